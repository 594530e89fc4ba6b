use std::collections::BTreeMap;

use cascada_core::{
    BlockColor, CellKind, Coord, EnemyConfig, EnemyKind, GameMode, LayoutSymbol, LevelConfig, LevelSource,
    ObstacleConfig, Position,
};
use serde::{Deserialize, Serialize};

use crate::*;

/// Top level of a level file: `{"levels": [...]}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelsFile {
    pub levels: Vec<LevelRecord>,
}

/// One level as written in a level file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelRecord {
    pub level_number: u32,
    pub mode: String,
    pub board_width: Coord,
    pub board_height: Coord,
    pub max_turns: u32,
    #[serde(default)]
    pub target_score: u32,
    #[serde(default)]
    pub special_cells: Vec<SpecialCellRecord>,
    #[serde(default)]
    pub enemies: Vec<EnemyRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_board: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialCellRecord {
    pub row: Coord,
    pub col: Coord,
    #[serde(rename = "type")]
    pub kind: String,
    pub durability: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_color: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub spawn_turn: u32,
    pub spawn_col: Coord,
    pub hp: u32,
}

impl LevelRecord {
    /// Converts and validates the record.
    pub fn to_config(&self) -> Result<LevelConfig> {
        let mode: GameMode = self
            .mode
            .parse()
            .map_err(|_| ProtocolError::UnknownLevelMode(self.mode.clone()))?;

        let mut config = LevelConfig::new_unchecked(
            self.level_number,
            mode,
            (self.board_width, self.board_height),
            self.max_turns,
        );
        config.target_score = self.target_score;
        config.obstacles = self
            .special_cells
            .iter()
            .map(SpecialCellRecord::to_obstacle)
            .collect::<Result<_>>()?;
        config.enemies = self
            .enemies
            .iter()
            .map(EnemyRecord::to_enemy)
            .collect::<Result<_>>()?;
        if let Some(rows) = &self.initial_board {
            let (layout, obstacles) = parse_initial_board(rows);
            config.layout = Some(layout);
            config.obstacles.extend(obstacles);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        config.validate().map_err(|source| ProtocolError::InvalidLevel {
            level: self.level_number,
            source,
        })?;
        Ok(config)
    }
}

impl SpecialCellRecord {
    fn to_obstacle(&self) -> Result<ObstacleConfig> {
        let kind: CellKind = self
            .kind
            .parse()
            .map_err(|_| ProtocolError::UnknownCellKind(self.kind.clone()))?;
        let required_color = self.required_color.as_deref().map(parse_color).transpose()?;
        Ok(ObstacleConfig {
            position: Position::new(self.row, self.col),
            kind,
            durability: self.durability,
            required_color,
        })
    }
}

impl EnemyRecord {
    fn to_enemy(&self) -> Result<EnemyConfig> {
        let kind: EnemyKind = self
            .kind
            .parse()
            .map_err(|_| ProtocolError::UnknownEnemyKind(self.kind.clone()))?;
        Ok(EnemyConfig {
            kind,
            spawn_turn: self.spawn_turn,
            column: self.spawn_col,
            hp: self.hp,
        })
    }
}

fn parse_color(name: &str) -> Result<BlockColor> {
    name.parse()
        .map_err(|_| ProtocolError::UnknownColor(name.to_owned()))
}

/// Splits an initial board into a layout and the obstacles embedded in it.
///
/// Rows are whitespace separated tokens: `R B G Y` for plain tiles, `🚀H` `🚀V` `💣` `🌀` `🪩` for specials,
/// `❄️2` `📦3` `🎨R2` for obstacles with their durability, and `.` for an empty cell. A row made of a single
/// token written in layout symbols (`RGbY..`) is taken as is.
pub fn parse_initial_board(rows: &[String]) -> (Vec<String>, Vec<ObstacleConfig>) {
    let mut layout = Vec::with_capacity(rows.len());
    let mut obstacles = Vec::new();

    for (row, line) in rows.iter().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if let [compact] = tokens[..]
            && compact.chars().count() > 1
            && compact.chars().all(|c| LayoutSymbol::parse(c).is_some())
        {
            layout.push(compact.to_owned());
            continue;
        }

        let mut symbols = String::with_capacity(tokens.len());
        for (col, token) in tokens.into_iter().enumerate() {
            let position = Position::new(row as Coord, col as Coord);
            let symbol = match parse_token(token, position) {
                Token::Symbol(symbol) => symbol,
                Token::Obstacle(obstacle) => {
                    obstacles.push(obstacle);
                    '.'
                }
                Token::Unknown => {
                    log::warn!("Unknown board token {token:?} at {position}, left empty");
                    '.'
                }
            };
            symbols.push(symbol);
        }
        layout.push(symbols);
    }

    (layout, obstacles)
}

enum Token {
    Symbol(char),
    Obstacle(ObstacleConfig),
    Unknown,
}

fn parse_token(token: &str, position: Position) -> Token {
    let durability = |rest: &str, default: u32| rest.parse().unwrap_or(default);

    match token {
        "." => Token::Symbol('.'),
        "R" => Token::Symbol('R'),
        "B" => Token::Symbol('b'),
        "G" => Token::Symbol('G'),
        "Y" => Token::Symbol('Y'),
        "🚀H" => Token::Symbol('H'),
        "🚀V" => Token::Symbol('V'),
        "💣" => Token::Symbol('B'),
        "🌀" => Token::Symbol('P'),
        "🪩" => Token::Symbol('D'),
        _ => {
            if let Some(rest) = strip_emoji(token, '❄') {
                Token::Obstacle(ObstacleConfig::frozen(position, durability(rest, 1)))
            } else if let Some(rest) = strip_emoji(token, '📦') {
                Token::Obstacle(ObstacleConfig::boxed(position, durability(rest, 2)))
            } else if let Some(rest) = strip_emoji(token, '🎨') {
                let (color, rest) = match rest.chars().next() {
                    Some('R') => (BlockColor::Red, &rest[1..]),
                    Some('B') => (BlockColor::Blue, &rest[1..]),
                    Some('G') => (BlockColor::Green, &rest[1..]),
                    Some('Y') => (BlockColor::Yellow, &rest[1..]),
                    _ => (BlockColor::Red, rest),
                };
                Token::Obstacle(ObstacleConfig::color_box(position, durability(rest, 2), color))
            } else {
                Token::Unknown
            }
        }
    }
}

/// Strips an emoji prefix, with or without its variation selector.
fn strip_emoji(token: &str, emoji: char) -> Option<&str> {
    let rest = token.strip_prefix(emoji)?;
    Some(rest.strip_prefix('\u{fe0f}').unwrap_or(rest))
}

/// Hand-made levels loaded from a level file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelCatalog {
    levels: BTreeMap<u32, LevelConfig>,
}

impl LevelCatalog {
    pub fn from_json(json: &str) -> Result<Self> {
        let file: LevelsFile = serde_json::from_str(json)?;
        Self::from_records(&file.levels)
    }

    /// Converts every record. A level number given twice keeps the later record.
    pub fn from_records(records: &[LevelRecord]) -> Result<Self> {
        let mut levels = BTreeMap::new();
        for record in records {
            if levels.insert(record.level_number, record.to_config()?).is_some() {
                log::warn!("Level {} is defined more than once, keeping the last one", record.level_number);
            }
        }
        log::debug!("Loaded {} levels", levels.len());
        Ok(Self { levels })
    }

    pub fn get(&self, level: u32) -> Option<&LevelConfig> {
        self.levels.get(&level)
    }

    pub fn contains(&self, level: u32) -> bool {
        self.levels.contains_key(&level)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> impl Iterator<Item = &LevelConfig> {
        self.levels.values()
    }
}

impl LevelSource for LevelCatalog {
    fn level_config(&self, level: u32) -> Option<LevelConfig> {
        self.get(level).cloned()
    }
}
