#![no_std]

extern crate alloc;

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

pub use activator::*;
pub use board::*;
pub use defense::*;
pub use engine::*;
pub use error::*;
pub use event::*;
pub use generator::*;
pub use matcher::*;
pub use resolve::*;
pub use tile::*;
pub use types::*;

mod activator;
mod board;
mod defense;
mod engine;
mod error;
mod event;
mod generator;
mod matcher;
mod resolve;
mod tile;
mod types;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMode {
    #[default]
    ScoreAccumulation,
    ClearSpecialCells,
    TowerDefense,
}

impl GameMode {
    pub const fn name(self) -> &'static str {
        match self {
            Self::ScoreAccumulation => "SCORE_ACCUMULATION",
            Self::ClearSpecialCells => "CLEAR_SPECIAL_CELLS",
            Self::TowerDefense => "TOWER_DEFENSE",
        }
    }
}

impl FromStr for GameMode {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        [
            Self::ScoreAccumulation,
            Self::ClearSpecialCells,
            Self::TowerDefense,
        ]
        .into_iter()
        .find(|mode| mode.name().eq_ignore_ascii_case(s))
        .ok_or(GameError::UnknownName("game mode"))
    }
}

/// One obstacle placement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleConfig {
    pub position: Position,
    pub kind: CellKind,
    pub durability: u32,
    pub required_color: Option<BlockColor>,
}

impl ObstacleConfig {
    pub const fn frozen(position: Position, durability: u32) -> Self {
        Self {
            position,
            kind: CellKind::Frozen,
            durability,
            required_color: None,
        }
    }

    pub const fn frozen_zone(position: Position, durability: u32) -> Self {
        Self {
            position,
            kind: CellKind::FrozenZone,
            durability,
            required_color: None,
        }
    }

    pub const fn boxed(position: Position, durability: u32) -> Self {
        Self {
            position,
            kind: CellKind::Box,
            durability,
            required_color: None,
        }
    }

    pub const fn color_box(position: Position, durability: u32, color: BlockColor) -> Self {
        Self {
            position,
            kind: CellKind::ColorBox,
            durability,
            required_color: Some(color),
        }
    }
}

/// One scheduled enemy of a tower defense level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyConfig {
    pub kind: EnemyKind,
    pub spawn_turn: u32,
    pub column: Coord,
    pub hp: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub level: u32,
    pub mode: GameMode,
    pub width: Coord,
    pub height: Coord,
    pub max_turns: u32,
    pub target_score: u32,
    pub obstacles: Vec<ObstacleConfig>,
    pub enemies: Vec<EnemyConfig>,
    pub layout: Option<Vec<String>>,
    pub seed: u64,
}

impl LevelConfig {
    /// Seed used for a level when none is given explicitly.
    pub const fn default_seed(level: u32) -> u64 {
        level as u64 * 12345
    }

    pub const fn board_size_for_level(level: u32) -> (Coord, Coord) {
        if level <= 40 { (7, 10) } else { (9, 12) }
    }

    pub fn new_unchecked(level: u32, mode: GameMode, (width, height): (Coord, Coord), max_turns: u32) -> Self {
        Self {
            level,
            mode,
            width,
            height,
            max_turns,
            target_score: 0,
            obstacles: Vec::new(),
            enemies: Vec::new(),
            layout: None,
            seed: Self::default_seed(level),
        }
    }

    pub fn score_level(level: u32, target_score: u32, max_turns: u32) -> Self {
        Self {
            target_score,
            ..Self::new_unchecked(
                level,
                GameMode::ScoreAccumulation,
                Self::board_size_for_level(level),
                max_turns.max(1),
            )
        }
    }

    pub fn clear_level(level: u32, max_turns: u32, obstacles: Vec<ObstacleConfig>) -> Self {
        Self {
            obstacles,
            ..Self::new_unchecked(
                level,
                GameMode::ClearSpecialCells,
                Self::board_size_for_level(level),
                max_turns.max(1),
            )
        }
    }

    /// Tower defense levels play on a shorter board than the other modes.
    pub fn tower_defense_level(level: u32, max_turns: u32, enemies: Vec<EnemyConfig>) -> Self {
        let width = Self::board_size_for_level(level).0;
        Self {
            enemies,
            ..Self::new_unchecked(level, GameMode::TowerDefense, (width, 8), max_turns.max(1))
        }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }

    pub fn with_layout<S: Into<String>>(self, rows: impl IntoIterator<Item = S>) -> Self {
        Self {
            layout: Some(rows.into_iter().map(Into::into).collect()),
            ..self
        }
    }

    pub fn with_board_size(self, width: Coord, height: Coord) -> Self {
        Self {
            width,
            height,
            ..self
        }
    }

    /// Board dimensions, clamped into `1..=MAX_BOARD_DIM`.
    pub fn board_size(&self) -> (Coord, Coord) {
        (
            self.width.clamp(1, MAX_BOARD_DIM),
            self.height.clamp(1, MAX_BOARD_DIM),
        )
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = |dim: Coord| (1..=MAX_BOARD_DIM).contains(&dim);
        if !in_range(self.width) || !in_range(self.height) {
            return Err(GameError::InvalidBoardSize {
                width: self.width,
                height: self.height,
            });
        }
        if self.max_turns == 0 {
            return Err(GameError::NoTurns);
        }

        let contains = |pos: Position| {
            (0..self.height).contains(&pos.row) && (0..self.width).contains(&pos.col)
        };
        for obstacle in &self.obstacles {
            if !contains(obstacle.position) {
                return Err(GameError::PositionOutOfBounds(obstacle.position));
            }
            if obstacle.durability == 0 || obstacle.kind.is_normal() {
                return Err(GameError::ZeroDurability(obstacle.position));
            }
            if obstacle.kind == CellKind::ColorBox && obstacle.required_color.is_none() {
                return Err(GameError::MissingRequiredColor(obstacle.position));
            }
        }

        if let Some(rows) = &self.layout {
            if rows.len() > self.height as usize
                || rows.iter().any(|row| row.chars().count() > self.width as usize)
            {
                return Err(GameError::LayoutTooLarge);
            }
            for (row, line) in rows.iter().enumerate() {
                for (col, symbol) in line.chars().enumerate() {
                    if LayoutSymbol::parse(symbol).is_none() {
                        return Err(GameError::InvalidLayoutSymbol { row, col, symbol });
                    }
                }
            }
        }

        if let Some(enemy) = self.enemies.iter().find(|enemy| !(0..self.width).contains(&enemy.column)) {
            return Err(GameError::EnemyColumnOutOfBounds(enemy.column));
        }
        Ok(())
    }

    pub fn description(&self) -> String {
        match self.mode {
            GameMode::ScoreAccumulation => format!(
                "Score {} points in {} turns",
                self.target_score, self.max_turns
            ),
            GameMode::ClearSpecialCells => format!("Clear all obstacles in {} turns", self.max_turns),
            GameMode::TowerDefense => format!("Defend the gate for {} turns", self.max_turns),
        }
    }
}
