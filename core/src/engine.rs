use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::resolve;
use crate::*;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    #[default]
    Ready,
    Active,
    Won,
    Lost,
}

impl EngineState {
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }

    pub const fn is_victory(self) -> bool {
        matches!(self, Self::Won)
    }
}

/// Rules engine for score and clear levels.
#[derive(Clone, Debug)]
pub struct GameEngine {
    config: LevelConfig,
    field: Playfield,
    score: u32,
    turns_remaining: u32,
    turn_score: u32,
    /// Multiplier bonus in 0.2 steps, reset every turn.
    multiplier_steps: u32,
    state: EngineState,
}

impl GameEngine {
    /// Builds the engine even from a configuration that does not validate; bad parts are clamped or skipped.
    pub fn new(config: LevelConfig) -> Self {
        if let Err(err) = config.validate() {
            log::warn!("Level {} does not validate, playing it anyway: {err}", config.level);
        }
        if config.mode == GameMode::TowerDefense {
            log::warn!("Level {} is a tower defense level, no win condition applies", config.level);
        }
        Self {
            field: Playfield::new(&config),
            score: 0,
            turns_remaining: config.max_turns,
            turn_score: 0,
            multiplier_steps: 0,
            state: Default::default(),
            config,
        }
    }

    pub fn try_new(config: LevelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn with_chain_order(mut self, chain_order: ChainOrder) -> Self {
        self.field.set_chain_order(chain_order);
        self
    }

    pub fn can_swap(&self, from: Position, to: Position) -> bool {
        resolve::can_swap(self, from, to)
    }

    /// Swaps two adjacent tiles and resolves the board. Returns `false` if the move was rejected, in which case
    /// nothing changed.
    pub fn swap(&mut self, from: Position, to: Position) -> bool {
        let accepted = resolve::swap(self, from, to);
        if accepted {
            self.mark_started();
        }
        accepted
    }

    pub fn tap_block(&mut self, pos: Position) -> bool {
        let accepted = resolve::tap(self, pos);
        if accepted {
            self.mark_started();
        }
        accepted
    }

    /// Everything recorded since the previous call, oldest first.
    pub fn get_events(&mut self) -> Vec<RecordedEvent> {
        self.field.drain_events()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn turns_remaining(&self) -> u32 {
        self.turns_remaining
    }

    pub fn multiplier(&self) -> f32 {
        multiplier_for(self.multiplier_steps)
    }

    pub fn is_game_over(&self) -> bool {
        self.state.is_finished()
    }

    pub fn is_victory(&self) -> bool {
        self.state.is_victory()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn board(&self) -> &Board {
        self.field.board()
    }

    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    pub fn special_cells_remaining(&self) -> u32 {
        self.board().obstacles_remaining() as u32
    }

    /// Currency earned by the game so far.
    pub fn wallet_reward(&self) -> u32 {
        match self.config.mode {
            GameMode::ScoreAccumulation if self.is_victory() => {
                self.score.saturating_sub(self.config.target_score)
            }
            GameMode::ClearSpecialCells if self.is_victory() => {
                self.score + self.turns_remaining * 10
            }
            GameMode::ScoreAccumulation | GameMode::ClearSpecialCells => 0,
            GameMode::TowerDefense => self.score,
        }
    }

    fn add_score(&mut self, base: u32, position: Position) {
        let points = base * (10 + 2 * self.multiplier_steps) / 10;
        self.score += points;
        self.turn_score += points;
        self.field.record(GameEvent::ScoreGained {
            points,
            position,
            multiplier: self.multiplier(),
        });

        let steps = self.turn_score / 10;
        if steps > self.multiplier_steps {
            self.multiplier_steps = steps;
            self.field.record(GameEvent::MultiplierIncreased {
                multiplier: self.multiplier(),
            });
        }

        if self.config.mode == GameMode::ScoreAccumulation && self.score >= self.config.target_score {
            self.evaluate();
        }
    }

    fn evaluate(&mut self) {
        match self.config.mode {
            GameMode::ScoreAccumulation => {
                if self.score >= self.config.target_score {
                    let bonus = self.score - self.config.target_score + self.turns_remaining * 5;
                    self.end_game(GameEvent::GameWon {
                        score: self.score,
                        bonus,
                    });
                } else if self.turns_remaining == 0 {
                    self.end_game(GameEvent::GameLost {
                        reason: LossReason::TargetScoreMissed,
                    });
                }
            }
            GameMode::ClearSpecialCells => {
                let remaining = self.special_cells_remaining();
                if remaining == 0 {
                    self.end_game(GameEvent::GameWon {
                        score: self.score,
                        bonus: self.turns_remaining * 10,
                    });
                } else if self.turns_remaining == 0 {
                    self.end_game(GameEvent::GameLost {
                        reason: LossReason::ObstaclesRemaining(remaining),
                    });
                }
            }
            GameMode::TowerDefense => {}
        }
    }

    fn mark_started(&mut self) {
        if self.state.is_ready() {
            self.state = EngineState::Active;
        }
    }

    /// Latches the outcome. Only the first call has any effect.
    fn end_game(&mut self, outcome: GameEvent) {
        if self.state.is_finished() {
            return;
        }

        self.state = if matches!(outcome, GameEvent::GameWon { .. }) {
            EngineState::Won
        } else {
            EngineState::Lost
        };
        log::debug!("Level {} over: {:?}", self.config.level, self.state);
        self.field.record(outcome);
    }
}

impl resolve::TurnRules for GameEngine {
    fn field(&self) -> &Playfield {
        &self.field
    }

    fn field_mut(&mut self) -> &mut Playfield {
        &mut self.field
    }

    fn is_game_over(&self) -> bool {
        self.state.is_finished()
    }

    fn tile_destroyed(&mut self, pos: Position, _tile: Tile) {
        self.add_score(1, pos);
    }

    fn board_stabilized(&mut self) {
        self.evaluate();
    }

    fn end_turn(&mut self) {
        self.turns_remaining = self.turns_remaining.saturating_sub(1);
        self.turn_score = 0;
        self.multiplier_steps = 0;
        self.field.end_turn();
        self.field.record(GameEvent::TurnEnded {
            turns_remaining: self.turns_remaining,
        });
        if self.turns_remaining == 0 {
            self.evaluate();
        }
    }
}

fn multiplier_for(steps: u32) -> f32 {
    (10 + 2 * steps) as f32 / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn at(row: Coord, col: Coord) -> Position {
        Position::new(row, col)
    }

    fn small(config: LevelConfig, rows: &[&str]) -> GameEngine {
        let config = config
            .with_board_size(rows[0].len() as Coord, rows.len() as Coord)
            .with_layout(rows.iter().copied());
        GameEngine::try_new(config).unwrap()
    }

    const LINE_FOUR: [&str; 3] = ["GbYG", "bYRb", "RRGR"];

    fn events(engine: &mut GameEngine) -> Vec<GameEvent> {
        engine.get_events().into_iter().map(|e| e.event).collect()
    }

    /// First swap, scanning row-major, that the engine would accept.
    fn first_move(board: &Board) -> Option<(Position, Position)> {
        for pos in board.positions() {
            for other in [pos.offset(0, 1), pos.offset(1, 0)] {
                let (Some(a), Some(b)) = (board.cell(pos), board.cell(other)) else {
                    continue;
                };
                if !a.can_swap() || !b.can_swap() {
                    continue;
                }
                if a.tile.is_some_and(|t| t.is_special()) || b.tile.is_some_and(|t| t.is_special()) {
                    return Some((pos, other));
                }
                let mut probe = board.clone();
                probe.swap_tiles(pos, other);
                if MatchFinder::new(&probe)
                    .find_all_matches()
                    .iter()
                    .any(|m| m.contains(pos) || m.contains(other))
                {
                    return Some((pos, other));
                }
            }
        }
        None
    }

    #[test]
    fn same_seed_same_game() {
        let config = LevelConfig::score_level(1, 60, 20).with_seed(99);
        let mut first = GameEngine::new(config.clone());
        let mut second = GameEngine::new(config);
        assert_eq!(first.board(), second.board());

        while !first.is_game_over() {
            let Some((from, to)) = first_move(first.board()) else {
                break;
            };
            assert!(first.swap(from, to));
            assert!(second.swap(from, to));
            assert_eq!(first.get_events(), second.get_events());
        }

        assert_eq!(first.score(), second.score());
        assert_eq!(first.is_victory(), second.is_victory());
        assert_eq!(first.board(), second.board());
    }

    #[test]
    fn non_adjacent_swap_is_rejected() {
        let mut engine = GameEngine::new(LevelConfig::score_level(1, 60, 20));

        assert!(!engine.can_swap(at(0, 0), at(2, 0)));
        assert!(!engine.swap(at(0, 0), at(2, 0)));
        assert!(engine.get_events().is_empty());
        assert_eq!(engine.turns_remaining(), 20);
        assert!(engine.state().is_ready());
    }

    #[test]
    fn turn_economy() {
        let mut engine = small(LevelConfig::score_level(1, 1000, 5), &LINE_FOUR);
        let before = engine.board().clone();

        assert!(!engine.swap(at(0, 0), at(0, 1)));
        assert_eq!(engine.board(), &before);
        assert_eq!((engine.score(), engine.turns_remaining()), (0, 5));

        assert!(engine.swap(at(1, 2), at(2, 2)));
        assert_eq!(engine.turns_remaining(), 4);
        assert!(engine.score() >= 4);
        assert_eq!(engine.multiplier(), 1.0);
        assert_eq!(engine.state(), EngineState::Active);
        let events = events(&mut engine);
        assert!(events.contains(&GameEvent::SpecialCreated {
            position: at(2, 2),
            special: SpecialType::RocketHorizontal,
            color: BlockColor::Red
        }));
        assert!(matches!(events.last(), Some(GameEvent::TurnEnded { turns_remaining: 4 })));
    }

    #[test]
    fn multiplier_grows_in_buckets_of_ten() {
        let mut engine = GameEngine::new(LevelConfig::score_level(1, 1000, 5));

        for _ in 0..50 {
            engine.add_score(1, at(0, 0));
        }
        assert_eq!(engine.score(), 50);
        assert_eq!(engine.multiplier(), 2.0);

        engine.add_score(1, at(0, 0));
        assert_eq!(engine.score(), 52);

        let increases = events(&mut engine)
            .iter()
            .filter(|e| matches!(e, GameEvent::MultiplierIncreased { .. }))
            .count();
        assert_eq!(increases, 5);
    }

    #[test]
    fn multiplier_resets_every_turn() {
        let mut engine = small(LevelConfig::score_level(1, 1000, 5), &["RGbY", "GDDR", "bYRG"]);

        assert!(engine.swap(at(1, 1), at(1, 2)));

        let events = events(&mut engine);
        assert!(events.iter().any(|e| matches!(e, GameEvent::MultiplierIncreased { .. })));
        assert!(engine.score() >= 12);
        assert_eq!(engine.multiplier(), 1.0);
    }

    #[test]
    fn score_level_is_won_mid_cascade() {
        let mut engine = small(LevelConfig::score_level(1, 4, 5), &LINE_FOUR);

        assert!(engine.swap(at(1, 2), at(2, 2)));

        let events = events(&mut engine);
        let won: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, GameEvent::GameWon { .. }))
            .collect();
        assert_eq!(won, [&GameEvent::GameWon { score: 4, bonus: 25 }]);
        assert!(!events.iter().any(|e| matches!(e, GameEvent::GameLost { .. })));
        assert!(engine.is_victory());
        assert_eq!(engine.state(), EngineState::Won);
        assert!(!engine.swap(at(0, 0), at(0, 1)));
        assert!(!engine.tap_block(at(2, 2)));
        assert_eq!(engine.wallet_reward(), engine.score() - 4);
    }

    #[test]
    fn score_level_is_lost_when_turns_run_out() {
        let mut engine = small(LevelConfig::score_level(1, 1000, 1), &LINE_FOUR);

        assert!(engine.swap(at(1, 2), at(2, 2)));

        let events = events(&mut engine);
        assert!(matches!(
            events[events.len() - 2..],
            [
                GameEvent::TurnEnded { turns_remaining: 0 },
                GameEvent::GameLost {
                    reason: LossReason::TargetScoreMissed
                }
            ]
        ));
        assert!(engine.is_game_over());
        assert!(!engine.is_victory());
        assert_eq!(engine.wallet_reward(), 0);
    }

    #[test]
    fn frozen_cell_takes_one_hit_per_adjacent_destruction() {
        let obstacles = vec![ObstacleConfig::frozen(at(1, 0), 2)];
        let mut engine = small(LevelConfig::clear_level(3, 5, obstacles), &LINE_FOUR);

        assert!(engine.swap(at(1, 2), at(2, 2)));

        let first_hit = events(&mut engine)
            .into_iter()
            .find(|e| matches!(e, GameEvent::CellDamaged { .. } | GameEvent::CellCleared { .. }));
        assert_eq!(
            first_hit,
            Some(GameEvent::CellDamaged {
                position: at(1, 0),
                remaining: 1
            })
        );
    }

    #[test]
    fn thawed_cell_accepts_swaps() {
        let mut board = Board::new(3, 3);
        board.setup_special_cells(&[ObstacleConfig::frozen(at(1, 1), 2)]);
        board.fill_empty(&mut GameRng::new(4));

        assert!(!board.cell(at(1, 1)).unwrap().can_swap());
        assert_eq!(
            board.damage_adjacent_cells(at(0, 1), Some(BlockColor::Red)),
            [(at(1, 1), CellDamage::Damaged { remaining: 1 })]
        );
        assert_eq!(
            board.damage_adjacent_cells(at(2, 1), Some(BlockColor::Blue)),
            [(at(1, 1), CellDamage::Cleared { former: CellKind::Frozen })]
        );

        board.apply_gravity();
        board.fill_empty(&mut GameRng::new(5));
        assert!(board.cell(at(1, 1)).unwrap().can_swap());
    }

    #[test]
    fn clear_level_latches_a_single_victory() {
        let obstacles = vec![ObstacleConfig::frozen(at(1, 0), 1)];
        let mut engine = small(LevelConfig::clear_level(3, 5, obstacles), &LINE_FOUR);
        assert_eq!(engine.special_cells_remaining(), 1);

        assert!(engine.swap(at(1, 2), at(2, 2)));
        assert_eq!(engine.special_cells_remaining(), 0);
        engine.evaluate();
        engine.evaluate();

        let events = events(&mut engine);
        let outcomes: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], GameEvent::GameWon { bonus: 50, .. }));
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::CellCleared {
                former: CellKind::Frozen,
                ..
            }
        )));
        assert!(engine.is_victory());
        assert_eq!(engine.wallet_reward(), engine.score() + 4 * 10);
    }

    #[test]
    fn clear_level_is_lost_with_obstacles_left() {
        let obstacles = vec![ObstacleConfig::boxed(at(0, 0), 50)];
        let mut engine = small(LevelConfig::clear_level(3, 1, obstacles), &LINE_FOUR);

        assert!(engine.swap(at(1, 2), at(2, 2)));

        assert!(events(&mut engine).contains(&GameEvent::GameLost {
            reason: LossReason::ObstaclesRemaining(1)
        }));
        assert_eq!(engine.wallet_reward(), 0);
    }

    #[test]
    fn invalid_configuration_is_reported() {
        let config = LevelConfig::score_level(1, 60, 20).with_board_size(0, 5);

        assert!(matches!(
            GameEngine::try_new(config.clone()),
            Err(GameError::InvalidBoardSize { .. })
        ));
        assert_eq!(GameEngine::new(config).board().width(), 1);
    }
}
