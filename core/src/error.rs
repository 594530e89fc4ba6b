use thiserror::Error;

use crate::{Coord, Position};

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Board size {width}x{height} is outside the supported range")]
    InvalidBoardSize { width: Coord, height: Coord },
    #[error("Position {0} is outside the board")]
    PositionOutOfBounds(Position),
    #[error("Color box at {0} has no required color")]
    MissingRequiredColor(Position),
    #[error("Obstacle at {0} has zero durability")]
    ZeroDurability(Position),
    #[error("Unknown layout symbol {symbol:?} at row {row}, column {col}")]
    InvalidLayoutSymbol { row: usize, col: usize, symbol: char },
    #[error("Initial layout does not fit the board")]
    LayoutTooLarge,
    #[error("Enemy column {0} is outside the board")]
    EnemyColumnOutOfBounds(Coord),
    #[error("Level must allow at least one turn")]
    NoTurns,
    #[error("Unknown {0} name")]
    UnknownName(&'static str),
}

pub type Result<T> = core::result::Result<T, GameError>;
