use cascada_core::GameError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Level {level} is invalid: {source}")]
    InvalidLevel {
        level: u32,
        #[source]
        source: GameError,
    },
    #[error("Unknown level mode {0:?}")]
    UnknownLevelMode(String),
    #[error("Unknown cell kind {0:?}")]
    UnknownCellKind(String),
    #[error("Unknown block color {0:?}")]
    UnknownColor(String),
    #[error("Unknown enemy kind {0:?}")]
    UnknownEnemyKind(String),
}

pub type Result<T> = core::result::Result<T, ProtocolError>;
