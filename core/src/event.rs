use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::*;

/// Why a game ended in defeat.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossReason {
    TargetScoreMissed,
    ObstaclesRemaining(u32),
    GateDestroyed,
    EnemiesRemaining,
}

impl fmt::Display for LossReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetScoreMissed => write!(f, "Target score not reached"),
            Self::ObstaclesRemaining(remaining) => write!(f, "Special cells remaining: {remaining}"),
            Self::GateDestroyed => write!(f, "Gate destroyed"),
            Self::EnemiesRemaining => write!(f, "Out of turns with enemies remaining"),
        }
    }
}

/// One observable occurrence during a player action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    BlocksSwapped {
        from: Position,
        to: Position,
    },
    BlocksMatched {
        positions: BTreeSet<Position>,
        color: BlockColor,
    },
    SpecialForming {
        positions: BTreeSet<Position>,
        special: SpecialType,
        creation: Position,
    },
    BlocksDestroyed {
        positions: BTreeSet<Position>,
    },
    SpecialCreated {
        position: Position,
        special: SpecialType,
        color: BlockColor,
    },
    BlocksFell {
        moves: Vec<(Position, Position)>,
    },
    BlocksSpawned {
        positions: Vec<Position>,
    },
    ScoreGained {
        points: u32,
        position: Position,
        multiplier: f32,
    },
    MultiplierIncreased {
        multiplier: f32,
    },
    RocketFired {
        position: Position,
        horizontal: bool,
        cleared: BTreeSet<Position>,
    },
    DiscoActivated {
        position: Position,
        color: BlockColor,
        cleared: BTreeSet<Position>,
    },
    PropellerFlew {
        from: Position,
        to: Position,
        cleared: BTreeSet<Position>,
    },
    PropellerCarrying {
        from: Position,
        to: Position,
        carried: SpecialType,
    },
    BombExploded {
        position: Position,
        cleared: BTreeSet<Position>,
    },
    ComboActivated {
        first: SpecialType,
        second: SpecialType,
        position: Position,
    },
    SimultaneousRocketFires {
        rockets: Vec<(Position, bool)>,
    },
    SimultaneousBombExplosions {
        positions: BTreeSet<Position>,
    },
    SimultaneousPropellerFlights {
        flights: Vec<(Position, Position)>,
    },
    DiscoTransformToRockets {
        positions: BTreeSet<Position>,
        color: BlockColor,
        horizontal: BTreeSet<Position>,
    },
    DiscoTransformToBombs {
        positions: BTreeSet<Position>,
        color: BlockColor,
    },
    DiscoTransformToPropellers {
        positions: BTreeSet<Position>,
        color: BlockColor,
    },
    CascadeStarted {
        level: u32,
    },
    CascadeEnded {
        level: u32,
    },
    CellCleared {
        position: Position,
        former: CellKind,
    },
    CellDamaged {
        position: Position,
        remaining: u32,
    },
    TurnEnded {
        turns_remaining: u32,
    },
    BoardStabilized,
    GameWon {
        score: u32,
        bonus: u32,
    },
    GameLost {
        reason: LossReason,
    },
    ProjectileFired {
        column: Coord,
        count: u32,
    },
    EnemySpawned {
        id: EnemyId,
        kind: EnemyKind,
        position: Position,
    },
    EnemyMoved {
        id: EnemyId,
        from: Position,
        to: Position,
    },
    EnemyDamaged {
        id: EnemyId,
        damage: u32,
        hp: u32,
    },
    EnemyDestroyed {
        id: EnemyId,
        position: Position,
    },
    GateDamaged {
        amount: u32,
        remaining: u32,
    },
}

impl GameEvent {
    pub fn from_cell_damage(position: Position, damage: CellDamage) -> Self {
        match damage {
            CellDamage::Damaged { remaining } => Self::CellDamaged {
                position,
                remaining,
            },
            CellDamage::Cleared { former } => Self::CellCleared { position, former },
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::GameWon { .. } | Self::GameLost { .. })
    }
}

/// An event together with the board as it was right after the event happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub event: GameEvent,
    pub board: Board,
}

/// FIFO of recorded events, drained exactly once by the caller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventLog {
    pending: Vec<RecordedEvent>,
}

impl EventLog {
    pub fn record(&mut self, event: GameEvent, board: &Board) {
        self.pending.push(RecordedEvent {
            event,
            board: board.clone(),
        });
    }

    pub fn drain(&mut self) -> Vec<RecordedEvent> {
        core::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
