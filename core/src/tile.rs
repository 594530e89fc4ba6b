use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::*;

/// Creation-order identity of a tile, minted by the board that spawned it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileId(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub color: BlockColor,
    pub special: SpecialType,
}

impl Tile {
    pub const fn is_special(&self) -> bool {
        self.special.is_special()
    }

    pub const fn is_rocket(&self) -> bool {
        self.special.is_rocket()
    }

    pub const fn glyph(&self) -> char {
        match self.special.glyph() {
            Some(glyph) => glyph,
            None => self.color.glyph(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellKind {
    #[default]
    Normal,
    Frozen,
    FrozenZone,
    Box,
    ColorBox,
}

impl CellKind {
    pub const fn is_normal(self) -> bool {
        matches!(self, Self::Normal)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Frozen => "FROZEN",
            Self::FrozenZone => "FROZEN_ZONE",
            Self::Box => "BOX",
            Self::ColorBox => "COLOR_BOX",
        }
    }

    const fn glyph(self) -> char {
        match self {
            Self::Normal => '.',
            Self::Frozen => '*',
            Self::FrozenZone => '%',
            Self::Box => '#',
            Self::ColorBox => '@',
        }
    }
}

impl FromStr for CellKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        [
            Self::Normal,
            Self::Frozen,
            Self::FrozenZone,
            Self::Box,
            Self::ColorBox,
        ]
        .into_iter()
        .find(|kind| kind.name().eq_ignore_ascii_case(s))
        .ok_or(GameError::UnknownName("cell kind"))
    }
}

/// What happened to an obstacle that took a hit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CellDamage {
    Damaged { remaining: u32 },
    Cleared { former: CellKind },
}

/// One slot of the board. Its position is implied by its index in the grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub kind: CellKind,
    pub durability: u32,
    pub required_color: Option<BlockColor>,
    pub tile: Option<Tile>,
}

impl Cell {
    pub const fn obstacle(
        kind: CellKind,
        durability: u32,
        required_color: Option<BlockColor>,
    ) -> Self {
        Self {
            kind,
            durability,
            required_color,
            tile: None,
        }
    }

    pub const fn is_normal(&self) -> bool {
        self.kind.is_normal()
    }

    /// Normal slot with nothing in it, waiting for gravity or a refill.
    pub const fn is_vacant(&self) -> bool {
        self.kind.is_normal() && self.tile.is_none()
    }

    pub const fn is_blocked(&self) -> bool {
        !self.kind.is_normal() && self.durability > 0
    }

    pub const fn can_swap(&self) -> bool {
        self.kind.is_normal() && self.tile.is_some()
    }

    /// Applies one point of damage. Color boxes only react to their own color.
    pub fn take_damage(&mut self, color: Option<BlockColor>) -> Option<CellDamage> {
        if !self.is_blocked() {
            return None;
        }
        if matches!(self.kind, CellKind::ColorBox) && color != self.required_color {
            return None;
        }

        if self.durability > 1 {
            self.durability -= 1;
            Some(CellDamage::Damaged {
                remaining: self.durability,
            })
        } else {
            let former = self.kind;
            self.kind = CellKind::Normal;
            self.durability = 0;
            self.required_color = None;
            Some(CellDamage::Cleared { former })
        }
    }

    pub fn glyph(&self) -> char {
        if self.is_blocked() {
            self.kind.glyph()
        } else {
            self.tile.map_or('.', |tile| tile.glyph())
        }
    }
}
