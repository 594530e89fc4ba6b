use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::*;

/// Single coordinate axis used for board width, height, and positions.
///
/// Signed so that neighbourhoods can be computed around edge cells and clipped by the board afterwards.
pub type Coord = i32;

/// Largest width or height a board may have.
pub const MAX_BOARD_DIM: Coord = 32;

/// Two-dimensional board coordinates, ordered row-major.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub row: Coord,
    pub col: Coord,
}

const ADJACENT: [(Coord, Coord); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

impl Position {
    pub const fn new(row: Coord, col: Coord) -> Self {
        Self { row, col }
    }

    pub const fn offset(self, d_row: Coord, d_col: Coord) -> Self {
        Self::new(self.row + d_row, self.col + d_col)
    }

    pub const fn is_adjacent(self, other: Position) -> bool {
        let d_row = (self.row - other.row).abs();
        let d_col = (self.col - other.col).abs();
        d_row + d_col == 1
    }

    pub const fn manhattan(self, other: Position) -> Coord {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }

    /// The four orthogonal neighbours: up, down, left, right.
    pub fn adjacent(self) -> [Position; 4] {
        ADJACENT.map(|(d_row, d_col)| self.offset(d_row, d_col))
    }

    pub fn cross(self) -> [Position; 4] {
        self.adjacent()
    }

    pub fn area_3x3(self) -> impl Iterator<Item = Position> {
        self.area(1)
    }

    pub fn area_5x5(self) -> impl Iterator<Item = Position> {
        self.area(2)
    }

    /// Square neighbourhood of the given radius in row-major order, not clipped to any board.
    fn area(self, radius: Coord) -> impl Iterator<Item = Position> {
        (-radius..=radius)
            .flat_map(move |d_row| (-radius..=radius).map(move |d_col| self.offset(d_row, d_col)))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

pub trait ToNdIndex {
    type Output;
    fn to_nd_index(self) -> Self::Output;
}

impl ToNdIndex for Position {
    type Output = [usize; 2];

    /// Only meaningful for positions already checked against the board bounds.
    fn to_nd_index(self) -> Self::Output {
        [self.row as usize, self.col as usize]
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockColor {
    Red,
    Blue,
    Green,
    Yellow,
}

impl BlockColor {
    pub const ALL: [BlockColor; 4] = [Self::Red, Self::Blue, Self::Green, Self::Yellow];

    /// Glyph used by board rendering and layout rows. Blue is lowercase since `B` is the bomb.
    pub const fn glyph(self) -> char {
        match self {
            Self::Red => 'R',
            Self::Blue => 'b',
            Self::Green => 'G',
            Self::Yellow => 'Y',
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Red => "RED",
            Self::Blue => "BLUE",
            Self::Green => "GREEN",
            Self::Yellow => "YELLOW",
        }
    }
}

impl FromStr for BlockColor {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|color| color.name().eq_ignore_ascii_case(s))
            .ok_or(GameError::UnknownName("block color"))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecialType {
    #[default]
    None,
    RocketHorizontal,
    RocketVertical,
    DiscoBall,
    Propeller,
    Bomb,
}

impl SpecialType {
    pub const fn is_special(self) -> bool {
        !matches!(self, Self::None)
    }

    pub const fn is_rocket(self) -> bool {
        matches!(self, Self::RocketHorizontal | Self::RocketVertical)
    }

    pub const fn rocket(horizontal: bool) -> Self {
        if horizontal {
            Self::RocketHorizontal
        } else {
            Self::RocketVertical
        }
    }

    /// Total order used to normalise combo pairs: rockets < disco ball < propeller < bomb.
    ///
    /// Plain tiles sort last; they never take part in a combo.
    pub const fn combo_rank(self) -> u8 {
        match self {
            Self::RocketHorizontal | Self::RocketVertical => 0,
            Self::DiscoBall => 1,
            Self::Propeller => 2,
            Self::Bomb => 3,
            Self::None => 4,
        }
    }

    pub const fn glyph(self) -> Option<char> {
        match self {
            Self::None => None,
            Self::RocketHorizontal => Some('H'),
            Self::RocketVertical => Some('V'),
            Self::DiscoBall => Some('D'),
            Self::Propeller => Some('P'),
            Self::Bomb => Some('B'),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn adjacency_is_orthogonal_only() {
        let center = Position::new(2, 2);

        assert!(center.is_adjacent(Position::new(1, 2)));
        assert!(center.is_adjacent(Position::new(2, 3)));
        assert!(!center.is_adjacent(Position::new(3, 3)));
        assert!(!center.is_adjacent(center));
        assert!(!center.is_adjacent(Position::new(2, 4)));
    }

    #[test]
    fn areas_are_row_major_and_unclipped() {
        let area: Vec<_> = Position::new(0, 0).area_3x3().collect();

        assert_eq!(area.len(), 9);
        assert_eq!(area[0], Position::new(-1, -1));
        assert_eq!(area[4], Position::new(0, 0));
        assert_eq!(area[8], Position::new(1, 1));
        assert_eq!(Position::new(5, 5).area_5x5().count(), 25);
    }

    #[test]
    fn positions_order_row_major() {
        let mut positions = [
            Position::new(1, 0),
            Position::new(0, 3),
            Position::new(0, 1),
        ];
        positions.sort();

        assert_eq!(
            positions,
            [
                Position::new(0, 1),
                Position::new(0, 3),
                Position::new(1, 0)
            ]
        );
    }

    #[test]
    fn combo_rank_is_explicit() {
        use SpecialType::*;

        assert_eq!(RocketHorizontal.combo_rank(), RocketVertical.combo_rank());
        assert!(RocketVertical.combo_rank() < DiscoBall.combo_rank());
        assert!(DiscoBall.combo_rank() < Propeller.combo_rank());
        assert!(Propeller.combo_rank() < Bomb.combo_rank());
    }

    #[test]
    fn color_names_parse_case_insensitively() {
        assert_eq!("red".parse::<BlockColor>(), Ok(BlockColor::Red));
        assert_eq!("YELLOW".parse::<BlockColor>(), Ok(BlockColor::Yellow));
        assert_eq!(
            "purple".parse::<BlockColor>(),
            Err(GameError::UnknownName("block color"))
        );
    }
}
