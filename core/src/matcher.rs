use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::cmp::Reverse;
use hashbrown::HashSet;
use smallvec::SmallVec;

use crate::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MatchType {
    Line3,
    Line4,
    Line5,
    Square2x2,
    TShape,
    LShape,
}

impl MatchType {
    /// Merge priority: higher values claim contested tiles first.
    pub const fn priority(self) -> u8 {
        match self {
            Self::Line5 => 100,
            Self::TShape | Self::LShape => 80,
            Self::Square2x2 => 70,
            Self::Line4 => 60,
            Self::Line3 => 30,
        }
    }

    const fn for_run(len: usize) -> Self {
        match len {
            0..=3 => Self::Line3,
            4 => Self::Line4,
            _ => Self::Line5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    pub positions: BTreeSet<Position>,
    pub color: BlockColor,
    pub kind: MatchType,
    /// The cell the player swiped into, when it is part of this match.
    pub swapped_to: Option<Position>,
}

impl Match {
    pub fn new(positions: BTreeSet<Position>, color: BlockColor, kind: MatchType) -> Self {
        Self {
            positions,
            color,
            kind,
            swapped_to: None,
        }
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.positions.contains(&pos)
    }

    pub fn is_horizontal(&self) -> bool {
        let mut rows = self.positions.iter().map(|pos| pos.row);
        let first = rows.next();
        rows.all(|row| Some(row) == first)
    }

    pub fn special_type(&self) -> SpecialType {
        match self.kind {
            MatchType::Line3 => SpecialType::None,
            MatchType::Line4 => SpecialType::rocket(self.is_horizontal()),
            MatchType::Line5 => SpecialType::DiscoBall,
            MatchType::Square2x2 => SpecialType::Propeller,
            MatchType::TShape | MatchType::LShape => SpecialType::Bomb,
        }
    }

    /// Where a special formed by this match appears: the swiped-to cell if it is part of the match, otherwise
    /// the bottom-most, then left-most position.
    pub fn creation_position(&self) -> Position {
        if let Some(pos) = self.swapped_to.filter(|pos| self.contains(*pos)) {
            return pos;
        }
        self.positions
            .iter()
            .copied()
            .max_by_key(|pos| (pos.row, Reverse(pos.col)))
            .unwrap_or_default()
    }
}

type Pattern = [(Coord, Coord); 5];

/// T pentominoes: a bar of three centered on the anchor plus a two-cell stem.
const T_PATTERNS: [Pattern; 4] = [
    [(0, -1), (0, 0), (0, 1), (1, 0), (2, 0)],
    [(0, -1), (0, 0), (0, 1), (-1, 0), (-2, 0)],
    [(-1, 0), (0, 0), (1, 0), (0, 1), (0, 2)],
    [(-1, 0), (0, 0), (1, 0), (0, -1), (0, -2)],
];

/// L pentominoes: two bars of three sharing a corner of the 3x3 box anchored at the top-left.
const L_PATTERNS: [Pattern; 4] = [
    [(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)],
    [(0, 0), (0, 1), (0, 2), (1, 0), (2, 0)],
    [(0, 0), (0, 1), (0, 2), (1, 2), (2, 2)],
    [(0, 2), (1, 2), (2, 0), (2, 1), (2, 2)],
];

pub struct MatchFinder<'a> {
    board: &'a Board,
}

impl<'a> MatchFinder<'a> {
    pub fn new(board: &'a Board) -> Self {
        Self { board }
    }

    /// Color of a tile that can take part in a match: present and not special.
    fn matchable(&self, pos: Position) -> Option<BlockColor> {
        self.board
            .tile(pos)
            .filter(|tile| !tile.is_special())
            .map(|tile| tile.color)
    }

    pub fn find_all_matches(&self) -> Vec<Match> {
        let mut candidates = Vec::new();
        self.find_runs(&mut candidates, false);
        self.find_runs(&mut candidates, true);
        self.find_squares(&mut candidates);
        self.find_shapes(&mut candidates);
        merge_overlapping(candidates)
    }

    /// Same as [`Self::find_all_matches`], tagging every accepted match that contains `swapped_to`.
    pub fn find_all_matches_with_swap_info(&self, swapped_to: Position) -> Vec<Match> {
        let mut matches = self.find_all_matches();
        for m in matches.iter_mut().filter(|m| m.contains(swapped_to)) {
            m.swapped_to = Some(swapped_to);
        }
        matches
    }

    pub fn has_any_matches(&self) -> bool {
        !self.find_all_matches().is_empty()
    }

    pub fn find_matches_at(&self, pos: Position) -> Vec<Match> {
        self.find_all_matches()
            .into_iter()
            .filter(|m| m.contains(pos))
            .collect()
    }

    /// Maximal same-color runs along rows (left to right) or columns (top to bottom).
    fn find_runs(&self, out: &mut Vec<Match>, vertical: bool) {
        let (lines, len) = if vertical {
            (self.board.width(), self.board.height())
        } else {
            (self.board.height(), self.board.width())
        };
        let at = |line: Coord, i: Coord| {
            if vertical {
                Position::new(i, line)
            } else {
                Position::new(line, i)
            }
        };

        for line in 0..lines {
            let mut start = 0;
            while start < len {
                let Some(color) = self.matchable(at(line, start)) else {
                    start += 1;
                    continue;
                };
                let mut end = start + 1;
                while end < len && self.matchable(at(line, end)) == Some(color) {
                    end += 1;
                }
                let run = (end - start) as usize;
                if run >= 3 {
                    let positions = (start..end).map(|i| at(line, i)).collect();
                    out.push(Match::new(positions, color, MatchType::for_run(run)));
                }
                start = end;
            }
        }
    }

    fn find_squares(&self, out: &mut Vec<Match>) {
        for row in 0..self.board.height() - 1 {
            for col in 0..self.board.width() - 1 {
                let corner = Position::new(row, col);
                let square = [
                    corner,
                    corner.offset(0, 1),
                    corner.offset(1, 0),
                    corner.offset(1, 1),
                ];
                let Some(color) = self.uniform_color(&square) else {
                    continue;
                };
                let positions: BTreeSet<_> = square.into_iter().collect();
                if out.iter().any(|m| m.positions.is_superset(&positions)) {
                    continue;
                }
                out.push(Match::new(positions, color, MatchType::Square2x2));
            }
        }
    }

    /// T shapes then L shapes, anchored at every cell in row-major order.
    fn find_shapes(&self, out: &mut Vec<Match>) {
        for anchor in self.board.positions() {
            let shapes = T_PATTERNS
                .iter()
                .map(|pattern| (pattern, MatchType::TShape))
                .chain(L_PATTERNS.iter().map(|pattern| (pattern, MatchType::LShape)));
            for (pattern, kind) in shapes {
                let cells: SmallVec<[Position; 5]> = pattern
                    .iter()
                    .map(|&(d_row, d_col)| anchor.offset(d_row, d_col))
                    .collect();
                if let Some(color) = self.uniform_color(&cells) {
                    out.push(Match::new(cells.into_iter().collect(), color, kind));
                }
            }
        }
    }

    fn uniform_color(&self, cells: &[Position]) -> Option<BlockColor> {
        let (&first, rest) = cells.split_first()?;
        let color = self.matchable(first)?;
        rest.iter()
            .all(|&pos| self.matchable(pos) == Some(color))
            .then_some(color)
    }
}

/// Greedy, highest-priority-first overlap resolution. A contested match survives only when at least three of
/// its cells are still unclaimed and it is not a plain line of three.
fn merge_overlapping(mut candidates: Vec<Match>) -> Vec<Match> {
    candidates.sort_by_key(|m| Reverse(m.kind.priority()));

    let mut claimed: HashSet<Position> = HashSet::new();
    let mut accepted = Vec::new();
    for candidate in candidates {
        let unclaimed = candidate
            .positions
            .iter()
            .filter(|pos| !claimed.contains(*pos))
            .count();
        let overlapping = unclaimed < candidate.positions.len();
        if overlapping && (unclaimed < 3 || candidate.kind == MatchType::Line3) {
            continue;
        }
        claimed.extend(candidate.positions.iter().copied());
        accepted.push(candidate);
    }
    accepted
}
