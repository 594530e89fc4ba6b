use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

/// Number of colors tried per cell before accepting a tile that completes a run.
const FILL_ATTEMPTS: usize = 10;

/// One character of an initial layout row.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayoutSymbol {
    Empty,
    Plain(BlockColor),
    Special(SpecialType),
}

impl LayoutSymbol {
    pub const fn parse(symbol: char) -> Option<Self> {
        use LayoutSymbol::*;
        Some(match symbol {
            '.' => Empty,
            'R' => Plain(BlockColor::Red),
            'G' => Plain(BlockColor::Green),
            'b' => Plain(BlockColor::Blue),
            'Y' => Plain(BlockColor::Yellow),
            'H' => Special(SpecialType::RocketHorizontal),
            'V' => Special(SpecialType::RocketVertical),
            'B' => Special(SpecialType::Bomb),
            'P' => Special(SpecialType::Propeller),
            'D' => Special(SpecialType::DiscoBall),
            _ => return None,
        })
    }
}

/// Grid of cells, indexed `[row, col]`.
///
/// The board never owns randomness: operations that need it borrow the engine's [`GameRng`], so a cloned board
/// is a pure snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Board {
    cells: Array2<Cell>,
    next_tile_id: u64,
}

impl Board {
    pub fn new(width: Coord, height: Coord) -> Self {
        let width = width.clamp(1, MAX_BOARD_DIM);
        let height = height.clamp(1, MAX_BOARD_DIM);
        Self {
            cells: Array2::default((height as usize, width as usize)),
            next_tile_id: 0,
        }
    }

    pub fn width(&self) -> Coord {
        self.cells.ncols() as Coord
    }

    pub fn height(&self) -> Coord {
        self.cells.nrows() as Coord
    }

    pub fn contains(&self, pos: Position) -> bool {
        (0..self.height()).contains(&pos.row) && (0..self.width()).contains(&pos.col)
    }

    pub fn center(&self) -> Position {
        Position::new(self.height() / 2, self.width() / 2)
    }

    /// Every position in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + use<> {
        let (height, width) = (self.height(), self.width());
        (0..height).flat_map(move |row| (0..width).map(move |col| Position::new(row, col)))
    }

    pub fn cell(&self, pos: Position) -> Option<&Cell> {
        if self.contains(pos) {
            Some(&self.cells[pos.to_nd_index()])
        } else {
            None
        }
    }

    fn cell_mut(&mut self, pos: Position) -> Option<&mut Cell> {
        if self.contains(pos) {
            Some(&mut self.cells[pos.to_nd_index()])
        } else {
            None
        }
    }

    pub fn tile(&self, pos: Position) -> Option<Tile> {
        self.cell(pos).and_then(|cell| cell.tile)
    }

    /// Places (or clears) the tile at `pos`. Out-of-bounds positions are ignored.
    pub fn set_tile(&mut self, pos: Position, tile: Option<Tile>) {
        if let Some(cell) = self.cell_mut(pos) {
            cell.tile = tile;
        }
    }

    pub fn take_tile(&mut self, pos: Position) -> Option<Tile> {
        self.cell_mut(pos).and_then(|cell| cell.tile.take())
    }

    /// Exchanges the tiles of two in-bounds cells, leaving cell kinds alone.
    pub fn swap_tiles(&mut self, a: Position, b: Position) -> bool {
        if !self.contains(a) || !self.contains(b) {
            return false;
        }
        let tile_a = self.take_tile(a);
        let tile_b = self.take_tile(b);
        self.set_tile(a, tile_b);
        self.set_tile(b, tile_a);
        true
    }

    pub fn mint_tile(&mut self, color: BlockColor, special: SpecialType) -> Tile {
        let id = TileId(self.next_tile_id);
        self.next_tile_id += 1;
        Tile { id, color, special }
    }

    /// Fills every vacant normal cell, column by column, top to bottom.
    pub fn fill_empty(&mut self, rng: &mut GameRng) -> Vec<Position> {
        let mut spawned = Vec::new();
        for pos in self.column_major(false) {
            if self.cells[pos.to_nd_index()].is_vacant() {
                let tile = self.mint_tile(rng.next_color(), SpecialType::None);
                self.set_tile(pos, Some(tile));
                spawned.push(pos);
            }
        }
        spawned
    }

    /// Initial fill: column by column, scanning bottom to top, re-rolling a color up to [`FILL_ATTEMPTS`] times
    /// to avoid completing a run of three.
    pub fn fill_empty_without_matches(&mut self, rng: &mut GameRng) -> Vec<Position> {
        let mut spawned = Vec::new();
        for pos in self.column_major(true) {
            if !self.cells[pos.to_nd_index()].is_vacant() {
                continue;
            }
            let tile = self.mint_tile(rng.next_color(), SpecialType::None);
            self.set_tile(pos, Some(tile));
            let mut attempts = 1;
            while attempts < FILL_ATTEMPTS && self.would_create_match(pos) {
                let color = rng.next_color();
                if let Some(cell) = self.cell_mut(pos)
                    && let Some(tile) = cell.tile.as_mut()
                {
                    tile.color = color;
                }
                attempts += 1;
            }
            spawned.push(pos);
        }
        spawned
    }

    pub fn spawn_new_blocks(&mut self, rng: &mut GameRng) -> Vec<Position> {
        let spawned = self.fill_empty(rng);
        log::trace!("refilled {} cells", spawned.len());
        spawned
    }

    fn column_major(&self, bottom_up: bool) -> impl Iterator<Item = Position> + use<> {
        let (height, width) = (self.height(), self.width());
        (0..width).flat_map(move |col| {
            (0..height).map(move |i| {
                let row = if bottom_up { height - 1 - i } else { i };
                Position::new(row, col)
            })
        })
    }

    fn would_create_match(&self, pos: Position) -> bool {
        let Some(color) = self.tile(pos).map(|tile| tile.color) else {
            return false;
        };
        let run = |d_row: Coord, d_col: Coord| {
            let mut len = 0;
            let mut next = pos.offset(d_row, d_col);
            while self.tile(next).is_some_and(|tile| tile.color == color) {
                len += 1;
                next = next.offset(d_row, d_col);
            }
            len
        };
        1 + run(0, -1) + run(0, 1) >= 3 || 1 + run(-1, 0) + run(1, 0) >= 3
    }

    /// Applies an initial layout. Colors of special tiles are drawn from `rng`; unknown symbols and cells outside
    /// the board are skipped.
    pub fn initialize_from_layout<S: AsRef<str>>(&mut self, rows: &[S], rng: &mut GameRng) {
        for (row, line) in rows.iter().enumerate() {
            for (col, symbol) in line.as_ref().chars().enumerate() {
                let pos = Position::new(row as Coord, col as Coord);
                if !self.contains(pos) {
                    log::warn!("Layout symbol {symbol:?} at {pos} is outside the board, skipped");
                    continue;
                }
                let tile = match LayoutSymbol::parse(symbol) {
                    Some(LayoutSymbol::Empty) => None,
                    Some(LayoutSymbol::Plain(color)) => {
                        Some(self.mint_tile(color, SpecialType::None))
                    }
                    Some(LayoutSymbol::Special(special)) => {
                        let color = rng.next_color();
                        Some(self.mint_tile(color, special))
                    }
                    None => {
                        log::warn!("Unknown layout symbol {symbol:?} at {pos}, skipped");
                        continue;
                    }
                };
                self.set_tile(pos, tile);
            }
        }
    }

    /// Compacts tiles downward, column by column. Non-normal cells are barriers: they split a column into
    /// segments, tiles never fall through or into them, and tiles resting on them stay put.
    pub fn apply_gravity(&mut self) -> Vec<(Position, Position)> {
        let mut moves = Vec::new();
        for col in 0..self.width() {
            let mut write: Option<Coord> = None;
            for row in (0..self.height()).rev() {
                let pos = Position::new(row, col);
                let cell = self.cells[pos.to_nd_index()];
                if !cell.is_normal() {
                    write = None;
                    continue;
                }
                let target = *write.get_or_insert(row);
                if cell.tile.is_some() {
                    if target != row {
                        let dest = Position::new(target, col);
                        let tile = self.take_tile(pos);
                        self.set_tile(dest, tile);
                        moves.push((pos, dest));
                    }
                    write = Some(target - 1);
                }
            }
        }
        moves
    }

    /// Applies obstacle placements. Tiles already on the affected cells stay there, locked in until the obstacle
    /// clears. Placements outside the board are skipped.
    pub fn setup_special_cells(&mut self, obstacles: &[ObstacleConfig]) {
        for obstacle in obstacles {
            let Some(cell) = self.cell_mut(obstacle.position) else {
                log::warn!(
                    "Obstacle {:?} at {} is outside the board, skipped",
                    obstacle.kind,
                    obstacle.position
                );
                continue;
            };
            if obstacle.durability == 0 || obstacle.kind.is_normal() {
                log::warn!(
                    "Obstacle at {} has no durability, left as a normal cell",
                    obstacle.position
                );
                continue;
            }
            cell.kind = obstacle.kind;
            cell.durability = obstacle.durability;
            cell.required_color = obstacle.required_color;
        }
    }

    /// Hits the four orthogonal neighbours of `pos` with one point of damage in the given color.
    pub fn damage_adjacent_cells(
        &mut self,
        pos: Position,
        color: Option<BlockColor>,
    ) -> Vec<(Position, CellDamage)> {
        pos.adjacent()
            .into_iter()
            .filter_map(|adj| {
                let damage = self.cell_mut(adj)?.take_damage(color)?;
                Some((adj, damage))
            })
            .collect()
    }

    /// Number of obstacle cells that still have durability left.
    pub fn obstacles_remaining(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_blocked()).count()
    }

    pub fn find_all_specials(&self) -> Vec<(Position, SpecialType)> {
        self.positions()
            .filter_map(|pos| {
                let tile = self.tile(pos)?;
                tile.is_special().then_some((pos, tile.special))
            })
            .collect()
    }

    /// Nearest special tile by Manhattan distance, ties going to the first one in row-major order.
    pub fn find_nearest_special(&self, from: Position) -> Option<Position> {
        self.find_all_specials()
            .into_iter()
            .map(|(pos, _)| pos)
            .filter(|&pos| pos != from)
            .min_by_key(|&pos| (pos.manhattan(from), pos))
    }

    pub fn random_position(&self, rng: &mut GameRng) -> Position {
        self.random_position_excluding(&BTreeSet::new(), rng)
    }

    /// Uniform pick among occupied normal cells not in `excluded`, falling back to the board center.
    pub fn random_position_excluding(
        &self,
        excluded: &BTreeSet<Position>,
        rng: &mut GameRng,
    ) -> Position {
        let candidates: Vec<_> = self
            .positions()
            .filter(|pos| !excluded.contains(pos))
            .filter(|&pos| self.cell(pos).is_some_and(Cell::can_swap))
            .collect();
        if candidates.is_empty() {
            return self.center();
        }
        candidates[rng.next_index(candidates.len())]
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.rows() {
            for cell in row {
                write!(f, "{}", cell.glyph())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn board_from(rows: &[&str]) -> (Board, GameRng) {
        let mut rng = GameRng::new(1);
        let mut board = Board::new(rows[0].len() as Coord, rows.len() as Coord);
        board.initialize_from_layout(rows, &mut rng);
        (board, rng)
    }

    #[test]
    fn layout_round_trips_through_display() {
        let rows = ["RGbY", "Y.GR", "bbRG"];
        let (board, _) = board_from(&rows);

        assert_eq!(board.to_string(), "RGbY\nY.GR\nbbRG\n");
        assert_eq!(board.tile(Position::new(1, 1)), None);
        assert_eq!(board.tile(Position::new(5, 1)), None);
    }

    #[test]
    fn layout_specials_get_random_colors_and_unknown_symbols_are_skipped() {
        let (board, rng) = board_from(&["HxB"]);

        assert_eq!(
            board.tile(Position::new(0, 0)).map(|tile| tile.special),
            Some(SpecialType::RocketHorizontal)
        );
        assert_eq!(board.tile(Position::new(0, 1)), None);
        assert_eq!(
            board.tile(Position::new(0, 2)).map(|tile| tile.special),
            Some(SpecialType::Bomb)
        );
        assert_eq!(rng.call_count(), 2);
    }

    #[test]
    fn gravity_compacts_columns() {
        let (mut board, _) = board_from(&["R.", ".G", "Y.", ".."]);

        let moves = board.apply_gravity();

        assert_eq!(board.to_string(), "..\n..\nR.\nYG\n");
        assert_eq!(
            moves,
            [
                (Position::new(2, 0), Position::new(3, 0)),
                (Position::new(0, 0), Position::new(2, 0)),
                (Position::new(1, 1), Position::new(3, 1)),
            ]
        );
    }

    #[test]
    fn obstacles_are_gravity_barriers() {
        let (mut board, _) = board_from(&["R", "G", ".", ".", "."]);
        board.setup_special_cells(&[ObstacleConfig::frozen(Position::new(3, 0), 1)]);

        let moves = board.apply_gravity();

        // R and G settle on top of the frozen cell; the slot beneath it stays empty.
        assert_eq!(board.tile(Position::new(1, 0)).map(|t| t.color), Some(BlockColor::Red));
        assert_eq!(board.tile(Position::new(2, 0)).map(|t| t.color), Some(BlockColor::Green));
        assert_eq!(board.tile(Position::new(4, 0)), None);
        assert_eq!(moves.len(), 2);
    }

    #[test]
    fn gravity_leaves_no_gaps_below_each_barrier() {
        let mut rng = GameRng::new(99);
        let mut board = Board::new(6, 8);
        board.setup_special_cells(&[
            ObstacleConfig::boxed(Position::new(4, 2), 2),
            ObstacleConfig::frozen(Position::new(6, 4), 1),
        ]);
        board.fill_empty(&mut rng);
        for pos in board.positions().filter(|p| (p.row + p.col) % 3 == 0) {
            if board.cell(pos).is_some_and(Cell::is_normal) {
                board.take_tile(pos);
            }
        }
        let before: usize = board.positions().filter(|&p| board.tile(p).is_some()).count();

        board.apply_gravity();

        let after: usize = board.positions().filter(|&p| board.tile(p).is_some()).count();
        assert_eq!(before, after);
        for col in 0..board.width() {
            let mut seen_empty = false;
            for row in (0..board.height()).rev() {
                let cell = board.cell(Position::new(row, col)).unwrap();
                if !cell.is_normal() {
                    seen_empty = false;
                } else if cell.tile.is_none() {
                    seen_empty = true;
                } else {
                    assert!(!seen_empty, "gap below tile at ({row},{col})");
                }
            }
        }
    }

    #[test]
    fn fill_without_matches_avoids_runs() {
        let mut rng = GameRng::new(5);
        let mut board = Board::new(7, 10);

        let spawned = board.fill_empty_without_matches(&mut rng);

        assert_eq!(spawned.len(), 70);
        assert_eq!(spawned[0], Position::new(9, 0));
        let runs = board
            .positions()
            .filter(|&pos| board.would_create_match(pos))
            .count();
        assert_eq!(runs, 0);
    }

    #[test]
    fn obstacles_keep_the_tiles_placed_on_them() {
        let mut rng = GameRng::new(1);
        let mut board = Board::new(3, 2);
        board.setup_special_cells(&[ObstacleConfig::boxed(Position::new(1, 1), 1)]);
        board.initialize_from_layout(&["RGY", "GYR"], &mut rng);
        let boxed = board.tile(Position::new(1, 1));

        assert_eq!(boxed.map(|tile| tile.color), Some(BlockColor::Yellow));
        assert!(!board.cell(Position::new(1, 1)).unwrap().can_swap());
        assert!(board.apply_gravity().is_empty());

        board.damage_adjacent_cells(Position::new(0, 1), None);
        assert_eq!(board.tile(Position::new(1, 1)), boxed);
        assert!(board.cell(Position::new(1, 1)).unwrap().can_swap());
    }

    #[test]
    fn spawn_fills_top_to_bottom_by_column() {
        let (mut board, mut rng) = board_from(&["..", "R."]);

        let spawned = board.spawn_new_blocks(&mut rng);

        assert_eq!(
            spawned,
            [
                Position::new(0, 0),
                Position::new(0, 1),
                Position::new(1, 1)
            ]
        );
    }

    #[test]
    fn adjacent_damage_reports_damage_and_clearing() {
        let (mut board, _) = board_from(&["RRR", "RRR", "RRR"]);
        board.setup_special_cells(&[
            ObstacleConfig::frozen(Position::new(0, 1), 2),
            ObstacleConfig::color_box(Position::new(1, 0), 1, BlockColor::Green),
            ObstacleConfig::boxed(Position::new(1, 2), 1),
        ]);

        let damaged = board.damage_adjacent_cells(Position::new(1, 1), Some(BlockColor::Red));

        assert_eq!(
            damaged,
            [
                (Position::new(0, 1), CellDamage::Damaged { remaining: 1 }),
                (
                    Position::new(1, 2),
                    CellDamage::Cleared {
                        former: CellKind::Box
                    }
                ),
            ]
        );
        assert_eq!(board.obstacles_remaining(), 2);
    }

    #[test]
    fn nearest_special_prefers_row_major_ties() {
        let (board, _) = board_from(&["R.B", "...", "P.."]);

        assert_eq!(
            board.find_nearest_special(Position::new(1, 1)),
            Some(Position::new(0, 2))
        );
        assert_eq!(
            board.find_nearest_special(Position::new(2, 0)),
            Some(Position::new(0, 2))
        );
        assert_eq!(board.find_all_specials().len(), 2);
    }

    #[test]
    fn random_position_falls_back_to_center() {
        let (board, mut rng) = board_from(&["R..", "...", "..."]);

        let only = board.random_position(&mut rng);
        assert_eq!(only, Position::new(0, 0));

        let excluded = BTreeSet::from([Position::new(0, 0)]);
        assert_eq!(
            board.random_position_excluding(&excluded, &mut rng),
            Position::new(1, 1)
        );
    }

    #[test]
    fn snapshots_are_independent() {
        let (mut board, _) = board_from(&["RG"]);
        let snapshot = board.clone();

        board.take_tile(Position::new(0, 0));

        assert!(snapshot.tile(Position::new(0, 0)).is_some());
        assert!(board.tile(Position::new(0, 0)).is_none());
    }
}
