use alloc::collections::BTreeSet;
use alloc::vec;
use alloc::vec::Vec;

use crate::*;

/// What a special (or a pair of specials) did to the board, without having touched it yet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivationResult {
    pub destroyed: BTreeSet<Position>,
    pub events: Vec<GameEvent>,
    /// Specials caught in `destroyed`, to be activated by the caller.
    pub chained: Vec<(Position, Tile)>,
}

impl ActivationResult {
    pub fn is_empty(&self) -> bool {
        self.destroyed.is_empty()
    }
}

/// Computes blast areas. The board is only read; chains are reported, never expanded.
pub struct SpecialActivator<'a> {
    board: &'a Board,
    rng: &'a mut GameRng,
}

impl<'a> SpecialActivator<'a> {
    pub fn new(board: &'a Board, rng: &'a mut GameRng) -> Self {
        Self { board, rng }
    }

    /// Activates the special tile at `pos`, if there is one.
    pub fn activate(&mut self, pos: Position, swapped_with: Option<Position>) -> ActivationResult {
        match self.board.tile(pos) {
            Some(tile) if tile.is_special() => self.activate_tile(pos, tile, swapped_with),
            _ => ActivationResult::default(),
        }
    }

    /// Activates `tile` as if it sat at `pos`; it may already have been lifted off the board.
    pub fn activate_tile(
        &mut self,
        pos: Position,
        tile: Tile,
        swapped_with: Option<Position>,
    ) -> ActivationResult {
        let (destroyed, event) = match tile.special {
            SpecialType::None => return ActivationResult::default(),
            SpecialType::RocketHorizontal | SpecialType::RocketVertical => {
                let horizontal = tile.special == SpecialType::RocketHorizontal;
                let cleared = self.line(pos, horizontal);
                let event = GameEvent::RocketFired {
                    position: pos,
                    horizontal,
                    cleared: cleared.clone(),
                };
                (cleared, event)
            }
            SpecialType::DiscoBall => {
                let color = match swapped_with.and_then(|other| self.board.tile(other)) {
                    Some(other) => other.color,
                    None => self.rng.next_color(),
                };
                let mut cleared = self.tiles_of(color);
                cleared.insert(pos);
                let event = GameEvent::DiscoActivated {
                    position: pos,
                    color,
                    cleared: cleared.clone(),
                };
                (cleared, event)
            }
            SpecialType::Propeller => {
                let mut cleared = self.launch_cross(pos);
                let target = self.board.random_position_excluding(&cleared, self.rng);
                cleared.insert(target);
                let event = GameEvent::PropellerFlew {
                    from: pos,
                    to: target,
                    cleared: cleared.clone(),
                };
                (cleared, event)
            }
            SpecialType::Bomb => {
                let cleared = self.clip(pos.area_3x3());
                let event = GameEvent::BombExploded {
                    position: pos,
                    cleared: cleared.clone(),
                };
                (cleared, event)
            }
        };
        let chained = self.chains(&destroyed, &[pos]);
        ActivationResult {
            destroyed,
            events: vec![event],
            chained,
        }
    }

    /// Two specials dragged onto each other. `dragged` came from `from`, `target` sat at `to`, where the combo
    /// goes off.
    pub fn activate_combo(
        &mut self,
        from: Position,
        dragged: Tile,
        to: Position,
        target: Tile,
    ) -> ActivationResult {
        use SpecialType::*;

        let mut events = vec![GameEvent::ComboActivated {
            first: dragged.special,
            second: target.special,
            position: to,
        }];
        let (low, high) = if dragged.special.combo_rank() <= target.special.combo_rank() {
            (dragged, target)
        } else {
            (target, dragged)
        };
        let mut destroyed = BTreeSet::from([from, to]);

        match (low.special, high.special) {
            (a, b) if a.is_rocket() && b.is_rocket() => {
                let row = self.line(to, true);
                let column = self.line(to, false);
                destroyed.extend(row.iter().chain(&column).copied());
                events.push(GameEvent::RocketFired {
                    position: to,
                    horizontal: true,
                    cleared: row,
                });
                events.push(GameEvent::RocketFired {
                    position: to,
                    horizontal: false,
                    cleared: column,
                });
            }
            (rocket, DiscoBall) if rocket.is_rocket() => {
                let color = low.color;
                let converted = self.converted(color, from, to);
                let mut rockets = Vec::with_capacity(converted.len());
                let mut horizontal = BTreeSet::new();
                for &pos in &converted {
                    let is_horizontal = self.rng.next_bool();
                    if is_horizontal {
                        horizontal.insert(pos);
                    }
                    destroyed.extend(self.line(pos, is_horizontal));
                    rockets.push((pos, is_horizontal));
                }
                events.push(GameEvent::DiscoTransformToRockets {
                    positions: converted,
                    color,
                    horizontal,
                });
                events.push(GameEvent::SimultaneousRocketFires { rockets });
            }
            (rocket, Propeller) if rocket.is_rocket() => {
                destroyed.append(&mut self.launch_cross(to));
                let landing = self.board.random_position_excluding(&destroyed, self.rng);
                let horizontal = rocket == RocketHorizontal;
                let line = self.line(landing, horizontal);
                destroyed.extend(&line);
                events.push(GameEvent::PropellerCarrying {
                    from: to,
                    to: landing,
                    carried: rocket,
                });
                events.push(GameEvent::RocketFired {
                    position: landing,
                    horizontal,
                    cleared: line,
                });
            }
            (rocket, Bomb) if rocket.is_rocket() => {
                let rows = self.clip((-1..=1).flat_map(|d| self.line(to.offset(d, 0), true)));
                let columns = self.clip((-1..=1).flat_map(|d| self.line(to.offset(0, d), false)));
                destroyed.extend(rows.iter().chain(&columns).copied());
                events.push(GameEvent::RocketFired {
                    position: to,
                    horizontal: true,
                    cleared: rows,
                });
                events.push(GameEvent::RocketFired {
                    position: to,
                    horizontal: false,
                    cleared: columns,
                });
            }
            (DiscoBall, DiscoBall) => {
                let cleared = self.clip(self.board.positions());
                destroyed.extend(&cleared);
                events.push(GameEvent::DiscoActivated {
                    position: to,
                    color: dragged.color,
                    cleared,
                });
            }
            (DiscoBall, Propeller) => {
                let color = high.color;
                let converted = self.converted(color, from, to);
                destroyed.extend(&converted);
                let mut flights = Vec::with_capacity(converted.len());
                for &pos in &converted {
                    let landing = self.board.random_position_excluding(&destroyed, self.rng);
                    destroyed.insert(landing);
                    flights.push((pos, landing));
                }
                events.push(GameEvent::DiscoTransformToPropellers {
                    positions: converted,
                    color,
                });
                events.push(GameEvent::SimultaneousPropellerFlights { flights });
            }
            (DiscoBall, Bomb) => {
                let color = high.color;
                let converted = self.converted(color, from, to);
                for &pos in &converted {
                    destroyed.extend(self.clip(pos.area_3x3()));
                }
                events.push(GameEvent::DiscoTransformToBombs {
                    positions: converted.clone(),
                    color,
                });
                events.push(GameEvent::SimultaneousBombExplosions {
                    positions: converted,
                });
            }
            (Propeller, Propeller) => {
                destroyed.append(&mut self.launch_cross(to));
                for _ in 0..2 {
                    let landing = self.board.random_position_excluding(&destroyed, self.rng);
                    destroyed.insert(landing);
                    events.push(GameEvent::PropellerFlew {
                        from: to,
                        to: landing,
                        cleared: BTreeSet::from([landing]),
                    });
                }
            }
            (Propeller, Bomb) => {
                destroyed.append(&mut self.launch_cross(to));
                let landing = self.board.random_position_excluding(&destroyed, self.rng);
                let blast = self.clip(landing.area_3x3());
                destroyed.extend(&blast);
                events.push(GameEvent::PropellerCarrying {
                    from: to,
                    to: landing,
                    carried: Bomb,
                });
                events.push(GameEvent::BombExploded {
                    position: landing,
                    cleared: blast,
                });
            }
            (Bomb, Bomb) => {
                let blast = self.clip(to.area_5x5());
                destroyed.extend(&blast);
                events.push(GameEvent::BombExploded {
                    position: to,
                    cleared: blast,
                });
            }
            (low_type, high_type) => {
                log::warn!("No combo for {low_type:?} with {high_type:?}, nothing activated");
                return ActivationResult::default();
            }
        }

        let chained = self.chains(&destroyed, &[from, to]);
        ActivationResult {
            destroyed,
            events,
            chained,
        }
    }

    fn clip(&self, positions: impl Iterator<Item = Position>) -> BTreeSet<Position> {
        positions.filter(|&pos| self.board.contains(pos)).collect()
    }

    /// The whole row (or column) through `pos`.
    fn line(&self, pos: Position, horizontal: bool) -> BTreeSet<Position> {
        let (width, height) = (self.board.width(), self.board.height());
        if horizontal {
            self.clip((0..width).map(|col| Position::new(pos.row, col)))
        } else {
            self.clip((0..height).map(|row| Position::new(row, pos.col)))
        }
    }

    fn launch_cross(&self, pos: Position) -> BTreeSet<Position> {
        self.clip(core::iter::once(pos).chain(pos.cross()))
    }

    fn tiles_of(&self, color: BlockColor) -> BTreeSet<Position> {
        self.board
            .positions()
            .filter(|&pos| self.board.tile(pos).is_some_and(|tile| tile.color == color))
            .collect()
    }

    /// Plain tiles of `color` that a disco combo turns into copies of its partner.
    fn converted(&self, color: BlockColor, from: Position, to: Position) -> BTreeSet<Position> {
        self.board
            .positions()
            .filter(|&pos| pos != from && pos != to)
            .filter(|&pos| {
                self.board
                    .tile(pos)
                    .is_some_and(|tile| tile.color == color && !tile.is_special())
            })
            .collect()
    }

    fn chains(&self, destroyed: &BTreeSet<Position>, activating: &[Position]) -> Vec<(Position, Tile)> {
        destroyed
            .iter()
            .filter(|pos| !activating.contains(pos))
            .filter_map(|&pos| {
                let tile = self.board.tile(pos)?;
                tile.is_special().then_some((pos, tile))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_from(rows: &[&str]) -> (Board, GameRng) {
        let mut rng = GameRng::new(21);
        let mut board = Board::new(rows[0].len() as Coord, rows.len() as Coord);
        board.initialize_from_layout(rows, &mut rng);
        (board, rng)
    }

    fn at(row: Coord, col: Coord) -> Position {
        Position::new(row, col)
    }

    #[test]
    fn rocket_clears_its_row_and_reports_chains() {
        let (board, mut rng) = board_from(&["RGbY", "GHbB", "YRGb"]);

        let result = SpecialActivator::new(&board, &mut rng).activate(at(1, 1), None);

        assert_eq!(
            result.destroyed,
            BTreeSet::from([at(1, 0), at(1, 1), at(1, 2), at(1, 3)])
        );
        assert_eq!(result.chained.len(), 1);
        assert_eq!(result.chained[0].0, at(1, 3));
        assert_eq!(result.chained[0].1.special, SpecialType::Bomb);
        assert!(matches!(
            result.events[..],
            [GameEvent::RocketFired { horizontal: true, .. }]
        ));
    }

    #[test]
    fn vertical_rocket_clears_its_column() {
        let (board, mut rng) = board_from(&["RGb", "GVb", "YRG"]);

        let result = SpecialActivator::new(&board, &mut rng).activate(at(1, 1), None);

        assert_eq!(result.destroyed, BTreeSet::from([at(0, 1), at(1, 1), at(2, 1)]));
        assert!(result.chained.is_empty());
    }

    #[test]
    fn disco_takes_the_swapped_color() {
        let (board, mut rng) = board_from(&["RGbR", "GDRY", "RYGb"]);
        let calls = rng.call_count();

        let result = SpecialActivator::new(&board, &mut rng).activate(at(1, 1), Some(at(1, 2)));

        assert_eq!(
            result.destroyed,
            BTreeSet::from([at(0, 0), at(0, 3), at(1, 1), at(1, 2), at(2, 0)])
        );
        assert_eq!(rng.call_count(), calls, "no random color needed");
    }

    #[test]
    fn untargeted_disco_draws_a_color() {
        let (board, mut rng) = board_from(&["RGbY", "GDRY"]);
        let calls = rng.call_count();

        let result = SpecialActivator::new(&board, &mut rng).activate(at(1, 1), None);

        assert_eq!(rng.call_count(), calls + 1);
        let GameEvent::DiscoActivated { color, .. } = result.events[0] else {
            panic!("expected a disco event");
        };
        assert!(
            result
                .destroyed
                .iter()
                .filter(|&&pos| pos != at(1, 1))
                .all(|&pos| board.tile(pos).unwrap().color == color)
        );
    }

    #[test]
    fn propeller_clears_cross_then_one_landing_cell() {
        let (board, mut rng) = board_from(&["RGbYR", "GYPRG", "RbGYb", "YRGbY"]);

        let result = SpecialActivator::new(&board, &mut rng).activate(at(1, 2), None);

        let cross = BTreeSet::from([at(0, 2), at(1, 1), at(1, 2), at(1, 3), at(2, 2)]);
        assert!(result.destroyed.is_superset(&cross));
        assert_eq!(result.destroyed.len(), 6);
        let GameEvent::PropellerFlew { from, to, .. } = result.events[0] else {
            panic!("expected a propeller event");
        };
        assert_eq!(from, at(1, 2));
        assert!(!cross.contains(&to));
    }

    #[test]
    fn bomb_is_clipped_at_the_edge() {
        let (board, mut rng) = board_from(&["BGb", "GYb", "RRG"]);

        let result = SpecialActivator::new(&board, &mut rng).activate(at(0, 0), None);

        assert_eq!(
            result.destroyed,
            BTreeSet::from([at(0, 0), at(0, 1), at(1, 0), at(1, 1)])
        );
    }

    #[test]
    fn plain_tiles_do_nothing() {
        let (board, mut rng) = board_from(&["RG"]);

        assert!(SpecialActivator::new(&board, &mut rng).activate(at(0, 0), None).is_empty());
        assert!(SpecialActivator::new(&board, &mut rng).activate(at(5, 5), None).is_empty());
    }

    fn combo(rows: &[&str], from: Position, to: Position) -> (ActivationResult, Board) {
        let (board, mut rng) = board_from(rows);
        let dragged = board.tile(from).unwrap();
        let target = board.tile(to).unwrap();
        let result = SpecialActivator::new(&board, &mut rng).activate_combo(from, dragged, to, target);
        (result, board)
    }

    #[test]
    fn double_bomb_clears_five_by_five() {
        let rows = ["RGbYRGb", "GYRGbYR", "bRGYBGY", "YGbRBYG", "RbYGRbR", "GRbYGYb", "bYRGbRG"];
        let (result, _) = combo(&rows, at(2, 4), at(3, 4));

        assert_eq!(result.destroyed.len(), 25);
        assert!(result.destroyed.contains(&at(1, 2)));
        assert!(result.destroyed.contains(&at(5, 6)));
        assert!(matches!(
            result.events[..],
            [
                GameEvent::ComboActivated {
                    first: SpecialType::Bomb,
                    second: SpecialType::Bomb,
                    ..
                },
                GameEvent::BombExploded { .. }
            ]
        ));
        assert!(result.chained.is_empty());
    }

    #[test]
    fn rocket_pair_makes_a_cross() {
        let (result, _) = combo(&["RGbY", "GHVR", "bYRG"], at(1, 1), at(1, 2));

        assert_eq!(
            result.destroyed,
            BTreeSet::from([at(0, 2), at(1, 0), at(1, 1), at(1, 2), at(1, 3), at(2, 2)])
        );
        assert_eq!(result.events.len(), 3);
    }

    #[test]
    fn rocket_and_bomb_fire_three_lines_each_way() {
        let rows = ["RGbYR", "GYRGb", "bRHBY", "YGbRG", "RbYGR"];
        let (result, _) = combo(&rows, at(2, 2), at(2, 3));

        // rows 1..=3 and columns 2..=4
        assert_eq!(result.destroyed.len(), 15 + 6);
        assert!(result.destroyed.contains(&at(0, 4)));
        assert!(!result.destroyed.contains(&at(0, 0)));
        assert!(matches!(
            result.events[0],
            GameEvent::ComboActivated {
                first: SpecialType::RocketHorizontal,
                second: SpecialType::Bomb,
                ..
            }
        ));
    }

    #[test]
    fn disco_pair_clears_everything() {
        let (result, board) = combo(&["RGbY", "GDDR", "bYRG"], at(1, 1), at(1, 2));

        assert_eq!(result.destroyed.len(), 12);
        let GameEvent::DiscoActivated { color, .. } = result.events[1] else {
            panic!("expected a disco event");
        };
        assert_eq!(color, board.tile(at(1, 1)).unwrap().color);
    }

    #[test]
    fn disco_bomb_explodes_every_tile_of_the_bomb_color() {
        let (board, mut rng) = board_from(&["RGbYRG", "GYRGbY", "bRDBYG", "YGbRGb", "RbYGRY"]);
        let disco = board.tile(at(2, 2)).unwrap();
        let mut bomb = board.tile(at(2, 3)).unwrap();
        bomb.color = BlockColor::Red;

        let result =
            SpecialActivator::new(&board, &mut rng).activate_combo(at(2, 2), disco, at(2, 3), bomb);

        let reds = BTreeSet::from([at(0, 0), at(0, 4), at(1, 2), at(2, 1), at(3, 3), at(4, 0), at(4, 4)]);
        let GameEvent::DiscoTransformToBombs { positions, color } = &result.events[1] else {
            panic!("expected bomb conversion");
        };
        assert_eq!(*color, BlockColor::Red);
        assert_eq!(*positions, reds);
        for pos in reds {
            let blast: BTreeSet<_> = pos.area_3x3().filter(|&p| board.contains(p)).collect();
            assert!(result.destroyed.is_superset(&blast));
        }
    }

    #[test]
    fn rocket_propeller_carries_the_rocket() {
        let rows = ["RGbYRG", "GYRGbY", "bRVPYG", "YGbRGb", "RbYGRY"];
        let (result, _) = combo(&rows, at(2, 2), at(2, 3));

        let GameEvent::PropellerCarrying { from, to, carried } = result.events[1] else {
            panic!("expected the propeller to carry");
        };
        assert_eq!(from, at(2, 3));
        assert_eq!(carried, SpecialType::RocketVertical);
        let launch = BTreeSet::from([at(1, 3), at(2, 2), at(2, 3), at(2, 4), at(3, 3)]);
        assert!(!launch.contains(&to));
        let column: BTreeSet<_> = (0..5).map(|row| at(row, to.col)).collect();
        assert!(result.destroyed.is_superset(&column));
        assert!(result.destroyed.is_superset(&launch));
    }

    #[test]
    fn propeller_pair_lands_on_two_distinct_cells() {
        let rows = ["RGbYRG", "GYRGbY", "bRPPYG", "YGbRGb", "RbYGRY"];
        let (result, _) = combo(&rows, at(2, 2), at(2, 3));

        let landings: Vec<_> = result
            .events
            .iter()
            .filter_map(|event| match event {
                GameEvent::PropellerFlew { to, .. } => Some(*to),
                _ => None,
            })
            .collect();
        assert_eq!(landings.len(), 2);
        assert_ne!(landings[0], landings[1]);
        // launch cross (including both partners) plus two landings
        assert_eq!(result.destroyed.len(), 5 + 2);
    }

    /// Like [`combo`], with the special at `recolor` painted `color` first.
    fn painted_combo(
        rows: &[&str],
        from: Position,
        to: Position,
        recolor: Position,
        color: BlockColor,
    ) -> (ActivationResult, Board) {
        let (mut board, mut rng) = board_from(rows);
        if let Some(mut tile) = board.tile(recolor) {
            tile.color = color;
            board.set_tile(recolor, Some(tile));
        }
        let dragged = board.tile(from).unwrap();
        let target = board.tile(to).unwrap();
        let result = SpecialActivator::new(&board, &mut rng).activate_combo(from, dragged, to, target);
        (result, board)
    }

    /// Plain red tiles of the 5x6 boards below, with the combo pair at (2,2) and (2,3).
    fn reds() -> BTreeSet<Position> {
        BTreeSet::from([at(0, 0), at(0, 4), at(1, 2), at(2, 1), at(3, 3), at(4, 0), at(4, 4)])
    }

    #[test]
    fn rocket_disco_fires_a_rocket_from_every_tile_of_the_rocket_color() {
        let rows = ["RGbYRG", "GYRGbY", "bRHDYG", "YGbRGb", "RbYGRY"];
        let (result, board) = painted_combo(&rows, at(2, 2), at(2, 3), at(2, 2), BlockColor::Red);

        let GameEvent::DiscoTransformToRockets {
            positions,
            color,
            horizontal,
        } = &result.events[1]
        else {
            panic!("expected rocket conversion");
        };
        assert_eq!(*color, BlockColor::Red);
        assert_eq!(*positions, reds());
        assert!(!positions.contains(&at(2, 2)) && !positions.contains(&at(2, 3)));

        let GameEvent::SimultaneousRocketFires { rockets } = &result.events[2] else {
            panic!("expected the rockets to fire together");
        };
        assert_eq!(rockets.len(), 7);
        let mut expected = BTreeSet::from([at(2, 2), at(2, 3)]);
        for &(pos, is_horizontal) in rockets {
            assert!(positions.contains(&pos));
            assert_eq!(horizontal.contains(&pos), is_horizontal);
            if is_horizontal {
                expected.extend((0..board.width()).map(|col| at(pos.row, col)));
            } else {
                expected.extend((0..board.height()).map(|row| at(row, pos.col)));
            }
        }
        assert_eq!(result.destroyed, expected);
    }

    #[test]
    fn disco_propeller_sends_every_tile_of_the_propeller_color_flying() {
        let rows = ["RGbYRG", "GYRGbY", "bRDPYG", "YGbRGb", "RbYGRY"];
        let (result, _) = painted_combo(&rows, at(2, 2), at(2, 3), at(2, 3), BlockColor::Red);

        let GameEvent::DiscoTransformToPropellers { positions, color } = &result.events[1] else {
            panic!("expected propeller conversion");
        };
        assert_eq!(*color, BlockColor::Red);
        assert_eq!(*positions, reds());

        let GameEvent::SimultaneousPropellerFlights { flights } = &result.events[2] else {
            panic!("expected the propellers to fly together");
        };
        let sources: BTreeSet<_> = flights.iter().map(|&(from, _)| from).collect();
        let landings: BTreeSet<_> = flights.iter().map(|&(_, to)| to).collect();
        assert_eq!(sources, reds());
        assert_eq!(landings.len(), 7, "one distinct landing cell per propeller");
        assert!(landings.is_disjoint(&reds()));
        assert!(!landings.contains(&at(2, 2)) && !landings.contains(&at(2, 3)));

        let mut expected = BTreeSet::from([at(2, 2), at(2, 3)]);
        expected.extend(reds());
        expected.extend(landings);
        assert_eq!(result.destroyed, expected);
    }

    #[test]
    fn propeller_bomb_carries_the_bomb_away_from_the_launch() {
        let rows = ["RGbYRG", "GYRGbY", "bRPBYG", "YGbRGb", "RbYGRY"];
        let (result, board) = combo(&rows, at(2, 2), at(2, 3));

        let GameEvent::PropellerCarrying { from, to, carried } = result.events[1] else {
            panic!("expected the propeller to carry");
        };
        assert_eq!((from, carried), (at(2, 3), SpecialType::Bomb));
        let launch = BTreeSet::from([at(1, 3), at(2, 2), at(2, 3), at(2, 4), at(3, 3)]);
        assert!(!launch.contains(&to));

        let GameEvent::BombExploded { position, cleared } = &result.events[2] else {
            panic!("expected the bomb to go off at the landing cell");
        };
        let blast: BTreeSet<_> = to.area_3x3().filter(|&p| board.contains(p)).collect();
        assert_eq!(*position, to);
        assert_eq!(*cleared, blast);
        assert_eq!(result.destroyed, &launch | &blast);
    }

    #[test]
    fn combo_chains_skip_both_partners() {
        let (result, _) = combo(&["RGbY", "GHHB", "bYRG"], at(1, 1), at(1, 2));

        assert_eq!(result.chained.len(), 1);
        assert_eq!(result.chained[0].0, at(1, 3));
    }
}
