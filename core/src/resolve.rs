use alloc::collections::{BTreeSet, VecDeque};
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::*;

/// Upper bound on cascade passes for a single action.
pub const MAX_CASCADE_PASSES: u32 = 256;

/// When chained specials go off relative to the destruction that caught them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainOrder {
    /// Each blast is applied to the board before the specials it caught are activated.
    #[default]
    DestroyThenChain,
    /// Every chained special is activated against the untouched board, then the union is destroyed once.
    ChainThenDestroy,
}

/// Board, randomness and event log of one running game, plus the bookkeeping of the action in progress.
#[derive(Clone, Debug)]
pub struct Playfield {
    board: Board,
    rng: GameRng,
    log: EventLog,
    /// Specials created this turn, with the cascade pass that created them.
    fresh: HashMap<TileId, u32>,
    /// Specials already activated during the current action.
    detonated: HashSet<TileId>,
    cascade_level: u32,
    chain_order: ChainOrder,
}

impl Playfield {
    /// Builds the starting board: obstacles, then the layout, then a match-free fill of whatever is left.
    pub fn new(config: &LevelConfig) -> Self {
        let (width, height) = config.board_size();
        let mut rng = GameRng::new(config.seed);
        let mut board = Board::new(width, height);
        board.setup_special_cells(&config.obstacles);
        if let Some(rows) = &config.layout {
            board.initialize_from_layout(rows, &mut rng);
        }
        board.fill_empty_without_matches(&mut rng);

        Self {
            board,
            rng,
            log: EventLog::default(),
            fresh: HashMap::new(),
            detonated: HashSet::new(),
            cascade_level: 0,
            chain_order: ChainOrder::default(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn rng(&self) -> &GameRng {
        &self.rng
    }

    pub fn chain_order(&self) -> ChainOrder {
        self.chain_order
    }

    pub fn set_chain_order(&mut self, chain_order: ChainOrder) {
        self.chain_order = chain_order;
    }

    pub fn drain_events(&mut self) -> Vec<RecordedEvent> {
        self.log.drain()
    }

    pub(crate) fn record(&mut self, event: GameEvent) {
        self.log.record(event, &self.board);
    }

    fn begin_action(&mut self) {
        self.detonated.clear();
        self.cascade_level = 0;
    }

    /// Forgets the specials created this turn.
    pub(crate) fn end_turn(&mut self) {
        self.fresh.clear();
    }

    fn is_fresh(&self, tile: Tile) -> bool {
        self.fresh.get(&tile.id) == Some(&self.cascade_level)
    }

    /// Whether a chained special may go off now. Each tile goes off at most once per action, and never in the
    /// same cascade pass that created it.
    fn claim_chain(&mut self, tile: Tile) -> bool {
        !self.is_fresh(tile) && self.detonated.insert(tile.id)
    }

    fn activate(&mut self, pos: Position, tile: Tile, swapped_with: Option<Position>) -> ActivationResult {
        SpecialActivator::new(&self.board, &mut self.rng).activate_tile(pos, tile, swapped_with)
    }
}

/// Mode-specific hooks plugged into the shared turn pipeline.
pub(crate) trait TurnRules {
    fn field(&self) -> &Playfield;

    fn field_mut(&mut self) -> &mut Playfield;

    fn is_game_over(&self) -> bool;

    /// A tile was removed from the board by a match or a blast.
    fn tile_destroyed(&mut self, pos: Position, tile: Tile);

    /// All tiles removed by one destruction batch, after its `BlocksDestroyed` event.
    fn batch_destroyed(&mut self, _destroyed: &[(Position, Tile)]) {}

    fn board_stabilized(&mut self);

    fn end_turn(&mut self);
}

pub(crate) fn can_swap<R: TurnRules>(rules: &R, from: Position, to: Position) -> bool {
    let board = rules.field().board();
    !rules.is_game_over()
        && from.is_adjacent(to)
        && board.cell(from).is_some_and(Cell::can_swap)
        && board.cell(to).is_some_and(Cell::can_swap)
}

/// Plays a swap. Returns `false`, with nothing changed and nothing recorded, when the move is not allowed.
pub(crate) fn swap<R: TurnRules>(rules: &mut R, from: Position, to: Position) -> bool {
    if !can_swap(rules, from, to) {
        return false;
    }
    let field = rules.field_mut();
    let (Some(dragged), Some(target)) = (field.board.tile(from), field.board.tile(to)) else {
        return false;
    };
    field.begin_action();

    let swapped_to = match (dragged.is_special(), target.is_special()) {
        (true, true) => {
            field.board.swap_tiles(from, to);
            field.detonated.extend([dragged.id, target.id]);
            let result = SpecialActivator::new(&field.board, &mut field.rng)
                .activate_combo(from, dragged, to, target);
            run_activation(rules, result);
            None
        }
        (true, false) => {
            field.board.swap_tiles(from, to);
            field.detonated.insert(dragged.id);
            let result = field.activate(to, dragged, Some(from));
            run_activation(rules, result);
            None
        }
        (false, true) => {
            field.board.swap_tiles(from, to);
            field.record(GameEvent::BlocksSwapped { from, to });
            field.detonated.insert(target.id);
            let result = field.activate(from, target, Some(to));
            run_activation(rules, result);
            None
        }
        (false, false) => {
            field.board.swap_tiles(from, to);
            let matched = MatchFinder::new(&field.board)
                .find_all_matches()
                .iter()
                .any(|m| m.contains(from) || m.contains(to));
            if !matched {
                field.board.swap_tiles(from, to);
                return false;
            }
            field.record(GameEvent::BlocksSwapped { from, to });
            Some(to)
        }
    };

    log::debug!("Swapped {from} with {to}");
    resolve_board(rules, swapped_to);
    rules.end_turn();
    true
}

/// Detonates the special at `pos` on its own.
pub(crate) fn tap<R: TurnRules>(rules: &mut R, pos: Position) -> bool {
    if rules.is_game_over() {
        return false;
    }
    let field = rules.field_mut();
    let Some(tile) = field.board.tile(pos).filter(Tile::is_special) else {
        return false;
    };
    field.begin_action();
    let result = field.activate(pos, tile, None);
    if result.is_empty() {
        return false;
    }
    field.detonated.insert(tile.id);

    log::debug!("Tapped {:?} at {pos}", tile.special);
    run_activation(rules, result);
    resolve_board(rules, None);
    rules.end_turn();
    true
}

/// Applies an activation and everything it sets off, breadth first.
pub(crate) fn run_activation<R: TurnRules>(rules: &mut R, first: ActivationResult) {
    let mut queue = VecDeque::from([first]);
    match rules.field().chain_order() {
        ChainOrder::DestroyThenChain => {
            while let Some(result) = queue.pop_front() {
                let field = rules.field_mut();
                for event in result.events {
                    field.record(event);
                }
                destroy_positions(rules, &result.destroyed);
                let field = rules.field_mut();
                for (pos, tile) in result.chained {
                    if field.claim_chain(tile) {
                        queue.push_back(field.activate(pos, tile, None));
                    }
                }
            }
        }
        ChainOrder::ChainThenDestroy => {
            let mut destroyed = BTreeSet::new();
            let field = rules.field_mut();
            while let Some(mut result) = queue.pop_front() {
                for event in result.events {
                    field.record(event);
                }
                destroyed.append(&mut result.destroyed);
                for (pos, tile) in result.chained {
                    if field.claim_chain(tile) {
                        queue.push_back(field.activate(pos, tile, None));
                    }
                }
            }
            destroy_positions(rules, &destroyed);
        }
    }
}

/// Removes every tile in `positions`, damaging obstacles next to each one in that tile's color.
fn destroy_positions<R: TurnRules>(rules: &mut R, positions: &BTreeSet<Position>) {
    let mut batch = Vec::new();
    for &pos in positions {
        let Some(tile) = rules.field_mut().board.take_tile(pos) else {
            continue;
        };
        rules.tile_destroyed(pos, tile);
        damage_around(rules.field_mut(), pos, tile.color);
        batch.push((pos, tile));
    }
    rules.field_mut().record(GameEvent::BlocksDestroyed {
        positions: positions.clone(),
    });
    rules.batch_destroyed(&batch);
}

fn damage_around(field: &mut Playfield, pos: Position, color: BlockColor) {
    for (adj, damage) in field.board.damage_adjacent_cells(pos, Some(color)) {
        field.record(GameEvent::from_cell_damage(adj, damage));
    }
}

/// Gravity, refill and match passes until the board settles.
pub(crate) fn resolve_board<R: TurnRules>(rules: &mut R, swapped_to: Option<Position>) {
    let mut bias = swapped_to;
    loop {
        let field = rules.field_mut();
        let moves = field.board.apply_gravity();
        if !moves.is_empty() {
            log::trace!("{} tiles fell", moves.len());
            field.record(GameEvent::BlocksFell { moves });
        }
        let spawned = field.board.spawn_new_blocks(&mut field.rng);
        if !spawned.is_empty() {
            field.record(GameEvent::BlocksSpawned { positions: spawned });
        }

        let finder = MatchFinder::new(&field.board);
        let matches = match bias.take() {
            Some(pos) => finder.find_all_matches_with_swap_info(pos),
            None => finder.find_all_matches(),
        };
        if matches.is_empty() {
            break;
        }
        if field.cascade_level >= MAX_CASCADE_PASSES {
            log::warn!("Board still matching after {MAX_CASCADE_PASSES} cascade passes, stopped");
            break;
        }
        process_pass(rules, matches);
    }

    let field = rules.field_mut();
    if field.cascade_level > 0 {
        log::debug!("Board settled after {} cascade passes", field.cascade_level);
        field.record(GameEvent::CascadeEnded {
            level: field.cascade_level,
        });
    }
    field.record(GameEvent::BoardStabilized);
    rules.board_stabilized();
}

fn process_pass<R: TurnRules>(rules: &mut R, matches: Vec<Match>) {
    let field = rules.field_mut();
    field.cascade_level += 1;
    let level = field.cascade_level;
    field.record(GameEvent::CascadeStarted { level });
    for m in &matches {
        field.record(GameEvent::BlocksMatched {
            positions: m.positions.clone(),
            color: m.color,
        });
    }

    let mut creations = Vec::new();
    let mut chains = Vec::new();
    let mut destroyed = BTreeSet::new();
    let mut batch = Vec::new();
    for m in matches {
        let special = m.special_type();
        if special.is_special() {
            let creation = m.creation_position();
            rules.field_mut().record(GameEvent::SpecialForming {
                positions: m.positions.clone(),
                special,
                creation,
            });
            creations.push((creation, special, m.color));
        }

        for &pos in &m.positions {
            let field = rules.field_mut();
            let Some(tile) = field.board.take_tile(pos) else {
                continue;
            };
            // Matches collect plain tiles only, and this pass's specials are placed after its chains.
            if tile.is_special() && field.claim_chain(tile) {
                chains.push((pos, tile));
            }
            rules.tile_destroyed(pos, tile);
            damage_around(rules.field_mut(), pos, m.color);
            batch.push((pos, tile));
        }
        destroyed.extend(m.positions);
    }
    rules.field_mut().record(GameEvent::BlocksDestroyed {
        positions: destroyed,
    });
    rules.batch_destroyed(&batch);

    for (pos, tile) in chains {
        let result = rules.field_mut().activate(pos, tile, None);
        run_activation(rules, result);
    }

    let field = rules.field_mut();
    for (pos, special, color) in creations {
        if !field.board.cell(pos).is_some_and(Cell::is_vacant) {
            continue;
        }
        let tile = field.board.mint_tile(color, special);
        field.board.set_tile(pos, Some(tile));
        field.fresh.insert(tile.id, level);
        field.record(GameEvent::SpecialCreated {
            position: pos,
            special,
            color,
        });
    }
}
