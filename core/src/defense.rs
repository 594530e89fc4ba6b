use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::cmp::Reverse;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::resolve;
use crate::*;

/// Rows between the spawn line and the gate.
pub const ENEMY_FIELD_HEIGHT: Coord = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnemyKind {
    Basic,
    Controller,
    Spawner,
    Boss,
}

impl EnemyKind {
    pub const ALL: [EnemyKind; 4] = [Self::Basic, Self::Controller, Self::Spawner, Self::Boss];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Basic => "BASIC",
            Self::Controller => "CONTROLLER",
            Self::Spawner => "SPAWNER",
            Self::Boss => "BOSS",
        }
    }

    /// Damage dealt to the gate every turn once the enemy reached it.
    pub const fn damage_per_turn(self) -> u32 {
        match self {
            Self::Basic | Self::Spawner => 1,
            Self::Controller => 2,
            Self::Boss => 5,
        }
    }
}

impl FromStr for EnemyKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or(GameError::UnknownName("enemy kind"))
    }
}

/// Spawn-order identity of an enemy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnemyId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: EnemyId,
    pub kind: EnemyKind,
    pub row: Coord,
    pub col: Coord,
    pub hp: u32,
    pub max_hp: u32,
    pub at_gate: bool,
}

impl Enemy {
    pub const fn position(&self) -> Position {
        Position::new(self.row, self.col)
    }

    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateMaterial {
    #[default]
    Wood,
    Stone,
    Iron,
    Steel,
    Diamond,
}

impl GateMaterial {
    pub const ALL: [GateMaterial; 5] = [Self::Wood, Self::Stone, Self::Iron, Self::Steel, Self::Diamond];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Wood => "WOOD",
            Self::Stone => "STONE",
            Self::Iron => "IRON",
            Self::Steel => "STEEL",
            Self::Diamond => "DIAMOND",
        }
    }

    pub const fn base_durability(self) -> u32 {
        match self {
            Self::Wood => 10,
            Self::Stone => 25,
            Self::Iron => 40,
            Self::Steel => 60,
            Self::Diamond => 100,
        }
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Wood => Some(Self::Stone),
            Self::Stone => Some(Self::Iron),
            Self::Iron => Some(Self::Steel),
            Self::Steel => Some(Self::Diamond),
            Self::Diamond => None,
        }
    }

    /// Price of upgrading to the next material, `None` at the top tier.
    pub const fn upgrade_cost(self) -> Option<u32> {
        match self {
            Self::Wood => Some(100),
            Self::Stone => Some(250),
            Self::Iron => Some(500),
            Self::Steel => Some(1000),
            Self::Diamond => None,
        }
    }

    pub const fn repair_cost_per_point(self) -> u32 {
        match self {
            Self::Wood => 1,
            Self::Stone => 2,
            Self::Iron => 3,
            Self::Steel => 4,
            Self::Diamond => 5,
        }
    }

    /// Parses a stored material name, falling back to wood.
    pub fn parse_lenient(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            log::warn!("Unknown gate material {name:?}, using wood");
            Self::Wood
        })
    }
}

impl FromStr for GateMaterial {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|material| material.name().eq_ignore_ascii_case(s))
            .ok_or(GameError::UnknownName("gate material"))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    pub material: GateMaterial,
    pub durability: u32,
    pub max_durability: u32,
}

impl Gate {
    pub const fn new(material: GateMaterial) -> Self {
        let max_durability = material.base_durability();
        Self {
            material,
            durability: max_durability,
            max_durability,
        }
    }

    /// A gate of `material` that has already taken damage. Durability is capped by the material.
    pub fn damaged(material: GateMaterial, durability: u32) -> Self {
        let mut gate = Self::new(material);
        gate.durability = durability.min(gate.max_durability);
        gate
    }

    /// Applies up to `amount` damage and returns how much was actually taken.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.durability);
        self.durability -= taken;
        taken
    }

    pub const fn is_destroyed(&self) -> bool {
        self.durability == 0
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new(GateMaterial::default())
    }
}

/// Rules engine for tower defense levels: tiles cleared on the board fire projectiles at enemies walking
/// down their column towards the gate.
#[derive(Clone, Debug)]
pub struct TowerDefenseEngine {
    config: LevelConfig,
    field: Playfield,
    enemies: Vec<Enemy>,
    gate: Gate,
    score: u32,
    turns_remaining: u32,
    current_turn: u32,
    next_enemy_id: u32,
    state: EngineState,
}

impl TowerDefenseEngine {
    pub fn new(config: LevelConfig, gate: Gate) -> Self {
        if let Err(err) = config.validate() {
            log::warn!("Level {} does not validate, playing it anyway: {err}", config.level);
        }
        Self {
            field: Playfield::new(&config),
            enemies: Vec::new(),
            gate,
            score: 0,
            turns_remaining: config.max_turns,
            current_turn: 0,
            next_enemy_id: 0,
            state: Default::default(),
            config,
        }
    }

    pub fn try_new(config: LevelConfig, gate: Gate) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config, gate))
    }

    pub fn with_chain_order(mut self, chain_order: ChainOrder) -> Self {
        self.field.set_chain_order(chain_order);
        self
    }

    pub fn can_swap(&self, from: Position, to: Position) -> bool {
        resolve::can_swap(self, from, to)
    }

    pub fn swap(&mut self, from: Position, to: Position) -> bool {
        let accepted = resolve::swap(self, from, to);
        if accepted && self.state.is_ready() {
            self.state = EngineState::Active;
        }
        accepted
    }

    pub fn tap_block(&mut self, pos: Position) -> bool {
        let accepted = resolve::tap(self, pos);
        if accepted && self.state.is_ready() {
            self.state = EngineState::Active;
        }
        accepted
    }

    pub fn get_events(&mut self) -> Vec<RecordedEvent> {
        self.field.drain_events()
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    /// Live enemy standing at `pos` of the enemy field.
    pub fn enemy_at(&self, pos: Position) -> Option<&Enemy> {
        self.enemies
            .iter()
            .find(|enemy| enemy.is_alive() && enemy.position() == pos)
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Damage the gate will take at the end of the next turn if nothing changes.
    pub fn gate_damage_per_turn(&self) -> u32 {
        self.enemies
            .iter()
            .filter(|enemy| enemy.at_gate && enemy.is_alive())
            .map(|enemy| enemy.kind.damage_per_turn())
            .sum()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn turns_remaining(&self) -> u32 {
        self.turns_remaining
    }

    pub fn current_turn(&self) -> u32 {
        self.current_turn
    }

    pub fn board(&self) -> &Board {
        self.field.board()
    }

    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_game_over(&self) -> bool {
        self.state.is_finished()
    }

    pub fn is_victory(&self) -> bool {
        self.state.is_victory()
    }

    pub fn wallet_reward(&self) -> u32 {
        if self.is_victory() {
            self.score + self.gate.durability
        } else {
            0
        }
    }

    fn fire_projectiles(&mut self, column: Coord, count: u32) {
        self.field.record(GameEvent::ProjectileFired { column, count });

        let mut targets: Vec<usize> = (0..self.enemies.len())
            .filter(|&i| self.enemies[i].col == column && self.enemies[i].is_alive())
            .collect();
        targets.sort_by_key(|&i| (Reverse(self.enemies[i].row), self.enemies[i].id));

        let mut remaining = count;
        for i in targets {
            if remaining == 0 {
                break;
            }
            let enemy = &mut self.enemies[i];
            let damage = remaining.min(enemy.hp);
            enemy.hp -= damage;
            remaining -= damage;

            self.field.record(GameEvent::EnemyDamaged {
                id: enemy.id,
                damage,
                hp: enemy.hp,
            });
            if !enemy.is_alive() {
                self.field.record(GameEvent::EnemyDestroyed {
                    id: enemy.id,
                    position: enemy.position(),
                });
            }
        }

        self.enemies.retain(Enemy::is_alive);
    }

    fn spawn_enemies(&mut self) {
        let last_col = self.board().width() - 1;
        let due: Vec<EnemyConfig> = self
            .config
            .enemies
            .iter()
            .filter(|enemy| enemy.spawn_turn == self.current_turn)
            .copied()
            .collect();

        for spawn in due {
            let enemy = Enemy {
                id: EnemyId(self.next_enemy_id),
                kind: spawn.kind,
                row: 0,
                col: spawn.column.clamp(0, last_col),
                hp: spawn.hp,
                max_hp: spawn.hp,
                at_gate: false,
            };
            self.next_enemy_id += 1;
            self.field.record(GameEvent::EnemySpawned {
                id: enemy.id,
                kind: enemy.kind,
                position: enemy.position(),
            });
            self.enemies.push(enemy);
        }
    }

    fn move_enemies(&mut self) {
        for enemy in self.enemies.iter_mut().filter(|e| !e.at_gate && e.is_alive()) {
            let from = enemy.position();
            enemy.row += 1;
            if enemy.row >= ENEMY_FIELD_HEIGHT {
                enemy.row = ENEMY_FIELD_HEIGHT - 1;
                enemy.at_gate = true;
            }
            self.field.record(GameEvent::EnemyMoved {
                id: enemy.id,
                from,
                to: enemy.position(),
            });
        }
    }

    fn attack_gate(&mut self) {
        for enemy in self.enemies.iter().filter(|e| e.at_gate && e.is_alive()) {
            let amount = self.gate.take_damage(enemy.kind.damage_per_turn());
            if amount > 0 {
                self.field.record(GameEvent::GateDamaged {
                    amount,
                    remaining: self.gate.durability,
                });
            }
        }
    }

    fn evaluate(&mut self) {
        if self.gate.is_destroyed() {
            self.end_game(GameEvent::GameLost {
                reason: LossReason::GateDestroyed,
            });
            return;
        }

        let alive = self.enemies.iter().any(Enemy::is_alive);
        let pending = self
            .config
            .enemies
            .iter()
            .any(|enemy| enemy.spawn_turn > self.current_turn);
        if !alive && !pending && self.current_turn > 0 {
            self.end_game(GameEvent::GameWon {
                score: self.score,
                bonus: self.gate.durability,
            });
        } else if self.turns_remaining == 0 {
            self.end_game(GameEvent::GameLost {
                reason: LossReason::EnemiesRemaining,
            });
        }
    }

    fn end_game(&mut self, outcome: GameEvent) {
        if self.state.is_finished() {
            return;
        }

        self.state = if matches!(outcome, GameEvent::GameWon { .. }) {
            EngineState::Won
        } else {
            EngineState::Lost
        };
        log::debug!("Defense of level {} over: {:?}", self.config.level, self.state);
        self.field.record(outcome);
    }
}

impl resolve::TurnRules for TowerDefenseEngine {
    fn field(&self) -> &Playfield {
        &self.field
    }

    fn field_mut(&mut self) -> &mut Playfield {
        &mut self.field
    }

    fn is_game_over(&self) -> bool {
        self.state.is_finished()
    }

    fn tile_destroyed(&mut self, _pos: Position, _tile: Tile) {
        self.score += 1;
    }

    fn batch_destroyed(&mut self, destroyed: &[(Position, Tile)]) {
        let mut columns = BTreeMap::new();
        for (pos, _) in destroyed {
            *columns.entry(pos.col).or_insert(0) += 1;
        }
        for (column, count) in columns {
            self.fire_projectiles(column, count);
        }
    }

    fn board_stabilized(&mut self) {}

    fn end_turn(&mut self) {
        self.current_turn += 1;
        self.turns_remaining = self.turns_remaining.saturating_sub(1);
        self.field.end_turn();

        self.spawn_enemies();
        self.move_enemies();
        self.attack_gate();

        self.field.record(GameEvent::TurnEnded {
            turns_remaining: self.turns_remaining,
        });
        self.evaluate();
    }
}
