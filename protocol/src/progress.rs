use std::collections::BTreeMap;
use std::str::FromStr;

use cascada_core::{Gate, GameError, GateMaterial};
use serde::{Deserialize, Serialize};

/// Price of one extra life.
pub const LIFE_COST: u32 = 10;

pub const MAX_LIVES: u32 = 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerkType {
    ExtraRocket,
    ExtraBomb,
    ExtraPropeller,
    ExtraDisco,
    DoubleDamage,
    Shield,
    LuckySpawns,
    ScoreBoost,
}

impl PerkType {
    pub const ALL: [PerkType; 8] = [
        Self::ExtraRocket,
        Self::ExtraBomb,
        Self::ExtraPropeller,
        Self::ExtraDisco,
        Self::DoubleDamage,
        Self::Shield,
        Self::LuckySpawns,
        Self::ScoreBoost,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::ExtraRocket => "EXTRA_ROCKET",
            Self::ExtraBomb => "EXTRA_BOMB",
            Self::ExtraPropeller => "EXTRA_PROPELLER",
            Self::ExtraDisco => "EXTRA_DISCO",
            Self::DoubleDamage => "DOUBLE_DAMAGE",
            Self::Shield => "SHIELD",
            Self::LuckySpawns => "LUCKY_SPAWNS",
            Self::ScoreBoost => "SCORE_BOOST",
        }
    }

    pub const fn cost(self) -> u32 {
        match self {
            Self::ExtraRocket => 50,
            Self::ExtraBomb => 75,
            Self::ExtraPropeller => 60,
            Self::ExtraDisco => 100,
            Self::DoubleDamage => 150,
            Self::Shield => 200,
            Self::LuckySpawns => 100,
            Self::ScoreBoost => 80,
        }
    }

    /// How many turns the perk lasts once activated. Zero for perks that apply once at level start.
    pub const fn duration(self) -> u32 {
        match self {
            Self::DoubleDamage | Self::ScoreBoost => 5,
            Self::Shield => 3,
            Self::LuckySpawns => 10,
            Self::ExtraRocket | Self::ExtraBomb | Self::ExtraPropeller | Self::ExtraDisco => 0,
        }
    }

    pub const fn is_instant(self) -> bool {
        self.duration() == 0
    }
}

impl FromStr for PerkType {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, GameError> {
        Self::ALL
            .into_iter()
            .find(|perk| perk.name().eq_ignore_ascii_case(s))
            .ok_or(GameError::UnknownName("perk"))
    }
}

/// Everything the player carries from one level to the next.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProgress {
    pub current_level: u32,
    pub wallet: u32,
    pub lives: u32,
    pub max_lives: u32,
    pub gate_material: GateMaterial,
    pub gate_durability: u32,
    pub owned_perks: BTreeMap<PerkType, u32>,
    /// Running perks and the turns they have left.
    pub active_perks: BTreeMap<PerkType, u32>,
}

impl Default for PlayerProgress {
    fn default() -> Self {
        Self {
            current_level: 1,
            wallet: 0,
            lives: MAX_LIVES,
            max_lives: MAX_LIVES,
            gate_material: GateMaterial::Wood,
            gate_durability: GateMaterial::Wood.base_durability(),
            owned_perks: BTreeMap::new(),
            active_perks: BTreeMap::new(),
        }
    }
}

impl PlayerProgress {
    pub fn gate(&self) -> Gate {
        Gate::damaged(self.gate_material, self.gate_durability)
    }

    pub fn add_currency(&mut self, amount: u32) {
        self.wallet = self.wallet.saturating_add(amount);
    }

    pub fn spend_currency(&mut self, amount: u32) -> bool {
        match self.wallet.checked_sub(amount) {
            Some(left) => {
                self.wallet = left;
                true
            }
            None => false,
        }
    }

    pub fn repair_cost(&self, amount: u32) -> u32 {
        amount * self.gate_material.repair_cost_per_point()
    }

    /// Restores up to `amount` durability, paying for what is actually restored.
    pub fn repair_gate(&mut self, amount: u32) -> bool {
        let max = self.gate_material.base_durability();
        let amount = amount.min(max.saturating_sub(self.gate_durability));
        if amount == 0 || !self.spend_currency(self.repair_cost(amount)) {
            return false;
        }
        self.gate_durability += amount;
        true
    }

    pub fn upgrade_cost(&self) -> Option<u32> {
        self.gate_material.upgrade_cost()
    }

    /// Moves to the next material at full durability.
    pub fn upgrade_gate(&mut self) -> bool {
        let (Some(next), Some(cost)) = (self.gate_material.next(), self.upgrade_cost()) else {
            return false;
        };
        if !self.spend_currency(cost) {
            return false;
        }
        self.gate_material = next;
        self.gate_durability = next.base_durability();
        true
    }

    pub fn apply_gate_damage(&mut self, damage: u32) {
        self.gate_durability = self.gate_durability.saturating_sub(damage);
    }

    /// Keeps whatever durability the gate has left after a defense.
    pub fn store_gate(&mut self, gate: &Gate) {
        self.gate_material = gate.material;
        self.gate_durability = gate.durability;
    }

    pub fn buy_perk(&mut self, perk: PerkType) -> bool {
        if !self.spend_currency(perk.cost()) {
            return false;
        }
        *self.owned_perks.entry(perk).or_default() += 1;
        true
    }

    /// Uses up one owned perk. Instant perks are consumed without ever becoming active.
    pub fn activate_perk(&mut self, perk: PerkType) -> bool {
        let Some(owned) = self.owned_perks.get_mut(&perk).filter(|owned| **owned > 0) else {
            return false;
        };
        *owned -= 1;
        if *owned == 0 {
            self.owned_perks.remove(&perk);
        }
        if !perk.is_instant() {
            self.active_perks.insert(perk, perk.duration());
        }
        true
    }

    /// Counts one turn off every running perk, dropping those that run out.
    pub fn consume_perk_turn(&mut self) {
        self.active_perks.retain(|_, turns| {
            *turns = turns.saturating_sub(1);
            *turns > 0
        });
    }

    pub fn is_perk_active(&self, perk: PerkType) -> bool {
        self.active_perks.get(&perk).is_some_and(|&turns| turns > 0)
    }

    pub fn owned(&self, perk: PerkType) -> u32 {
        self.owned_perks.get(&perk).copied().unwrap_or(0)
    }

    pub fn has_lives(&self) -> bool {
        self.lives > 0
    }

    pub fn use_life(&mut self) -> bool {
        if self.lives == 0 {
            return false;
        }
        self.lives -= 1;
        true
    }

    /// Buys a life. Nothing is charged when lives are already full.
    pub fn buy_life(&mut self) -> bool {
        if self.lives >= self.max_lives || !self.spend_currency(LIFE_COST) {
            return false;
        }
        self.lives += 1;
        true
    }

    pub fn refill_life(&mut self) {
        if self.lives < self.max_lives {
            self.lives += 1;
        }
    }

    /// Credits a finished level: the reward goes to the wallet and a victory unlocks the next level.
    pub fn complete_level(&mut self, level: u32, victory: bool, reward: u32) {
        self.add_currency(reward);
        if victory && level >= self.current_level {
            self.current_level = level + 1;
        } else if !victory {
            self.use_life();
        }
    }
}
