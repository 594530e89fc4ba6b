use std::collections::BTreeMap;
use std::str::FromStr;

use cascada_core::GateMaterial;

use crate::*;

pub const CURRENT_LEVEL_KEY: &str = "current_level";
pub const WALLET_KEY: &str = "wallet";
pub const LIVES_KEY: &str = "lives";
pub const GATE_MATERIAL_KEY: &str = "gate_material";
pub const GATE_DURABILITY_KEY: &str = "gate_durability";
pub const OWNED_PERKS_KEY: &str = "owned_perks";

/// Somewhere player progress survives between sessions.
pub trait ProgressStore {
    /// Reads the stored progress. Missing or unreadable entries fall back to their defaults.
    fn load(&self) -> PlayerProgress;

    fn save(&mut self, progress: &PlayerProgress) -> Result<()>;

    fn reset(&mut self);
}

/// String key/value store, the shape of browser local storage or a preferences file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a store written by [`MemoryStore::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            entries: serde_json::from_str(json)?,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_owned(), value.into());
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        value
            .parse()
            .inspect_err(|_| log::warn!("Ignoring unreadable {key} {value:?}"))
            .ok()
    }
}

impl ProgressStore for MemoryStore {
    fn load(&self) -> PlayerProgress {
        let mut progress = PlayerProgress::default();
        if let Some(level) = self.parsed(CURRENT_LEVEL_KEY) {
            progress.current_level = level;
        }
        if let Some(wallet) = self.parsed(WALLET_KEY) {
            progress.wallet = wallet;
        }
        if let Some(lives) = self.parsed::<u32>(LIVES_KEY) {
            progress.lives = lives.min(progress.max_lives);
        }

        if let Some(material) = self.get(GATE_MATERIAL_KEY) {
            progress.gate_material = GateMaterial::parse_lenient(material);
        }
        progress.gate_durability = match self.parsed::<u32>(GATE_DURABILITY_KEY) {
            Some(durability) => durability.min(progress.gate_material.base_durability()),
            None => progress.gate_material.base_durability(),
        };

        if let Some(perks) = self.get(OWNED_PERKS_KEY) {
            progress.owned_perks = serde_json::from_str(perks).unwrap_or_else(|err| {
                log::warn!("Ignoring corrupt perk inventory: {err}");
                Default::default()
            });
        }
        progress
    }

    fn save(&mut self, progress: &PlayerProgress) -> Result<()> {
        let perks = serde_json::to_string(&progress.owned_perks)?;
        self.set(CURRENT_LEVEL_KEY, progress.current_level.to_string());
        self.set(WALLET_KEY, progress.wallet.to_string());
        self.set(LIVES_KEY, progress.lives.to_string());
        self.set(GATE_MATERIAL_KEY, progress.gate_material.name());
        self.set(GATE_DURABILITY_KEY, progress.gate_durability.to_string());
        self.set(OWNED_PERKS_KEY, perks);
        Ok(())
    }

    fn reset(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_loads_defaults() {
        assert_eq!(MemoryStore::new().load(), PlayerProgress::default());
    }

    #[test]
    fn saved_progress_loads_back() {
        let mut progress = PlayerProgress::default();
        progress.add_currency(500);
        progress.upgrade_gate();
        progress.apply_gate_damage(5);
        progress.buy_perk(PerkType::ScoreBoost);
        progress.complete_level(1, true, 0);

        let mut store = MemoryStore::new();
        store.save(&progress).unwrap();
        assert_eq!(store.get(GATE_MATERIAL_KEY), Some("STONE"));

        let restored = MemoryStore::from_json(&store.to_json().unwrap()).unwrap();
        assert_eq!(restored.load(), progress);

        store.reset();
        assert_eq!(store.load(), PlayerProgress::default());
    }

    #[test]
    fn corrupt_entries_fall_back() {
        let mut store = MemoryStore::new();
        store.set(CURRENT_LEVEL_KEY, "7");
        store.set(WALLET_KEY, "lots");
        store.set(GATE_MATERIAL_KEY, "adamantium");
        store.set(GATE_DURABILITY_KEY, "500");
        store.set(OWNED_PERKS_KEY, "{not json");

        let progress = store.load();
        assert_eq!(progress.current_level, 7);
        assert_eq!(progress.wallet, 0);
        assert_eq!(progress.gate_material, GateMaterial::Wood);
        assert_eq!(progress.gate_durability, 10);
        assert!(progress.owned_perks.is_empty());
    }
}
