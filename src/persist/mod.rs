//! Combat state persistence
//!
//! The orchestrator saves after every turn boundary through the
//! `CombatStore` trait; failures are logged and never fatal. The JSON
//! written by `JsonFileStore` is exactly the serde form of
//! `CombatState`.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::core::error::Result;
use crate::encounter::state::CombatState;

/// Opaque save/load surface consumed by the orchestrator
pub trait CombatStore: Send {
    fn save(&self, state: &CombatState) -> Result<()>;
    fn load(&self, id: &str) -> Result<Option<CombatState>>;
}

/// Stores the encounter as pretty JSON under a directory
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CombatStore for JsonFileStore {
    fn save(&self, state: &CombatState) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(self.dir.join("encounter.json"), json)?;
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<CombatState>> {
        let path = self.dir.join(format!("{id}.json"));
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }
}

/// In-memory store for tests and headless runs
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_save(&self) -> bool {
        self.slot.lock().map(|s| s.is_some()).unwrap_or(false)
    }
}

impl CombatStore for MemoryStore {
    fn save(&self, state: &CombatState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(json);
        }
        Ok(())
    }

    fn load(&self, _id: &str) -> Result<Option<CombatState>> {
        let json = match self.slot.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::combatant::{Combatant, CombatantKind};
    use crate::mechanics::AbilityScores;

    fn sample_state() -> CombatState {
        let hero =
            Combatant::new("Hero", CombatantKind::Player, 20, 16, AbilityScores::flat()).unwrap();
        let goblin =
            Combatant::new("Goblin", CombatantKind::Enemy, 7, 15, AbilityScores::flat()).unwrap();
        CombatState::new(vec![hero, goblin], None)
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        let state = sample_state();
        assert!(!store.has_save());

        store.save(&state).unwrap();
        assert!(store.has_save());

        let restored = store.load("encounter").unwrap().unwrap();
        assert_eq!(restored.combatants.len(), 2);
        assert_eq!(restored.combatants[0].id, state.combatants[0].id);
    }

    #[test]
    fn test_memory_store_empty_load() {
        let store = MemoryStore::new();
        assert!(store.load("encounter").unwrap().is_none());
    }

    #[test]
    fn test_json_file_store_roundtrip() {
        let dir = std::env::temp_dir().join("duskfall-store-test");
        let store = JsonFileStore::new(&dir);
        let state = sample_state();

        store.save(&state).unwrap();
        let restored = store.load("encounter").unwrap().unwrap();
        assert_eq!(restored.combatants.len(), state.combatants.len());

        let _ = std::fs::remove_dir_all(dir);
    }
}
