#![deny(warnings)]

//! Persistence layer: named storage slots and JSON snapshots of the game state.
//!
//! The whole [`GameState`] is written to one slot after every change and read
//! back once at startup. Loading never trusts the payload blindly: missing
//! fields take their defaults and [`farm_core::repair_state`] restores the
//! invariants before the engine sees the state.

use farm_core::{repair_state, GameState, Repair};
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Returns the default directory used for local saves.
pub fn default_save_dir() -> &'static str {
    "./saves"
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed save: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Key/value store holding whole documents under named slots.
pub trait Storage: Send {
    /// Read a slot. `Ok(None)` when nothing was ever written there.
    fn get(&self, key: &str) -> Result<Option<String>, PersistError>;
    /// Overwrite a slot.
    fn set(&self, key: &str, value: &str) -> Result<(), PersistError>;
}

/// One `<key>.json` file per slot inside a directory.
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(value.as_bytes())?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-process store. Clones share the same slots.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        let slots = self.slots.lock().map_err(|_| PersistError::Poisoned)?;
        Ok(slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistError> {
        let mut slots = self.slots.lock().map_err(|_| PersistError::Poisoned)?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Serialize the whole state into `key`, replacing what was there.
pub fn save_state(storage: &dyn Storage, key: &str, state: &GameState) -> Result<(), PersistError> {
    let text = serde_json::to_string(state)?;
    storage.set(key, &text)?;
    debug!(key, bytes = text.len(), "state saved");
    Ok(())
}

/// Read and parse the state in `key` without repairing it.
pub fn load_state(storage: &dyn Storage, key: &str) -> Result<Option<GameState>, PersistError> {
    match storage.get(key)? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

/// How the startup state was obtained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing was saved; a new game was created.
    Fresh,
    /// The save was loaded. `repairs` lists what had to be fixed.
    Restored { repairs: Vec<Repair> },
    /// The save could not be parsed; a new game was created.
    Corrupt { reason: String },
}

/// Load the saved state, or a new game when there is none or it is unreadable.
///
/// Storage I/O failures are returned as errors rather than replaced by a new
/// game, so a transient read error never leads to the save being overwritten.
pub fn load_or_default(
    storage: &dyn Storage,
    key: &str,
) -> Result<(GameState, LoadOutcome), PersistError> {
    match load_state(storage, key) {
        Ok(Some(mut state)) => {
            let repairs = repair_state(&mut state);
            info!(key, repairs = repairs.len(), "save restored");
            Ok((state, LoadOutcome::Restored { repairs }))
        }
        Ok(None) => {
            info!(key, "no save found, starting a new farm");
            Ok((GameState::default(), LoadOutcome::Fresh))
        }
        Err(PersistError::Parse(e)) => {
            warn!(key, error = %e, "save is malformed, starting a new farm");
            Ok((
                GameState::default(),
                LoadOutcome::Corrupt {
                    reason: e.to_string(),
                },
            ))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farm_core::{FarmAnimal, PlantedCrop, DEFAULT_STORAGE_KEY};
    use proptest::prelude::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "farmstead-persistence-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn busy_state() -> GameState {
        let mut s = GameState::default();
        s.player.coins = 1234;
        s.player.level = 3;
        s.player.inventory.insert("Milk".to_string(), 2);
        s.player.statistics.crops_harvested = 7;
        s.planted_crops.push(PlantedCrop {
            id: "crop-1-0".to_string(),
            crop_id: "wheat".to_string(),
            planted_at: 1_000,
            harvest_at: 31_000,
            is_ready: true,
            plot: 0,
        });
        s.animals.push(FarmAnimal {
            id: "animal-1".to_string(),
            animal_id: "cow".to_string(),
            last_collection: 5_000,
            is_ready: false,
        });
        s.achievements[0].unlocked = true;
        s
    }

    #[test]
    fn default_dir_is_relative() {
        assert!(default_save_dir().starts_with("./"));
    }

    #[test]
    fn memory_roundtrip_is_identical() {
        let storage = MemoryStorage::new();
        let state = busy_state();
        save_state(&storage, DEFAULT_STORAGE_KEY, &state).unwrap();
        let (back, outcome) = load_or_default(&storage, DEFAULT_STORAGE_KEY).unwrap();
        assert_eq!(back, state);
        assert_eq!(outcome, LoadOutcome::Restored { repairs: vec![] });
    }

    #[test]
    fn file_roundtrip_overwrites_slot() {
        let dir = temp_dir("roundtrip");
        let storage = FileStorage::new(&dir);
        save_state(&storage, "slot", &GameState::default()).unwrap();
        let state = busy_state();
        save_state(&storage, "slot", &state).unwrap();
        assert!(storage.path_for("slot").exists());
        assert!(!storage.path_for("slot").with_extension("json.tmp").exists());
        assert_eq!(load_state(&storage, "slot").unwrap(), Some(state));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_slot_starts_fresh() {
        let storage = FileStorage::new(temp_dir("missing"));
        let (state, outcome) = load_or_default(&storage, "nothing").unwrap();
        assert_eq!(outcome, LoadOutcome::Fresh);
        assert_eq!(state, GameState::default());
    }

    #[test]
    fn garbage_slot_starts_fresh() {
        let storage = MemoryStorage::new();
        storage.set(DEFAULT_STORAGE_KEY, "{not json").unwrap();
        let (state, outcome) = load_or_default(&storage, DEFAULT_STORAGE_KEY).unwrap();
        assert!(matches!(outcome, LoadOutcome::Corrupt { .. }));
        assert_eq!(state, GameState::default());
    }

    #[test]
    fn stale_save_is_repaired_on_load() {
        let storage = MemoryStorage::new();
        let text = r#"{
            "player": {"coins": 77, "plots": 1},
            "plantedCrops": [
                {"id": "a", "cropId": "wheat", "plantedAt": 0, "harvestAt": 10, "plot": 0},
                {"id": "b", "cropId": "wheat", "plantedAt": 0, "harvestAt": 10, "plot": 3}
            ],
            "achievements": []
        }"#;
        storage.set(DEFAULT_STORAGE_KEY, text).unwrap();
        let (state, outcome) = load_or_default(&storage, DEFAULT_STORAGE_KEY).unwrap();
        assert_eq!(state.player.coins, 77);
        assert_eq!(state.planted_crops.len(), 1);
        assert_eq!(state.achievements.len(), farm_core::catalog::ACHIEVEMENTS.len());
        match outcome {
            LoadOutcome::Restored { repairs } => assert!(!repairs.is_empty()),
            other => panic!("unexpected outcome {other:?}"),
        }
        farm_core::validate_state(&state).unwrap();
    }

    struct UnreadableStorage;

    impl Storage for UnreadableStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, PersistError> {
            Err(std::io::Error::new(ErrorKind::PermissionDenied, "read denied").into())
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), PersistError> {
            Ok(())
        }
    }

    #[test]
    fn read_error_is_returned_not_replaced() {
        let result = load_or_default(&UnreadableStorage, DEFAULT_STORAGE_KEY);
        assert!(matches!(result, Err(PersistError::Io(_))));
    }

    #[test]
    fn unreadable_file_slot_is_an_io_error() {
        let dir = temp_dir("dir-slot");
        // A directory where the slot file should be cannot be read as text.
        fs::create_dir_all(dir.join("slot.json")).unwrap();
        let storage = FileStorage::new(&dir);
        assert!(matches!(
            load_or_default(&storage, "slot"),
            Err(PersistError::Io(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    proptest! {
        #[test]
        fn wallet_roundtrips(coins in 0u64..u64::MAX, gems in 0u64..1_000_000, exp in 0u64..100) {
            let storage = MemoryStorage::new();
            let mut s = GameState::default();
            s.player.coins = coins;
            s.player.gems = gems;
            s.player.experience = exp;
            save_state(&storage, "k", &s).unwrap();
            prop_assert_eq!(load_state(&storage, "k").unwrap(), Some(s));
        }
    }
}
