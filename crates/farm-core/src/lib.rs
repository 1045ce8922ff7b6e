#![deny(warnings)]

//! Core domain models and invariants for Farmstead.
//!
//! This crate defines the serializable game state, the static catalogs the
//! engine reads from, and validation/repair helpers that guarantee the
//! state invariants after loading a save.

pub mod catalog;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Experience needed to go from level 1 to level 2.
pub const BASE_EXPERIENCE_TO_NEXT: u64 = 100;
/// Smallest threshold that still grows under the level curve.
pub const MIN_EXPERIENCE_TO_NEXT: u64 = 2;
/// Coins a fresh farm starts with.
pub const STARTING_COINS: u64 = 500;
/// Gems a fresh farm starts with.
pub const STARTING_GEMS: u64 = 10;
/// Arable plots a fresh farm starts with.
pub const STARTING_PLOTS: u32 = 6;
/// Barn slots a fresh farm starts with.
pub const STARTING_BARN_CAPACITY: u32 = 5;
/// Storage slot the game state is written to.
pub const DEFAULT_STORAGE_KEY: &str = "farmGameState";

/// Lifetime counters. All of them only ever grow.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Statistics {
    pub crops_harvested: u64,
    pub animals_collected: u64,
    pub coins_earned: u64,
    pub products_sold: u64,
}

/// The player's profile, wallet and progression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub avatar: String,
    /// Current level (>= 1).
    pub level: u32,
    /// Experience accumulated towards the next level.
    pub experience: u64,
    /// Experience required to reach the next level (>= 2).
    pub experience_to_next: u64,
    /// Soft currency.
    pub coins: u64,
    /// Hard currency.
    pub gems: u64,
    /// Number of arable plots.
    pub plots: u32,
    /// Maximum number of animals kept at once.
    pub barn_capacity: u32,
    /// Product name to count.
    pub inventory: BTreeMap<String, u64>,
    pub statistics: Statistics,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            id: "1".to_string(),
            name: "Farmer".to_string(),
            avatar: "👨‍🌾".to_string(),
            level: 1,
            experience: 0,
            experience_to_next: BASE_EXPERIENCE_TO_NEXT,
            coins: STARTING_COINS,
            gems: STARTING_GEMS,
            plots: STARTING_PLOTS,
            barn_capacity: STARTING_BARN_CAPACITY,
            inventory: BTreeMap::new(),
            statistics: Statistics::default(),
        }
    }
}

/// A crop growing on one plot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantedCrop {
    pub id: String,
    pub crop_id: String,
    /// Planting time, epoch milliseconds.
    pub planted_at: i64,
    /// Time the crop becomes harvestable, epoch milliseconds.
    pub harvest_at: i64,
    #[serde(default)]
    pub is_ready: bool,
    pub plot: u32,
}

impl PlantedCrop {
    /// Whether the crop can be harvested at `now`, regardless of the cached flag.
    pub fn ready_at(&self, now: i64) -> bool {
        self.is_ready || now >= self.harvest_at
    }

    /// Milliseconds left until harvest, zero once ready.
    pub fn remaining_ms(&self, now: i64) -> i64 {
        (self.harvest_at - now).max(0)
    }
}

/// An animal living in the barn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmAnimal {
    pub id: String,
    pub animal_id: String,
    /// Time of the last collection or of the purchase, epoch milliseconds.
    pub last_collection: i64,
    #[serde(default)]
    pub is_ready: bool,
}

/// Statistic an achievement condition is measured against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    CropsHarvested,
    AnimalsCollected,
    CoinsEarned,
    LevelReached,
    ProductsSold,
}

/// Threshold that unlocks an achievement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    pub value: u64,
}

/// Bundle granted once when an achievement unlocks. Absent fields grant nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coins: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gems: Option<u64>,
}

/// Per-save achievement instance with its unlock flag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub condition: Condition,
    #[serde(default)]
    pub reward: Reward,
    #[serde(default)]
    pub unlocked: bool,
}

/// Demo friend entry. Never mutated by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub id: String,
    pub name: String,
    pub level: u32,
    pub avatar: String,
    pub last_active: i64,
}

/// Root aggregate persisted as a single JSON document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameState {
    pub player: Player,
    pub planted_crops: Vec<PlantedCrop>,
    pub animals: Vec<FarmAnimal>,
    pub achievements: Vec<Achievement>,
    pub friends: Vec<Friend>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            player: Player::default(),
            planted_crops: Vec::new(),
            animals: Vec::new(),
            achievements: catalog::ACHIEVEMENTS
                .iter()
                .map(catalog::AchievementDefinition::to_instance)
                .collect(),
            friends: Vec::new(),
        }
    }
}

impl GameState {
    /// The crop occupying `plot`, if any.
    pub fn crop_on_plot(&self, plot: u32) -> Option<&PlantedCrop> {
        self.planted_crops.iter().find(|c| c.plot == plot)
    }

    /// Lowest plot index with nothing planted on it.
    pub fn first_free_plot(&self) -> Option<u32> {
        (0..self.player.plots).find(|p| self.crop_on_plot(*p).is_none())
    }

    pub fn barn_is_full(&self) -> bool {
        self.animals.len() >= self.player.barn_capacity as usize
    }

    pub fn unlocked_count(&self) -> usize {
        self.achievements.iter().filter(|a| a.unlocked).count()
    }

    /// Whether any crop or animal instance already uses `id`.
    pub fn has_instance_id(&self, id: &str) -> bool {
        self.planted_crops.iter().any(|c| c.id == id) || self.animals.iter().any(|a| a.id == id)
    }
}

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmConfig {
    /// Period of the readiness tick in milliseconds.
    pub tick_interval_ms: u64,
    /// Seed for the instance id generator.
    pub rng_seed: u64,
    /// Storage slot holding the saved state.
    pub storage_key: String,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            rng_seed: 42,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

/// Validation errors for state invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("player level must be >= 1")]
    LevelBelowOne,
    #[error("experience threshold must be at least 2, got {0}")]
    ExperienceThresholdTooLow(u64),
    #[error("unknown crop: {0}")]
    UnknownCrop(String),
    #[error("unknown animal: {0}")]
    UnknownAnimal(String),
    #[error("plot {plot} is outside the field of {plots} plots")]
    PlotOutOfRange { plot: u32, plots: u32 },
    #[error("plot {0} holds more than one crop")]
    PlotOccupied(u32),
    #[error("duplicate instance id: {0}")]
    DuplicateInstance(String),
    #[error("barn holds {count} animals but has room for {capacity}")]
    BarnOverCapacity { count: usize, capacity: u32 },
    #[error("achievement missing from save: {0}")]
    MissingAchievement(String),
    #[error("duplicate achievement: {0}")]
    DuplicateAchievement(String),
}

/// Validate the whole state, including references into the catalogs.
pub fn validate_state(state: &GameState) -> Result<(), ValidationError> {
    let player = &state.player;
    if player.level == 0 {
        return Err(ValidationError::LevelBelowOne);
    }
    if player.experience_to_next < MIN_EXPERIENCE_TO_NEXT {
        return Err(ValidationError::ExperienceThresholdTooLow(
            player.experience_to_next,
        ));
    }

    let mut ids: BTreeSet<&str> = BTreeSet::new();
    let mut plots: BTreeSet<u32> = BTreeSet::new();
    for c in &state.planted_crops {
        if catalog::crop(&c.crop_id).is_none() {
            return Err(ValidationError::UnknownCrop(c.crop_id.clone()));
        }
        if c.plot >= player.plots {
            return Err(ValidationError::PlotOutOfRange {
                plot: c.plot,
                plots: player.plots,
            });
        }
        if !plots.insert(c.plot) {
            return Err(ValidationError::PlotOccupied(c.plot));
        }
        if !ids.insert(&c.id) {
            return Err(ValidationError::DuplicateInstance(c.id.clone()));
        }
    }

    for a in &state.animals {
        if catalog::animal(&a.animal_id).is_none() {
            return Err(ValidationError::UnknownAnimal(a.animal_id.clone()));
        }
        if !ids.insert(&a.id) {
            return Err(ValidationError::DuplicateInstance(a.id.clone()));
        }
    }
    if state.animals.len() > player.barn_capacity as usize {
        return Err(ValidationError::BarnOverCapacity {
            count: state.animals.len(),
            capacity: player.barn_capacity,
        });
    }

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for a in &state.achievements {
        if !seen.insert(&a.id) {
            return Err(ValidationError::DuplicateAchievement(a.id.clone()));
        }
    }
    for def in catalog::ACHIEVEMENTS {
        if !seen.contains(def.id) {
            return Err(ValidationError::MissingAchievement(def.id.to_string()));
        }
    }
    Ok(())
}

/// A single fix applied by [`repair_state`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Repair {
    LevelRaisedToOne,
    ExperienceThresholdReset,
    DroppedCrop { id: String, reason: DropReason },
    DroppedAnimal { id: String, reason: DropReason },
    AddedAchievement(String),
    DroppedDuplicateAchievement(String),
}

/// Why an instance was dropped during repair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    UnknownDefinition,
    PlotOutOfRange,
    PlotOccupied,
    DuplicateId,
    OverCapacity,
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repair::LevelRaisedToOne => write!(f, "level raised to 1"),
            Repair::ExperienceThresholdReset => {
                write!(f, "experience threshold reset to {BASE_EXPERIENCE_TO_NEXT}")
            }
            Repair::DroppedCrop { id, reason } => write!(f, "dropped crop {id} ({reason:?})"),
            Repair::DroppedAnimal { id, reason } => write!(f, "dropped animal {id} ({reason:?})"),
            Repair::AddedAchievement(id) => write!(f, "added missing achievement {id}"),
            Repair::DroppedDuplicateAchievement(id) => {
                write!(f, "dropped duplicate achievement {id}")
            }
        }
    }
}

/// Bring a loaded state back within its invariants.
///
/// Unlock flags and wallet values are never touched. Returns every fix applied
/// so callers can log them; an empty list means the state was already valid.
pub fn repair_state(state: &mut GameState) -> Vec<Repair> {
    let mut repairs = Vec::new();
    let player = &mut state.player;
    if player.level == 0 {
        player.level = 1;
        repairs.push(Repair::LevelRaisedToOne);
    }
    if player.experience_to_next < MIN_EXPERIENCE_TO_NEXT {
        player.experience_to_next = BASE_EXPERIENCE_TO_NEXT;
        repairs.push(Repair::ExperienceThresholdReset);
    }

    let plots = player.plots;
    let capacity = player.barn_capacity as usize;
    let mut ids: BTreeSet<String> = BTreeSet::new();
    let mut used_plots: BTreeSet<u32> = BTreeSet::new();

    state.planted_crops.retain(|c| {
        let reason = if catalog::crop(&c.crop_id).is_none() {
            Some(DropReason::UnknownDefinition)
        } else if c.plot >= plots {
            Some(DropReason::PlotOutOfRange)
        } else if used_plots.contains(&c.plot) {
            Some(DropReason::PlotOccupied)
        } else if ids.contains(&c.id) {
            Some(DropReason::DuplicateId)
        } else {
            None
        };
        match reason {
            Some(reason) => {
                repairs.push(Repair::DroppedCrop {
                    id: c.id.clone(),
                    reason,
                });
                false
            }
            None => {
                used_plots.insert(c.plot);
                ids.insert(c.id.clone());
                true
            }
        }
    });

    let mut kept = 0usize;
    state.animals.retain(|a| {
        let reason = if catalog::animal(&a.animal_id).is_none() {
            Some(DropReason::UnknownDefinition)
        } else if ids.contains(&a.id) {
            Some(DropReason::DuplicateId)
        } else if kept >= capacity {
            Some(DropReason::OverCapacity)
        } else {
            None
        };
        match reason {
            Some(reason) => {
                repairs.push(Repair::DroppedAnimal {
                    id: a.id.clone(),
                    reason,
                });
                false
            }
            None => {
                ids.insert(a.id.clone());
                kept += 1;
                true
            }
        }
    });

    let mut seen: BTreeSet<String> = BTreeSet::new();
    state.achievements.retain(|a| {
        if seen.insert(a.id.clone()) {
            true
        } else {
            repairs.push(Repair::DroppedDuplicateAchievement(a.id.clone()));
            false
        }
    });
    for def in catalog::ACHIEVEMENTS {
        if !seen.contains(def.id) {
            state.achievements.push(def.to_instance());
            repairs.push(Repair::AddedAchievement(def.id.to_string()));
        }
    }

    for r in &repairs {
        warn!(repair = %r, "repaired game state");
    }
    repairs
}
