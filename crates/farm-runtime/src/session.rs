//! The game state engine: one owned [`GameState`] and the operations on it.

use crate::clock::Clock;
use farm_core::catalog::{self, AnimalDefinition, CropDefinition, UpgradeKind};
use farm_core::{FarmAnimal, FarmConfig, GameState, PlantedCrop};
use farm_econ::{EconError, COLLECT_EXPERIENCE, HARVEST_EXPERIENCE};
use farm_progress::Progress;
use persistence::{load_or_default, save_state, LoadOutcome, PersistError, Storage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Why an operation was refused. Refusals never change the state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("unknown crop: {0}")]
    UnknownCrop(String),
    #[error("unknown animal: {0}")]
    UnknownAnimal(String),
    #[error("unknown gem package: {0}")]
    UnknownPackage(String),
    #[error("insufficient coins: need {need}, have {have}")]
    InsufficientCoins { need: u64, have: u64 },
    #[error("insufficient gems: need {need}, have {have}")]
    InsufficientGems { need: u64, have: u64 },
    #[error("requires level {required}, player is level {level}")]
    LevelTooLow { required: u32, level: u32 },
    #[error("plot {plot} is outside the field of {plots} plots")]
    PlotOutOfRange { plot: u32, plots: u32 },
    #[error("plot {0} is already planted")]
    PlotOccupied(u32),
    #[error("no free plot")]
    NoFreePlot,
    #[error("barn is full")]
    BarnFull,
    #[error("no such instance: {0}")]
    NotFound(String),
    #[error("{0} is not ready yet")]
    NotReady(String),
    #[error("only {held} {product} in inventory")]
    InsufficientInventory { product: String, held: u64 },
    #[error("amount must be positive")]
    ZeroAmount,
    #[error("nothing is growing")]
    NothingGrowing,
}

impl From<EconError> for Rejection {
    fn from(e: EconError) -> Self {
        match e {
            EconError::InsufficientCoins { need, have } => Rejection::InsufficientCoins { need, have },
            EconError::InsufficientGems { need, have } => Rejection::InsufficientGems { need, have },
        }
    }
}

/// Readiness flips produced by one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub crops_ready: usize,
    pub animals_ready: usize,
}

/// What is on a plot right now.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlotStatus {
    pub planted: PlantedCrop,
    pub crop: &'static CropDefinition,
    pub remaining_ms: i64,
}

/// Exclusive owner of the game state.
///
/// Every successful operation re-evaluates achievements and writes the whole
/// state to storage before returning. Refused operations change nothing.
pub struct Session {
    state: GameState,
    storage: Box<dyn Storage>,
    clock: Arc<dyn Clock>,
    rng: ChaCha8Rng,
    config: FarmConfig,
}

fn accepted<T>(op: &'static str, result: Result<T, Rejection>) -> bool {
    match result {
        Ok(_) => true,
        Err(reason) => {
            debug!(op, %reason, "operation refused");
            false
        }
    }
}

impl Session {
    pub fn new(
        state: GameState,
        storage: Box<dyn Storage>,
        clock: Arc<dyn Clock>,
        config: FarmConfig,
    ) -> Self {
        Self {
            state,
            storage,
            clock,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            config,
        }
    }

    /// Restore the saved state from `storage`, or start a new farm.
    pub fn load(
        storage: Box<dyn Storage>,
        clock: Arc<dyn Clock>,
        config: FarmConfig,
    ) -> Result<(Self, LoadOutcome), PersistError> {
        let (state, outcome) = load_or_default(storage.as_ref(), &config.storage_key)?;
        let mut session = Self::new(state, storage, clock, config);
        session.tick();
        Ok((session, outcome))
    }

    /// Read-only snapshot for presentation.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &FarmConfig {
        &self.config
    }

    pub fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    // ---------------------------------------------------------------------
    // Field
    // ---------------------------------------------------------------------

    /// Check whether `crop_id` can be planted on `plot` right now.
    pub fn check_plant(&self, crop_id: &str, plot: u32) -> Result<&'static CropDefinition, Rejection> {
        let crop = catalog::crop(crop_id).ok_or_else(|| Rejection::UnknownCrop(crop_id.to_string()))?;
        let player = &self.state.player;
        farm_econ::can_afford(player, crop.price)?;
        if player.level < crop.level {
            return Err(Rejection::LevelTooLow {
                required: crop.level,
                level: player.level,
            });
        }
        if plot >= player.plots {
            return Err(Rejection::PlotOutOfRange {
                plot,
                plots: player.plots,
            });
        }
        if self.state.crop_on_plot(plot).is_some() {
            return Err(Rejection::PlotOccupied(plot));
        }
        Ok(crop)
    }

    pub fn plant_crop(&mut self, crop_id: &str, plot: u32) -> bool {
        let result = self.try_plant(crop_id, plot);
        accepted("plant_crop", result)
    }

    fn try_plant(&mut self, crop_id: &str, plot: u32) -> Result<(), Rejection> {
        let crop = self.check_plant(crop_id, plot)?;
        let now = self.now();
        farm_econ::spend_coins(&mut self.state.player, crop.price)?;
        let id = self.fresh_id(&format!("crop-{now}-{plot}"));
        let growth_ms = i64::try_from(crop.growth_time.saturating_mul(1000)).unwrap_or(i64::MAX);
        self.state.planted_crops.push(PlantedCrop {
            id: id.clone(),
            crop_id: crop.id.to_string(),
            planted_at: now,
            harvest_at: now.saturating_add(growth_ms),
            is_ready: false,
            plot,
        });
        info!(%id, crop = crop.id, plot, "crop planted");
        self.commit();
        Ok(())
    }

    /// Plant on the lowest free plot.
    pub fn buy_crop(&mut self, crop_id: &str) -> bool {
        let result = match self.state.first_free_plot() {
            Some(plot) => self.try_plant(crop_id, plot),
            None => Err(Rejection::NoFreePlot),
        };
        accepted("buy_crop", result)
    }

    pub fn harvest_crop(&mut self, planted_id: &str) -> bool {
        let result = self.try_harvest(planted_id);
        accepted("harvest_crop", result)
    }

    fn try_harvest(&mut self, planted_id: &str) -> Result<(), Rejection> {
        let now = self.now();
        let idx = self
            .state
            .planted_crops
            .iter()
            .position(|c| c.id == planted_id)
            .ok_or_else(|| Rejection::NotFound(planted_id.to_string()))?;
        let planted = &self.state.planted_crops[idx];
        if !planted.ready_at(now) {
            return Err(Rejection::NotReady(planted_id.to_string()));
        }
        let crop = catalog::crop(&planted.crop_id)
            .ok_or_else(|| Rejection::UnknownCrop(planted.crop_id.clone()))?;

        self.state.planted_crops.remove(idx);
        let value = crop.harvest_value();
        let player = &mut self.state.player;
        farm_econ::earn_coins(player, value);
        player.statistics.crops_harvested = player.statistics.crops_harvested.saturating_add(1);
        player.statistics.products_sold = player
            .statistics
            .products_sold
            .saturating_add(crop.harvest_amount);
        farm_econ::add_experience(player, HARVEST_EXPERIENCE);
        info!(id = planted_id, crop = crop.id, coins = value, "crop harvested");
        self.commit();
        Ok(())
    }

    /// The crop on `plot`, with time left until harvest.
    pub fn plot_status(&self, plot: u32) -> Option<PlotStatus> {
        let planted = self.state.crop_on_plot(plot)?;
        let crop = catalog::crop(&planted.crop_id)?;
        Some(PlotStatus {
            planted: planted.clone(),
            crop,
            remaining_ms: planted.remaining_ms(self.now()),
        })
    }

    // ---------------------------------------------------------------------
    // Barn
    // ---------------------------------------------------------------------

    /// Check whether `animal_id` can be bought right now.
    pub fn check_buy_animal(&self, animal_id: &str) -> Result<&'static AnimalDefinition, Rejection> {
        let animal =
            catalog::animal(animal_id).ok_or_else(|| Rejection::UnknownAnimal(animal_id.to_string()))?;
        let player = &self.state.player;
        farm_econ::can_afford(player, animal.price)?;
        if player.level < animal.level {
            return Err(Rejection::LevelTooLow {
                required: animal.level,
                level: player.level,
            });
        }
        if self.state.barn_is_full() {
            return Err(Rejection::BarnFull);
        }
        Ok(animal)
    }

    pub fn buy_animal(&mut self, animal_id: &str) -> bool {
        let result = self.try_buy_animal(animal_id);
        accepted("buy_animal", result)
    }

    fn try_buy_animal(&mut self, animal_id: &str) -> Result<(), Rejection> {
        let animal = self.check_buy_animal(animal_id)?;
        let now = self.now();
        farm_econ::spend_coins(&mut self.state.player, animal.price)?;
        let id = self.fresh_id(&format!("animal-{now}"));
        self.state.animals.push(FarmAnimal {
            id: id.clone(),
            animal_id: animal.id.to_string(),
            last_collection: now,
            is_ready: false,
        });
        info!(%id, animal = animal.id, "animal bought");
        self.commit();
        Ok(())
    }

    pub fn collect_product(&mut self, farm_animal_id: &str) -> bool {
        let result = self.try_collect(farm_animal_id);
        accepted("collect_product", result)
    }

    fn try_collect(&mut self, farm_animal_id: &str) -> Result<(), Rejection> {
        let now = self.now();
        let animal = self
            .state
            .animals
            .iter_mut()
            .find(|a| a.id == farm_animal_id)
            .ok_or_else(|| Rejection::NotFound(farm_animal_id.to_string()))?;
        let def = catalog::animal(&animal.animal_id)
            .ok_or_else(|| Rejection::UnknownAnimal(animal.animal_id.clone()))?;
        if !(animal.is_ready || production_done(def, animal.last_collection, now)) {
            return Err(Rejection::NotReady(farm_animal_id.to_string()));
        }

        animal.last_collection = now;
        animal.is_ready = false;
        let value = def.collection_value();
        let player = &mut self.state.player;
        farm_econ::earn_coins(player, value);
        player.statistics.animals_collected = player.statistics.animals_collected.saturating_add(1);
        player.statistics.products_sold = player
            .statistics
            .products_sold
            .saturating_add(def.product.amount);
        farm_econ::add_experience(player, COLLECT_EXPERIENCE);
        info!(id = farm_animal_id, product = def.product.name, coins = value, "product collected");
        self.commit();
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Market
    // ---------------------------------------------------------------------

    /// Sell `amount` units of an inventory product at its catalog unit price.
    pub fn sell_product(&mut self, product_name: &str, amount: u64) -> bool {
        let result = self.try_sell(product_name, amount);
        accepted("sell_product", result)
    }

    fn try_sell(&mut self, product_name: &str, amount: u64) -> Result<(), Rejection> {
        if amount == 0 {
            return Err(Rejection::ZeroAmount);
        }
        let player = &mut self.state.player;
        let held = player.inventory.get(product_name).copied().unwrap_or(0);
        if held < amount {
            return Err(Rejection::InsufficientInventory {
                product: product_name.to_string(),
                held,
            });
        }
        if held == amount {
            player.inventory.remove(product_name);
        } else {
            player.inventory.insert(product_name.to_string(), held - amount);
        }
        let value = catalog::unit_price(product_name)
            .unwrap_or(0)
            .saturating_mul(amount);
        farm_econ::earn_coins(player, value);
        player.statistics.products_sold = player.statistics.products_sold.saturating_add(amount);
        info!(product = product_name, amount, coins = value, "product sold");
        self.commit();
        Ok(())
    }

    /// Credit purchased gems. Payment is not processed.
    pub fn buy_gems(&mut self, amount: u64) {
        farm_econ::grant_gems(&mut self.state.player, amount);
        info!(amount, gems = self.state.player.gems, "gems purchased");
        self.commit();
    }

    pub fn buy_gem_package(&mut self, package_id: &str) -> bool {
        match catalog::gem_package(package_id) {
            Some(package) => {
                self.buy_gems(package.gems);
                true
            }
            None => accepted::<()>(
                "buy_gem_package",
                Err(Rejection::UnknownPackage(package_id.to_string())),
            ),
        }
    }

    pub fn buy_upgrade(&mut self, kind: UpgradeKind) -> bool {
        let result = self.try_upgrade(kind);
        accepted("buy_upgrade", result)
    }

    fn try_upgrade(&mut self, kind: UpgradeKind) -> Result<(), Rejection> {
        let upgrade = catalog::upgrade(kind);
        let now = self.now();
        if kind == UpgradeKind::GrowthBoost
            && !self.state.planted_crops.iter().any(|c| c.harvest_at > now)
        {
            return Err(Rejection::NothingGrowing);
        }
        farm_econ::spend_gems(&mut self.state.player, upgrade.gem_cost)?;
        let amount = u32::try_from(upgrade.amount).unwrap_or(u32::MAX);
        match kind {
            UpgradeKind::ExpandField => {
                self.state.player.plots = self.state.player.plots.saturating_add(amount);
            }
            UpgradeKind::ExpandBarn => {
                self.state.player.barn_capacity =
                    self.state.player.barn_capacity.saturating_add(amount);
            }
            UpgradeKind::GrowthBoost => {
                let skip_ms = i64::try_from(upgrade.amount.saturating_mul(1000)).unwrap_or(i64::MAX);
                for c in &mut self.state.planted_crops {
                    c.harvest_at = c.harvest_at.saturating_sub(skip_ms).max(c.planted_at);
                }
            }
        }
        info!(?kind, gems = upgrade.gem_cost, "upgrade bought");
        self.commit();
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Achievements
    // ---------------------------------------------------------------------

    pub fn achievement_progress(&self, id: &str) -> Option<Progress> {
        self.state
            .achievements
            .iter()
            .find(|a| a.id == id)
            .map(|a| farm_progress::progress(a, &self.state.player))
    }

    pub fn unlocked_count(&self) -> usize {
        self.state.unlocked_count()
    }

    // ---------------------------------------------------------------------
    // Tick
    // ---------------------------------------------------------------------

    /// Refresh every readiness flag against the clock.
    ///
    /// Touches nothing but `is_ready`: no economy change, no achievement
    /// evaluation, no storage write.
    pub fn tick(&mut self) -> TickReport {
        let now = self.now();
        let mut report = TickReport::default();
        for c in &mut self.state.planted_crops {
            let ready = now >= c.harvest_at;
            if ready && !c.is_ready {
                report.crops_ready += 1;
            }
            c.is_ready = ready;
        }
        for a in &mut self.state.animals {
            let Some(def) = catalog::animal(&a.animal_id) else {
                continue;
            };
            let ready = production_done(def, a.last_collection, now);
            if ready && !a.is_ready {
                report.animals_ready += 1;
            }
            a.is_ready = ready;
        }
        trace!(?report, "tick");
        report
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn commit(&mut self) {
        farm_progress::evaluate(&mut self.state.achievements, &mut self.state.player);
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = save_state(self.storage.as_ref(), &self.config.storage_key, &self.state) {
            warn!(error = %e, "failed to save game state");
        }
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        loop {
            let id = format!("{prefix}-{:08x}", self.rng.gen::<u32>());
            if !self.state.has_instance_id(&id) {
                return id;
            }
        }
    }
}

fn production_done(def: &AnimalDefinition, last_collection: i64, now: i64) -> bool {
    let production_ms = i64::try_from(def.production_time.saturating_mul(1000)).unwrap_or(i64::MAX);
    now.saturating_sub(last_collection) >= production_ms
}
