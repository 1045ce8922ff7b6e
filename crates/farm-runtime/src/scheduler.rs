//! Tick scheduler: drives a [`Session`] from a single task.
//!
//! The driver task owns the session. It refreshes readiness on a fixed
//! interval and runs operations sent through a [`SessionHandle`] one at a
//! time, so ticks and operations never interleave mid-way.
//!
//! Operations end with a synchronous save, so each one runs on the blocking
//! pool with the session moved there and back. Ticks never write and stay on
//! the driver task.

use crate::session::{Rejection, Session, TickReport};
use farm_core::catalog::UpgradeKind;
use farm_core::GameState;
use farm_progress::Progress;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

const QUEUE_DEPTH: usize = 64;

type Job = Box<dyn FnOnce(&mut Session) + Send>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("session driver has stopped")]
    Closed,
    #[error("session driver failed: {0}")]
    Join(String),
    #[error("operation panicked: {0}")]
    Panicked(String),
}

/// Cloneable handle presentation code uses to reach the session.
#[derive(Clone)]
pub struct SessionHandle {
    jobs: mpsc::Sender<Job>,
}

impl SessionHandle {
    /// Run `f` against the session on the driver task and return its result.
    pub async fn call<R, F>(&self, f: F) -> Result<R, RuntimeError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Session) -> R + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: Job = Box::new(move |session| {
            let _ = reply.send(f(session));
        });
        self.jobs.send(job).await.map_err(|_| RuntimeError::Closed)?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    /// Cloned copy of the current state.
    pub async fn snapshot(&self) -> Result<GameState, RuntimeError> {
        self.call(|s| s.state().clone()).await
    }

    pub async fn plant_crop(&self, crop_id: &str, plot: u32) -> Result<bool, RuntimeError> {
        let crop_id = crop_id.to_string();
        self.call(move |s| s.plant_crop(&crop_id, plot)).await
    }

    pub async fn buy_crop(&self, crop_id: &str) -> Result<bool, RuntimeError> {
        let crop_id = crop_id.to_string();
        self.call(move |s| s.buy_crop(&crop_id)).await
    }

    pub async fn harvest_crop(&self, planted_id: &str) -> Result<bool, RuntimeError> {
        let planted_id = planted_id.to_string();
        self.call(move |s| s.harvest_crop(&planted_id)).await
    }

    pub async fn buy_animal(&self, animal_id: &str) -> Result<bool, RuntimeError> {
        let animal_id = animal_id.to_string();
        self.call(move |s| s.buy_animal(&animal_id)).await
    }

    pub async fn collect_product(&self, farm_animal_id: &str) -> Result<bool, RuntimeError> {
        let farm_animal_id = farm_animal_id.to_string();
        self.call(move |s| s.collect_product(&farm_animal_id)).await
    }

    pub async fn sell_product(&self, product_name: &str, amount: u64) -> Result<bool, RuntimeError> {
        let product_name = product_name.to_string();
        self.call(move |s| s.sell_product(&product_name, amount)).await
    }

    pub async fn buy_gems(&self, amount: u64) -> Result<(), RuntimeError> {
        self.call(move |s| s.buy_gems(amount)).await
    }

    pub async fn buy_gem_package(&self, package_id: &str) -> Result<bool, RuntimeError> {
        let package_id = package_id.to_string();
        self.call(move |s| s.buy_gem_package(&package_id)).await
    }

    pub async fn buy_upgrade(&self, kind: UpgradeKind) -> Result<bool, RuntimeError> {
        self.call(move |s| s.buy_upgrade(kind)).await
    }

    pub async fn check_plant(&self, crop_id: &str, plot: u32) -> Result<Result<(), Rejection>, RuntimeError> {
        let crop_id = crop_id.to_string();
        self.call(move |s| s.check_plant(&crop_id, plot).map(|_| ())).await
    }

    pub async fn check_buy_animal(&self, animal_id: &str) -> Result<Result<(), Rejection>, RuntimeError> {
        let animal_id = animal_id.to_string();
        self.call(move |s| s.check_buy_animal(&animal_id).map(|_| ())).await
    }

    pub async fn achievement_progress(&self, id: &str) -> Result<Option<Progress>, RuntimeError> {
        let id = id.to_string();
        self.call(move |s| s.achievement_progress(&id)).await
    }
}

/// Owner of the driver task. Stopping it returns the session.
pub struct Scheduler {
    task: JoinHandle<Result<Session, RuntimeError>>,
    stop: Option<oneshot::Sender<()>>,
}

impl Scheduler {
    /// Stop ticking and hand the session back.
    pub async fn shutdown(mut self) -> Result<Session, RuntimeError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.join().await
    }

    /// Wait for the driver to stop on its own, i.e. once every handle is dropped.
    pub async fn join(self) -> Result<Session, RuntimeError> {
        let Scheduler { task, stop } = self;
        let session = task.await.map_err(|e| RuntimeError::Join(e.to_string()));
        drop(stop);
        session?
    }
}

/// Move `session` onto a driver task ticking at the configured period.
///
/// Must be called from within a tokio runtime.
pub fn spawn(session: Session) -> (SessionHandle, Scheduler) {
    let period = Duration::from_millis(session.config().tick_interval_ms.max(1));
    let (jobs, rx) = mpsc::channel(QUEUE_DEPTH);
    let (stop, stop_rx) = oneshot::channel();
    let task = tokio::spawn(drive(session, rx, stop_rx, period));
    info!(period_ms = period.as_millis() as u64, "scheduler started");
    (
        SessionHandle { jobs },
        Scheduler {
            task,
            stop: Some(stop),
        },
    )
}

async fn drive(
    mut session: Session,
    mut jobs: mpsc::Receiver<Job>,
    mut stop: oneshot::Receiver<()>,
    period: Duration,
) -> Result<Session, RuntimeError> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = &mut stop => break,
            job = jobs.recv() => match job {
                Some(job) => {
                    let ran = tokio::task::spawn_blocking(move || {
                        job(&mut session);
                        session
                    });
                    session = match ran.await {
                        Ok(session) => session,
                        Err(e) => {
                            error!(error = %e, "operation panicked, driver stopped");
                            return Err(RuntimeError::Panicked(e.to_string()));
                        }
                    };
                }
                None => break,
            },
            _ = interval.tick() => {
                let report: TickReport = session.tick();
                if report.crops_ready + report.animals_ready > 0 {
                    debug!(?report, "production ready");
                }
            }
        }
    }
    info!("scheduler stopped");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use farm_core::{FarmConfig, DEFAULT_STORAGE_KEY};
    use persistence::{load_state, MemoryStorage};
    use std::sync::Arc;

    const START: i64 = 1_700_000_000_000;

    fn start() -> (SessionHandle, Scheduler, ManualClock, MemoryStorage) {
        let clock = ManualClock::new(START);
        let storage = MemoryStorage::new();
        let session = Session::new(
            GameState::default(),
            Box::new(storage.clone()),
            Arc::new(clock.clone()),
            FarmConfig::default(),
        );
        let (handle, scheduler) = spawn(session);
        (handle, scheduler, clock, storage)
    }

    #[tokio::test(start_paused = true)]
    async fn tick_marks_crop_ready() {
        let (handle, scheduler, clock, _) = start();
        assert!(handle.plant_crop("carrot", 0).await.unwrap());
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.player.coins, 450);
        assert!(!snap.planted_crops[0].is_ready);

        clock.advance_secs(61);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let snap = handle.snapshot().await.unwrap();
        assert!(snap.planted_crops[0].is_ready);

        let id = snap.planted_crops[0].id.clone();
        assert!(handle.harvest_crop(&id).await.unwrap());
        let session = scheduler.shutdown().await.unwrap();
        assert!(session.state().planted_crops.is_empty());
        assert_eq!(session.state().player.statistics.crops_harvested, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticking_never_writes_storage() {
        let (handle, scheduler, clock, storage) = start();
        clock.advance_secs(10);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(load_state(&storage, DEFAULT_STORAGE_KEY).unwrap().is_none());

        handle.buy_gems(5).await.unwrap();
        let saved = load_state(&storage, DEFAULT_STORAGE_KEY).unwrap();
        assert_eq!(saved.map(|s| s.player.gems), Some(15));
        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn handle_fails_after_shutdown() {
        let (handle, scheduler, _, _) = start();
        scheduler.shutdown().await.unwrap();
        assert!(matches!(
            handle.buy_animal("chicken").await,
            Err(RuntimeError::Closed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn driver_stops_when_handles_dropped() {
        let (handle, scheduler, _, _) = start();
        let other = handle.clone();
        assert!(other.buy_animal("chicken").await.unwrap());
        drop(handle);
        drop(other);
        let session = scheduler.join().await.unwrap();
        assert_eq!(session.state().animals.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_operation_stops_driver_with_error() {
        let (handle, scheduler, _, _) = start();
        assert!(handle.buy_animal("chicken").await.unwrap());
        let result = handle
            .call::<(), _>(|_| panic!("operation failed mid-way"))
            .await;
        assert!(matches!(result, Err(RuntimeError::Closed)));
        assert!(matches!(
            scheduler.join().await,
            Err(RuntimeError::Panicked(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn operations_save_from_blocking_pool() {
        let (handle, scheduler, _, storage) = start();
        for plot in 0..3 {
            assert!(handle.plant_crop("wheat", plot).await.unwrap());
        }
        let saved = load_state(&storage, DEFAULT_STORAGE_KEY).unwrap();
        assert_eq!(saved.map(|s| s.planted_crops.len()), Some(3));
        let session = scheduler.shutdown().await.unwrap();
        assert_eq!(session.state().player.coins, 440);
    }

    #[tokio::test(start_paused = true)]
    async fn checks_report_reasons_through_handle() {
        let (handle, scheduler, _, _) = start();
        assert_eq!(
            handle.check_buy_animal("goat").await.unwrap(),
            Err(Rejection::LevelTooLow {
                required: 7,
                level: 1
            })
        );
        assert_eq!(handle.check_plant("wheat", 0).await.unwrap(), Ok(()));
        let progress = handle.achievement_progress("first_harvest").await.unwrap();
        assert_eq!(progress.map(|p| p.target), Some(1));
        scheduler.shutdown().await.unwrap();
    }
}
