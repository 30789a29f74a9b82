use std::sync::Arc;

use async_trait::async_trait;
use hunt_core::model::{GameSnapshot, GameState, LocationId, ProgressDelta};
use storage::repository::GameSnapshotRepository;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use crate::Clock;
use crate::settings::GameSettings;

/// Anything that accepts the result of a finished or reset location session.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Merge `delta` into `location` and return the updated game state.
    async fn apply_location_result(&self, location: LocationId, delta: ProgressDelta) -> GameState;
}

/// Build the starting state from an optional persisted snapshot.
#[must_use]
pub fn initialize(snapshot: Option<GameSnapshot>) -> GameState {
    snapshot.map_or_else(GameState::initial, GameState::from_snapshot)
}

/// Owner of the canonical `GameState`.
///
/// All writes go through [`ProgressStore::apply_location_result`], which keeps
/// the write lock for merge, recompute and persist so readers never observe a
/// half-applied update. Views read through [`ProgressStore::snapshot`] or watch
/// [`ProgressStore::subscribe`].
pub struct ProgressStore {
    state: RwLock<GameState>,
    snapshots: Arc<dyn GameSnapshotRepository>,
    clock: Clock,
    snapshot_key: String,
    updates: watch::Sender<GameState>,
}

impl ProgressStore {
    /// Wrap an already built state without touching storage.
    #[must_use]
    pub fn new(
        state: GameState,
        snapshots: Arc<dyn GameSnapshotRepository>,
        clock: Clock,
        snapshot_key: impl Into<String>,
    ) -> Self {
        let (updates, _) = watch::channel(state.clone());
        Self {
            state: RwLock::new(state),
            snapshots,
            clock,
            snapshot_key: snapshot_key.into(),
            updates,
        }
    }

    /// Load the persisted snapshot (if any) and build the store around it.
    ///
    /// Read failures and malformed bodies are logged and treated as "no save".
    pub async fn load(
        snapshots: Arc<dyn GameSnapshotRepository>,
        clock: Clock,
        settings: &GameSettings,
    ) -> Self {
        let snapshot = match snapshots.load_snapshot(&settings.snapshot_key).await {
            Ok(Some(body)) => match GameSnapshot::from_json(&body) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    warn!(error = %err, key = %settings.snapshot_key, "ignoring malformed game snapshot");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, key = %settings.snapshot_key, "failed to load game snapshot");
                None
            }
        };

        let mut state = initialize(snapshot);
        if settings.repair_on_load {
            let report = state.repair();
            if !report.is_clean() {
                info!(?report, "repaired loaded game state");
            }
        }

        Self::new(state, snapshots, clock, settings.snapshot_key.clone())
    }

    /// Merge a session result, refresh aggregates, stamp the time and persist.
    ///
    /// Never fails from the caller's point of view: persistence errors are
    /// logged and the in-memory state stays authoritative.
    pub async fn apply_location_result(
        &self,
        location: LocationId,
        delta: ProgressDelta,
    ) -> GameState {
        let mut state = self.state.write().await;
        state.apply_delta(location, delta, self.clock.now());
        self.persist(&state).await;
        let updated = state.clone();
        drop(state);

        debug!(
            %location,
            total = updated.total_progress(),
            unlocked = updated.unlocked().len(),
            "applied location result"
        );
        self.updates.send_replace(updated.clone());
        updated
    }

    /// Same as [`Self::apply_location_result`] for a raw wire key.
    ///
    /// Unknown keys are ignored and leave the state untouched.
    pub async fn apply_location_result_by_key(
        &self,
        key: &str,
        delta: ProgressDelta,
    ) -> Option<GameState> {
        match key.parse::<LocationId>() {
            Ok(location) => Some(self.apply_location_result(location, delta).await),
            Err(err) => {
                warn!(error = %err, "ignoring result for unknown location");
                None
            }
        }
    }

    /// A consistent copy of the current state.
    pub async fn snapshot(&self) -> GameState {
        self.state.read().await.clone()
    }

    pub async fn total_progress(&self) -> u8 {
        self.state.read().await.total_progress()
    }

    pub async fn is_unlocked(&self, location: LocationId) -> bool {
        self.state.read().await.is_unlocked(location)
    }

    /// Receive a fresh `GameState` after every applied result.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.updates.subscribe()
    }

    async fn persist(&self, state: &GameState) {
        let body = match GameSnapshot::from_state(state).to_json() {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "failed to encode game snapshot");
                return;
            }
        };
        if let Err(err) = self.snapshots.save_snapshot(&self.snapshot_key, &body).await {
            warn!(error = %err, key = %self.snapshot_key, "failed to persist game snapshot");
        }
    }
}

#[async_trait]
impl ProgressSink for ProgressStore {
    async fn apply_location_result(&self, location: LocationId, delta: ProgressDelta) -> GameState {
        ProgressStore::apply_location_result(self, location, delta).await
    }
}
