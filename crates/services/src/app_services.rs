use std::sync::Arc;

use async_trait::async_trait;
use hunt_core::model::{GameState, LocationId, NewUser, ProgressDelta, User};
use storage::repository::Storage;
use tokio::sync::RwLock;
use tracing::warn;

use crate::Clock;
use crate::error::{AppServicesError, UserServiceError};
use crate::progress_store::{ProgressSink, ProgressStore};
use crate::sessions::LocationSession;
use crate::settings::GameSettings;
use crate::user_service::UserService;

/// Progress sink for the signed-in player.
///
/// Forwards every result to the `ProgressStore`, then copies the new total
/// onto the current user's leaderboard entry.
pub struct PlayerProgress {
    store: Arc<ProgressStore>,
    users: Arc<UserService>,
    current: RwLock<Option<User>>,
}

impl PlayerProgress {
    #[must_use]
    pub fn new(store: Arc<ProgressStore>, users: Arc<UserService>) -> Self {
        Self {
            store,
            users,
            current: RwLock::new(None),
        }
    }

    pub async fn sign_in(&self, user: User) {
        *self.current.write().await = Some(user);
    }

    pub async fn sign_out(&self) -> Option<User> {
        self.current.write().await.take()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.current.read().await.clone()
    }
}

#[async_trait]
impl ProgressSink for PlayerProgress {
    async fn apply_location_result(&self, location: LocationId, delta: ProgressDelta) -> GameState {
        let state = self.store.apply_location_result(location, delta).await;

        let mut current = self.current.write().await;
        if let Some(user) = current.as_mut() {
            let total = state.total_progress();
            user.set_progress(total);
            if let Err(err) = self.users.update_progress(user.id(), total).await {
                warn!(error = %err, user = %user.id(), "failed to record player progress");
            }
        }

        state
    }
}

/// Assembles app-facing services on top of a `Storage`.
#[derive(Clone)]
pub struct AppServices {
    settings: GameSettings,
    progress: Arc<ProgressStore>,
    users: Arc<UserService>,
    player: Arc<PlayerProgress>,
}

impl AppServices {
    /// Load saved progress and make sure the demo users exist.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the default users cannot be seeded.
    pub async fn new(
        storage: &Storage,
        clock: Clock,
        settings: GameSettings,
    ) -> Result<Self, AppServicesError> {
        let progress =
            Arc::new(ProgressStore::load(Arc::clone(&storage.snapshots), clock, &settings).await);
        let users = Arc::new(UserService::new(clock, Arc::clone(&storage.users)));
        users.seed_defaults().await?;
        let player = Arc::new(PlayerProgress::new(
            Arc::clone(&progress),
            Arc::clone(&users),
        ));

        Ok(Self {
            settings,
            progress,
            users,
            player,
        })
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or seeding fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: GameSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::new(&storage, clock, settings).await
    }

    #[must_use]
    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressStore> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn users(&self) -> Arc<UserService> {
        Arc::clone(&self.users)
    }

    #[must_use]
    pub fn player(&self) -> Arc<PlayerProgress> {
        Arc::clone(&self.player)
    }

    /// Open a session whose results are credited to the signed-in player.
    #[must_use]
    pub fn open_location(&self, location: LocationId) -> LocationSession {
        let sink: Arc<dyn ProgressSink> = self.player();
        LocationSession::new(location, sink, self.settings.step_delay)
    }

    /// Same as [`Self::open_location`] for a wire key, falling back to the
    /// seed location.
    #[must_use]
    pub fn open_location_key(&self, key: &str) -> LocationSession {
        self.open_location(LocationId::resolve(key))
    }

    /// Sign in with username and password. Returns `None` on bad credentials.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` on storage failures.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let user = self.users.login(username, password).await?;
        if let Some(user) = &user {
            self.player.sign_in(user.clone()).await;
        }
        Ok(user)
    }

    /// Register and immediately sign in.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError` if validation or persistence fails.
    pub async fn register(&self, draft: NewUser) -> Result<User, UserServiceError> {
        let user = self.users.register(draft).await?;
        self.player.sign_in(user.clone()).await;
        Ok(user)
    }

    pub async fn logout(&self) -> Option<User> {
        self.player.sign_out().await
    }
}
