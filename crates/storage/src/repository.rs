use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hunt_core::model::{User, UserId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for a user about to be inserted; the id is assigned by storage.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub username: String,
    pub password: String,
    pub nickname: String,
    pub registered_at: DateTime<Utc>,
    pub progress: u8,
}

impl NewUserRecord {
    fn into_user(self, id: UserId) -> User {
        User::from_persisted(
            id,
            self.username,
            self.password,
            self.nickname,
            self.registered_at,
            self.progress,
        )
    }
}

/// Key-value persistence for serialized game snapshots.
#[async_trait]
pub trait GameSnapshotRepository: Send + Sync {
    /// Fetch the snapshot body stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_snapshot(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the snapshot body stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the body cannot be written.
    async fn save_snapshot(&self, key: &str, body: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// All users in id order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_users(&self) -> Result<Vec<User>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// Insert a user, assigning the next id (highest existing id + 1).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the username is already taken.
    async fn insert_user(&self, user: NewUserRecord) -> Result<User, StorageError>;

    /// Overwrite a user's progress. Returns `false` if no such user exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn update_progress(&self, id: UserId, progress: u8) -> Result<bool, StorageError>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    snapshots: Arc<Mutex<HashMap<String, String>>>,
    users: Arc<Mutex<BTreeMap<UserId, User>>>,
    fail_saves: Arc<AtomicBool>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent snapshot save fail with `StorageError::Connection`.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl GameSnapshotRepository for InMemoryRepository {
    async fn load_snapshot(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = lock(&self.snapshots)?;
        Ok(guard.get(key).cloned())
    }

    async fn save_snapshot(&self, key: &str, body: &str) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("store unavailable".into()));
        }
        let mut guard = lock(&self.snapshots)?;
        guard.insert(key.to_string(), body.to_string());
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let guard = lock(&self.users)?;
        Ok(guard.values().cloned().collect())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let guard = lock(&self.users)?;
        Ok(guard.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let guard = lock(&self.users)?;
        Ok(guard.values().find(|u| u.username() == username).cloned())
    }

    async fn insert_user(&self, user: NewUserRecord) -> Result<User, StorageError> {
        let mut guard = lock(&self.users)?;
        if guard.values().any(|u| u.username() == user.username) {
            return Err(StorageError::Conflict);
        }
        let next = guard.keys().next_back().map_or(1, |id| id.value() + 1);
        let user = user.into_user(UserId::new(next));
        guard.insert(user.id(), user.clone());
        Ok(user)
    }

    async fn update_progress(&self, id: UserId, progress: u8) -> Result<bool, StorageError> {
        let mut guard = lock(&self.users)?;
        match guard.get_mut(&id) {
            Some(user) => {
                user.set_progress(progress);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub snapshots: Arc<dyn GameSnapshotRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    /// Wrap an existing in-memory repository, keeping a handle for inspection.
    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let snapshots: Arc<dyn GameSnapshotRepository> = Arc::new(repo.clone());
        let users: Arc<dyn UserRepository> = Arc::new(repo);
        Self { snapshots, users }
    }
}
