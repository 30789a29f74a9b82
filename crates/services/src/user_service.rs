use std::sync::Arc;

use hunt_core::model::{self, NewUser, User, UserId};
use storage::repository::{NewUserRecord, StorageError, UserRepository};
use tracing::info;

use crate::Clock;
use crate::error::UserServiceError;

/// Demo accounts created on first launch: username, nickname, days since
/// registration, progress.
const DEFAULT_USERS: [(&str, &str, i64, u8); 4] = [
    ("admin", "Administrator", 0, 95),
    ("player1", "Adventurer One", 1, 75),
    ("player2", "Treasure Hunter", 2, 60),
    ("player3", "Rookie", 3, 30),
];
const DEFAULT_PASSWORD: &str = "123456";

/// Registration, sign-in and leaderboard queries.
#[derive(Clone)]
pub struct UserService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
}

impl UserService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>) -> Self {
        Self { clock, users }
    }

    /// Insert the demo accounts if no user exists yet.
    ///
    /// Returns how many users were created.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` on storage failures.
    pub async fn seed_defaults(&self) -> Result<usize, UserServiceError> {
        if !self.users.list_users().await?.is_empty() {
            return Ok(0);
        }

        for (username, nickname, days_ago, progress) in DEFAULT_USERS {
            self.users
                .insert_user(NewUserRecord {
                    username: username.to_string(),
                    password: DEFAULT_PASSWORD.to_string(),
                    nickname: nickname.to_string(),
                    registered_at: self.clock.days_ago(days_ago),
                    progress,
                })
                .await?;
        }
        info!(count = DEFAULT_USERS.len(), "seeded default users");
        Ok(DEFAULT_USERS.len())
    }

    /// Look up a user by exact username and password.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` on storage failures.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let user = self.users.find_by_username(username).await?;
        Ok(user.filter(|u| u.matches_credentials(username, password)))
    }

    /// Validate and persist a new user with zero progress.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::UsernameTaken` for duplicate usernames and
    /// `UserServiceError::User` for empty fields.
    pub async fn register(&self, draft: NewUser) -> Result<User, UserServiceError> {
        let draft = draft.validate()?;
        if self.users.find_by_username(&draft.username).await?.is_some() {
            return Err(UserServiceError::UsernameTaken);
        }

        let record = NewUserRecord {
            username: draft.username,
            password: draft.password,
            nickname: draft.nickname,
            registered_at: self.clock.now(),
            progress: 0,
        };
        match self.users.insert_user(record).await {
            Ok(user) => Ok(user),
            Err(StorageError::Conflict) => Err(UserServiceError::UsernameTaken),
            Err(err) => Err(err.into()),
        }
    }

    /// Returns `false` if the user does not exist.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` on storage failures.
    pub async fn update_progress(&self, id: UserId, progress: u8) -> Result<bool, UserServiceError> {
        Ok(self.users.update_progress(id, progress).await?)
    }

    /// All users, highest progress first.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` on storage failures.
    pub async fn leaderboard(&self) -> Result<Vec<User>, UserServiceError> {
        let users = self.users.list_users().await?;
        Ok(model::leaderboard(&users))
    }

    /// 1-based leaderboard position, `None` if the user is unknown.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` on storage failures.
    pub async fn rank_of(&self, id: UserId) -> Result<Option<usize>, UserServiceError> {
        let users = self.users.list_users().await?;
        Ok(model::rank_of(&users, id))
    }
}
