use chrono::{DateTime, Utc};
use thiserror::Error;

use super::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("username cannot be empty")]
    EmptyUsername,
    #[error("password cannot be empty")]
    EmptyPassword,
    #[error("nickname cannot be empty")]
    EmptyNickname,
}

/// A registered player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    username: String,
    password: String,
    nickname: String,
    registered_at: DateTime<Utc>,
    progress: u8,
}

/// Registration form contents before validation.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub nickname: String,
}

impl NewUser {
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        nickname: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            nickname: nickname.into(),
        }
    }

    /// Trim the form fields and reject empty ones.
    ///
    /// # Errors
    ///
    /// Returns `UserError` naming the first empty field.
    pub fn validate(self) -> Result<Self, UserError> {
        let username = self.username.trim().to_string();
        let nickname = self.nickname.trim().to_string();
        if username.is_empty() {
            return Err(UserError::EmptyUsername);
        }
        if self.password.is_empty() {
            return Err(UserError::EmptyPassword);
        }
        if nickname.is_empty() {
            return Err(UserError::EmptyNickname);
        }
        Ok(Self {
            username,
            password: self.password,
            nickname,
        })
    }
}

impl User {
    /// Rehydrate a user from persisted storage.
    #[must_use]
    pub fn from_persisted(
        id: UserId,
        username: String,
        password: String,
        nickname: String,
        registered_at: DateTime<Utc>,
        progress: u8,
    ) -> Self {
        Self {
            id,
            username,
            password,
            nickname,
            registered_at,
            progress,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    #[must_use]
    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    #[must_use]
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress;
    }

    /// Plain credential comparison; there is no hashing.
    #[must_use]
    pub fn matches_credentials(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

/// Users ordered by progress, highest first. Ties keep their input order.
#[must_use]
pub fn leaderboard(users: &[User]) -> Vec<User> {
    let mut sorted = users.to_vec();
    sorted.sort_by(|a, b| b.progress.cmp(&a.progress));
    sorted
}

/// 1-based leaderboard position of `id`, if the user is present.
#[must_use]
pub fn rank_of(users: &[User], id: UserId) -> Option<usize> {
    leaderboard(users)
        .iter()
        .position(|user| user.id == id)
        .map(|index| index + 1)
}
