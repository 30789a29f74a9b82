use async_trait::async_trait;
use hunt_core::model::{User, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_user_row, user_id_from_i64, user_id_to_i64};
use crate::repository::{NewUserRecord, StorageError, UserRepository};

const USER_COLUMNS: &str = "id, username, password, nickname, registered_at, progress";

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_user_row).collect()
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(user_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn insert_user(&self, user: NewUserRecord) -> Result<User, StorageError> {
        // Omitting `id` lets SQLite assign max(rowid) + 1.
        let res = sqlx::query(
            r"
            INSERT INTO users (username, password, nickname, registered_at, progress)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(user.username.as_str())
        .bind(user.password.as_str())
        .bind(user.nickname.as_str())
        .bind(user.registered_at)
        .bind(i64::from(user.progress))
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if err
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                StorageError::Conflict
            } else {
                conn(err)
            }
        })?;

        let id = user_id_from_i64(res.last_insert_rowid())?;
        Ok(User::from_persisted(
            id,
            user.username,
            user.password,
            user.nickname,
            user.registered_at,
            user.progress,
        ))
    }

    async fn update_progress(&self, id: UserId, progress: u8) -> Result<bool, StorageError> {
        let res = sqlx::query("UPDATE users SET progress = ?1 WHERE id = ?2")
            .bind(i64::from(progress))
            .bind(user_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected() > 0)
    }
}
