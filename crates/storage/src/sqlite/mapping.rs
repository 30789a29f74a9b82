use hunt_core::model::{User, UserId};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    u64::try_from(v)
        .map(UserId::new)
        .map_err(|_| StorageError::Serialization("user_id sign overflow".into()))
}

pub(crate) fn user_id_to_i64(id: UserId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("user_id overflow".into()))
}

pub(crate) fn progress_from_i64(v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid progress: {v}")))
}

pub(crate) fn map_user_row(row: &sqlx::sqlite::SqliteRow) -> Result<User, StorageError> {
    Ok(User::from_persisted(
        user_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get("username").map_err(ser)?,
        row.try_get("password").map_err(ser)?,
        row.try_get("nickname").map_err(ser)?,
        row.try_get("registered_at").map_err(ser)?,
        progress_from_i64(row.try_get("progress").map_err(ser)?)?,
    ))
}
