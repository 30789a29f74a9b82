#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    GameSnapshotRepository, InMemoryRepository, NewUserRecord, Storage, StorageError,
    UserRepository,
};
