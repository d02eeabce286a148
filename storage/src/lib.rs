//! Merchant Governance Storage Layer
//!
//! - `GovernanceDb`: sled-backed store of the governance state, one key per
//!   proposal, kind tag, vote mark and global scalar
//! - `SnapshotStore`: file snapshots (JSON for reading, bincode for loading)

pub mod db;
pub mod snapshot;

pub use db::GovernanceDb;
pub use snapshot::SnapshotStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
