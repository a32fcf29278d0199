pub mod repository;
pub mod sqlite;

pub use repository::*;
pub use sqlite::*;

use thiserror::Error;

use crate::models::{InvalidSchedule, UnknownVariant};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Schedule not found: {id}")]
    NotFound { id: String },

    #[error("Version conflict on schedule {id}: expected version {expected}")]
    VersionConflict { id: String, expected: i64 },

    #[error("Corrupt stored value for {field}: {value}")]
    CorruptField { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error(transparent)]
    Invalid(#[from] InvalidSchedule),

    #[error(transparent)]
    Wire(#[from] crate::wire::WireError),
}

impl From<UnknownVariant> for StoreError {
    fn from(e: UnknownVariant) -> Self {
        StoreError::CorruptField { field: e.field, value: e.value }
    }
}
