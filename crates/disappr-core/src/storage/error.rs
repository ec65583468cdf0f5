//! Store error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by [`NoteStore`](super::NoteStore) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A note with this id already exists; notes are never overwritten
    #[error("note already exists: {0}")]
    Conflict(Uuid),

    /// The patch would violate a record invariant
    #[error("rejected update: {0}")]
    Rejected(String),

    /// A persisted record could not be parsed
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The backend failed
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(format!("SQLite error: {}", err))
    }
}
