//! Note store trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::StoreError;
use super::types::{Note, NotePatch, UpdateOutcome};

/// Storage interface for note records.
///
/// All implementations must ensure:
/// - Read-your-writes consistency per note
/// - `put` never overwrites an existing id
/// - `update` applies `consumed = true` atomically and only where the note
///   is not yet consumed, so concurrent readers race on a single flag flip
/// - `consumed` is never cleared
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Persist a new note.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the id is already present.
    async fn put(&self, note: &Note) -> Result<(), StoreError>;

    /// Load a note by id.
    ///
    /// Returns `Ok(Some(note))` if found, `Ok(None)` if not found.
    async fn get(&self, id: &Uuid) -> Result<Option<Note>, StoreError>;

    /// Apply a field patch conditionally.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Rejected` for `consumed = Some(false)` on a
    /// consumed note.
    async fn update(&self, id: &Uuid, patch: &NotePatch) -> Result<UpdateOutcome, StoreError>;

    /// Delete notes that expired at or before `now`, or were consumed.
    ///
    /// Store-side garbage collection; the lifecycle never calls this.
    /// Returns the number of deleted records.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trait_is_object_safe() {
        fn _accepts_dyn_store(_store: &dyn NoteStore) {}
    }
}
