//! In-memory note store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::StoreError;
use super::traits::NoteStore;
use super::types::{Note, NotePatch, UpdateOutcome};

/// `HashMap`-backed store. Clones share the same notes.
#[derive(Clone, Default)]
pub struct MemoryNoteStore {
    inner: Arc<Mutex<HashMap<Uuid, Note>>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored notes.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Note>>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store poisoned".to_string()))
    }
}

/// Apply `patch` to `note` in place, enforcing the never-revert invariant.
pub(super) fn apply_patch(note: &mut Note, patch: &NotePatch) -> Result<UpdateOutcome, StoreError> {
    match patch.consumed {
        Some(true) if !note.consumed => {
            note.consumed = true;
            Ok(UpdateOutcome::Applied)
        }
        Some(false) if note.consumed => Err(StoreError::Rejected(
            "consumed flag cannot be cleared".to_string(),
        )),
        _ => Ok(UpdateOutcome::Unchanged),
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn put(&self, note: &Note) -> Result<(), StoreError> {
        let mut notes = self.lock()?;
        if notes.contains_key(&note.id) {
            return Err(StoreError::Conflict(note.id));
        }
        notes.insert(note.id, note.clone());
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Note>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn update(&self, id: &Uuid, patch: &NotePatch) -> Result<UpdateOutcome, StoreError> {
        let mut notes = self.lock()?;
        match notes.get_mut(id) {
            Some(note) => apply_patch(note, patch),
            None => Ok(UpdateOutcome::Missing),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut notes = self.lock()?;
        let before = notes.len();
        notes.retain(|_, note| note.is_readable_at(now));
        Ok(before - notes.len())
    }
}
