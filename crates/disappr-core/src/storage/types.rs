//! Note record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted note.
///
/// Everything except `consumed` is immutable after creation, and `consumed`
/// only ever moves from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unguessable identifier; the sole credential readers need
    pub id: Uuid,

    /// Base64 sealed blob (`nonce || ciphertext || tag`)
    pub sealed_content: String,

    /// Whether the first successful view consumes the note
    pub burn_after_read: bool,

    /// Instant after which the note is unreadable
    pub expires_at: DateTime<Utc>,

    /// Set once by a successful burn-after-read view
    pub consumed: bool,

    /// Authenticated subject of the creator
    pub owner_subject: String,

    /// When the note was created (informational)
    pub created_at: DateTime<Utc>,
}

impl Note {
    /// True if the note may still yield plaintext at `now`.
    pub fn is_readable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at && !self.consumed
    }
}

/// Field patch applied by [`NoteStore::update`](super::NoteStore::update).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotePatch {
    pub consumed: Option<bool>,
}

impl NotePatch {
    /// Patch that marks a note consumed.
    pub fn consume() -> Self {
        Self {
            consumed: Some(true),
        }
    }
}

/// Result of a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The record changed
    Applied,
    /// The record already had the requested values
    Unchanged,
    /// No record with that id
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn note(expires_at: DateTime<Utc>, consumed: bool) -> Note {
        Note {
            id: Uuid::new_v4(),
            sealed_content: String::new(),
            burn_after_read: true,
            expires_at,
            consumed,
            owner_subject: "user-1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_readable_before_expiry() {
        let now = Utc::now();
        assert!(note(now + Duration::minutes(1), false).is_readable_at(now));
    }

    #[test]
    fn test_unreadable_at_expiry_instant() {
        let now = Utc::now();
        assert!(!note(now, false).is_readable_at(now));
    }

    #[test]
    fn test_unreadable_when_consumed() {
        let now = Utc::now();
        assert!(!note(now + Duration::minutes(1), true).is_readable_at(now));
    }
}
