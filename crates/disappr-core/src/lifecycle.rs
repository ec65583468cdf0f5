//! Note lifecycle: create and view.
//!
//! [`NoteService`] owns no state of its own beyond its collaborators. Each
//! call authenticates (create only), fetches the content key, seals or
//! unseals, and reads or writes the store. Nothing is retried here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::Authenticator;
use crate::clock::Clock;
use crate::crypto::{seal, unseal};
use crate::error::{GoneReason, NoteError, Result};
use crate::keys::KeyProvider;
use crate::storage::{Note, NotePatch, NoteStore, UpdateOutcome};

/// Largest accepted note content, in bytes.
pub const MAX_CONTENT_BYTES: usize = 1024 * 1024;

/// What a burn-after-read view does when marking the note consumed fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurnPolicy {
    /// Return the plaintext anyway and log the failure, including a burn
    /// that overruns the request deadline
    #[default]
    BestEffort,
    /// Return plaintext only if this view flipped `consumed`
    Strict,
}

/// Input to [`NoteService::create`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewNote {
    pub content: String,
    pub expires_in_minutes: i64,
    #[serde(default)]
    pub burn_after_read: bool,
}

/// Result of [`NoteService::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedNote {
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Orchestrates token verification, sealing and storage.
#[derive(Clone)]
pub struct NoteService {
    store: Arc<dyn NoteStore>,
    keys: Arc<dyn KeyProvider>,
    authenticator: Arc<dyn Authenticator>,
    clock: Arc<dyn Clock>,
    burn_policy: BurnPolicy,
}

impl NoteService {
    pub fn new(
        store: Arc<dyn NoteStore>,
        keys: Arc<dyn KeyProvider>,
        authenticator: Arc<dyn Authenticator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            keys,
            authenticator,
            clock,
            burn_policy: BurnPolicy::default(),
        }
    }

    pub fn with_burn_policy(mut self, burn_policy: BurnPolicy) -> Self {
        self.burn_policy = burn_policy;
        self
    }

    pub fn burn_policy(&self) -> BurnPolicy {
        self.burn_policy
    }

    /// Create a note owned by the bearer of `bearer_token`.
    ///
    /// The size ceiling is checked before the token or any key material is
    /// touched. On a store failure no id is returned.
    pub async fn create(&self, note: NewNote, bearer_token: &str) -> Result<CreatedNote> {
        let size = note.content.len();
        if size > MAX_CONTENT_BYTES {
            return Err(NoteError::PayloadTooLarge {
                size,
                max: MAX_CONTENT_BYTES,
            });
        }

        let identity = self
            .authenticator
            .authenticate(bearer_token)
            .await
            .map_err(NoteError::Unauthorized)?;

        let key = self.keys.encryption_key().await.map_err(|e| {
            error!(error = %e, "Encryption key unavailable");
            NoteError::KeyUnavailable(e)
        })?;
        let sealed_content =
            seal(note.content.as_bytes(), key.as_bytes()).map_err(NoteError::Encryption)?;

        let created_at = self.clock.now();
        let expires_at = expiry_from(created_at, note.expires_in_minutes)?;

        let record = Note {
            id: Uuid::new_v4(),
            sealed_content,
            burn_after_read: note.burn_after_read,
            expires_at,
            consumed: false,
            owner_subject: identity.subject,
            created_at,
        };

        self.store.put(&record).await.map_err(|e| {
            error!(error = %e, "Failed to store note");
            NoteError::Storage(e)
        })?;

        info!(
            note_id = %record.id,
            burn_after_read = record.burn_after_read,
            %expires_at,
            "Note created"
        );

        Ok(CreatedNote {
            id: record.id,
            expires_at,
        })
    }

    /// Return the plaintext of a readable note.
    ///
    /// An id that does not parse is reported as not found.
    pub async fn view(&self, note_id: &str) -> Result<String> {
        let opened = self.open(note_id).await?;
        if opened.burn_after_read {
            self.burn(&opened.id, None).await?;
        }
        Ok(opened.content)
    }

    /// [`view`](Self::view) with a deadline.
    ///
    /// Loading and decrypting must finish within `deadline`, or the call fails
    /// with [`NoteError::DeadlineExceeded`] and nothing is consumed. The burn
    /// gets whatever time is left. A best-effort burn that overruns is
    /// abandoned with a warning and the plaintext is still returned. A strict
    /// burn that overruns fails with [`NoteError::DeadlineExceeded`]; a store
    /// that commits the abandoned update anyway leaves the note consumed.
    pub async fn view_within(&self, note_id: &str, deadline: StdDuration) -> Result<String> {
        let started = tokio::time::Instant::now();
        let opened = within(deadline, self.open(note_id)).await?;
        if opened.burn_after_read {
            let remaining = deadline.saturating_sub(started.elapsed());
            self.burn(&opened.id, Some(remaining)).await?;
        }
        Ok(opened.content)
    }

    async fn open(&self, note_id: &str) -> Result<Opened> {
        let id = Uuid::parse_str(note_id).map_err(|_| {
            debug!("View of malformed note id");
            NoteError::NotFound
        })?;

        let note = self
            .store
            .get(&id)
            .await
            .map_err(|e| {
                error!(note_id = %id, error = %e, "Failed to load note");
                NoteError::Storage(e)
            })?
            .ok_or_else(|| {
                debug!(note_id = %id, "Note not found");
                NoteError::NotFound
            })?;

        let now = self.clock.now();
        if !note.is_readable_at(now) {
            let reason = if note.consumed {
                GoneReason::Consumed
            } else {
                GoneReason::Expired
            };
            debug!(note_id = %id, ?reason, "Note is gone");
            return Err(NoteError::Gone(reason));
        }

        let key = self.keys.encryption_key().await.map_err(|e| {
            error!(note_id = %id, error = %e, "Encryption key unavailable");
            NoteError::KeyUnavailable(e)
        })?;
        let plaintext = unseal(&note.sealed_content, key.as_bytes()).map_err(|e| {
            error!(note_id = %id, kind = e.kind(), "Stored note failed to decrypt");
            NoteError::Decryption(e)
        })?;
        let content = String::from_utf8(plaintext.to_vec()).map_err(|_| {
            error!(note_id = %id, "Decrypted note is not valid UTF-8");
            NoteError::Corrupted("content is not valid UTF-8".to_string())
        })?;

        Ok(Opened {
            id,
            content,
            burn_after_read: note.burn_after_read,
        })
    }

    async fn burn(&self, id: &Uuid, budget: Option<StdDuration>) -> Result<()> {
        let patch = NotePatch::consume();
        let update = self.store.update(id, &patch);
        let outcome = match budget {
            None => update.await,
            Some(budget) => match tokio::time::timeout(budget, update).await {
                Ok(outcome) => outcome,
                Err(_) => return self.burn_overran(id),
            },
        };
        match (self.burn_policy, outcome) {
            (_, Ok(UpdateOutcome::Applied)) => {
                debug!(note_id = %id, "Note consumed");
                Ok(())
            }
            (BurnPolicy::BestEffort, Ok(outcome)) => {
                debug!(note_id = %id, ?outcome, "Note was already consumed");
                Ok(())
            }
            (BurnPolicy::BestEffort, Err(e)) => {
                warn!(note_id = %id, error = %e, "Failed to mark note consumed");
                Ok(())
            }
            (BurnPolicy::Strict, Ok(outcome)) => {
                debug!(note_id = %id, ?outcome, "Lost burn race");
                Err(NoteError::Gone(GoneReason::Consumed))
            }
            (BurnPolicy::Strict, Err(e)) => {
                error!(note_id = %id, error = %e, "Failed to mark note consumed");
                Err(NoteError::Storage(e))
            }
        }
    }

    fn burn_overran(&self, id: &Uuid) -> Result<()> {
        match self.burn_policy {
            BurnPolicy::BestEffort => {
                warn!(note_id = %id, "Burn did not finish before the deadline");
                Ok(())
            }
            BurnPolicy::Strict => {
                error!(note_id = %id, "Burn did not finish before the deadline");
                Err(NoteError::DeadlineExceeded)
            }
        }
    }
}

/// A readable note, decrypted but not yet burned.
struct Opened {
    id: Uuid,
    content: String,
    burn_after_read: bool,
}

/// `created_at + minutes`, rejecting values outside the timestamp range.
fn expiry_from(created_at: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>> {
    Duration::try_minutes(minutes)
        .and_then(|delta| created_at.checked_add_signed(delta))
        .ok_or_else(|| {
            NoteError::InvalidInput(format!("expires_in_minutes out of range: {}", minutes))
        })
}

/// Run `fut`, failing with [`NoteError::DeadlineExceeded`] after `deadline`.
///
/// The future is dropped on expiry, which cancels any collaborator call it
/// was awaiting. Wrapping [`NoteService::view`] this way also cancels a burn
/// already handed to the store; use [`NoteService::view_within`] to keep the
/// plaintext when only the burn overruns.
pub async fn within<T, F>(deadline: StdDuration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| NoteError::DeadlineExceeded)?
}
