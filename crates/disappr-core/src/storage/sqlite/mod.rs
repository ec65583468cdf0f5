//! SQLite note store.
//!
//! One `notes` table. Content is stored sealed; the database file itself is
//! not encrypted. SQLite calls run on the blocking thread pool.

mod row;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use uuid::Uuid;

use super::error::StoreError;
use super::traits::NoteStore;
use super::types::{Note, NotePatch, UpdateOutcome};

use row::{to_micros, NoteRow};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS notes (
    id TEXT PRIMARY KEY NOT NULL,
    sealed_content TEXT NOT NULL,
    burn_after_read INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    consumed INTEGER NOT NULL DEFAULT 0,
    owner_subject TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notes_expires_at ON notes(expires_at);
"#;

/// SQLite-backed store. Clones share one connection.
#[derive(Clone)]
pub struct SqliteNoteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteNoteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Backend(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("SQLite connection poisoned".to_string()))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("SQLite task failed: {}", e)))?
    }
}

fn note_exists(conn: &Connection, id: &str) -> Result<bool, StoreError> {
    let found = conn
        .query_row("SELECT 1 FROM notes WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn put(&self, note: &Note) -> Result<(), StoreError> {
        let note = note.clone();
        self.with_conn(move |conn| {
            let result = conn.execute(
                "INSERT INTO notes (id, sealed_content, burn_after_read, expires_at, consumed, owner_subject, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    note.id.to_string(),
                    note.sealed_content,
                    note.burn_after_read,
                    to_micros(&note.expires_at),
                    note.consumed,
                    note.owner_subject,
                    to_micros(&note.created_at),
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::Conflict(note.id))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Note>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM notes WHERE id = ?1", NoteRow::COLUMNS),
                    [&id],
                    NoteRow::from_row,
                )
                .optional()?;
            row.map(Note::try_from).transpose()
        })
        .await
    }

    async fn update(&self, id: &Uuid, patch: &NotePatch) -> Result<UpdateOutcome, StoreError> {
        let id = id.to_string();
        let patch = *patch;
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let outcome = match patch.consumed {
                Some(true) => {
                    let changed = tx.execute(
                        "UPDATE notes SET consumed = 1 WHERE id = ?1 AND consumed = 0",
                        [&id],
                    )?;
                    if changed == 1 {
                        UpdateOutcome::Applied
                    } else if note_exists(&tx, &id)? {
                        UpdateOutcome::Unchanged
                    } else {
                        UpdateOutcome::Missing
                    }
                }
                Some(false) => {
                    let consumed: Option<bool> = tx
                        .query_row("SELECT consumed FROM notes WHERE id = ?1", [&id], |row| {
                            row.get(0)
                        })
                        .optional()?;
                    match consumed {
                        None => UpdateOutcome::Missing,
                        Some(true) => {
                            return Err(StoreError::Rejected(
                                "consumed flag cannot be cleared".to_string(),
                            ))
                        }
                        Some(false) => UpdateOutcome::Unchanged,
                    }
                }
                None => {
                    if note_exists(&tx, &id)? {
                        UpdateOutcome::Unchanged
                    } else {
                        UpdateOutcome::Missing
                    }
                }
            };
            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = to_micros(&now);
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM notes WHERE expires_at <= ?1 OR consumed = 1",
                [cutoff],
            )?;
            Ok(deleted)
        })
        .await
    }
}
