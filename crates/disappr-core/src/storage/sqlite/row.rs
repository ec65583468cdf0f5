//! Note row type for database queries.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::storage::error::StoreError;
use crate::storage::types::Note;

/// Raw row data from the notes table, before parsing into domain types.
#[derive(Debug)]
pub struct NoteRow {
    pub id: String,
    pub sealed_content: String,
    pub burn_after_read: bool,
    pub expires_at: i64,
    pub consumed: bool,
    pub owner_subject: String,
    pub created_at: i64,
}

impl NoteRow {
    pub const COLUMNS: &'static str =
        "id, sealed_content, burn_after_read, expires_at, consumed, owner_subject, created_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            sealed_content: row.get(1)?,
            burn_after_read: row.get(2)?,
            expires_at: row.get(3)?,
            consumed: row.get(4)?,
            owner_subject: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

/// Microseconds since the Unix epoch. Stored as INTEGER so SQL compares
/// numerically over the whole range `DateTime<Utc>` can represent.
pub fn to_micros(value: &DateTime<Utc>) -> i64 {
    value.timestamp_micros()
}

fn from_micros(value: i64, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(value).ok_or_else(|| {
        StoreError::Corrupt(format!("Invalid {} timestamp: {}", column, value))
    })
}

impl TryFrom<NoteRow> for Note {
    type Error = StoreError;

    fn try_from(row: NoteRow) -> Result<Self, StoreError> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| StoreError::Corrupt(format!("Invalid note UUID: {}", e)))?;
        let expires_at = from_micros(row.expires_at, "expires_at")?;
        let created_at = from_micros(row.created_at, "created_at")?;

        Ok(Note {
            id,
            sealed_content: row.sealed_content,
            burn_after_read: row.burn_after_read,
            expires_at,
            consumed: row.consumed,
            owner_subject: row.owner_subject,
            created_at,
        })
    }
}
