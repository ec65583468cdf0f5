//! Note persistence.
//!
//! The [`NoteStore`] trait is the boundary to the durable document store.
//! Two backends ship with the crate:
//! - [`MemoryNoteStore`]: process-local, for tests and ephemeral deployments
//! - [`SqliteNoteStore`]: single-file SQLite database

mod error;
mod memory;
mod sqlite;
mod traits;
mod types;

pub use error::StoreError;
pub use memory::MemoryNoteStore;
pub use sqlite::SqliteNoteStore;
pub use traits::NoteStore;
pub use types::{Note, NotePatch, UpdateOutcome};
