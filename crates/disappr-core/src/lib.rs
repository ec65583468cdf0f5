//! # Disappr Core
//!
//! Core library for Disappr - an ephemeral, encrypted note-sharing service.
//!
//! This crate provides the note lifecycle, content encryption, bearer-token
//! verification and the collaborator interfaces (storage, key provision)
//! independent of the HTTP interface.
//!
//! ## Architecture
//!
//! - **crypto**: AES-256-GCM sealing of note content
//! - **auth**: Bearer-token verification against a cached, refreshed key set
//! - **keys**: Symmetric encryption key providers
//! - **storage**: Note model and store implementations
//! - **lifecycle**: Create/view state machine with expiry and burn-after-read
//!
//! ## Lifecycle
//!
//! A note moves `nonexistent -> active -> {consumed | expired}`. `active` is
//! never persisted; it is derived at read time from `consumed` and `expires_at`.

pub mod auth;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod lifecycle;
pub mod storage;

pub use error::{ErrorCategory, NoteError, Result};
pub use lifecycle::{BurnPolicy, CreatedNote, NewNote, NoteService};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
