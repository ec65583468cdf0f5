//! # Disappr Server
//!
//! HTTP surface, configuration and process wiring for the Disappr note
//! service. The binary in `main.rs` is a thin shell over [`bootstrap`].

pub mod app;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod errors;
pub mod handlers;

pub use app::{router, AppState};
pub use config::ServerConfig;
