use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use disappr_core::NoteService;

use crate::handlers;

pub const PASTE_PATH: &str = "/api/v1/paste";
pub const VIEW_PATH: &str = "/api/v1/view";

/// Shared request state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub notes: NoteService,
    pub public_base_url: Arc<str>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(notes: NoteService, public_base_url: &str, request_timeout: Duration) -> Self {
        Self {
            notes,
            public_base_url: Arc::from(public_base_url.trim_end_matches('/')),
            request_timeout,
        }
    }

    pub fn view_url(&self, id: &str) -> String {
        format!("{}{}?id={}", self.public_base_url, VIEW_PATH, id)
    }
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(PASTE_PATH, post(handlers::create_paste))
        .route(VIEW_PATH, get(handlers::view_paste))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
