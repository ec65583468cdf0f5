use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use disappr_core::lifecycle::within;
use disappr_core::NewNote;

use crate::app::AppState;
use crate::errors::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct PasteResponse {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewResponse {
    pub content: String,
}

/// `POST /api/v1/paste`
///
/// The token is checked for presence before the body is parsed, so an
/// anonymous caller gets 401 even with a malformed body.
pub async fn create_paste(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<PasteResponse>, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::MissingToken)?;

    let body = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let note: NewNote =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let created = within(state.request_timeout, state.notes.create(note, token)).await?;

    Ok(Json(PasteResponse {
        url: state.view_url(&created.id.to_string()),
        expires_at: created.expires_at,
    }))
}

/// `GET /api/v1/view?id=<id>`
pub async fn view_paste(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<ViewResponse>, ApiError> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing id".to_string()))?;

    let content = state.notes.view_within(&id, state.request_timeout).await?;
    Ok(Json(ViewResponse { content }))
}

/// Token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}
