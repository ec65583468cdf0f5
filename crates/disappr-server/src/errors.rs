//! HTTP error responses.
//!
//! Callers only ever see a status code and a fixed message per category.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use disappr_core::{ErrorCategory, NoteError};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// No usable `Authorization: Bearer` header
    MissingToken,
    /// Request body or query could not be read
    BadRequest(String),
    Note(NoteError),
}

impl ApiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::MissingToken => ErrorCategory::Unauthorized,
            ApiError::BadRequest(_) => ErrorCategory::InvalidInput,
            ApiError::Note(err) => err.category(),
        }
    }
}

impl From<NoteError> for ApiError {
    fn from(err: NoteError) -> Self {
        ApiError::Note(err)
    }
}

pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorCategory::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Gone => StatusCode::GONE,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn public_message(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::InvalidInput => "invalid request",
        ErrorCategory::Unauthorized => "unauthorized",
        ErrorCategory::NotFound => "paste not found",
        ErrorCategory::Gone => "paste expired or already viewed",
        ErrorCategory::Internal => "internal server error",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let category = self.category();
        match &self {
            ApiError::Note(err) if category == ErrorCategory::Internal => {
                error!(error = %err, "Request failed")
            }
            other => debug!(error = ?other, ?category, "Request rejected"),
        }

        let body = ErrorBody {
            error: public_message(category).to_string(),
        };
        (status_for(category), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disappr_core::error::GoneReason;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::MissingToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::BadRequest("bad json".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(NoteError::Gone(GoneReason::Expired))
                .into_response()
                .status(),
            StatusCode::GONE
        );
        assert_eq!(
            ApiError::from(NoteError::DeadlineExceeded)
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_gone_reasons_share_a_message() {
        let expired = ApiError::from(NoteError::Gone(GoneReason::Expired));
        let consumed = ApiError::from(NoteError::Gone(GoneReason::Consumed));
        assert_eq!(
            public_message(expired.category()),
            public_message(consumed.category())
        );
    }
}
