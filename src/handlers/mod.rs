// ---------------------------------------------------------------------------
// handlers/ — HTTP surface
// Sub-modules for logical grouping; mod.rs re-exports the public handlers
// so lib.rs routes read `handlers::*`.
// ---------------------------------------------------------------------------

// Sub-modules are pub(crate) so utoipa __path_* types are accessible from lib.rs OpenApi derive.
pub(crate) mod analyze;
pub(crate) mod history;
pub(crate) mod system;

// ── Re-exports ───────────────────────────────────────────────────────────────

pub use analyze::{analyze_symptoms, method_not_allowed, preflight};
pub use history::{create_history_entry, delete_history_entry, list_history};
pub use system::{health, readiness};

// ── utoipa __path_* re-exports ───────────────────────────────────────────────
pub use analyze::__path_analyze_symptoms;
pub use history::{__path_create_history_entry, __path_delete_history_entry, __path_list_history};
pub use system::{__path_health, __path_readiness};

// ── Shared types ─────────────────────────────────────────────────────────────

use axum::Json;
use axum::http::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::history::HistoryError;

// ---------------------------------------------------------------------------
// Error envelope
// ---------------------------------------------------------------------------

/// Error type of the auxiliary (non-analysis) endpoints.
/// Logs full details server-side, returns sanitized JSON to the client.
///
/// Response format:
/// ```json
/// {
///   "error": {
///     "code": "NOT_FOUND",
///     "message": "Resource not found",
///     "request_id": "uuid",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not authenticated: {0}")]
    Unauthorized(String),
}

impl ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Sanitized message safe to return to clients. NotFound and Internal
    /// never echo their detail.
    fn sanitized_message(&self) -> String {
        match self {
            ApiError::BadRequest(m) => m.clone(),
            ApiError::NotFound(_) => "Resource not found".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
            ApiError::Unauthorized(m) => m.clone(),
        }
    }

    fn body(&self, request_id: &str) -> Value {
        json!({
            "error": {
                "code": self.error_code(),
                "message": self.sanitized_message(),
                "request_id": request_id,
                "details": null,
            }
        })
    }
}

impl From<HistoryError> for ApiError {
    fn from(e: HistoryError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let request_id = Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            code = self.error_code(),
            "API error ({}): {}",
            status.as_u16(),
            self
        );

        (status, Json(self.body(&request_id))).into_response()
    }
}
