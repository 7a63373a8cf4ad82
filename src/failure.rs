// Request-level failure taxonomy of the analysis endpoint and its wire bodies.
//
// Extraction failures never reach this type: they are absorbed by the
// normalizer, which substitutes the language template.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::config::ConfigError;
use crate::invoker::InvokeError;
use crate::models::{AnalyzeErrorResponse, Language, timestamp_now};
use crate::templates::fallback_template;

pub const TIMEOUT_GUIDANCE: &str =
    "The AI analysis took too long to complete. Please try again with a shorter or simpler description.";
pub const OVERLOAD_GUIDANCE: &str =
    "Our AI service is currently experiencing high demand. Please try again in a few moments.";
pub const BODY_TOO_LARGE: &str = "Request body too large";
pub const RATE_LIMITED: &str = "Too many requests";

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TriageError {
    #[error("Symptoms are required")]
    Validation,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("API configuration error: {0}")]
    Configuration(ConfigError),

    #[error("Request timeout")]
    Timeout,

    /// All candidates overloaded. The response carries the language template.
    #[error("Service temporarily unavailable: {reason}")]
    Overloaded { reason: String, language: Language },

    #[error("Failed to analyze symptoms: {0}")]
    Unknown(String),
}

impl TriageError {
    pub fn from_invoke(err: InvokeError, language: Language) -> Self {
        match err {
            InvokeError::Timeout(_) => TriageError::Timeout,
            InvokeError::Overloaded(reason) => TriageError::Overloaded { reason, language },
            InvokeError::Fatal(message) => TriageError::Unknown(message),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            TriageError::Validation => StatusCode::BAD_REQUEST,
            TriageError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            TriageError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TriageError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            TriageError::Overloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            TriageError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TriageError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let timestamp = timestamp_now();

        match &self {
            TriageError::Validation => tracing::info!("analyze: rejected request without symptoms"),
            TriageError::PayloadTooLarge => tracing::info!("analyze: rejected oversized body"),
            TriageError::Overloaded { .. } => tracing::warn!("analyze ({}): {}", status.as_u16(), self),
            _ => tracing::error!("analyze ({}): {}", status.as_u16(), self),
        }

        match self {
            TriageError::Validation => simple_body(status, "Symptoms are required"),
            TriageError::PayloadTooLarge => simple_body(status, BODY_TOO_LARGE),
            TriageError::Configuration(_) => simple_body(status, "API configuration error"),
            TriageError::Timeout => (
                status,
                Json(AnalyzeErrorResponse {
                    success: false,
                    error: "Request timeout".to_string(),
                    message: TIMEOUT_GUIDANCE.to_string(),
                    fallback: None,
                    timestamp,
                }),
            )
                .into_response(),
            TriageError::Overloaded { language, .. } => (
                status,
                Json(AnalyzeErrorResponse {
                    success: false,
                    error: "Service temporarily unavailable".to_string(),
                    message: OVERLOAD_GUIDANCE.to_string(),
                    fallback: Some(fallback_template(language)),
                    timestamp,
                }),
            )
                .into_response(),
            TriageError::Unknown(message) => (
                status,
                Json(AnalyzeErrorResponse {
                    success: false,
                    error: "Failed to analyze symptoms".to_string(),
                    message,
                    fallback: None,
                    timestamp,
                }),
            )
                .into_response(),
        }
    }
}

fn simple_body(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": error, "timestamp": timestamp_now() })),
    )
        .into_response()
}

/// Response mapper for the outer middleware: 413 and 429 answers produced
/// outside the handlers (body limit, rate limiter) are plain text, and are
/// rewritten into the JSON error shape. Headers such as `retry-after` stay.
pub async fn json_rejections(response: Response) -> Response {
    let error = match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => BODY_TOO_LARGE,
        StatusCode::TOO_MANY_REQUESTS => RATE_LIMITED,
        _ => return response,
    };
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if is_json {
        return response;
    }

    let status = response.status();
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_TYPE);
    parts.headers.remove(header::CONTENT_LENGTH);
    tracing::info!("edge rejection ({}): {}", status.as_u16(), error);
    (parts, simple_body(status, error)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn invoke_errors_map_onto_request_taxonomy() {
        assert_eq!(
            TriageError::from_invoke(InvokeError::Timeout(Duration::from_secs(15)), Language::En),
            TriageError::Timeout
        );
        assert_eq!(
            TriageError::from_invoke(InvokeError::Overloaded("busy".into()), Language::Uz),
            TriageError::Overloaded { reason: "busy".into(), language: Language::Uz }
        );
        assert_eq!(
            TriageError::from_invoke(InvokeError::Fatal("gemini error: 400".into()), Language::En),
            TriageError::Unknown("gemini error: 400".into())
        );
    }

    #[test]
    fn status_codes_follow_failure_class() {
        assert_eq!(TriageError::Validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            TriageError::Configuration(ConfigError::NoCandidates).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(TriageError::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            TriageError::Overloaded { reason: String::new(), language: Language::En }.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(TriageError::Unknown("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn plain_edge_rejections_become_json() {
        let limited = (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "2")],
            "Too Many Requests! Wait for 2s",
        )
            .into_response();
        let rewritten = json_rejections(limited).await;
        assert_eq!(rewritten.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(rewritten.headers()[header::RETRY_AFTER], "2");
        assert_eq!(rewritten.headers()[header::CONTENT_TYPE], "application/json");

        let bytes = axum::body::to_bytes(rewritten.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], RATE_LIMITED);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn other_responses_pass_through_unchanged() {
        let ok = json_rejections((StatusCode::OK, "fine").into_response()).await;
        assert_eq!(ok.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");

        let own = json_rejections(TriageError::PayloadTooLarge.into_response()).await;
        let bytes = axum::body::to_bytes(own.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], BODY_TOO_LARGE);
    }
}
