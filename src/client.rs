//! HTTP client for the analysis endpoint, as used by front ends and tools.
//!
//! The round trip has its own deadline, longer than the server's model
//! deadline. Running out of it is reported as [`ClientError::TooLong`],
//! distinct from the server's 504.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::models::{AnalysisResult, AnalyzeErrorResponse, AnalyzeResponse, Language};

pub const DEFAULT_ROUND_TRIP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("the request took too long to complete")]
    TooLong,

    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// An analysis as delivered to the user. `degraded` marks the generic
/// template shown while the service is overloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientAnalysis {
    pub result: AnalysisResult,
    pub degraded: bool,
}

#[derive(Serialize)]
struct AnalyzeBody<'a> {
    symptoms: &'a str,
    language: &'a str,
}

pub struct TriageClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl TriageClient {
    /// `base_url` is the server root, e.g. `http://localhost:8080`.
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, DEFAULT_ROUND_TRIP_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/api/analyze-symptoms", base_url.trim_end_matches('/')),
            timeout,
        }
    }

    pub async fn analyze(&self, symptoms: &str, language: Language) -> Result<ClientAnalysis, ClientError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&AnalyzeBody { symptoms, language: language.code() })
            .send()
            .await
            .map_err(map_transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(map_transport)?;

        if status.is_success() {
            let body: AnalyzeResponse =
                serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))?;
            return Ok(ClientAnalysis { result: body.data, degraded: false });
        }

        if status.as_u16() == 503
            && let Ok(AnalyzeErrorResponse { fallback: Some(fallback), .. }) = serde_json::from_str(&text)
        {
            tracing::warn!("client: service overloaded, showing fallback analysis");
            return Ok(ClientAnalysis { result: fallback, degraded: true });
        }

        Err(ClientError::Server {
            status: status.as_u16(),
            message: error_message(&text),
        })
    }
}

fn map_transport(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::TooLong
    } else {
        ClientError::Transport(e.to_string())
    }
}

/// Best human-readable message of an error body: `message`, then `error`
/// (plain or structured), then the raw text.
fn error_message(text: &str) -> String {
    let Ok(body) = serde_json::from_str::<Value>(text) else {
        return text.to_string();
    };
    body.get("message")
        .and_then(Value::as_str)
        .or_else(|| body.get("error").and_then(Value::as_str))
        .or_else(|| body.pointer("/error/message").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| text.to_string())
}
