//! Model invocation with candidate fallback under one shared deadline.
//!
//! Candidates are tried strictly in order, one at a time. An overload-class
//! failure advances to the next candidate; any other failure ends the loop.
//! The deadline starts with the first attempt and is never reset, so a
//! timeout is terminal no matter which candidate was in flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ConfigError, GenerationParams};

// ── Backend seam ────────────────────────────────────────────────────────────

/// Failure of a single generation call against one model.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum BackendError {
    #[error("{model} error: {status} - {body}")]
    Status { model: String, status: u16, body: String },

    #[error("{model} failed: {message}")]
    Transport { model: String, message: String, timed_out: bool },

    #[error("{model} returned no text ({diagnosis})")]
    EmptyResponse { model: String, diagnosis: String },
}

/// One generation call per attempted candidate. Implemented by the HTTP
/// providers and by scripted backends in tests.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, BackendError>;
}

// ── Per-attempt classification ──────────────────────────────────────────────

/// Result of one attempt, as seen by the invocation loop.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    Success(String),
    /// Overload-class failure: the next candidate may be tried.
    RetryableFailure(String),
    FatalFailure(String),
    Timeout,
}

/// Server-busy signals: 503, 429, or a body naming an overload/unavailable state.
pub fn is_overload(status: u16, body: &str) -> bool {
    if status == 503 || status == 429 {
        return true;
    }
    let lower = body.to_ascii_lowercase();
    lower.contains("overloaded") || lower.contains("unavailable") || lower.contains("resource_exhausted")
}

/// Map one backend result onto an [`InvocationOutcome`]. Pure.
pub fn classify(result: Result<String, BackendError>) -> InvocationOutcome {
    match result {
        Ok(text) if text.trim().is_empty() => {
            InvocationOutcome::FatalFailure("model returned an empty response".to_string())
        }
        Ok(text) => InvocationOutcome::Success(text),
        Err(e) => match &e {
            BackendError::Status { status, body, .. } if is_overload(*status, body) => {
                InvocationOutcome::RetryableFailure(e.to_string())
            }
            BackendError::Transport { timed_out: true, .. } => InvocationOutcome::Timeout,
            _ => InvocationOutcome::FatalFailure(e.to_string()),
        },
    }
}

// ── Invoker ─────────────────────────────────────────────────────────────────

/// Terminal failure of a whole invocation.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum InvokeError {
    #[error("model invocation exceeded its {}s budget", .0.as_secs_f32())]
    Timeout(Duration),

    /// Every candidate answered with an overload-class failure; carries the last one.
    #[error("all model candidates overloaded (503): {0}")]
    Overloaded(String),

    #[error("{0}")]
    Fatal(String),
}

/// Successful invocation: the generated text and the candidate that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub model: String,
    pub text: String,
    pub attempts: usize,
}

pub struct ModelInvoker {
    candidates: Vec<String>,
    timeout: Duration,
    params: GenerationParams,
    backend: Arc<dyn GenerationBackend>,
}

impl std::fmt::Debug for ModelInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInvoker")
            .field("candidates", &self.candidates)
            .field("timeout", &self.timeout)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl ModelInvoker {
    pub fn new(
        candidates: Vec<String>,
        timeout: Duration,
        params: GenerationParams,
        backend: Arc<dyn GenerationBackend>,
    ) -> Result<Self, ConfigError> {
        if candidates.is_empty() {
            return Err(ConfigError::NoCandidates);
        }
        Ok(Self {
            candidates,
            timeout,
            params,
            backend,
        })
    }

    pub async fn invoke(&self, prompt: &str) -> Result<Generation, InvokeError> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        let expired = tokio::time::sleep_until(deadline);
        tokio::pin!(expired);

        let mut last_overload: Option<String> = None;

        for (index, model) in self.candidates.iter().enumerate() {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!("invoker: deadline reached before trying {}", model);
                return Err(InvokeError::Timeout(self.timeout));
            }

            tracing::info!(
                "invoker: attempt {}/{} with model {}",
                index + 1,
                self.candidates.len(),
                model
            );

            // The deadline branch is polled first, so a request still in
            // flight when it fires is reported as a timeout.
            let outcome = tokio::select! {
                biased;
                _ = &mut expired => InvocationOutcome::Timeout,
                result = self.backend.generate(model, prompt, &self.params) => classify(result),
            };

            match outcome {
                InvocationOutcome::Success(text) => {
                    tracing::info!("invoker: {} answered ({} bytes)", model, text.len());
                    return Ok(Generation {
                        model: model.clone(),
                        text,
                        attempts: index + 1,
                    });
                }
                InvocationOutcome::RetryableFailure(reason) => {
                    tracing::warn!("invoker: {} overloaded, trying next candidate: {}", model, reason);
                    last_overload = Some(reason);
                }
                InvocationOutcome::FatalFailure(reason) => {
                    tracing::error!("invoker: {} failed, not trying further candidates: {}", model, reason);
                    return Err(InvokeError::Fatal(reason));
                }
                InvocationOutcome::Timeout => {
                    tracing::warn!(
                        "invoker: timed out after {}s while waiting on {}",
                        self.timeout.as_secs_f32(),
                        model
                    );
                    return Err(InvokeError::Timeout(self.timeout));
                }
            }
        }

        Err(InvokeError::Overloaded(
            last_overload.unwrap_or_else(|| "all model candidates failed".to_string()),
        ))
    }
}
