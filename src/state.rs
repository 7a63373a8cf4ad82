// Avicenna backend - application state

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use reqwest::Client;

use crate::config::{ConfigError, Provider, TriageConfig};
use crate::history::HistoryStore;
use crate::invoker::{GenerationBackend, ModelInvoker};
use crate::models::ProviderInfo;
use crate::providers::HttpBackend;

/// Central application state. Clone-friendly: everything shared sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TriageConfig>,
    /// Built once at startup. Holds the configuration error instead when the
    /// candidate list cannot be served; the analysis endpoint reports it per request.
    pub invoker: Result<Arc<ModelInvoker>, ConfigError>,
    pub history: Arc<dyn HistoryStore>,
    pub start_time: Instant,
    /// `true` once startup (database, migrations) has completed.
    pub ready: Arc<AtomicBool>,
}

// ── Shared: readiness helpers ───────────────────────────────────────────────
impl AppState {
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
        tracing::info!("Backend marked as READY");
    }
}

impl AppState {
    /// Production state: HTTP providers built from `config`.
    pub fn new(config: TriageConfig, history: Arc<dyn HistoryStore>) -> Self {
        let invoker = build_http_client().and_then(|client| {
            let backend = HttpBackend::from_config(&config, client)?;
            ModelInvoker::new(
                config.candidates.clone(),
                config.timeout,
                config.params.clone(),
                Arc::new(backend),
            )
        });

        match &invoker {
            Ok(_) => tracing::info!(
                "AppState initialised — candidates: {:?}, timeout: {}s",
                config.candidates,
                config.timeout.as_secs()
            ),
            Err(e) => tracing::error!(
                "AppState initialised without a model invoker: {} (analysis requests will fail)",
                e
            ),
        }

        Self::assemble(config, invoker.map(Arc::new), history)
    }

    /// State around an arbitrary generation backend (scripted in tests).
    /// Credentials are not checked; the backend is trusted to serve every candidate.
    pub fn with_backend(
        config: TriageConfig,
        backend: Arc<dyn GenerationBackend>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let invoker = ModelInvoker::new(
            config.candidates.clone(),
            config.timeout,
            config.params.clone(),
            backend,
        )
        .map(Arc::new);
        Self::assemble(config, invoker, history)
    }

    fn assemble(
        config: TriageConfig,
        invoker: Result<Arc<ModelInvoker>, ConfigError>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            invoker,
            history,
            start_time: Instant::now(),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Provider availability as reported by `/api/health`.
    pub fn providers(&self) -> Vec<ProviderInfo> {
        [
            (Provider::Gemini, self.config.gemini_api_key.is_some()),
            (Provider::OpenAi, self.config.openai_api_key.is_some()),
        ]
        .into_iter()
        .map(|(provider, has_key)| ProviderInfo {
            name: provider.name().to_string(),
            available: has_key
                && self
                    .config
                    .candidates
                    .iter()
                    .any(|c| Provider::resolve(c).0 == provider),
        })
        .collect()
    }
}

fn build_http_client() -> Result<Client, ConfigError> {
    Client::builder()
        .pool_max_idle_per_host(10)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}
