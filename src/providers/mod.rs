//! HTTP generation backends. Candidates prefixed `openai:` go to OpenAI,
//! everything else to Gemini.

pub mod gemini;
pub mod openai;

use async_trait::async_trait;

use crate::config::{ConfigError, GenerationParams, Provider, TriageConfig};
use crate::invoker::{BackendError, GenerationBackend};

use gemini::GeminiProvider;
use openai::OpenAiProvider;

/// Maximum bytes of an upstream error body kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 500;

pub struct HttpBackend {
    gemini: Option<GeminiProvider>,
    openai: Option<OpenAiProvider>,
}

impl HttpBackend {
    /// Build providers for every credential present. Fails fast when a
    /// configured candidate has no credential for its provider.
    pub fn from_config(config: &TriageConfig, client: reqwest::Client) -> Result<Self, ConfigError> {
        config.validate_credentials()?;

        Ok(Self {
            gemini: config
                .gemini_api_key
                .as_deref()
                .map(|key| GeminiProvider::new(client.clone(), &config.gemini_base_url, key)),
            openai: config
                .openai_api_key
                .as_deref()
                .map(|key| OpenAiProvider::new(client.clone(), &config.openai_base_url, key)),
        })
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, BackendError> {
        let missing = |provider: Provider| BackendError::Transport {
            model: model.to_string(),
            message: format!("{} provider is not configured", provider.name()),
            timed_out: false,
        };

        match Provider::resolve(model) {
            (Provider::Gemini, name) => match &self.gemini {
                Some(p) => p.generate(name, prompt, params).await,
                None => Err(missing(Provider::Gemini)),
            },
            (Provider::OpenAi, name) => match &self.openai {
                Some(p) => p.generate(name, prompt, params).await,
                None => Err(missing(Provider::OpenAi)),
            },
        }
    }
}

pub(crate) fn transport_error(model: &str, e: &reqwest::Error) -> BackendError {
    BackendError::Transport {
        model: model.to_string(),
        message: e.to_string(),
        timed_out: e.is_timeout(),
    }
}

/// Read an error body, cut to [`ERROR_BODY_LIMIT`] bytes on a char boundary.
pub(crate) async fn read_error_body(resp: reqwest::Response) -> String {
    let err_body = resp.text().await.unwrap_or_default();
    truncate_body(&err_body).to_string()
}

fn truncate_body(body: &str) -> &str {
    let safe_len = body
        .char_indices()
        .take_while(|(i, _)| *i < ERROR_BODY_LIMIT)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    &body[..safe_len]
}
