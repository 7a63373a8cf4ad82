// Avicenna backend — configuration
//
// Read once at startup from the process environment. Credentials are checked
// separately (`validate_credentials`) when the invoker is built; a missing key
// still lets the server start and answer with a configuration error.

use std::time::Duration;

pub const DEFAULT_MODELS: [&str; 3] = ["gemini-2.5-flash", "gemini-2.0-flash", "gemini-2.0-flash-lite"];
pub const OPENAI_FALLBACK_MODEL: &str = "openai:gpt-4o-mini";
pub const OPENAI_PREFIX: &str = "openai:";

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PORT: u16 = 8080;
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("no model candidates configured")]
    NoCandidates,

    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Sampling parameters sent with every generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2000,
        }
    }
}

/// Upstream provider of a model candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAi,
}

impl Provider {
    /// Split a candidate identifier into its provider and bare model name.
    pub fn resolve(candidate: &str) -> (Provider, &str) {
        match candidate.strip_prefix(OPENAI_PREFIX) {
            Some(model) => (Provider::OpenAi, model),
            None => (Provider::Gemini, candidate),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Model candidates, most preferred first.
    pub candidates: Vec<String>,
    /// Shared deadline for one whole invocation loop.
    pub timeout: Duration,
    pub params: GenerationParams,
    pub gemini_base_url: String,
    pub openai_base_url: String,
    pub database_url: Option<String>,
    pub port: u16,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            openai_api_key: None,
            candidates: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            params: GenerationParams::default(),
            gemini_base_url: GEMINI_BASE_URL.to_string(),
            openai_base_url: OPENAI_BASE_URL.to_string(),
            database_url: None,
            port: DEFAULT_PORT,
        }
    }
}

impl TriageConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the environment in
    /// production, a map in tests). Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let gemini_api_key = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY"));
        let openai_api_key = get("OPENAI_API_KEY");

        let candidates = match get("TRIAGE_MODELS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect(),
            None => {
                let mut models = defaults.candidates.clone();
                if openai_api_key.is_some() {
                    models.push(OPENAI_FALLBACK_MODEL.to_string());
                }
                models
            }
        };

        let timeout = match get("TRIAGE_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_var("TRIAGE_TIMEOUT_SECS", &v)?),
            None => defaults.timeout,
        };

        let mut params = GenerationParams::default();
        if let Some(v) = get("TRIAGE_TEMPERATURE") {
            params.temperature = parse_var("TRIAGE_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("TRIAGE_MAX_OUTPUT_TOKENS") {
            params.max_output_tokens = parse_var("TRIAGE_MAX_OUTPUT_TOKENS", &v)?;
        }

        let port = match get("PORT") {
            Some(v) => parse_var("PORT", &v)?,
            None => defaults.port,
        };

        Ok(Self {
            gemini_api_key,
            openai_api_key,
            candidates,
            timeout,
            params,
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            database_url: get("DATABASE_URL"),
            port,
        })
    }

    /// Fail fast when the candidate list cannot be served with the
    /// credentials at hand.
    pub fn validate_credentials(&self) -> Result<(), ConfigError> {
        if self.candidates.is_empty() {
            return Err(ConfigError::NoCandidates);
        }
        for candidate in &self.candidates {
            match Provider::resolve(candidate).0 {
                Provider::Gemini if self.gemini_api_key.is_none() => {
                    return Err(ConfigError::MissingCredential("GEMINI_API_KEY"));
                }
                Provider::OpenAi if self.openai_api_key.is_none() => {
                    return Err(ConfigError::MissingCredential("OPENAI_API_KEY"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}
