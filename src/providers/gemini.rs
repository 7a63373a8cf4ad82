// Gemini `generateContent` provider.

use serde_json::{Value, json};

use crate::config::GenerationParams;
use crate::invoker::BackendError;

use super::{read_error_body, transport_error};

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, BackendError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let parsed_url = reqwest::Url::parse(&url).map_err(|e| BackendError::Transport {
            model: model.to_string(),
            message: format!("invalid URL {}: {}", url, e),
            timed_out: false,
        })?;

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": params.temperature,
                "topK": params.top_k,
                "topP": params.top_p,
                "maxOutputTokens": params.max_output_tokens,
            }
        });

        let resp = self
            .client
            .post(parsed_url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(model, &e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                model: model.to_string(),
                status: status.as_u16(),
                body: read_error_body(resp).await,
            });
        }

        let j: Value = resp.json().await.map_err(|e| transport_error(model, &e))?;
        extract_text(&j).ok_or_else(|| BackendError::EmptyResponse {
            model: model.to_string(),
            diagnosis: gemini_diagnose(&j),
        })
    }
}

/// Text of the first candidate's first part, if any.
pub(crate) fn extract_text(j: &Value) -> Option<String> {
    j.get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c0| c0.get("content"))
        .and_then(|ct| ct.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p0| p0.get("text"))
        .and_then(|t| t.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
}

/// Extract diagnostic info from a Gemini response that's missing expected parts.
pub(crate) fn gemini_diagnose(resp_json: &Value) -> String {
    let mut diag = Vec::new();

    if let Some(feedback) = resp_json.get("promptFeedback") {
        if let Some(reason) = feedback.get("blockReason").and_then(|v| v.as_str()) {
            diag.push(format!("promptFeedback.blockReason={}", reason));
        }
    }

    if let Some(candidates) = resp_json.get("candidates").and_then(|v| v.as_array()) {
        if let Some(c0) = candidates.first() {
            if let Some(reason) = c0.get("finishReason").and_then(|v| v.as_str()) {
                diag.push(format!("finishReason={}", reason));
            }
            if c0.get("content").is_none() {
                diag.push("candidate has no 'content' field".to_string());
            }
        } else {
            diag.push("candidates array is empty".to_string());
        }
    } else {
        diag.push("no 'candidates' field in response".to_string());
    }

    diag.join(", ")
}
