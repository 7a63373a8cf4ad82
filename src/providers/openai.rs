// OpenAI chat-completions provider, used for `openai:`-prefixed candidates.

use serde_json::{Value, json};

use crate::config::GenerationParams;
use crate::invoker::BackendError;

use super::{read_error_body, transport_error};

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiProvider {
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
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": params.temperature,
            "top_p": params.top_p,
            "max_tokens": params.max_output_tokens,
        });

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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
            diagnosis: j
                .pointer("/choices/0/finish_reason")
                .and_then(|v| v.as_str())
                .map(|r| format!("finish_reason={}", r))
                .unwrap_or_else(|| "no choices in response".to_string()),
        })
    }
}

pub(crate) fn extract_text(j: &Value) -> Option<String> {
    j.pointer("/choices/0/message/content")
        .and_then(|t| t.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_read_from_first_choice() {
        let j = json!({ "choices": [{ "message": { "role": "assistant", "content": "{}" } }] });
        assert_eq!(extract_text(&j).as_deref(), Some("{}"));
        assert!(extract_text(&json!({ "choices": [] })).is_none());
    }

    mod upstream {
        use axum::http::StatusCode;
        use serde_json::json;

        use super::super::OpenAiProvider;
        use crate::config::GenerationParams;
        use crate::invoker::{BackendError, InvocationOutcome, classify};
        use crate::providers::stub;

        fn provider(base_url: &str) -> OpenAiProvider {
            OpenAiProvider::new(reqwest::Client::new(), base_url, "k2")
        }

        #[tokio::test]
        async fn request_uses_bearer_auth_and_chat_body() {
            let upstream = stub::serve(
                StatusCode::OK,
                json!({ "choices": [{ "message": { "role": "assistant", "content": "{}" }, "finish_reason": "stop" }] }),
            )
            .await;

            let text = provider(&upstream.base_url)
                .generate("gpt-4o-mini", "hello", &GenerationParams::default())
                .await
                .unwrap();
            assert_eq!(text, "{}");

            let requests = upstream.requests();
            let req = &requests[0];
            assert_eq!(req.path, "/v1/chat/completions");
            assert_eq!(req.headers["authorization"], "Bearer k2");
            assert_eq!(
                req.body,
                json!({
                    "model": "gpt-4o-mini",
                    "messages": [{ "role": "user", "content": "hello" }],
                    "temperature": 0.3,
                    "top_p": 0.95,
                    "max_tokens": 2000,
                })
            );
        }

        #[tokio::test]
        async fn rate_limit_status_is_retryable() {
            let upstream = stub::serve(
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": { "type": "rate_limit_exceeded" } }),
            )
            .await;

            let result = provider(&upstream.base_url)
                .generate("gpt-4o-mini", "hello", &GenerationParams::default())
                .await;
            assert!(matches!(result, Err(BackendError::Status { status: 429, .. })));
            assert!(matches!(classify(result), InvocationOutcome::RetryableFailure(_)));
        }

        #[tokio::test]
        async fn success_without_content_reports_finish_reason() {
            let upstream = stub::serve(
                StatusCode::OK,
                json!({ "choices": [{ "message": { "content": null }, "finish_reason": "length" }] }),
            )
            .await;

            let result = provider(&upstream.base_url)
                .generate("gpt-4o-mini", "hello", &GenerationParams::default())
                .await;
            match result {
                Err(BackendError::EmptyResponse { diagnosis, .. }) => assert_eq!(diagnosis, "finish_reason=length"),
                other => panic!("expected empty response, got {other:?}"),
            }
        }
    }
}
