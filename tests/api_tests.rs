use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use avicenna_backend::config::{GenerationParams, TriageConfig};
use avicenna_backend::history::MemoryHistoryStore;
use avicenna_backend::invoker::{BackendError, GenerationBackend};
use avicenna_backend::models::Language;
use avicenna_backend::state::AppState;
use avicenna_backend::templates::fallback_template;

/// In-process stand-in for the model provider: one behaviour for every
/// call, plus a log of the models asked.
#[derive(Clone)]
enum Reply {
    Text(&'static str),
    Overloaded,
    Rejected,
    Slow(Duration),
}

struct ScriptedBackend {
    reply: Reply,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(
        &self,
        model: &str,
        _prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, BackendError> {
        self.calls.lock().unwrap().push(model.to_string());
        match &self.reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Overloaded => Err(BackendError::Status {
                model: model.to_string(),
                status: 503,
                body: r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#
                    .to_string(),
            }),
            Reply::Rejected => Err(BackendError::Status {
                model: model.to_string(),
                status: 400,
                body: "API key not valid".to_string(),
            }),
            Reply::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok("{}".to_string())
            }
        }
    }
}

fn test_state(reply: Reply, timeout: Duration) -> (AppState, Arc<ScriptedBackend>) {
    let backend = Arc::new(ScriptedBackend { reply, calls: Mutex::new(Vec::new()) });
    let config = TriageConfig {
        candidates: vec!["gemini-a".into(), "gemini-b".into(), "gemini-c".into()],
        timeout,
        ..TriageConfig::default()
    };
    let state = AppState::with_backend(config, backend.clone(), Arc::new(MemoryHistoryStore::new()));
    (state, backend)
}

/// Helper: build a router from a test state.
fn app(state: AppState) -> axum::Router {
    avicenna_backend::create_router(state)
}

/// Helper: collect a response body into a serde_json::Value.
async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn analyze(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/analyze-symptoms")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn assert_total(analysis: &Value) {
    assert!(
        ["monitor_at_home", "see_doctor_soon", "emergency_care"]
            .contains(&analysis["urgencyAssessment"]["level"].as_str().unwrap())
    );
    assert!(!analysis["disclaimer"].as_str().unwrap().trim().is_empty());
}

const VALID_ANALYSIS: &str = r#"{
  "primaryAnalysis": {"presentingSymptoms": ["headache", "fever"], "clinicalImpression": "Probable viral infection"},
  "differentialDiagnosis": [{"condition": "Influenza", "likelihood": "high", "explanation": "Fever and headache", "keyFeatures": ["fever"]}],
  "urgencyAssessment": {"level": "see_doctor_soon", "reasoning": "Persistent fever", "redFlags": ["stiff neck"], "timeframe": "24-48 hours"},
  "recommendations": {"immediate": ["Rest"], "monitoring": ["Temperature"], "lifestyle": ["Fluids"], "followUp": ["GP visit"]},
  "specialistReferral": {"recommended": false, "specialty": "General Practitioner", "reasoning": "Primary care first", "specificConditions": [], "whenToSee": "If not improving"},
  "educationalContent": {"overview": "Flu is common", "whatToExpect": "Recovery in a week", "prevention": "Annual vaccine"},
  "disclaimer": "This is not a diagnosis."
}"#;

// ═══════════════════════════════════════════════════════════════════════════
//  POST /api/analyze-symptoms
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn valid_model_answer_is_delivered() {
    let (state, backend) = test_state(Reply::Text(VALID_ANALYSIS), Duration::from_secs(5));
    let response = app(state)
        .oneshot(analyze(json!({ "symptoms": "I have a headache and fever", "language": "en" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["source"], "model");
    assert_eq!(json["data"]["urgencyAssessment"]["level"], "see_doctor_soon");
    assert_eq!(json["data"]["disclaimer"], "This is not a diagnosis.");
    assert!(json["timestamp"].is_string());
    assert_eq!(backend.calls(), vec!["gemini-a"]);
}

#[tokio::test]
async fn empty_symptoms_return_400_without_model_call() {
    let (state, backend) = test_state(Reply::Text(VALID_ANALYSIS), Duration::from_secs(5));
    let response = app(state)
        .oneshot(analyze(json!({ "symptoms": "" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Symptoms are required");
    assert!(json["timestamp"].is_string());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn malformed_body_is_treated_as_missing_symptoms() {
    let (state, backend) = test_state(Reply::Text(VALID_ANALYSIS), Duration::from_secs(5));
    let request = Request::builder()
        .method("POST")
        .uri("/api/analyze-symptoms")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Symptoms are required");
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn mistyped_language_falls_back_to_english() {
    let (state, backend) = test_state(Reply::Text(VALID_ANALYSIS), Duration::from_secs(5));
    let response = app(state)
        .oneshot(analyze(json!({ "symptoms": "I have a headache", "language": 7 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["source"], "model");
    assert_eq!(backend.calls(), vec!["gemini-a"]);
}

#[tokio::test]
async fn body_without_content_type_is_read_as_json() {
    let (state, _) = test_state(Reply::Text(VALID_ANALYSIS), Duration::from_secs(5));
    let request = Request::builder()
        .method("POST")
        .uri("/api/analyze-symptoms")
        .body(Body::from(json!({ "symptoms": "Sore throat" }).to_string()))
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);
}

fn oversized_body() -> String {
    let symptoms = "a".repeat(avicenna_backend::MAX_BODY_BYTES + 10);
    json!({ "symptoms": symptoms }).to_string()
}

async fn assert_too_large(response: axum::response::Response) {
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Request body too large");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn oversized_body_with_length_header_gets_json_413() {
    let (state, backend) = test_state(Reply::Text(VALID_ANALYSIS), Duration::from_secs(5));
    let body = oversized_body();
    let request = Request::builder()
        .method("POST")
        .uri("/api/analyze-symptoms")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_too_large(response).await;
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn oversized_body_without_length_header_gets_json_413() {
    let (state, backend) = test_state(Reply::Text(VALID_ANALYSIS), Duration::from_secs(5));
    let request = Request::builder()
        .method("POST")
        .uri("/api/analyze-symptoms")
        .header("content-type", "application/json")
        .body(Body::from(oversized_body()))
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_too_large(response).await;
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn rate_limited_responses_are_json_with_cors() {
    let limited = axum::Router::new().route(
        "/limited",
        axum::routing::get(|| async { (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests! Wait for 2s") }),
    );
    let response = avicenna_backend::with_edge_layers(limited)
        .oneshot(Request::builder().uri("/limited").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let json = body_json(response).await;
    assert_eq!(json["error"], "Too many requests");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn overload_on_every_candidate_returns_503_with_fallback() {
    let (state, backend) = test_state(Reply::Overloaded, Duration::from_secs(5));
    let response = app(state)
        .oneshot(analyze(json!({ "symptoms": "Boshim og'riyapti", "language": "uz" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Service temporarily unavailable");
    assert!(json["message"].as_str().unwrap().contains("high demand"));
    assert_total(&json["fallback"]);
    assert_eq!(json["fallback"], serde_json::to_value(fallback_template(Language::Uz)).unwrap());
    assert_eq!(backend.calls(), vec!["gemini-a", "gemini-b", "gemini-c"]);
}

#[tokio::test]
async fn prose_answer_is_replaced_by_language_template() {
    let (state, _) = test_state(
        Reply::Text("I'm sorry, but I can't provide medical advice."),
        Duration::from_secs(5),
    );
    let response = app(state)
        .oneshot(analyze(json!({ "symptoms": "머리가 아파요", "language": "ko" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["source"], "fallback");
    assert_eq!(json["data"], serde_json::to_value(fallback_template(Language::Ko)).unwrap());
    assert_total(&json["data"]);
}

#[tokio::test]
async fn truncated_fenced_answer_is_repaired() {
    let (state, _) = test_state(
        Reply::Text("```json\n{\"urgencyAssessment\": {\"level\": \"emergency_care\", \"reasoning\": \"Chest pain radiating to"),
        Duration::from_secs(5),
    );
    let response = app(state)
        .oneshot(analyze(json!({ "symptoms": "Crushing chest pain" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["source"], "repaired");
    assert_eq!(json["data"]["urgencyAssessment"]["level"], "emergency_care");
    assert_eq!(json["data"]["urgencyAssessment"]["reasoning"], "Chest pain radiating to");
    assert_total(&json["data"]);
}

#[tokio::test]
async fn slow_model_returns_504() {
    let (state, backend) = test_state(Reply::Slow(Duration::from_secs(30)), Duration::from_millis(50));
    let response = app(state)
        .oneshot(analyze(json!({ "symptoms": "Dizziness" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Request timeout");
    assert!(json["message"].as_str().unwrap().contains("shorter or simpler"));
    assert!(json.get("fallback").is_none());
    assert_eq!(backend.calls(), vec!["gemini-a"]);
}

#[tokio::test]
async fn non_overload_failure_returns_500_with_raw_message() {
    let (state, backend) = test_state(Reply::Rejected, Duration::from_secs(5));
    let response = app(state)
        .oneshot(analyze(json!({ "symptoms": "Rash on arm" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Failed to analyze symptoms");
    assert!(json["message"].as_str().unwrap().contains("API key not valid"));
    assert_eq!(backend.calls(), vec!["gemini-a"]);
}

#[tokio::test]
async fn missing_credentials_return_configuration_error_after_validation() {
    let state = AppState::new(TriageConfig::default(), Arc::new(MemoryHistoryStore::new()));

    let response = app(state.clone())
        .oneshot(analyze(json!({ "symptoms": "" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(state)
        .oneshot(analyze(json!({ "symptoms": "Sore throat" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "API configuration error");
}

#[tokio::test]
async fn preflight_returns_empty_200_with_cors_headers() {
    let (state, _) = test_state(Reply::Text(VALID_ANALYSIS), Duration::from_secs(5));
    let response = app(state)
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/analyze-symptoms")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "GET, POST, DELETE, OPTIONS");
    assert_eq!(headers["access-control-allow-headers"], "Content-Type, Authorization, X-User-Id");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn other_methods_return_405_with_cors_headers() {
    let (state, _) = test_state(Reply::Text(VALID_ANALYSIS), Duration::from_secs(5));
    let response = app(state)
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/analyze-symptoms")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let json = body_json(response).await;
    assert_eq!(json["error"], "Method not allowed");
}

#[tokio::test]
async fn error_responses_carry_cors_headers() {
    let (state, _) = test_state(Reply::Overloaded, Duration::from_secs(5));
    let response = app(state)
        .oneshot(analyze(json!({ "symptoms": "Back pain" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

// ═══════════════════════════════════════════════════════════════════════════
//  /api/history (in-memory store)
// ═══════════════════════════════════════════════════════════════════════════

fn history_request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn history_requires_user_header() {
    let (state, _) = test_state(Reply::Text(VALID_ANALYSIS), Duration::from_secs(5));
    let response = app(state)
        .oneshot(history_request("GET", "/api/history", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn history_preflight_allows_user_header_and_delete() {
    let (state, _) = test_state(Reply::Text(VALID_ANALYSIS), Duration::from_secs(5));
    let router = app(state);

    for uri in ["/api/history", "/api/history/00000000-0000-0000-0000-000000000000"] {
        let response = router
            .clone()
            .oneshot(history_request("OPTIONS", uri, None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let allowed = response.headers()["access-control-allow-headers"].to_str().unwrap();
        assert!(allowed.contains("X-User-Id"));
        let methods = response.headers()["access-control-allow-methods"].to_str().unwrap();
        assert!(methods.contains("DELETE"));
    }
}

#[tokio::test]
async fn history_rejects_malformed_body_with_error_envelope() {
    let (state, _) = test_state(Reply::Text(VALID_ANALYSIS), Duration::from_secs(5));
    let response = app(state)
        .oneshot(history_request(
            "POST",
            "/api/history",
            Some("patient-1"),
            Some(json!({ "symptoms": "x", "response": {} })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
    assert!(json["error"]["message"].as_str().unwrap().contains("primaryAnalysis"));
    assert!(json["error"]["request_id"].is_string());
}

#[tokio::test]
async fn history_save_list_delete_round() {
    let (state, _) = test_state(Reply::Text(VALID_ANALYSIS), Duration::from_secs(5));
    let router = app(state);
    let analysis: Value = serde_json::from_str(VALID_ANALYSIS).unwrap();

    let response = router
        .clone()
        .oneshot(history_request(
            "POST",
            "/api/history",
            Some("patient-1"),
            Some(json!({ "symptoms": "Headache", "language": "en", "response": analysis })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let saved = body_json(response).await;
    assert_eq!(saved["symptoms"], "Headache");
    assert_eq!(saved["response"], analysis);
    let id = saved["id"].as_str().unwrap().to_string();

    let response = router
        .clone()
        .oneshot(history_request("GET", "/api/history?limit=500", Some("patient-1"), None))
        .await
        .unwrap();
    let page = body_json(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["limit"], 100);
    assert_eq!(page["entries"][0]["id"], id.as_str());

    // Another user sees nothing and cannot delete.
    let response = router
        .clone()
        .oneshot(history_request("DELETE", &format!("/api/history/{id}"), Some("patient-2"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .clone()
        .oneshot(history_request("DELETE", &format!("/api/history/{id}"), Some("patient-1"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"], true);
}
