// ---------------------------------------------------------------------------
// handlers/analyze.rs — POST /api/analyze-symptoms
// ---------------------------------------------------------------------------

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::extract::extract_object;
use crate::failure::TriageError;
use crate::models::{
    AnalyzeErrorResponse, AnalyzeRequest, AnalyzeResponse, SymptomRequest, timestamp_now,
};
use crate::normalize::normalize;
use crate::prompt::build_prompt;
use crate::state::AppState;

/// POST /api/analyze-symptoms — validate, prompt, invoke, extract, normalize.
///
/// The body is read as JSON whatever its `Content-Type`. A body that is not
/// valid JSON is answered like a body without symptoms.
#[utoipa::path(post, path = "/api/analyze-symptoms", tag = "analysis",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Structured analysis", body = AnalyzeResponse),
        (status = 400, description = "Symptoms are required"),
        (status = 413, description = "Request body too large"),
        (status = 500, description = "Configuration error or generic failure", body = AnalyzeErrorResponse),
        (status = 503, description = "All models overloaded; carries a fallback analysis", body = AnalyzeErrorResponse),
        (status = 504, description = "Model invocation timed out", body = AnalyzeErrorResponse)
    )
)]
pub async fn analyze_symptoms(
    State(state): State<AppState>,
    payload: Result<Bytes, BytesRejection>,
) -> Result<Json<AnalyzeResponse>, TriageError> {
    let raw = match payload {
        Ok(raw) => raw,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(TriageError::PayloadTooLarge);
        }
        Err(rejection) => {
            tracing::debug!("analyze: unreadable body: {}", rejection.body_text());
            Bytes::new()
        }
    };
    let body: AnalyzeRequest = serde_json::from_slice(&raw).unwrap_or_else(|e| {
        tracing::debug!("analyze: body is not a JSON object: {}", e);
        AnalyzeRequest::default()
    });

    let request = SymptomRequest::new(body.symptoms.as_deref(), body.language.as_deref())
        .ok_or(TriageError::Validation)?;
    let language = request.language();

    let invoker = state
        .invoker
        .as_ref()
        .map_err(|e| TriageError::Configuration(e.clone()))?;

    tracing::info!(
        "analyze: {} chars of symptoms, language {}",
        request.symptom_text().chars().count(),
        language.code()
    );

    let prompt = build_prompt(&request);
    let generation = invoker
        .invoke(&prompt)
        .await
        .map_err(|e| TriageError::from_invoke(e, language))?;

    let extraction = extract_object(&generation.text);
    if let Some(ex) = &extraction {
        tracing::info!("analyze: {} output parsed via {}", generation.model, ex.method.as_str());
    }
    let normalized = normalize(extraction.map(|ex| ex.object), language);

    Ok(Json(AnalyzeResponse {
        success: true,
        data: normalized.result,
        source: normalized.source,
        timestamp: timestamp_now(),
    }))
}

/// OPTIONS /api/analyze-symptoms — CORS preflight, empty 200.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Any other method on /api/analyze-symptoms.
pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "success": false, "error": "Method not allowed", "timestamp": timestamp_now() })),
    )
        .into_response()
}
