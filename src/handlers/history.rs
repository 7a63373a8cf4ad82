// ---------------------------------------------------------------------------
// handlers/history.rs — saved consultations, scoped by X-User-Id
// ---------------------------------------------------------------------------

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::history::{HistoryEntry, NewEntry};
use crate::models::{AnalysisResult, Language};
use crate::state::AppState;

use super::ApiError;

/// Header carrying the opaque user identity issued by the auth collaborator.
pub const USER_HEADER: &str = "x-user-id";

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateHistoryRequest {
    pub symptoms: String,
    #[serde(default)]
    pub language: Option<String>,
    pub response: AnalysisResult,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Max entries to return (clamped to 1..=100, default 20).
    #[serde(default)]
    pub limit: Option<i64>,
    /// Number of entries to skip.
    #[serde(default)]
    pub offset: Option<i64>,
}

impl PaginationParams {
    fn resolve(&self) -> (i64, i64) {
        (
            self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            self.offset.unwrap_or(0).max(0),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

fn user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".to_string()))
}

/// POST /api/history — save a consultation.
#[utoipa::path(post, path = "/api/history", tag = "history",
    request_body = CreateHistoryRequest,
    responses(
        (status = 201, description = "Entry saved", body = HistoryEntry),
        (status = 400, description = "Malformed body or empty symptoms"),
        (status = 401, description = "Missing X-User-Id")
    )
)]
pub async fn create_history_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateHistoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<HistoryEntry>), ApiError> {
    let user = user_id(&headers)?;
    let Json(body) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let symptoms = body.symptoms.trim();
    if symptoms.is_empty() {
        return Err(ApiError::BadRequest("Symptoms are required".to_string()));
    }

    let entry = state
        .history
        .save(
            &user,
            NewEntry {
                symptoms: symptoms.to_string(),
                language: body.language.as_deref().map(Language::from_code).unwrap_or_default(),
                response: body.response,
            },
        )
        .await?;

    tracing::info!("history: saved entry {} for user {}", entry.id, user);
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /api/history — newest first, paginated.
#[utoipa::path(get, path = "/api/history", tag = "history",
    params(PaginationParams),
    responses(
        (status = 200, description = "Page of saved consultations", body = HistoryPage),
        (status = 401, description = "Missing X-User-Id")
    )
)]
pub async fn list_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PaginationParams>,
) -> Result<Json<HistoryPage>, ApiError> {
    let user = user_id(&headers)?;
    let (limit, offset) = params.resolve();
    let page = state.history.list(&user, limit, offset).await?;

    Ok(Json(HistoryPage {
        entries: page.entries,
        total: page.total,
        limit,
        offset,
    }))
}

/// DELETE /api/history/{id}
#[utoipa::path(delete, path = "/api/history/{id}", tag = "history",
    params(("id" = Uuid, Path, description = "Entry id")),
    responses(
        (status = 200, description = "Entry deleted", body = Value),
        (status = 401, description = "Missing X-User-Id"),
        (status = 404, description = "No such entry for this user")
    )
)]
pub async fn delete_history_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let user = user_id(&headers)?;
    if !state.history.delete(&user, id).await? {
        return Err(ApiError::NotFound(format!("history entry {}", id)));
    }
    Ok(Json(json!({ "deleted": true })))
}
