pub mod client;
pub mod config;
pub mod extract;
pub mod failure;
pub mod handlers;
pub mod history;
pub mod invoker;
pub mod models;
pub mod normalize;
pub mod prompt;
pub mod providers;
pub mod state;
pub mod templates;

use axum::http::{HeaderValue, header};
use axum::routing::{delete, get, post};
use axum::{Json, Router, middleware};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use utoipa::OpenApi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Avicenna API",
        description = "Multilingual symptom triage backend",
    ),
    paths(
        handlers::analyze_symptoms,
        handlers::health,
        handlers::readiness,
        handlers::create_history_entry,
        handlers::list_history,
        handlers::delete_history_entry,
    ),
    components(schemas(
        models::AnalyzeRequest,
        models::AnalyzeResponse,
        models::AnalyzeErrorResponse,
        models::AnalysisResult,
        models::ResultSource,
        models::HealthResponse,
        models::ProviderInfo,
        history::HistoryEntry,
        handlers::history::CreateHistoryRequest,
        handlers::history::HistoryPage,
    )),
    tags(
        (name = "analysis", description = "Symptom analysis"),
        (name = "health", description = "Liveness and readiness"),
        (name = "history", description = "Saved consultations"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the application router with the given state, edge layers included.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    with_edge_layers(api_routes(state))
}

/// Routes only. `main` inserts the rate limiter between these and
/// [`with_edge_layers`].
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        // Analysis
        .route(
            "/api/analyze-symptoms",
            post(handlers::analyze_symptoms)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed),
        )
        // Health
        .route("/api/health", get(handlers::health))
        .route("/api/health/ready", get(handlers::readiness))
        // History
        .route(
            "/api/history",
            get(handlers::list_history)
                .post(handlers::create_history_entry)
                .options(handlers::preflight),
        )
        .route(
            "/api/history/{id}",
            delete(handlers::delete_history_entry).options(handlers::preflight),
        )
        // Docs
        .route("/api/openapi.json", get(openapi_json))
        .with_state(state)
}

/// Body limit, JSON 413/429 bodies, then CORS outermost so every response
/// carries the CORS headers, rejections included.
pub fn with_edge_layers(router: Router) -> Router {
    router
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::map_response(failure::json_rejections))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization, X-User-Id"),
        ))
}
