//! JSON HTTP API for dashboard clients.
//!
//! Exposes the [`Hub`] operations so a browser dashboard (or any other
//! client) can manage configuration sets, trigger generation and read the
//! archive.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/configs` | All configuration sets and the active id |
//! | `POST` | `/configs` | Create a new blank configuration set |
//! | `PUT`  | `/configs` | Save (upsert) a configuration set |
//! | `GET`  | `/configs/{id}` | One configuration set |
//! | `DELETE` | `/configs/{id}` | Delete a configuration set |
//! | `POST` | `/configs/{id}/select` | Make a configuration set active |
//! | `POST` | `/configs/{id}/generate` | Generate and archive a report |
//! | `POST` | `/configs/{id}/suggest` | Suggest and merge focus keywords |
//! | `POST` | `/configs/{id}/import?file=<name>` | Import sources from the request body |
//! | `GET`  | `/reports?config=<id>` | Archived reports, newest first |
//! | `GET`  | `/reports/{id}` | One report |
//! | `POST` | `/reports/{id}/send` | Send a report to its webhook |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "configuration not found: x" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `busy` (409),
//! `generation_failed` (502), `delivery_failed` (502), `internal` (500).
//!
//! Only one generation runs at a time; a second request while one is in
//! flight gets `409 busy`.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::hub::{Hub, HubError};
use crate::models::{IntelConfig, Keyword, Report, Source};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    hub: Arc<Hub>,
    /// Held for the duration of a generation.
    generating: Arc<Mutex<()>>,
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let hub = Hub::open(config).await?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("listening on http://{}", config.server.bind);
    axum::serve(listener, router(Arc::new(hub))).await?;
    Ok(())
}

/// Build the router around an existing hub.
pub fn router(hub: Arc<Hub>) -> Router {
    let state = AppState {
        hub,
        generating: Arc::new(Mutex::new(())),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/configs",
            get(handle_list_configs)
                .post(handle_create_config)
                .put(handle_save_config),
        )
        .route(
            "/configs/{id}",
            get(handle_get_config).delete(handle_delete_config),
        )
        .route("/configs/{id}/select", post(handle_select_config))
        .route("/configs/{id}/generate", post(handle_generate))
        .route("/configs/{id}/suggest", post(handle_suggest))
        .route("/configs/{id}/import", post(handle_import))
        .route("/reports", get(handle_list_reports))
        .route("/reports/{id}", get(handle_get_report))
        .route("/reports/{id}/send", post(handle_send_report))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<HubError> for AppError {
    fn from(err: HubError) -> Self {
        let (status, code) = match &err {
            HubError::ConfigNotFound(_) | HubError::ReportNotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            HubError::InvalidConfig(_)
            | HubError::LastConfig
            | HubError::NoWebhook(_)
            | HubError::Import(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            HubError::Report(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
            HubError::DeliveryFailed(_) => (StatusCode::BAD_GATEWAY, "delivery_failed"),
            HubError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigList {
    configs: Vec<IntelConfig>,
    active_id: String,
}

async fn handle_list_configs(State(state): State<AppState>) -> ApiResult<ConfigList> {
    let configs = state.hub.configs().await?;
    let active_id = state.hub.active_config().await?.id;
    Ok(Json(ConfigList { configs, active_id }))
}

async fn handle_create_config(State(state): State<AppState>) -> ApiResult<IntelConfig> {
    Ok(Json(state.hub.create_config().await?))
}

async fn handle_save_config(
    State(state): State<AppState>,
    Json(config): Json<IntelConfig>,
) -> ApiResult<IntelConfig> {
    Ok(Json(state.hub.save_config(config).await?))
}

async fn handle_get_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<IntelConfig> {
    Ok(Json(state.hub.config(&id).await?))
}

async fn handle_delete_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.hub.delete_config(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_select_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.hub.select_config(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_generate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Report> {
    let _guard = state.generating.try_lock().map_err(|_| AppError {
        status: StatusCode::CONFLICT,
        code: "busy",
        message: "a report is already being generated".to_string(),
    })?;
    Ok(Json(state.hub.generate(&id).await?))
}

#[derive(Serialize)]
struct SuggestResponse {
    added: Vec<Keyword>,
}

async fn handle_suggest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SuggestResponse> {
    let added = state.hub.suggest_areas(&id).await?;
    Ok(Json(SuggestResponse { added }))
}

#[derive(Deserialize)]
struct ImportQuery {
    file: String,
    #[serde(default)]
    suggest: bool,
}

#[derive(Serialize)]
struct ImportResponse {
    added: Vec<Source>,
    suggested: usize,
}

async fn handle_import(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ImportQuery>,
    body: Bytes,
) -> ApiResult<ImportResponse> {
    let imported = state
        .hub
        .import_sources(&id, &query.file, &body, query.suggest)
        .await?;
    Ok(Json(ImportResponse {
        added: imported.added,
        suggested: imported.suggested,
    }))
}

#[derive(Deserialize)]
struct ReportsQuery {
    config: Option<String>,
}

async fn handle_list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportsQuery>,
) -> ApiResult<Vec<Report>> {
    Ok(Json(state.hub.reports(query.config.as_deref()).await?))
}

async fn handle_get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Report> {
    Ok(Json(state.hub.report(&id).await?))
}

async fn handle_send_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.hub.send_report(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
