use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    command::ScanConfig,
    engine::BlocklistRequest,
    error::ConsoleError,
    export::CsvExport,
    orchestrator::ScanOrchestrator,
    request::ScanRequest,
};

#[derive(Clone, Debug)]
pub struct AppState {
    orchestrator: Arc<ScanOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: ScanOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Directory holding the static UI, served for every non-API path.
    pub ui_dir: PathBuf,
}

impl IntoResponse for ConsoleError {
    fn into_response(self) -> Response {
        let status = match &self {
            ConsoleError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ConsoleError::NotFound(_) | ConsoleError::NoResults(_) => StatusCode::NOT_FOUND,
            ConsoleError::EngineUnreachable(_) | ConsoleError::MalformedResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            ConsoleError::DuplicateKey(_) | ConsoleError::TerminalState { .. } => {
                StatusCode::CONFLICT
            }
            ConsoleError::EngineReportedFailure(_) | ConsoleError::Aborted => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// API routes plus the static UI fallback.
pub fn router(state: AppState, ui_dir: impl Into<PathBuf>) -> Router {
    let api = Router::new()
        .route("/scan", post(post_scan))
        .route("/scan/modules", get(get_probe_modules))
        .route("/scan/test", get(get_engine_test))
        .route(
            "/scan/blocklist",
            post(post_blocklist).get(get_standard_blocklist),
        )
        .route("/command", post(post_command_preview))
        .route("/scans", get(get_scans))
        .route("/scans/{id}", get(get_scan).delete(delete_scan))
        .route("/results", get(get_results))
        .route("/results/download", get(download_results))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state);

    let static_svc = ServeDir::new(ui_dir.into()).append_index_html_on_directories(true);

    Router::new()
        .nest("/api", api)
        .fallback_service(static_svc)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` is cancelled.
pub async fn spawn_server(
    config: ServerConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    let app = router(state, config.ui_dir);

    info!(bind = %config.bind, "serving console");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn parse_id(raw: &str) -> Result<Uuid, ConsoleError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ConsoleError::scan_not_found(raw))
}

#[derive(Debug, Deserialize)]
struct ResultsQuery {
    #[serde(rename = "scanId")]
    scan_id: Option<String>,
}

impl ResultsQuery {
    fn scan_id(&self) -> Result<Uuid, ConsoleError> {
        match self.scan_id.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => parse_id(raw),
            None => Err(ConsoleError::InvalidRequest("scan ID is required".to_string())),
        }
    }
}

async fn post_scan(
    State(app): State<AppState>,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, ConsoleError> {
    let outcome = app.orchestrator.submit(req).await?;
    Ok(Json(json!({
        "success": true,
        "scanId": outcome.scan_id,
        "results": outcome.results,
        "count": outcome.count,
        "outputFile": outcome.output_file,
    })))
}

async fn post_command_preview(Json(config): Json<ScanConfig>) -> impl IntoResponse {
    let command = config.command_line();
    Json(json!({
        "command": command.to_string(),
        "args": command.args,
        "request": config.to_request(),
    }))
}

async fn get_scans(State(app): State<AppState>) -> Result<impl IntoResponse, ConsoleError> {
    let scans = app.orchestrator.list_scans().await?;
    Ok(Json(json!({ "success": true, "scans": scans })))
}

async fn get_scan(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ConsoleError> {
    let scan = app.orchestrator.get_scan(parse_id(&id)?).await?;
    Ok(Json(json!({ "success": true, "scan": scan })))
}

async fn delete_scan(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ConsoleError> {
    app.orchestrator.delete_scan(parse_id(&id)?).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Scan deleted successfully",
    })))
}

async fn get_results(
    State(app): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> Result<impl IntoResponse, ConsoleError> {
    let scan_id = query.scan_id()?;
    let scan = app.orchestrator.get_scan(scan_id).await?;
    let results = app.orchestrator.results(scan_id).await?;
    Ok(Json(json!({
        "success": true,
        "results": results,
        "scanInfo": scan,
    })))
}

async fn download_results(
    State(app): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> Result<Response, ConsoleError> {
    let scan_id = query.scan_id()?;
    let export = app.orchestrator.export_csv(scan_id).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        CsvExport::file_name(scan_id)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.to_csv(),
    )
        .into_response())
}

async fn get_probe_modules(State(app): State<AppState>) -> Response {
    match app.orchestrator.probe_modules().await {
        Ok(modules) => Json(json!({ "status": "success", "probe_modules": modules })).into_response(),
        Err(e) => {
            error!(error = %e, "failed to fetch probe modules");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": format!("Failed to fetch probe modules: {e}"),
                })),
            )
                .into_response()
        }
    }
}

async fn get_engine_test(State(app): State<AppState>) -> Response {
    match app.orchestrator.engine_health().await {
        Ok(info) => Json(json!({
            "status": "success",
            "connected": true,
            "backend_info": info,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "error",
                "connected": false,
                "message": format!("Connection error: {e}"),
            })),
        )
            .into_response(),
    }
}

async fn post_blocklist(
    State(app): State<AppState>,
    Json(req): Json<BlocklistRequest>,
) -> Result<impl IntoResponse, ConsoleError> {
    let file = app.orchestrator.create_blocklist(req).await?;
    Ok(Json(json!({
        "success": true,
        "file_path": file.file_path,
        "message": file.message,
    })))
}

async fn get_standard_blocklist(
    State(app): State<AppState>,
) -> Result<impl IntoResponse, ConsoleError> {
    let file = app.orchestrator.create_standard_blocklist().await?;
    Ok(Json(json!({
        "success": true,
        "file_path": file.file_path,
        "message": file.message,
    })))
}
