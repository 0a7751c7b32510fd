//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/match` | Rank grants for a company profile and goal text |
//! | `POST` | `/ask` | Answer a question about one grant, with citations |
//! | `GET`  | `/grants` | Stored grants, newest first (`?issuer=` filters) |
//! | `POST` | `/grants` | Ingest grant text or a grant page URL |
//! | `POST` | `/grants/upload` | Ingest a document body (PDF, DOCX, HTML, text) |
//! | `GET`  | `/grants/{id}` | Stored grant record |
//! | `GET`  | `/matches/{company_id}` | Stored match records for a company |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "text or url must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `timeout` (408),
//! `upstream_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::ask::{answer_question, AskError, AskRequest, AskResponse};
use crate::config::Config;
use crate::extract::{extract_text, MIME_TEXT};
use crate::ingest::{fetch_page_text, ingest_text, parse_http_url, IngestOutcome};
use crate::matcher::{run_match, MatchContext, MatchError};
use crate::models::{Grant, MatchRecord, MatchRequest, MatchResponse};
use crate::store::{list_grants, load_grant, load_matches};

type AppState = Arc<MatchContext>;

/// Request body cap for document uploads.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build the context from config and serve until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ctx = MatchContext::from_config(config).await?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "grant-match server listening");
    serve(listener, ctx).await
}

/// Serve the API on an already-bound listener.
pub async fn serve(listener: tokio::net::TcpListener, ctx: MatchContext) -> anyhow::Result<()> {
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

pub fn router(ctx: MatchContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/match", post(handle_match))
        .route("/ask", post(handle_ask))
        .route("/grants", get(handle_list_grants).post(handle_ingest))
        .route(
            "/grants/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/grants/{id}", get(handle_get_grant))
        .route("/matches/{company_id}", get(handle_list_matches))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(Arc::new(ctx))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

fn upstream(err: anyhow::Error) -> AppError {
    error!(error = %format!("{:#}", err), "Upstream request failed");
    AppError::new(StatusCode::BAD_GATEWAY, "upstream_error", format!("{:#}", err))
}

fn internal(err: anyhow::Error) -> AppError {
    error!(error = %format!("{:#}", err), "Request failed");
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", format!("{:#}", err))
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<MatchError> for AppError {
    fn from(err: MatchError) -> Self {
        error!(error = %err, "Match request failed");
        let (status, code) = match &err {
            MatchError::DeadlineExceeded(_) => (StatusCode::REQUEST_TIMEOUT, "timeout"),
            MatchError::Retrieval(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            MatchError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError::new(status, code, err.to_string())
    }
}

impl From<AskError> for AppError {
    fn from(err: AskError) -> Self {
        let (status, code) = match &err {
            AskError::EmptyQuestion => (StatusCode::BAD_REQUEST, "bad_request"),
            AskError::GrantNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AskError::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "timeout"),
            AskError::Completion(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            AskError::Lookup(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            error!(error = %err, "Ask request failed");
        }
        AppError::new(status, code, err.to_string())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /match ============

async fn handle_match(
    State(ctx): State<AppState>,
    payload: Result<Json<MatchRequest>, JsonRejection>,
) -> Result<Json<MatchResponse>, AppError> {
    let Json(request) = payload?;
    let response = run_match(&ctx, &request).await?;
    Ok(Json(response))
}

// ============ POST /ask ============

async fn handle_ask(
    State(ctx): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(request) = payload?;
    let response = answer_question(&ctx, &request).await?;
    Ok(Json(response))
}

// ============ GET /grants ============

#[derive(Deserialize)]
struct GrantListParams {
    #[serde(default)]
    issuer: Option<String>,
}

#[derive(Serialize)]
struct GrantListResponse {
    issuer: Option<String>,
    count: usize,
    grants: Vec<Grant>,
}

async fn handle_list_grants(
    State(ctx): State<AppState>,
    Query(params): Query<GrantListParams>,
) -> Result<Json<GrantListResponse>, AppError> {
    let issuer = params.issuer.filter(|i| !i.trim().is_empty());
    let grants = list_grants(ctx.store.as_ref(), issuer.as_deref())
        .await
        .map_err(internal)?;
    Ok(Json(GrantListResponse {
        issuer,
        count: grants.len(),
        grants,
    }))
}

// ============ POST /grants ============

/// Exactly one of `text` or `url` is expected.
#[derive(Deserialize)]
struct IngestRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

async fn handle_ingest(
    State(ctx): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestOutcome>, AppError> {
    let Json(request) = payload?;
    let text = request.text.filter(|t| !t.trim().is_empty());
    let url = request.url.filter(|u| !u.trim().is_empty());

    let text = match (text, url) {
        (Some(_), Some(_)) => return Err(bad_request("provide either text or url, not both")),
        (None, None) => return Err(bad_request("text or url must not be empty")),
        (Some(text), None) => text,
        (None, Some(url)) => {
            let url = parse_http_url(&url).map_err(|e| bad_request(format!("{:#}", e)))?;
            fetch_page_text(&url, ctx.settings.call_timeout)
                .await
                .map_err(upstream)?
        }
    };

    let outcome = ingest_text(&ctx, &text, request.title.as_deref())
        .await
        .map_err(internal)?;
    Ok(Json(outcome))
}

// ============ POST /grants/upload ============

#[derive(Deserialize)]
struct UploadParams {
    #[serde(default)]
    title: Option<String>,
}

async fn handle_upload(
    State(ctx): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestOutcome>, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(MIME_TEXT);
    let text = extract_text(&body, content_type).map_err(|e| bad_request(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(bad_request("document contains no text"));
    }

    let outcome = ingest_text(&ctx, &text, params.title.as_deref())
        .await
        .map_err(internal)?;
    Ok(Json(outcome))
}

// ============ GET /grants/{id} ============

async fn handle_get_grant(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Grant>, AppError> {
    load_grant(ctx.store.as_ref(), &id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found(format!("grant not found: {}", id)))
}

// ============ GET /matches/{company_id} ============

#[derive(Serialize)]
struct MatchListResponse {
    company_id: String,
    matches: Vec<MatchRecord>,
}

async fn handle_list_matches(
    State(ctx): State<AppState>,
    Path(company_id): Path<String>,
) -> Result<Json<MatchListResponse>, AppError> {
    let matches = load_matches(ctx.store.as_ref(), &company_id)
        .await
        .map_err(internal)?;
    Ok(Json(MatchListResponse {
        company_id,
        matches,
    }))
}
