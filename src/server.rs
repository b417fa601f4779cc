//! JSON HTTP backend for the report UI.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/countries` | Supported countries as `[{code, name}]` |
//! | `POST` | `/api/reports` | Generate a report for a country and date range |
//! | `GET`  | `/api/reports/{id}` | A previously generated report |
//! | `GET`  | `/api/reports/{id}/status` | Status of a report (`completed`) |
//! | `GET`  | `/api/sources` | Source adapters and their readiness |
//!
//! Generation is synchronous: `POST /api/reports` answers with the finished
//! report, including its `report_id`. The server keeps the most recent
//! reports in memory so the UI can fetch them again by id.
//!
//! `POST /api/reports` accepts the country either as a plain name or as the
//! `{code, name}` object returned by `/api/countries`:
//!
//! ```json
//! {
//!   "country": { "code": "KE", "name": "Kenya" },
//!   "date_range": { "start_date": "2024-01-01", "end_date": "2024-06-30" }
//! }
//! ```
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "unknown country: 'Atlantis'" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `timeout` (408),
//! `generation_failed` / `embedding_failed` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser UI can be
//! served from a different origin.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::Config;
use crate::country::COUNTRIES;
use crate::error::ReportError;
use crate::models::{DateRange, ReportDocument};
use crate::pipeline::ReportPipeline;
use crate::sources::{get_sources, SourceStatus};

/// Reports kept for `GET /api/reports/{id}`.
pub const MAX_STORED_REPORTS: usize = 256;

/// Finished reports by id, oldest evicted first.
#[derive(Default)]
pub struct ReportStore {
    reports: HashMap<Uuid, ReportDocument>,
    order: VecDeque<Uuid>,
}

impl ReportStore {
    pub fn insert(&mut self, doc: ReportDocument) {
        while self.order.len() >= MAX_STORED_REPORTS {
            if let Some(oldest) = self.order.pop_front() {
                self.reports.remove(&oldest);
            }
        }
        self.order.push_back(doc.report_id);
        self.reports.insert(doc.report_id, doc);
    }

    pub fn get(&self, id: &Uuid) -> Option<&ReportDocument> {
        self.reports.get(id)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ReportPipeline>,
    pub reports: Arc<RwLock<ReportStore>>,
}

impl AppState {
    pub fn new(pipeline: ReportPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            reports: Arc::new(RwLock::new(ReportStore::default())),
        }
    }

    fn config(&self) -> &Config {
        self.pipeline.config()
    }
}

/// Build the router with all routes and the CORS layer attached.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/countries", get(handle_countries))
        .route("/api/reports", post(handle_report))
        .route("/api/reports/{id}", get(handle_get_report))
        .route("/api/reports/{id}/status", get(handle_report_status))
        .route("/api/sources", get(handle_sources))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `server.bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = ReportPipeline::from_config(config)?;
    let app = router(AppState::new(pipeline));

    let bind_addr = config.server.bind.clone();
    tracing::info!(bind = %bind_addr, "report server listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
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

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
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
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(id: &str) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: format!("report not found: {}", id),
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        let message = err.to_string();
        if err.is_client_error() {
            return bad_request(message);
        }
        let status = match err {
            ReportError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            ReportError::Embedding(_)
            | ReportError::Generation(_)
            | ReportError::EmptyGeneration => StatusCode::BAD_GATEWAY,
            ReportError::InvalidDateRange { .. } | ReportError::UnknownCountry(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        AppError {
            status,
            code: err.code().to_string(),
            message,
        }
    }
}

// ============ GET /health ============

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

// ============ GET /api/countries ============

#[derive(Serialize)]
struct CountryEntry {
    code: &'static str,
    name: &'static str,
}

async fn handle_countries() -> Json<Vec<CountryEntry>> {
    Json(
        COUNTRIES
            .iter()
            .map(|c| CountryEntry {
                code: c.alpha2,
                name: c.name,
            })
            .collect(),
    )
}

// ============ GET /api/sources ============

async fn handle_sources(State(state): State<AppState>) -> Json<Vec<SourceStatus>> {
    Json(get_sources(state.config()))
}

// ============ POST /api/reports ============

/// Country as sent by the UI: a bare name, or a `{code, name}` option.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CountryField {
    Name(String),
    Choice {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl CountryField {
    /// The string handed to country lookup; names win over codes.
    fn query(&self) -> Option<&str> {
        match self {
            CountryField::Name(name) => Some(name.as_str()),
            CountryField::Choice { code, name } => name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .or(code.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReportBody {
    country: CountryField,
    date_range: DateRange,
}

async fn handle_report(
    State(state): State<AppState>,
    payload: Result<Json<ReportBody>, JsonRejection>,
) -> Result<Json<ReportDocument>, AppError> {
    let Json(body) = payload.map_err(|e| bad_request(e.body_text()))?;
    let country = body
        .country
        .query()
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| bad_request("country must not be empty"))?;

    let req = state.pipeline.resolve(country, body.date_range)?;
    let name = req.country.name;

    let timeout = Duration::from_secs(state.config().server.report_timeout_secs);
    let report = state
        .pipeline
        .generate_report_with_timeout(name, body.date_range, timeout)
        .await
        .map_err(|e| {
            tracing::warn!(country = name, code = e.code(), error = %e, "report request failed");
            AppError::from(e)
        })?;

    let doc = ReportDocument::new(name, body.date_range, report);
    state.reports.write().await.insert(doc.clone());
    tracing::info!(country = name, report_id = %doc.report_id, "report stored");
    Ok(Json(doc))
}

// ============ GET /api/reports/{id} ============

async fn stored_report(state: &AppState, id: &str) -> Result<ReportDocument, AppError> {
    let report_id = Uuid::parse_str(id).map_err(|_| not_found(id))?;
    state
        .reports
        .read()
        .await
        .get(&report_id)
        .cloned()
        .ok_or_else(|| not_found(id))
}

async fn handle_get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReportDocument>, AppError> {
    Ok(Json(stored_report(&state, &id).await?))
}

// ============ GET /api/reports/{id}/status ============

#[derive(Serialize)]
struct StatusResponse {
    report_id: Uuid,
    status: &'static str,
    progress: u8,
    current_step: &'static str,
}

async fn handle_report_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let doc = stored_report(&state, &id).await?;
    Ok(Json(StatusResponse {
        report_id: doc.report_id,
        status: "completed",
        progress: 100,
        current_step: "ready",
    }))
}
