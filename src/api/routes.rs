use crate::analyzer::{self, DEFAULT_LISTING_TITLE};
use crate::analyzer::report::ProgressReport;
use crate::backend::{self, Backend};
use crate::config::Config;
use crate::db::{Database, ExportRow};
use crate::export::{ExportArtifact, ExportControl, ExportOutcome};
use crate::model::CourseSummary;
use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

const MAX_TITLE_CHARS: usize = 200;
const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn Backend>,
    pub report_export: Arc<ExportControl>,
    pub listing_export: Arc<ExportControl>,
}

impl ApiState {
    /// Each download route owns its busy flag.
    pub fn new(config: Arc<Config>, backend: Arc<dyn Backend>) -> Self {
        Self {
            config,
            backend,
            report_export: Arc::new(ExportControl::new()),
            listing_export: Arc::new(ExportControl::new()),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/users/:user_id/summary", get(user_summary))
        .route(
            "/api/v1/users/:user_id/courses/:course_id/summary",
            get(course_summary),
        )
        .route("/api/v1/users/:user_id/report", get(user_report))
        .route(
            "/api/v1/users/:user_id/report/download",
            get(user_report_download),
        )
        .route(
            "/api/v1/admin/enrollments/download",
            get(enrollments_download),
        )
        .route("/api/v1/exports", get(export_list))
        .fallback(not_found)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ExportsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ListingQuery {
    title: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    backend: String,
    api_port: u16,
    report_export_busy: bool,
    listing_export_busy: bool,
    latest_export: Option<ExportRow>,
}

#[derive(Debug, Serialize)]
struct SummaryPayload {
    user_id: String,
    courses: Vec<CourseSummary>,
}

#[derive(Debug, Serialize)]
struct ExportsPayload {
    exports: Vec<ExportRow>,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let db_path = state.config.db_path.clone();
    let latest_export =
        run_blocking(move || Database::open(&db_path)?.latest_export()).await?;

    Ok(Json(StatusPayload {
        backend: state.backend.describe(),
        api_port: state.config.api_port,
        report_export_busy: state.report_export.is_busy(),
        listing_export_busy: state.listing_export.is_busy(),
        latest_export,
    }))
}

async fn user_summary(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<SummaryPayload>> {
    validate_user_id(&user_id)?;

    let backend = Arc::clone(&state.backend);
    let id = user_id.clone();
    let courses = run_blocking(move || analyzer::course_summaries(backend.as_ref(), &id)).await?;

    Ok(Json(SummaryPayload { user_id, courses }))
}

async fn course_summary(
    State(state): State<ApiState>,
    Path((user_id, course_id)): Path<(String, String)>,
) -> ApiResult<Json<CourseSummary>> {
    validate_user_id(&user_id)?;

    let backend = Arc::clone(&state.backend);
    let summary = run_blocking(move || {
        analyzer::course_summary(backend.as_ref(), &user_id, &course_id)
    })
    .await?;

    Ok(Json(summary))
}

async fn user_report(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ProgressReport>> {
    validate_user_id(&user_id)?;

    let backend = Arc::clone(&state.backend);
    let report = run_blocking(move || analyzer::progress_report(backend.as_ref(), &user_id)).await?;

    Ok(Json(report))
}

async fn user_report_download(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<Response> {
    validate_user_id(&user_id)?;

    let backend = Arc::clone(&state.backend);
    let outcome = state
        .report_export
        .run("progress_report", || async move {
            run_blocking(move || analyzer::export_progress_report(backend.as_ref(), &user_id))
                .await
        })
        .await;

    pdf_response(outcome)
}

async fn enrollments_download(
    State(state): State<ApiState>,
    Query(query): Query<ListingQuery>,
) -> ApiResult<Response> {
    let title = query
        .title
        .map(|title| title.trim().chars().take(MAX_TITLE_CHARS).collect::<String>())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_LISTING_TITLE.to_string());

    let backend = Arc::clone(&state.backend);
    let outcome = state
        .listing_export
        .run("enrollment_listing", || async move {
            run_blocking(move || analyzer::export_enrollment_listing(backend.as_ref(), &title))
                .await
        })
        .await;

    pdf_response(outcome)
}

async fn export_list(
    State(state): State<ApiState>,
    Query(query): Query<ExportsQuery>,
) -> ApiResult<Json<ExportsPayload>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    let db_path = state.config.db_path.clone();
    let exports = run_blocking(move || Database::open(&db_path)?.list_exports(limit)).await?;

    Ok(Json(ExportsPayload { exports }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

fn validate_user_id(user_id: &str) -> ApiResult<()> {
    backend::ensure_user_id(user_id).map_err(|error| ApiError::BadRequest(error.to_string()))
}

/// Backend reads use a blocking HTTP client, so they stay off the async workers.
async fn run_blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .context("Background task failed")?
}

fn pdf_response(outcome: ExportOutcome) -> ApiResult<Response> {
    let ExportArtifact { filename, bytes } = match outcome {
        ExportOutcome::Completed(artifact) => artifact,
        ExportOutcome::Busy => {
            return Err(ApiError::Conflict(
                "An export is already in progress".to_string(),
            ));
        }
        ExportOutcome::Failed { message } => return Err(ApiError::ExportFailed(message)),
    };

    let mut response = Response::new(bytes.into_response().into_body());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))?,
    );

    Ok(response)
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    /// Export failures carry only the user-facing notification; details are logged.
    ExportFailed(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<axum::http::header::InvalidHeaderValue> for ApiError {
    fn from(value: axum::http::header::InvalidHeaderValue) -> Self {
        Self::Internal(value.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::ExportFailed(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            ApiError::Internal(error) => {
                warn!(error = %format!("{error:#}"), "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
