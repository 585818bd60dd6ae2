//! HTTP API: upload endpoint plus read-only analysis views

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::data::read_table;
use crate::error::RfmError;
use crate::rfm::build_snapshot;
use crate::state::AppState;
use crate::views;

/// Upload size ceiling; transaction exports run large but bounded.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub rows: usize,
    pub customers: usize,
    pub filename: String,
}

impl IntoResponse for RfmError {
    fn into_response(self) -> Response {
        let status = match &self {
            RfmError::MissingColumns { .. }
            | RfmError::UnsupportedFormat(_)
            | RfmError::Malformed(_)
            | RfmError::EmptyDataset => StatusCode::BAD_REQUEST,
            RfmError::NoData => StatusCode::NOT_FOUND,
            RfmError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Internal details stay in the logs, not the response body.
        let detail = match &self {
            RfmError::Internal(reason) => {
                tracing::error!(%reason, "request failed");
                "internal error while processing the request".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Build the application router with CORS and request tracing applied.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/upload", post(upload_handler))
        .route("/summary", get(summary_handler))
        .route("/distribution", get(distribution_handler))
        .route("/insights", get(insights_handler))
        .route("/scatter-data", get(scatter_handler))
        .route("/export", get(export_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "message": "rfmforge API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Accept a transaction file and replace the active snapshot.
///
/// Validation and computation happen before the swap, so a failed upload
/// leaves the previous snapshot queryable.
async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, RfmError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RfmError::Malformed(e.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| RfmError::Malformed(e.to_string()))?;
            upload = Some((filename, bytes.to_vec()));
            break;
        }
    }
    let (filename, bytes) =
        upload.ok_or_else(|| RfmError::Malformed("multipart field 'file' is required".to_string()))?;

    let table = read_table(&bytes, &filename)?;
    let rows = table.rows.len();
    let snapshot = build_snapshot(&table)?;
    let customers = snapshot.customers.len();
    state.replace(snapshot);

    info!(rows, customers, filename = %filename, "dataset processed");
    Ok(Json(UploadResponse {
        message: "File uploaded and processed successfully",
        rows,
        customers,
        filename,
    }))
}

async fn summary_handler(State(state): State<AppState>) -> Result<Response, RfmError> {
    let snapshot = state.current()?;
    Ok(Json(views::summary(&snapshot)).into_response())
}

async fn distribution_handler(State(state): State<AppState>) -> Result<Response, RfmError> {
    let snapshot = state.current()?;
    Ok(Json(views::distribution(&snapshot)).into_response())
}

async fn insights_handler(State(state): State<AppState>) -> Result<Response, RfmError> {
    let snapshot = state.current()?;
    Ok(Json(views::insights(&snapshot)).into_response())
}

async fn scatter_handler(State(state): State<AppState>) -> Result<Response, RfmError> {
    let snapshot = state.current()?;
    Ok(Json(views::scatter(&snapshot)).into_response())
}

async fn export_handler(State(state): State<AppState>) -> Result<Response, RfmError> {
    let snapshot = state.current()?;
    let csv = views::export_csv(&snapshot)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"rfm_analysis_results.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}
