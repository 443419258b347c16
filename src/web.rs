//! HTTP surface for the order bridge.
//!
//! Routes nest under `/api/v1` and answer with a small JSON envelope,
//! except the CSV export which streams its body.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tower_http::cors::CorsLayer;

use crate::error::BridgeError;
use crate::export::{run_export, ExportQuery};
use crate::fulfilment::FulfilmentApi;
use crate::import;
use crate::models::ImportRowOutcome;

/// Uploaded order exports can get large; allow up to 50 MB.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<FulfilmentApi>,
    pub fulfilment_client_id: u32,
}

/// API response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T, message: &str) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.to_string()),
            error: None,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = match &self {
            BridgeError::Validation(_) => StatusCode::BAD_REQUEST,
            BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
            BridgeError::Upstream { .. } | BridgeError::Network(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("Request failed: {self}");
        } else {
            log::warn!("Request rejected: {self}");
        }

        let body = Json(ApiResponse::<()> {
            success: false,
            data: None,
            message: None,
            error: Some(self.to_string()),
        });
        (status, body).into_response()
    }
}

/// GET / - liveness probe
async fn root_handler() -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        success: true,
        data: None,
        message: Some("server running".to_string()),
        error: None,
    })
}

/// POST /api/v1/order/create-order
///
/// Accepts a multipart upload with a single `file` field, spools it to a
/// temp file and runs the import pipeline. The temp file is removed on
/// every exit path when the handle drops.
async fn create_order_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Vec<ImportRowOutcome>>>, BridgeError> {
    let mut upload: Option<NamedTempFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BridgeError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| BridgeError::Validation(format!("Failed to read upload: {e}")))?;

        let mut file = NamedTempFile::new()?;
        file.write_all(&data)?;
        file.flush()?;
        upload = Some(file);
        break;
    }

    let upload =
        upload.ok_or_else(|| BridgeError::Validation("No CSV file uploaded".to_string()))?;

    let outcomes =
        import::run_import(&state.api, upload.path(), state.fulfilment_client_id).await?;

    Ok(Json(ApiResponse::ok(
        outcomes,
        "CSV parsed & pushed successfully",
    )))
}

/// GET /api/v1/order/get-orders - pass-through listing
async fn get_orders_handler(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<ApiResponse<Value>>, BridgeError> {
    let params: Vec<(String, String)> = params.into_iter().collect();
    let page = state.api.fetch_orders_page(&params).await?;
    Ok(Json(ApiResponse::ok(page.body, "Orders fetched successfully")))
}

/// GET /api/v1/order/export-completed
///
/// Streams the filtered order listing as a CSV attachment. Once the
/// headers go out the body is best-effort: a mid-export failure truncates
/// the stream instead of producing an error response.
async fn export_completed_handler(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Response, BridgeError> {
    let query = ExportQuery::from_params(&params)?;

    let (tx, rx) = mpsc::channel::<Vec<u8>>(32);
    let api = Arc::clone(&state.api);
    tokio::spawn(async move {
        run_export(&api, &query, tx).await;
    });

    let stream = ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>);
    let filename = format!("orders-completed-{}.csv", Utc::now().format("%Y-%m-%d"));

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(Body::from_stream(stream))
        .unwrap())
}

/// GET /api/v1/product/get-products - pass-through listing
async fn get_products_handler(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<ApiResponse<Value>>, BridgeError> {
    let params: Vec<(String, String)> = params.into_iter().collect();
    let body = state.api.list_products(&params).await?;
    Ok(Json(ApiResponse::ok(body, "Products fetched successfully")))
}

/// Build the web server router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/v1/order/create-order", post(create_order_handler))
        .route("/api/v1/order/get-orders", get(get_orders_handler))
        .route("/api/v1/order/export-completed", get(export_completed_handler))
        .route("/api/v1/product/get-products", get(get_products_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server (async)
pub async fn serve(
    api: Arc<FulfilmentApi>,
    fulfilment_client_id: u32,
    port: u16,
) -> std::io::Result<()> {
    let app = create_router(AppState {
        api,
        fulfilment_client_id,
    });
    let addr = format!("0.0.0.0:{port}");

    log::info!("Order bridge listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
    }
}
