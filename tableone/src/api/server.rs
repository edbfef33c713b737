//! HTTP Server for the tableone API.
//!
//! Provides REST endpoints to summarize an uploaded CSV into a table.
//!
//! # API Endpoints
//!
//! | Method | Path                  | Description                          |
//! |--------|-----------------------|--------------------------------------|
//! | GET    | `/health`             | Health check                         |
//! | POST   | `/api/summarize`      | Upload CSV (+ config) and summarize  |
//! | GET    | `/api/example-config` | Example table configuration          |
//! | GET    | `/api/logs`           | SSE stream for real-time logs        |

use axum::{
    extract::Multipart,
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, SummarizeResponse};
use crate::config::{example_config, TableConfig, Theme};
use crate::error::{ServerError, ServerResult, TableError};
use crate::table::{render, Format};
use crate::themes::ThemeRegistry;
use crate::transform::pipeline::build_table_bytes;

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Table(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ServerError::Table(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        log_error(self.to_string());
        (self.status_code(), Json(error_response(&self.to_string()))).into_response()
    }
}

/// Application routes
pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/summarize", post(summarize_csv))
        .route("/api/example-config", get(example))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    eprintln!("🚀 tableone server running on http://localhost:{}", port);
    eprintln!("   POST /api/summarize      - Upload CSV and build a table");
    eprintln!("   GET  /api/example-config - Example configuration");
    eprintln!("   GET  /api/logs           - SSE log stream");
    eprintln!("   GET  /health             - Health check");
    eprintln!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "tableone",
        "version": env!("CARGO_PKG_VERSION"),
        "formats": Format::ALL.iter().map(|f| f.name()).collect::<Vec<_>>(),
        "endpoints": {
            "summarize": "POST /api/summarize",
            "exampleConfig": "GET /api/example-config",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn example() -> Json<TableConfig> {
    Json(example_config())
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Fields of a summarize request
#[derive(Debug, Default)]
struct SummarizeRequest {
    file_name: Option<String>,
    file: Option<Vec<u8>>,
    config: Option<String>,
    theme: Option<String>,
    format: Option<String>,
}

async fn read_request(mut multipart: Multipart) -> ServerResult<SummarizeRequest> {
    let mut request = SummarizeRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            request.file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            request.file = Some(bytes.to_vec());
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error in '{}': {}", name, e)))?;
        let text = Some(text).filter(|t| !t.trim().is_empty());
        match name.as_str() {
            "config" => request.config = text,
            "theme" => request.theme = text,
            "format" => request.format = text,
            other => return Err(ServerError::BadRequest(format!("Unknown field '{}'", other))),
        }
    }

    Ok(request)
}

/// Summarize endpoint
async fn summarize_csv(multipart: Multipart) -> ServerResult<Json<SummarizeResponse>> {
    let request = read_request(multipart).await?;
    let bytes = request
        .file
        .ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;

    log_info(format!(
        "📄 New upload: {} ({} bytes)",
        request.file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let format: Format = match request.format {
        Some(ref f) => f.parse::<Format>().map_err(TableError::from)?,
        None => Format::Html,
    };
    let config = match request.config {
        Some(ref json) => TableConfig::from_json(json).map_err(TableError::from)?,
        None => TableConfig::default(),
    };
    let theme_id = request.theme;

    // Aggregation is CPU bound and the registry touches the disk.
    let response = tokio::task::spawn_blocking(move || -> Result<SummarizeResponse, TableError> {
        let theme = match theme_id {
            Some(ref id) => ThemeRegistry::new().touch(id)?,
            None => Theme::default(),
        };
        let result = build_table_bytes(&bytes, &config, &theme)?;
        let rendered = render(&result.table, format)?;
        Ok(SummarizeResponse::new(result, format, rendered))
    })
    .await
    .map_err(|e| ServerError::Internal(format!("Worker failed: {}", e)))??;

    Ok(Json(response))
}
