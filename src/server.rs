//! HTTP surface for the extractor.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{ConfigError, Settings};
use crate::extract::Extractor;
use crate::service::{parse_tei, ServiceError, TeiParseRequest, TeiParseResponse};

/// Errors that stop the server.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state accessible from all handlers.
pub struct AppState {
    pub extractor: Extractor,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

async fn tei_parse(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TeiParseRequest>,
) -> Result<Json<TeiParseResponse>, ServiceError> {
    match parse_blocking(state, request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "TEI parse failed");
            Err(e)
        }
    }
}

/// Runs the extraction on tokio's blocking pool.
async fn parse_blocking(
    state: Arc<AppState>,
    request: TeiParseRequest,
) -> Result<TeiParseResponse, ServiceError> {
    tokio::task::spawn_blocking(move || parse_tei(&state.extractor, &request))
        .await
        .map_err(|e| {
            error!(error = %e, "extraction task failed");
            ServiceError::Internal(format!("Task join error: {}", e))
        })?
}

/// Builds the application router.
pub fn router(extractor: Extractor, settings: &Settings) -> Result<Router, ConfigError> {
    let origin = HeaderValue::from_str(&settings.cors_origin)
        .map_err(|_| ConfigError::InvalidCorsOrigin(settings.cors_origin.clone()))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = Arc::new(AppState { extractor });

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .route("/api/internal/tei-parse", post(tei_parse))
        .layer(DefaultBodyLimit::max(settings.max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Serves the API until Ctrl-C.
pub async fn run(settings: Settings) -> Result<(), ServerError> {
    let app = router(Extractor::new(), &settings)?;

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = TcpListener::bind((settings.host.as_str(), settings.port))
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
