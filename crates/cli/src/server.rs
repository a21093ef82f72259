//! HTTP answering service.
//!
//! Routes:
//! - `GET /`, `GET /health`: liveness
//! - `POST /v1/run`: answer `questions` about the document at `documents`
//!
//! `/v1` routes require `Authorization: Bearer <token>`.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use policyqa_core::{AppError, AppResult};
use policyqa_knowledge::{Answer, Pipeline};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    token: Arc<str>,
    /// Held while the on-disk index is rebuilt
    rebuild_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, token: impl Into<String>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            token: Arc::from(token.into()),
            rebuild_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    /// Document URL or path
    pub documents: String,
    pub questions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub answers: Vec<Answer>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

/// [`AppError`] rendered as an HTTP response.
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.0.to_string();

        if status.is_server_error() {
            error!(error = %message, status = status.as_u16(), "Server error");
        } else {
            warn!(error = %message, status = status.as_u16(), "Client error");
        }

        let mut response = (status, Json(ErrorResponse { detail: message })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/v1/run", post(run))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl+C or SIGTERM.
pub async fn serve(addr: &str, state: AppState) -> AppResult<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[instrument(skip_all, fields(document = %request.documents, questions = request.questions.len()))]
async fn run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let index = {
        let _guard = state.rebuild_lock.lock().await;
        state.pipeline.build_index(&request.documents).await?
    };

    let answers = state
        .pipeline
        .answer_all_queries(&request.questions, &index)
        .await?;

    info!("Answered {} questions", answers.len());
    Ok(Json(RunResponse { answers }))
}

async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    check_bearer(request.headers(), &state.token)?;
    Ok(next.run(request).await)
}

fn check_bearer(headers: &HeaderMap, expected: &str) -> AppResult<()> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let token = value.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized("Authorization header must use the Bearer scheme".to_string())
    })?;

    if token != expected {
        return Err(AppError::Forbidden("Invalid bearer token".to_string()));
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
