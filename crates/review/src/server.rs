//! HTTP server receiving Gitee webhooks.
//!
//! Endpoints:
//! - `POST /gitee-hook` for `Merge Request Hook` and `Note Hook` deliveries
//! - `GET /health` for liveness checks

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::bot::Robot;
use crate::events::{NoteEvent, PullRequestEvent};

const EVENT_HEADER: &str = "X-Gitee-Event";
const TOKEN_HEADER: &str = "X-Gitee-Token";

const PULL_REQUEST_HOOK: &str = "Merge Request Hook";
const NOTE_HOOK: &str = "Note Hook";

/// Server state shared across handlers.
pub struct ServerState {
    pub robot: Robot,
    /// Expected value of the `X-Gitee-Token` header.
    pub webhook_secret: String,
}

/// Build the HTTP router.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/gitee-hook", post(webhook_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// # Errors
///
/// Returns an error if the server fails to bind or serve.
pub async fn run_server(state: Arc<ServerState>, addr: &str) -> Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Review bot listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn is_authorized(headers: &HeaderMap, secret: &str) -> bool {
    header(headers, TOKEN_HEADER)
        .as_bytes()
        .ct_eq(secret.as_bytes())
        .into()
}

async fn webhook_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if !is_authorized(&headers, &state.webhook_secret) {
        warn!("Rejected webhook with invalid token");
        return (StatusCode::UNAUTHORIZED, "invalid token");
    }

    match header(&headers, EVENT_HEADER) {
        PULL_REQUEST_HOOK => {
            let event: PullRequestEvent = match serde_json::from_slice(&body) {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "Invalid pull request payload");
                    return (StatusCode::BAD_REQUEST, "invalid payload");
                }
            };

            tokio::spawn(async move {
                if let Err(e) = state.robot.handle_pr_event(&event).await {
                    error!(
                        org = %event.repository.namespace,
                        repo = %event.repository.path,
                        number = event.pull_request.number,
                        error = %e,
                        "Failed to handle pull request event"
                    );
                }
            });
        }
        NOTE_HOOK => {
            let event: NoteEvent = match serde_json::from_slice(&body) {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "Invalid note payload");
                    return (StatusCode::BAD_REQUEST, "invalid payload");
                }
            };

            tokio::spawn(async move {
                if let Err(e) = state.robot.handle_note_event(&event).await {
                    error!(
                        org = %event.repository.namespace,
                        repo = %event.repository.path,
                        error = %e,
                        "Failed to handle note event"
                    );
                }
            });
        }
        other => {
            debug!(event = other, "Ignoring unsupported webhook event");
            return (StatusCode::OK, "ignored");
        }
    }

    (StatusCode::ACCEPTED, "accepted")
}
