pub mod packages;
pub mod ws;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::error::AppError;
use crate::models::identity::Identity;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/packages", packages::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
        .fallback_service(ServeDir::new("static"))
}

/// Resolve the request's session token to an identity. Every `/api` route
/// goes through this; the session directory itself is owned by the external
/// identity provider.
pub(crate) fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, AppError> {
    let token = headers
        .get("x-session-token")
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthenticated)?;

    state
        .sessions
        .resolve(token)
        .ok_or(AppError::Unauthenticated)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    packages: usize,
    rooms: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        packages: state.registry.len(),
        rooms: state.rooms.room_count(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
