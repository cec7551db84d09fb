use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::rest::authenticate;
use crate::auth;
use crate::error::AppError;
use crate::events::ServerEvent;
use crate::models::history::{HistoryEvent, NewHistoryEvent};
use crate::models::message::MessageView;
use crate::models::package::{Package, PackageStatus};
use crate::registry::NewPackage;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_package))
        .route("/my-packages", get(my_packages))
        .route("/track/:tracking", get(track_package))
        .route("/:tracking/locations", get(package_locations))
        .route("/:tracking/messages", get(package_messages))
        .route("/:tracking/status", patch(update_status))
}

#[derive(Deserialize)]
pub struct CreatePackageRequest {
    #[serde(default)]
    pub receiver_name: String,
    pub receiver_phone: Option<String>,
    #[serde(default)]
    pub receiver_address: String,
    pub description: Option<String>,
    pub weight: Option<f64>,
}

#[derive(Serialize)]
pub struct CreatePackageResponse {
    pub message: &'static str,
    pub tracking_number: String,
    pub id: i64,
}

async fn create_package(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreatePackageRequest>,
) -> Result<(StatusCode, Json<CreatePackageResponse>), AppError> {
    let actor = authenticate(&state, &headers)?;

    let package = state.registry.create(NewPackage {
        sender_id: actor.id,
        receiver_name: payload.receiver_name,
        receiver_phone: payload.receiver_phone,
        receiver_address: payload.receiver_address,
        description: payload.description,
        weight: payload.weight,
    })?;

    // Second step of the creation protocol: every package starts with a
    // "registered" history event.
    state.history.append(
        package.id,
        NewHistoryEvent {
            location_name: Some("Package registered".to_string()),
            description: Some("Package registered in the system".to_string()),
            status: Some(PackageStatus::Pending.as_str().to_string()),
            ..Default::default()
        },
    );

    state.metrics.packages_created_total.inc();
    info!(
        tracking = %package.tracking_number,
        sender = actor.id,
        "package created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatePackageResponse {
            message: "package created",
            tracking_number: package.tracking_number,
            id: package.id,
        }),
    ))
}

async fn my_packages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Package>>, AppError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(state.registry.list_by_sender(actor.id)))
}

async fn track_package(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tracking): Path<String>,
) -> Result<Json<Package>, AppError> {
    let actor = authenticate(&state, &headers)?;
    let package = state
        .registry
        .find_by_tracking(&tracking)
        .ok_or_else(|| AppError::NotFound(format!("package {tracking} not found")))?;

    if !auth::can_access(&actor, &package) {
        return Err(AppError::Forbidden);
    }

    Ok(Json(package))
}

async fn package_locations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tracking): Path<String>,
) -> Result<Json<Vec<HistoryEvent>>, AppError> {
    let actor = authenticate(&state, &headers)?;
    let package = state
        .registry
        .find_by_tracking(&tracking)
        .ok_or_else(|| AppError::NotFound(format!("package {tracking} not found")))?;

    if !auth::can_access(&actor, &package) {
        return Err(AppError::Forbidden);
    }

    Ok(Json(state.history.list_by_package(package.id)))
}

async fn package_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tracking): Path<String>,
) -> Result<Json<Vec<MessageView>>, AppError> {
    let actor = authenticate(&state, &headers)?;
    let package = state
        .registry
        .find_by_tracking(&tracking)
        .ok_or_else(|| AppError::NotFound(format!("package {tracking} not found")))?;

    if !auth::can_access(&actor, &package) {
        return Err(AppError::Forbidden);
    }

    let views = state
        .messages
        .list_by_package(package.id)
        .into_iter()
        .map(|message| {
            let sender_username = state
                .sessions
                .user(message.sender_id)
                .map(|identity| identity.username);
            MessageView {
                message,
                sender_username,
            }
        })
        .collect();

    Ok(Json(views))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Serialize)]
pub struct UpdateStatusResponse {
    pub message: &'static str,
    pub status: PackageStatus,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tracking): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<UpdateStatusResponse>, AppError> {
    let actor = authenticate(&state, &headers)?;

    if !auth::can_write_status(&actor) {
        return Err(AppError::Forbidden);
    }

    let status = PackageStatus::parse(&payload.status)
        .ok_or_else(|| AppError::InvalidStatus(payload.status.clone()))?;

    // Append-then-broadcast must appear atomic to this package's room.
    let _guard = state.locks.acquire(&tracking).await;

    let package = state
        .registry
        .transition_status(&tracking, status, actor.id)?;

    let event = state.history.append(
        package.id,
        NewHistoryEvent {
            location_name: Some(format!("Status: {status}")),
            description: Some(format!("Updated by {}", actor.display_name)),
            status: Some(status.as_str().to_string()),
            ..Default::default()
        },
    );

    // The live event carries the durable record's timestamp.
    let recipients = state.rooms.broadcast(
        &tracking,
        &ServerEvent::StatusUpdated {
            tracking: tracking.clone(),
            status,
            timestamp: event.created_at,
        },
    );
    state
        .metrics
        .events_broadcast_total
        .with_label_values(&["status"])
        .inc();

    info!(
        tracking = %tracking,
        status = %status,
        actor = actor.id,
        recipients,
        "package status updated"
    );

    Ok(Json(UpdateStatusResponse {
        message: "status updated",
        status,
    }))
}
