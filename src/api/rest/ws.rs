use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth;
use crate::error::AppError;
use crate::events::{ClientEvent, LocationUpdate, MessageSend, ServerEvent};
use crate::models::history::NewHistoryEvent;
use crate::models::identity::Identity;
use crate::models::message::MessageKind;
use crate::rooms::{ConnectionId, EventSender};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    pub session: Option<String>,
}

/// Identity is resolved once at the handshake and carried for the life of the
/// connection; unauthenticated upgrades are rejected here, not per-message.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let identity = query
        .session
        .as_deref()
        .and_then(|token| state.sessions.resolve(token));

    let Some(identity) = identity else {
        return AppError::Unauthenticated.into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, identity: Identity) {
    let conn_id = Uuid::new_v4();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerEvent>();

    state.metrics.connections_active.inc();
    info!(connection = %conn_id, user = identity.id, "websocket client connected");

    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize outbound event");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = {
        let state = state.clone();
        let identity = identity.clone();
        let outbound_tx = outbound_tx.clone();

        tokio::spawn(async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            handle_client_event(&state, conn_id, &identity, &outbound_tx, event)
                                .await;
                        }
                        Err(err) => {
                            warn!(connection = %conn_id, error = %err, "unparseable client event");
                            let _ = outbound_tx.send(ServerEvent::error("unrecognized event"));
                        }
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        })
    };

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    // Exactly once per disconnect; the broker cannot see the socket close.
    state.rooms.leave_all(conn_id);
    state.metrics.connections_active.dec();
    state
        .metrics
        .rooms_active
        .set(state.rooms.room_count() as i64);

    info!(connection = %conn_id, user = identity.id, "websocket client disconnected");
}

/// Dispatch one inbound command. Failures never terminate the connection;
/// they are reported as an `error` event to the originating connection only.
pub async fn handle_client_event(
    state: &AppState,
    conn_id: ConnectionId,
    actor: &Identity,
    outbound: &EventSender,
    event: ClientEvent,
) {
    let result = match event {
        ClientEvent::TrackJoin(tracking) => {
            state.rooms.join(conn_id, outbound.clone(), &tracking);
            state
                .metrics
                .rooms_active
                .set(state.rooms.room_count() as i64);
            Ok(())
        }
        ClientEvent::TrackLeave(tracking) => {
            state.rooms.leave(conn_id, &tracking);
            state
                .metrics
                .rooms_active
                .set(state.rooms.room_count() as i64);
            Ok(())
        }
        ClientEvent::LocationUpdate(update) => publish_location(state, actor, update).await,
        ClientEvent::MessageSend(send) => publish_message(state, actor, send).await,
    };

    if let Err(err) = result {
        warn!(
            connection = %conn_id,
            user = actor.id,
            error = %err,
            "realtime command failed"
        );
        let _ = outbound.send(ServerEvent::error(err.public_message()));
    }
}

async fn publish_location(
    state: &AppState,
    actor: &Identity,
    update: LocationUpdate,
) -> Result<(), AppError> {
    let package = state
        .registry
        .find_by_tracking(&update.tracking)
        .ok_or_else(|| AppError::NotFound(format!("package {} not found", update.tracking)))?;

    if !auth::can_publish_location(actor, &package) {
        return Err(AppError::Forbidden);
    }

    if update.latitude.is_some() != update.longitude.is_some() {
        return Err(AppError::Validation(
            "latitude and longitude must both be present or both absent".to_string(),
        ));
    }

    let _guard = state.locks.acquire(&update.tracking).await;

    let event = state.history.append(
        package.id,
        NewHistoryEvent {
            latitude: update.latitude,
            longitude: update.longitude,
            location_name: update.location_name.clone(),
            description: update.description.clone(),
            status: update.status.clone(),
        },
    );

    let broadcast_event = ServerEvent::LocationUpdated {
        tracking: update.tracking.clone(),
        latitude: update.latitude,
        longitude: update.longitude,
        location_name: update.location_name,
        description: update.description,
        status: update.status,
        timestamp: event.created_at,
    };
    state.rooms.broadcast(&update.tracking, &broadcast_event);
    state
        .metrics
        .events_broadcast_total
        .with_label_values(&["location"])
        .inc();

    Ok(())
}

async fn publish_message(
    state: &AppState,
    actor: &Identity,
    send: MessageSend,
) -> Result<(), AppError> {
    let package = state
        .registry
        .find_by_tracking(&send.tracking)
        .ok_or_else(|| AppError::NotFound(format!("package {} not found", send.tracking)))?;

    // Chat is between the two parties: the courier talks to the sender and
    // everyone else talks to the courier.
    let receiver_id = if package.courier_id == Some(actor.id) {
        Some(package.sender_id)
    } else {
        package.courier_id
    };

    let _guard = state.locks.acquire(&send.tracking).await;

    let message = state.messages.append(
        package.id,
        actor.id,
        receiver_id,
        send.message,
        MessageKind::Chat,
    );

    let broadcast_event = ServerEvent::MessageReceived {
        id: message.id,
        tracking: send.tracking.clone(),
        sender_id: actor.id,
        message: message.message.clone(),
        timestamp: message.created_at,
    };
    state.rooms.broadcast(&send.tracking, &broadcast_event);
    state
        .metrics
        .events_broadcast_total
        .with_label_values(&["message"])
        .inc();

    Ok(())
}
