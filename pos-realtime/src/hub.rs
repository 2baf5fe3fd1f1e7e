//! The real-time hub's WebSocket handler: authenticates the connection,
//! joins it to its restaurant and user rooms, and pumps messages in both
//! directions until it closes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::response::Response;
use serde::Deserialize;
use tokio::time::timeout;
use tracing::{info, warn};

use pos_rate_limit::{ConnectionLimiter, RateLimiter};
use pos_security::introspection::IdentityVerifier;
use pos_security::tenant::TenantContext;

use crate::close::HubCloseCode;
use crate::connection::{
    self, backlog_within_limit, frame_within_limit, next_connection_id, ConnectionRegistry,
};
use crate::rooms::{restaurant_room, user_room, RoomMessage, WsRooms};
use crate::topics::ConnectionType;

pub struct HubState {
    pub rooms: WsRooms,
    pub identity_verifier: Arc<IdentityVerifier>,
    pub platform_owner_allowlist: Vec<String>,
    pub message_rate_limiter: RateLimiter<u64>,
    pub user_connections: ConnectionLimiter<String>,
    pub ip_connections: ConnectionLimiter<SocketAddr>,
    pub connection_registry: ConnectionRegistry,
}

impl HubState {
    pub fn new(identity_verifier: Arc<IdentityVerifier>, platform_owner_allowlist: Vec<String>) -> Self {
        Self {
            rooms: WsRooms::new(256),
            identity_verifier,
            platform_owner_allowlist,
            // 20 messages/sec per connection, full burst of 20 available up front.
            message_rate_limiter: RateLimiter::new(20.0, 20.0),
            user_connections: ConnectionLimiter::new(5),
            ip_connections: ConnectionLimiter::new(20),
            connection_registry: ConnectionRegistry::new(),
        }
    }
}

#[derive(Deserialize)]
struct AuthFrame {
    #[serde(rename = "type")]
    kind: String,
    token: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(hub): State<Arc<HubState>>,
) -> Response {
    let connection_type = params
        .get("connection_type")
        .and_then(|v| ConnectionType::from_query_param(v));
    ws.on_upgrade(move |socket| handle_socket(socket, hub, addr, connection_type))
}

async fn close_with(socket: &mut WebSocket, code: HubCloseCode) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: code.code(),
            reason: code.reason().into(),
        })))
        .await;
}

async fn handle_socket(
    mut socket: WebSocket,
    hub: Arc<HubState>,
    addr: SocketAddr,
    connection_type: Option<ConnectionType>,
) {
    let Some(connection_type) = connection_type else {
        close_with(&mut socket, HubCloseCode::Protocol).await;
        return;
    };

    let auth_frame = match timeout(connection::AUTH_TIMEOUT, socket.recv()).await {
        Ok(Some(Ok(Message::Text(text)))) => serde_json::from_str::<AuthFrame>(&text).ok(),
        _ => None,
    };

    let Some(auth_frame) = auth_frame.filter(|f| f.kind == "auth") else {
        close_with(&mut socket, HubCloseCode::Unauthenticated).await;
        return;
    };

    let introspection = match hub.identity_verifier.verify(&auth_frame.token).await {
        Ok(result) => result,
        Err(_) => {
            close_with(&mut socket, HubCloseCode::Unauthenticated).await;
            return;
        }
    };

    if !introspection.active {
        close_with(&mut socket, HubCloseCode::Unauthenticated).await;
        return;
    }

    let user = pos_security::identity::AuthenticatedUser::from(introspection);
    let tenant = match TenantContext::from_identity(&user, &hub.platform_owner_allowlist) {
        Ok(ctx) => ctx,
        Err(_) => {
            close_with(&mut socket, HubCloseCode::Unauthenticated).await;
            return;
        }
    };

    if !connection_type.allowed_for_roles(&tenant.roles) {
        close_with(&mut socket, HubCloseCode::Forbidden).await;
        return;
    }

    let Some(_ip_guard) = hub.ip_connections.try_acquire(addr) else {
        close_with(&mut socket, HubCloseCode::TooManyConnections).await;
        return;
    };
    let Some(_user_guard) = hub.user_connections.try_acquire(tenant.user_id.clone()) else {
        close_with(&mut socket, HubCloseCode::TooManyConnections).await;
        return;
    };

    let connection_id = next_connection_id();
    hub.connection_registry.register(&tenant.user_id, connection_id);

    let restaurant_broadcaster = hub.rooms.room(&restaurant_room(&tenant.tenant_id));
    let user_broadcaster = hub.rooms.room(&user_room(&tenant.user_id));
    let mut restaurant_rx = restaurant_broadcaster.subscribe();
    let mut user_rx = user_broadcaster.subscribe();

    info!(
        user_id = %tenant.user_id,
        tenant_id = %tenant.tenant_id,
        connection_id,
        ?connection_type,
        "websocket connection established"
    );

    let mut ping_interval = tokio::time::interval(connection::PING_INTERVAL);
    ping_interval.tick().await; // first tick fires immediately; skip it
    let mut last_pong = Instant::now();

    let mut outbound_backlog_bytes: usize = 0;
    let close_code;

    'pump: loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if !frame_within_limit(text.len()) {
                            close_code = HubCloseCode::Protocol;
                            break 'pump;
                        }
                        if !hub.message_rate_limiter.try_consume(&connection_id, 1.0) {
                            close_code = HubCloseCode::RateLimited;
                            break 'pump;
                        }
                        // The hub is fan-out only today; inbound application
                        // frames beyond auth/pong are accepted and ignored.
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        close_code = HubCloseCode::Protocol;
                        break 'pump;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => {
                        close_code = HubCloseCode::Protocol;
                        break 'pump;
                    }
                }
            }
            room_msg = restaurant_rx.recv() => {
                if !relevant_to(connection_type, &room_msg) {
                    continue;
                }
                if let Some((msg, len)) = room_msg_to_outbound(room_msg, outbound_backlog_bytes) {
                    outbound_backlog_bytes += len;
                    let sent = socket.send(msg).await;
                    outbound_backlog_bytes = outbound_backlog_bytes.saturating_sub(len);
                    if sent.is_err() {
                        close_code = HubCloseCode::Protocol;
                        break 'pump;
                    }
                } else {
                    close_code = HubCloseCode::Protocol;
                    break 'pump;
                }
            }
            room_msg = user_rx.recv() => {
                if let Some((msg, len)) = room_msg_to_outbound(room_msg, outbound_backlog_bytes) {
                    outbound_backlog_bytes += len;
                    let sent = socket.send(msg).await;
                    outbound_backlog_bytes = outbound_backlog_bytes.saturating_sub(len);
                    if sent.is_err() {
                        close_code = HubCloseCode::Protocol;
                        break 'pump;
                    }
                } else {
                    close_code = HubCloseCode::Protocol;
                    break 'pump;
                }
            }
            _ = ping_interval.tick() => {
                if last_pong.elapsed() > 2 * connection::PING_INTERVAL {
                    close_code = HubCloseCode::Idle;
                    break 'pump;
                }
                if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
                    close_code = HubCloseCode::Protocol;
                    break 'pump;
                }
            }
        }
    }

    close_with(&mut socket, close_code).await;
    let user_now_empty = hub.connection_registry.unregister(&tenant.user_id, connection_id);
    if user_now_empty {
        hub.rooms.evict_if_empty(&user_room(&tenant.user_id));
    }
    hub.rooms.evict_if_empty(&restaurant_room(&tenant.tenant_id));
    warn!(user_id = %tenant.user_id, connection_id, code = close_code.code(), "websocket connection closed");
}

fn relevant_to(
    connection_type: ConnectionType,
    room_msg: &Result<Arc<RoomMessage>, tokio::sync::broadcast::error::RecvError>,
) -> bool {
    match room_msg {
        Ok(msg) => connection_type.subscribes_to(&msg.topic),
        Err(_) => true,
    }
}

/// Translates a room broadcast into an outgoing frame and its byte length.
/// Returns `None` (and lets the caller treat it as fatal) on a lagged
/// receiver or if sending it would push the outbound backlog over the byte
/// ceiling — both mean this connection can't keep up.
fn room_msg_to_outbound(
    room_msg: Result<Arc<RoomMessage>, tokio::sync::broadcast::error::RecvError>,
    current_backlog_bytes: usize,
) -> Option<(Message, usize)> {
    let msg = room_msg.ok()?;
    let serialized = serde_json::to_string(&*msg).ok()?;
    let len = serialized.len();
    if !backlog_within_limit(current_backlog_bytes + len) {
        return None;
    }
    Some((Message::Text(serialized.into()), len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::RoomMessage;
    use tokio::sync::broadcast::error::RecvError;

    #[test]
    fn lagged_receiver_is_treated_as_fatal() {
        let result: Result<Arc<RoomMessage>, RecvError> = Err(RecvError::Lagged(5));
        assert!(room_msg_to_outbound(result, 0).is_none());
    }

    #[test]
    fn ok_message_serializes_to_a_text_frame() {
        let msg = Arc::new(RoomMessage {
            topic: "order.status".into(),
            payload: serde_json::json!({"order_id": "o1"}),
        });
        let outbound = room_msg_to_outbound(Ok(msg), 0);
        assert!(matches!(outbound, Some((Message::Text(_), _))));
    }

    #[test]
    fn backlog_over_ceiling_is_rejected() {
        let msg = Arc::new(RoomMessage {
            topic: "order.status".into(),
            payload: serde_json::json!({}),
        });
        let outbound = room_msg_to_outbound(Ok(msg), connection::MAX_OUTBOUND_BACKLOG_BYTES);
        assert!(outbound.is_none());
    }

    #[test]
    fn kitchen_connection_filters_out_payment_topics() {
        let msg: Result<Arc<RoomMessage>, RecvError> = Ok(Arc::new(RoomMessage {
            topic: "payment.status".into(),
            payload: serde_json::json!({}),
        }));
        assert!(!relevant_to(ConnectionType::Kitchen, &msg));
    }
}
