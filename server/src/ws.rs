use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use presence_shared::config::WorldConfig;
use presence_shared::protocol::ServerMsg;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};

use crate::person::OccupantId;
use crate::protocol::{ClientMsg, WelcomeMsg, PROTOCOL_VERSION};
use crate::registry::RoomRegistry;
use crate::room_loop::RoomEvent;
use crate::session::{Session, SessionInput};

const OCCUPANT_ID_LEN: usize = 20;

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub world: WorldConfig,
    pub connection_semaphore: Arc<Semaphore>,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    let permit = match Arc::clone(&app_state.connection_semaphore).try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!("Connection limit reached, rejecting upgrade");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, permit))
}

fn generate_occupant_id() -> OccupantId {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(OCCUPANT_ID_LEN)
        .map(char::from)
        .collect()
}

async fn handle_socket(socket: WebSocket, app_state: AppState, _permit: OwnedSemaphorePermit) {
    let (mut sink, mut stream) = socket.split();
    let mut session = Session::new(generate_occupant_id());

    tracing::info!(occupant = %session.occupant_id(), "Connected");

    let welcome = ServerMsg::Welcome(WelcomeMsg {
        protocol_version: PROTOCOL_VERSION,
        self_id: session.occupant_id().to_string(),
        world: app_state.world,
    });
    if send_msg(&mut sink, &welcome).await.is_err() {
        return;
    }

    let mut room_events: Option<broadcast::Receiver<RoomEvent>> = None;

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(client_msg) => client_msg,
                            Err(e) => {
                                tracing::warn!(occupant = %session.occupant_id(), error = %e, "Unparseable message dropped");
                                continue;
                            }
                        };
                        match SessionInput::try_from(client_msg) {
                            Ok(SessionInput::Join { room_id }) => {
                                match session.join(&app_state.registry, &room_id, app_state.world.gravity).await {
                                    Ok((snapshot, events)) => {
                                        room_events = Some(events);
                                        if send_msg(&mut sink, &ServerMsg::from(snapshot)).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        room_events = None;
                                        tracing::warn!(occupant = %session.occupant_id(), room = %room_id, error = %e, "Join failed");
                                    }
                                }
                            }
                            Ok(SessionInput::Action(action)) => {
                                if let Err(e) = session.apply(action) {
                                    tracing::warn!(occupant = %session.occupant_id(), error = %e, "Action dropped");
                                }
                            }
                            Err(e) => {
                                tracing::warn!(occupant = %session.occupant_id(), error = %e, "Message rejected");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(occupant = %session.occupant_id(), error = %e, "WebSocket error");
                        break;
                    }
                    _ => {} // Ignore ping/pong/binary
                }
            }

            // Server -> Client (room broadcast)
            result = next_room_event(&mut room_events) => {
                match result {
                    Ok(event) => {
                        if event.origin() == Some(session.occupant_id()) {
                            continue; // About us, meant for the others
                        }
                        if send_msg(&mut sink, &ServerMsg::from(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(occupant = %session.occupant_id(), skipped = n, "Room events lagged");
                        // Next people_state carries the full picture again
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        room_events = None;
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    session.leave(&app_state.registry).await;
    tracing::info!(occupant = %session.occupant_id(), "Disconnected");
}

/// Wait for the next room event, or forever when not in a room.
async fn next_room_event(
    events: &mut Option<broadcast::Receiver<RoomEvent>>,
) -> Result<RoomEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => sink.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize server message");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupant_ids_are_alphanumeric_tokens() {
        let a = generate_occupant_id();
        let b = generate_occupant_id();
        assert_eq!(a.len(), OCCUPANT_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
