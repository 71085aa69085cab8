//! Per-connection handler: register, route frames, clean up.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use huddle_common::{ParticipantId, RoomId, SignalingEnvelope};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::rooms::{FrameSender, RoomRegistry};

/// Outbound buffer per connection.
const OUTBOUND_BUFFER: usize = 256;

/// Extract the participant ID from a `/ws/{participant_id}` path.
pub fn participant_from_path(path: &str) -> Option<ParticipantId> {
    let id = path.strip_prefix("/ws/")?.trim_end_matches('/');
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(ParticipantId::new(id))
}

fn not_found() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("expected /ws/{participant_id}".into()));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

/// Handle a single TCP connection from upgrade to disconnect.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, registry: RoomRegistry) {
    let mut participant = None;
    let upgrade = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        match participant_from_path(req.uri().path()) {
            Some(id) => {
                participant = Some(id);
                Ok(resp)
            }
            None => Err(not_found()),
        }
    })
    .await;
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(e) => {
            warn!(peer = %addr, error = %e, "WS handshake failed");
            return;
        }
    };
    let Some(participant) = participant else {
        return;
    };

    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let (generation, replaced) = registry.connect(&participant, tx).await;
    info!(
        peer = %addr,
        participant = %participant,
        generation,
        replaced,
        "client connected"
    );

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(frame) => {
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                None => {
                    // The registry dropped our sender: a newer connection took over.
                    info!(participant = %participant, generation, "connection replaced");
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "replaced by a newer connection".into(),
                        })))
                        .await;
                    break;
                }
            },

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    route_frame(&registry, &participant, text.as_str()).await;
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(peer = %addr, error = %e, "WS error");
                    break;
                }
                _ => {}
            },
        }
    }

    let rooms = registry.disconnect(&participant, generation).await;
    info!(
        peer = %addr,
        participant = %participant,
        rooms = rooms.len(),
        "client disconnected"
    );
    for room in rooms {
        announce_left(&registry, &room, &participant).await;
    }
}

/// Apply one inbound frame from `from`.
pub async fn route_frame(registry: &RoomRegistry, from: &ParticipantId, text: &str) {
    let envelope: SignalingEnvelope = match serde_json::from_str(text) {
        Ok(env) => env,
        Err(e) => {
            warn!(participant = %from, error = %e, "unparseable frame");
            return;
        }
    };

    match envelope {
        SignalingEnvelope::JoinRoom { room_id } => {
            let others = registry.join(&room_id, from).await;
            info!(participant = %from, room = %room_id, others = others.len(), "joined room");
            if let Some(tx) = registry.sender(from).await {
                deliver(
                    &tx,
                    &SignalingEnvelope::Participants {
                        participants: others,
                    },
                );
            }
            let joined = SignalingEnvelope::UserJoined {
                user_id: from.clone(),
                room_id: Some(room_id.clone()),
            };
            broadcast(registry, &room_id, from, &joined).await;
        }

        SignalingEnvelope::LeaveRoom { room_id } => {
            if registry.leave(&room_id, from).await {
                info!(participant = %from, room = %room_id, "left room");
                announce_left(registry, &room_id, from).await;
            }
        }

        env @ (SignalingEnvelope::WebrtcOffer { .. }
        | SignalingEnvelope::WebrtcAnswer { .. }
        | SignalingEnvelope::IceCandidate { .. }) => {
            let kind = env.kind();
            let Some(target) = env.target().cloned() else {
                warn!(participant = %from, kind, "negotiation message without target_user");
                return;
            };
            match registry.sender(&target).await {
                Some(tx) => {
                    debug!(from = %from, to = %target, kind, "forwarding");
                    deliver(&tx, &env.with_sender(from.clone()));
                }
                None => debug!(from = %from, to = %target, kind, "target not connected, dropped"),
            }
        }

        SignalingEnvelope::ChatMessage {
            room_id,
            text,
            timestamp,
            ..
        } => {
            let chat = SignalingEnvelope::ChatMessage {
                room_id: room_id.clone(),
                text,
                timestamp,
                from_user: Some(from.clone()),
            };
            broadcast(registry, &room_id, from, &chat).await;
        }

        other => debug!(participant = %from, kind = other.kind(), "ignoring frame"),
    }
}

async fn announce_left(registry: &RoomRegistry, room: &RoomId, participant: &ParticipantId) {
    let left = SignalingEnvelope::UserLeft {
        user_id: participant.clone(),
        room_id: Some(room.clone()),
    };
    broadcast(registry, room, participant, &left).await;
}

async fn broadcast(
    registry: &RoomRegistry,
    room: &RoomId,
    exclude: &ParticipantId,
    envelope: &SignalingEnvelope,
) {
    for tx in registry.room_senders(room, exclude).await {
        deliver(&tx, envelope);
    }
}

/// Queue a frame without waiting on the receiving connection.
fn deliver(tx: &FrameSender, envelope: &SignalingEnvelope) {
    let frame = match serde_json::to_string(envelope) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(kind = envelope.kind(), error = %e, "failed to encode frame");
            return;
        }
    };
    match tx.try_send(frame) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!(kind = envelope.kind(), "client outbound buffer full, frame dropped");
        }
        Err(TrySendError::Closed(_)) => {
            debug!(kind = envelope.kind(), "client gone, frame dropped");
        }
    }
}
