//! Background WebSocket connection loop with bounded auto-reconnect.

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use huddle_common::{ParticipantId, RoomId, SignalingEnvelope, TransportError};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::types::{ConnectionState, TransportConfig, TransportEvent};

/// Close reason sent when the local side hangs up on purpose.
pub(crate) const CLIENT_LEAVING: &str = "client leaving";

/// How one open connection ended.
enum SessionEnd {
    /// Local teardown requested.
    Cancelled,
    /// The relay closed with a normal close code.
    ClosedByPeer,
    /// Anything else; eligible for retry.
    Lost(String),
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

pub(crate) struct LoopContext {
    pub(crate) config: TransportConfig,
    pub(crate) participant: ParticipantId,
    pub(crate) room_id: RoomId,
    pub(crate) state_tx: watch::Sender<ConnectionState>,
    pub(crate) event_tx: mpsc::Sender<TransportEvent>,
    pub(crate) outbound_rx: mpsc::UnboundedReceiver<SignalingEnvelope>,
    pub(crate) cancel: CancellationToken,
}

/// Background task owning the socket. Exits on deliberate close, on a
/// normal close from the relay, or once the retry ceiling is exhausted.
pub(crate) async fn connection_loop(mut ctx: LoopContext) {
    let url = ctx.config.endpoint(&ctx.participant);
    let mut retries: u32 = 0;
    let mut outbox_closed = false;

    loop {
        info!(url = %url, attempt = retries + 1, "connecting to signaling relay");

        let connect = tokio::time::timeout(
            ctx.config.connect_timeout,
            tokio_tungstenite::connect_async(url.as_str()),
        );
        let outcome = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            outcome = connect => outcome,
        };

        let failure = match outcome {
            Ok(Ok((ws_stream, _))) => {
                retries = 0;
                discard_stale(&mut ctx.outbound_rx);

                let (mut ws_write, mut ws_read) = ws_stream.split();
                let join = SignalingEnvelope::JoinRoom {
                    room_id: ctx.room_id.clone(),
                };
                if let Err(e) = send_envelope(&mut ws_write, &join).await {
                    warn!(error = %e, "failed to send join_room");
                    TransportError::AbnormalClose(e.to_string())
                } else {
                    info!(room = %ctx.room_id, "signaling open, join_room sent");
                    ctx.state_tx.send_replace(ConnectionState::Open);
                    let _ = ctx.event_tx.send(TransportEvent::Opened).await;

                    let end = run_open_session(
                        &mut ws_write,
                        &mut ws_read,
                        &mut ctx,
                        &mut outbox_closed,
                    )
                    .await;

                    match end {
                        SessionEnd::Cancelled => {
                            ctx.state_tx.send_replace(ConnectionState::Closed);
                            close_gracefully(&mut ws_write, &mut ctx.outbound_rx).await;
                            break;
                        }
                        SessionEnd::ClosedByPeer => {
                            info!("relay closed the connection normally");
                            ctx.state_tx.send_replace(ConnectionState::Closed);
                            let _ = ctx
                                .event_tx
                                .send(TransportEvent::Disconnected {
                                    reason: "closed by relay".into(),
                                })
                                .await;
                            break;
                        }
                        SessionEnd::Lost(reason) => {
                            warn!(reason = %reason, "signaling connection lost");
                            ctx.state_tx.send_replace(ConnectionState::Reconnecting);
                            let _ = ctx
                                .event_tx
                                .send(TransportEvent::Disconnected {
                                    reason: reason.clone(),
                                })
                                .await;
                            TransportError::AbnormalClose(reason)
                        }
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "failed to connect to signaling relay");
                TransportError::Connect(e.to_string())
            }
            Err(_elapsed) => {
                let secs = ctx.config.connect_timeout.as_secs();
                warn!(timeout_secs = secs, "signaling connect timed out");
                TransportError::Timeout(secs)
            }
        };

        if retries >= ctx.config.max_reconnect_attempts {
            error!(
                attempts = retries,
                last_error = %failure,
                "reconnect attempts exhausted, giving up"
            );
            ctx.state_tx.send_replace(ConnectionState::Failed);
            let _ = ctx
                .event_tx
                .send(TransportEvent::Failed(TransportError::RetriesExhausted {
                    attempts: retries,
                }))
                .await;
            return;
        }

        retries += 1;
        let delay = ctx.config.backoff_delay(retries);
        info!(
            attempt = retries,
            max_attempts = ctx.config.max_reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "reconnecting to signaling relay"
        );
        ctx.state_tx.send_replace(ConnectionState::Reconnecting);
        let _ = ctx
            .event_tx
            .send(TransportEvent::Reconnecting {
                attempt: retries,
                delay,
            })
            .await;

        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    ctx.state_tx.send_replace(ConnectionState::Closed);
    let _ = ctx.event_tx.send(TransportEvent::Closed).await;
    info!("signaling transport closed");
}

// ---------------------------------------------------------------------------
// Open Session
// ---------------------------------------------------------------------------

async fn run_open_session<W, R>(
    ws_write: &mut W,
    ws_read: &mut R,
    ctx: &mut LoopContext,
    outbox_closed: &mut bool,
) -> SessionEnd
where
    W: Sink<WsMessage, Error = WsError> + Unpin,
    R: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => return SessionEnd::Cancelled,

            outbound = ctx.outbound_rx.recv(), if !*outbox_closed => match outbound {
                Some(envelope) => {
                    if let Err(e) = send_envelope(ws_write, &envelope).await {
                        return SessionEnd::Lost(e.to_string());
                    }
                }
                None => *outbox_closed = true,
            },

            frame = ws_read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<SignalingEnvelope>(&text) {
                        Ok(SignalingEnvelope::Unknown) => {
                            debug!(text = %text, "ignoring unknown signaling message");
                        }
                        Ok(envelope) => {
                            let _ = ctx.event_tx.send(TransportEvent::Message(envelope)).await;
                        }
                        Err(e) => {
                            debug!(error = %e, "unparseable signaling frame");
                        }
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    return match frame {
                        Some(f) if f.code == CloseCode::Normal => SessionEnd::ClosedByPeer,
                        Some(f) => SessionEnd::Lost(format!("close {}: {}", f.code, f.reason)),
                        None => SessionEnd::Lost("closed without status".into()),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                None => return SessionEnd::Lost("stream ended".into()),
            },
        }
    }
}

async fn send_envelope<W>(ws_write: &mut W, envelope: &SignalingEnvelope) -> Result<(), WsError>
where
    W: Sink<WsMessage, Error = WsError> + Unpin,
{
    match serde_json::to_string(envelope) {
        Ok(json) => ws_write.send(WsMessage::Text(json.into())).await,
        Err(e) => {
            warn!(kind = envelope.kind(), error = %e, "failed to encode envelope");
            Ok(())
        }
    }
}

/// Flush what callers queued before teardown, then close with a
/// recognizable reason so the relay does not treat it as a drop.
async fn close_gracefully<W>(ws_write: &mut W, outbound_rx: &mut mpsc::UnboundedReceiver<SignalingEnvelope>)
where
    W: Sink<WsMessage, Error = WsError> + Unpin,
{
    while let Ok(envelope) = outbound_rx.try_recv() {
        if send_envelope(ws_write, &envelope).await.is_err() {
            return;
        }
    }
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: CLIENT_LEAVING.into(),
    };
    let _ = ws_write.send(WsMessage::Close(Some(frame))).await;
    let _ = ws_write.flush().await;
}

/// Drop anything queued against a connection that has since gone away.
fn discard_stale(outbound_rx: &mut mpsc::UnboundedReceiver<SignalingEnvelope>) {
    while let Ok(envelope) = outbound_rx.try_recv() {
        super::client::log_dropped(&envelope, "queued on a previous connection");
    }
}
