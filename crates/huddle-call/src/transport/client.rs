//! Public handle for the signaling connection.

use huddle_common::{RoomId, SignalingEnvelope};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::connection::{connection_loop, LoopContext};
use super::types::{ConnectionState, TransportConfig, TransportEvent};
use crate::identity::Identity;

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// Cheap, cloneable send side of the transport.
///
/// Components that emit signaling (the session orchestrator, chat) hold an
/// `Outbox` instead of a reference to the transport itself.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<SignalingEnvelope>,
    state: watch::Receiver<ConnectionState>,
}

impl Outbox {
    /// Hand an envelope to the open connection.
    ///
    /// Returns `false` when the channel is not open; the envelope is dropped,
    /// not queued. For ICE candidates that is harmless, for offers and
    /// answers it loses a negotiation step and is logged as a warning.
    pub fn send(&self, envelope: SignalingEnvelope) -> bool {
        if *self.state.borrow() != ConnectionState::Open {
            log_dropped(&envelope, "transport not open");
            return false;
        }
        match self.tx.send(envelope) {
            Ok(()) => true,
            Err(mpsc::error::SendError(envelope)) => {
                log_dropped(&envelope, "transport shut down");
                false
            }
        }
    }

    pub fn is_open(&self) -> bool {
        *self.state.borrow() == ConnectionState::Open
    }

    /// An outbox wired to a plain channel instead of a socket.
    #[cfg(test)]
    pub(crate) fn loopback(
        state: ConnectionState,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<SignalingEnvelope>,
        watch::Sender<ConnectionState>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(state);
        (
            Self {
                tx,
                state: state_rx,
            },
            rx,
            state_tx,
        )
    }
}

pub(crate) fn log_dropped(envelope: &SignalingEnvelope, why: &str) {
    let target = envelope.target().map(|t| t.to_string()).unwrap_or_default();
    if envelope.is_best_effort() {
        debug!(kind = envelope.kind(), target = %target, why, "dropped signaling message");
    } else {
        warn!(kind = envelope.kind(), target = %target, why, "dropped signaling message");
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Handle to the background connection task.
pub struct SignalingTransport {
    outbox: Outbox,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SignalingTransport {
    /// Start connecting as `identity` and join `room_id` on every open.
    /// Returns `(transport, event_receiver)`.
    pub fn connect(
        config: TransportConfig,
        identity: &Identity,
        room_id: RoomId,
    ) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(connection_loop(LoopContext {
            config,
            participant: identity.participant_id.clone(),
            room_id,
            state_tx,
            event_tx,
            outbound_rx,
            cancel: cancel.clone(),
        }));

        let transport = Self {
            outbox: Outbox {
                tx: outbound_tx,
                state: state_rx.clone(),
            },
            state: state_rx,
            cancel,
            task: Mutex::new(Some(task)),
        };
        (transport, event_rx)
    }

    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// See [`Outbox::send`].
    pub fn send(&self, envelope: SignalingEnvelope) -> bool {
        self.outbox.send(envelope)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Deliberate close: flush queued sends, close with a normal code and
    /// never reconnect. Waits for the connection task to finish.
    pub async fn close(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SignalingTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
