//! Owns the map of peer sessions and routes roster changes, negotiation
//! messages and outgoing-track changes to them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use huddle_common::{NegotiationError, ParticipantId};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tracing::{debug, info, warn};

use super::peer::{SessionHandle, SessionParams, StartMode};
use super::types::{
    GlarePolicy, OrchestratorConfig, SessionCommand, SessionEvent, SessionSnapshot, Signal,
};
use crate::media::{LocalMediaController, OutgoingTrackSink, OutgoingTracks};
use crate::platform::PeerConnectionFactory;
use crate::transport::Outbox;

type SessionMap = HashMap<ParticipantId, SessionHandle>;

/// How an inbound signal reaches a session.
enum Route {
    Existing,
    /// No usable session; an offer starts a fresh responder.
    Fresh,
    Drop,
}

pub struct PeerSessionOrchestrator {
    local_id: ParticipantId,
    config: OrchestratorConfig,
    factory: Arc<dyn PeerConnectionFactory>,
    media: Arc<LocalMediaController>,
    outbox: Outbox,
    sessions: Arc<RwLock<SessionMap>>,
    /// Newest outgoing tracks seen by the track sink.
    latest_tracks: Arc<watch::Sender<OutgoingTracks>>,
    event_tx: mpsc::Sender<SessionEvent>,
}

impl PeerSessionOrchestrator {
    /// Returns `(orchestrator, event_receiver)`.
    pub fn new(
        local_id: ParticipantId,
        config: OrchestratorConfig,
        factory: Arc<dyn PeerConnectionFactory>,
        media: Arc<LocalMediaController>,
        outbox: Outbox,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let orchestrator = Self {
            local_id,
            config,
            factory,
            media,
            outbox,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            latest_tracks: Arc::new(watch::channel(OutgoingTracks::default()).0),
            event_tx,
        };
        (orchestrator, event_rx)
    }

    /// Sink that retargets every live session when local tracks change.
    pub fn track_sink(&self) -> Arc<dyn OutgoingTrackSink> {
        Arc::new(SessionTrackSink {
            sessions: Arc::clone(&self.sessions),
            latest: Arc::clone(&self.latest_tracks),
        })
    }

    // -----------------------------------------------------------------------
    // Roster-driven lifecycle
    // -----------------------------------------------------------------------

    /// Ensure a session exists for a peer reported present by the roster.
    ///
    /// A live session is left alone. A failed or closed one is replaced,
    /// which is the only way a failed pairing is retried.
    pub async fn participant_present(&self, peer: &ParticipantId) {
        if *peer == self.local_id {
            return;
        }
        let mode = match self.config.glare_policy {
            GlarePolicy::FirstObserver => StartMode::Initiate,
            GlarePolicy::LowerIdInitiates if self.local_id < *peer => StartMode::Initiate,
            GlarePolicy::LowerIdInitiates => StartMode::AwaitOffer,
        };

        let Some(seed) = self.media.outgoing_if_initialized().await else {
            warn!(participant = %peer, "local media not initialized, no session created");
            return;
        };

        let failure = {
            let mut sessions = self.sessions.write().await;
            if sessions.get(peer).is_some_and(SessionHandle::is_live) {
                debug!(participant = %peer, "session already live");
                return;
            }
            self.spawn_session(&mut sessions, peer, mode, seed).await.err()
        };
        if let Some(error) = failure {
            self.emit_failed(peer, error);
        }
    }

    /// Tear down the session for a peer that left. Unknown peers are a no-op.
    pub async fn participant_removed(&self, peer: &ParticipantId) {
        let removed = self.sessions.write().await.remove(peer);
        if let Some(handle) = removed {
            handle.teardown().await;
            info!(participant = %peer, "session closed");
            self.emit(SessionEvent::Closed { peer: peer.clone() });
        }
    }

    /// Tear down every session, e.g. on leave.
    pub async fn close_all(&self) {
        let drained: Vec<_> = self.sessions.write().await.drain().collect();
        let count = drained.len();
        for (_, handle) in drained {
            handle.teardown().await;
        }
        if count > 0 {
            info!(count, "all sessions closed");
        }
    }

    // -----------------------------------------------------------------------
    // Negotiation routing
    // -----------------------------------------------------------------------

    /// Route an offer, answer or candidate from `from` to its session.
    ///
    /// An offer with no live session, or a new offer for a session that
    /// already completed negotiation, starts a fresh responder session. A
    /// repeat of the offer a session answered goes to that session, which
    /// answers it again. Answers and candidates without a live session are
    /// dropped.
    pub async fn handle_signal(&self, from: &ParticipantId, signal: Signal) {
        if *from == self.local_id {
            return;
        }
        let is_offer = matches!(signal, Signal::Offer(_));
        let seed = if is_offer {
            self.media.outgoing_if_initialized().await
        } else {
            None
        };

        let failure = {
            let mut sessions = self.sessions.write().await;
            let route = match sessions.get(from) {
                Some(handle) if handle.is_live() => {
                    let snapshot = handle.snapshot();
                    match &signal {
                        Signal::Offer(offer) if snapshot.answered_offer.as_ref() == Some(offer) => {
                            Route::Existing
                        }
                        Signal::Offer(_) if snapshot.remote_description_applied => {
                            info!(participant = %from, "offer for negotiated session, starting over");
                            Route::Fresh
                        }
                        _ => Route::Existing,
                    }
                }
                _ if is_offer => Route::Fresh,
                _ => Route::Drop,
            };

            match route {
                Route::Drop => {
                    debug!(
                        participant = %from,
                        kind = signal.kind(),
                        "no live session, signal dropped"
                    );
                    None
                }
                Route::Existing => {
                    if let Some(handle) = sessions.get(from) {
                        handle.send(SessionCommand::Signal(signal));
                    }
                    None
                }
                Route::Fresh => {
                    let Some(seed) = seed else {
                        warn!(participant = %from, "offer before local media initialized, dropped");
                        return;
                    };
                    match self
                        .spawn_session(&mut sessions, from, StartMode::AwaitOffer, seed)
                        .await
                    {
                        Ok(handle) => {
                            handle.send(SessionCommand::Signal(signal));
                            None
                        }
                        Err(error) => Some(error),
                    }
                }
            }
        };
        if let Some(error) = failure {
            self.emit_failed(from, error);
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn session(&self, peer: &ParticipantId) -> Option<SessionSnapshot> {
        self.sessions.read().await.get(peer).map(SessionHandle::snapshot)
    }

    /// Snapshots of every session, sorted by peer.
    pub async fn sessions(&self) -> Vec<SessionSnapshot> {
        let mut all: Vec<_> = self
            .sessions
            .read()
            .await
            .values()
            .map(SessionHandle::snapshot)
            .collect();
        all.sort_by(|a, b| a.peer.cmp(&b.peer));
        all
    }

    /// Watch one session's state. `None` when no session exists.
    pub async fn subscribe(
        &self,
        peer: &ParticipantId,
    ) -> Option<watch::Receiver<SessionSnapshot>> {
        self.sessions.read().await.get(peer).map(SessionHandle::subscribe)
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Replace whatever is stored for `peer` with a fresh session.
    ///
    /// `seed` is read from the media controller before the map lock is
    /// taken. A retarget published after that read is either already in
    /// `latest_tracks` or is delivered by the sink once the write lock is
    /// released, so the new session can not miss it.
    async fn spawn_session<'a>(
        &self,
        sessions: &'a mut SessionMap,
        peer: &ParticipantId,
        mode: StartMode,
        seed: OutgoingTracks,
    ) -> Result<&'a SessionHandle, NegotiationError> {
        if let Some(stale) = sessions.remove(peer) {
            stale.teardown().await;
        }

        let (pc, peer_events) = self
            .factory
            .create(peer, &self.config.ice_servers)
            .await
            .inspect_err(|e| warn!(participant = %peer, error = %e, "peer connection not created"))?;
        let tracks = {
            let latest = self.latest_tracks.borrow();
            if latest.version > seed.version {
                latest.clone()
            } else {
                seed
            }
        };

        info!(participant = %peer, mode = ?mode, "session created");
        let handle = SessionHandle::spawn(SessionParams {
            peer: peer.clone(),
            local_id: self.local_id.clone(),
            mode,
            pc,
            peer_events,
            tracks,
            outbox: self.outbox.clone(),
            events: self.event_tx.clone(),
        });
        sessions.insert(peer.clone(), handle);
        sessions.get(peer).ok_or(NegotiationError::Closed)
    }

    fn emit_failed(&self, peer: &ParticipantId, error: NegotiationError) {
        self.emit(SessionEvent::Failed {
            peer: peer.clone(),
            error,
        });
    }

    /// Never waits: the caller may be the only reader of the event queue.
    fn emit(&self, event: SessionEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(event = ?event, "session event queue full, event dropped");
            }
            Err(TrySendError::Closed(_)) => debug!("session event receiver gone"),
        }
    }
}

// ---------------------------------------------------------------------------
// Track sink
// ---------------------------------------------------------------------------

struct SessionTrackSink {
    sessions: Arc<RwLock<SessionMap>>,
    latest: Arc<watch::Sender<OutgoingTracks>>,
}

#[async_trait]
impl OutgoingTrackSink for SessionTrackSink {
    async fn publish(&self, tracks: OutgoingTracks) {
        // Recorded before the map lock so a session spawned meanwhile seeds
        // from it.
        self.latest.send_if_modified(|latest| {
            let newer = tracks.version > latest.version;
            if newer {
                *latest = tracks.clone();
            }
            newer
        });
        let acks: Vec<oneshot::Receiver<()>> = {
            let sessions = self.sessions.read().await;
            sessions
                .values()
                .filter(|handle| handle.is_live())
                .filter_map(|handle| {
                    let (done, ack) = oneshot::channel();
                    handle
                        .send(SessionCommand::UpdateTracks {
                            tracks: tracks.clone(),
                            done,
                        })
                        .then_some(ack)
                })
                .collect()
        };
        debug!(sessions = acks.len(), version = tracks.version, "retargeting sessions");
        for ack in acks {
            let _ = ack.await;
        }
    }
}
