//! A joined room: transport, roster, sessions and local media wired
//! together behind one handle.
//!
//! All inbound events are applied by a single dispatcher task, one at a
//! time, so roster and session changes for a peer are never interleaved.

use std::sync::Arc;
use std::time::Duration;

use huddle_common::{
    HuddleError, MediaError, NegotiationError, ParticipantId, RoomId, SignalingEnvelope,
    TransportError,
};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chat::{ChatLog, ChatMessage, DEFAULT_CHAT_CAPACITY};
use crate::identity::LoginSession;
use crate::media::{
    CaptureConstraints, DisplayMediaConstraints, LocalMediaController, LocalMediaState,
    LocalTracks,
};
use crate::platform::{Platform, TrackKind};
use crate::roster::RoomRoster;
use crate::screen_share::{ScreenShareController, ScreenShareEvent, StopReason};
use crate::session::{
    OrchestratorConfig, PeerSessionOrchestrator, SessionEvent, SessionSnapshot, Signal,
};
use crate::transport::{ConnectionState, SignalingTransport, TransportConfig, TransportEvent};

#[derive(Debug, Clone)]
pub struct CallConfig {
    pub transport: TransportConfig,
    pub capture: CaptureConstraints,
    pub display: DisplayMediaConstraints,
    pub orchestrator: OrchestratorConfig,
    pub chat_capacity: usize,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            capture: CaptureConstraints::default(),
            display: DisplayMediaConstraints::default(),
            orchestrator: OrchestratorConfig::default(),
            chat_capacity: DEFAULT_CHAT_CAPACITY,
        }
    }
}

/// What the application sees of a call.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// Signaling channel (re)opened and room joined.
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
    /// Reconnect attempts exhausted. Open peer sessions are left running.
    ConnectionLost(TransportError),
    ParticipantJoined(ParticipantId),
    ParticipantLeft(ParticipantId),
    PeerConnected(ParticipantId),
    PeerFailed {
        peer: ParticipantId,
        error: NegotiationError,
    },
    RemoteTrack {
        peer: ParticipantId,
        kind: TrackKind,
        track_id: String,
    },
    Chat(ChatMessage),
    ScreenShareStopped { reason: StopReason },
    Closed,
}

pub struct Call {
    room_id: RoomId,
    local_id: ParticipantId,
    transport: Arc<SignalingTransport>,
    media: Arc<LocalMediaController>,
    orchestrator: Arc<PeerSessionOrchestrator>,
    screen_share: ScreenShareController,
    roster: Arc<RwLock<RoomRoster>>,
    chat: Arc<RwLock<ChatLog>>,
    cancel: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Call {
    /// Acquire local media, connect to the relay and join `room_id`.
    ///
    /// Media is acquired first; if that fails no connection is opened.
    pub async fn join(
        login: &LoginSession,
        room_id: RoomId,
        config: CallConfig,
        platform: Platform,
    ) -> Result<(Self, mpsc::Receiver<CallEvent>), HuddleError> {
        let identity = login.identity();
        let local_id = identity.participant_id.clone();

        let media = Arc::new(LocalMediaController::new(
            Arc::clone(&platform.devices),
            config.capture,
        ));
        media.initialize().await?;

        let (transport, transport_rx) =
            SignalingTransport::connect(config.transport, identity, room_id.clone());
        let transport = Arc::new(transport);

        let (orchestrator, session_rx) = PeerSessionOrchestrator::new(
            local_id.clone(),
            config.orchestrator,
            platform.peers,
            Arc::clone(&media),
            transport.outbox(),
        );
        let orchestrator = Arc::new(orchestrator);
        media.attach_sink(orchestrator.track_sink()).await;

        let (screen_share, share_rx) =
            ScreenShareController::new(platform.devices, Arc::clone(&media), config.display);

        let roster = Arc::new(RwLock::new(RoomRoster::new(local_id.clone())));
        let chat = Arc::new(RwLock::new(ChatLog::new(config.chat_capacity)));
        let cancel = CancellationToken::new();
        let (event_tx, event_rx) = mpsc::channel(256);

        let dispatcher = Dispatcher {
            orchestrator: Arc::clone(&orchestrator),
            roster: Arc::clone(&roster),
            chat: Arc::clone(&chat),
            event_tx,
            closed_sent: false,
        };
        let task = tokio::spawn(dispatcher.run(
            transport_rx,
            session_rx,
            share_rx,
            cancel.clone(),
        ));

        info!(room = %room_id, participant = %local_id, "call joined");
        let call = Self {
            room_id,
            local_id,
            transport,
            media,
            orchestrator,
            screen_share,
            roster,
            chat,
            cancel,
            dispatcher: Mutex::new(Some(task)),
        };
        Ok((call, event_rx))
    }

    // -- local media --------------------------------------------------------

    /// Returns whether the microphone is now enabled.
    pub async fn toggle_audio(&self) -> Result<bool, MediaError> {
        self.media.toggle_audio().await
    }

    /// Returns whether the camera is now enabled.
    pub async fn toggle_video(&self) -> Result<bool, MediaError> {
        self.media.toggle_video().await
    }

    pub async fn start_screen_share(&self) -> Result<(), MediaError> {
        self.screen_share.start().await
    }

    pub async fn stop_screen_share(&self) -> Result<(), MediaError> {
        self.screen_share.stop().await
    }

    pub async fn local_media_state(&self) -> LocalMediaState {
        self.media.state().await
    }

    /// Camera and microphone tracks, for a local preview.
    pub async fn local_tracks(&self) -> LocalTracks {
        self.media.current_tracks().await
    }

    // -- chat ---------------------------------------------------------------

    /// Send a chat line to the room. Returns `false` if the transport is
    /// not open; the message is then neither sent nor logged.
    pub async fn send_chat(&self, text: &str) -> bool {
        let message = ChatMessage::outgoing(self.room_id.clone(), text);
        if !self.transport.send(message.to_envelope()) {
            return false;
        }
        self.chat.write().await.push(message);
        true
    }

    pub async fn chat_history(&self) -> Vec<ChatMessage> {
        self.chat.read().await.all()
    }

    // -- state --------------------------------------------------------------

    pub async fn participants(&self) -> Vec<ParticipantId> {
        self.roster.read().await.members()
    }

    pub async fn sessions(&self) -> Vec<SessionSnapshot> {
        self.orchestrator.sessions().await
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    /// Leave the room: announce it, close every session, release local
    /// media and close the transport without reconnecting.
    pub async fn leave(&self) {
        self.transport.send(SignalingEnvelope::LeaveRoom {
            room_id: self.room_id.clone(),
        });
        self.orchestrator.close_all().await;
        match self.screen_share.stop().await {
            Ok(()) | Err(MediaError::ScreenShareInactive) => {}
            Err(e) => warn!(error = %e, "screen share did not stop cleanly"),
        }
        self.media.release().await;
        self.transport.close().await;

        self.cancel.cancel();
        if let Some(task) = self.dispatcher.lock().await.take() {
            let _ = task.await;
        }
        info!(room = %self.room_id, "call left");
    }
}

impl Drop for Call {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

struct Dispatcher {
    orchestrator: Arc<PeerSessionOrchestrator>,
    roster: Arc<RwLock<RoomRoster>>,
    chat: Arc<RwLock<ChatLog>>,
    event_tx: mpsc::Sender<CallEvent>,
    closed_sent: bool,
}

impl Dispatcher {
    async fn run(
        mut self,
        mut transport_rx: mpsc::Receiver<TransportEvent>,
        mut session_rx: mpsc::Receiver<SessionEvent>,
        mut share_rx: mpsc::Receiver<ScreenShareEvent>,
        cancel: CancellationToken,
    ) {
        let mut transport_open = true;
        let mut share_open = true;
        loop {
            // Buffered events are drained before cancellation is honored.
            tokio::select! {
                biased;
                event = transport_rx.recv(), if transport_open => match event {
                    Some(event) => self.on_transport(event).await,
                    None => transport_open = false,
                },
                Some(event) = session_rx.recv() => self.on_session(event).await,
                event = share_rx.recv(), if share_open => match event {
                    Some(event) => self.on_screen_share(event).await,
                    None => share_open = false,
                },
                _ = cancel.cancelled() => break,
            }
        }
        if !self.closed_sent {
            self.emit(CallEvent::Closed).await;
        }
        debug!("call dispatcher stopped");
    }

    async fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.emit(CallEvent::Connected).await,
            TransportEvent::Message(envelope) => self.on_envelope(envelope).await,
            TransportEvent::Disconnected { reason } => {
                info!(reason = %reason, "signaling disconnected");
            }
            TransportEvent::Reconnecting { attempt, delay } => {
                self.emit(CallEvent::Reconnecting { attempt, delay }).await;
            }
            TransportEvent::Failed(err) => {
                error!(error = %err, "signaling connection lost");
                self.emit(CallEvent::ConnectionLost(err)).await;
            }
            TransportEvent::Closed => {
                self.closed_sent = true;
                self.emit(CallEvent::Closed).await;
            }
        }
    }

    async fn on_envelope(&mut self, envelope: SignalingEnvelope) {
        match envelope {
            SignalingEnvelope::UserJoined { .. }
            | SignalingEnvelope::UserLeft { .. }
            | SignalingEnvelope::Participants { .. } => {
                let (update, known) = {
                    let mut roster = self.roster.write().await;
                    let known = roster.members();
                    (roster.apply(&envelope), known)
                };
                for peer in update.removed {
                    self.orchestrator.participant_removed(&peer).await;
                    if known.contains(&peer) {
                        self.emit(CallEvent::ParticipantLeft(peer)).await;
                    }
                }
                for peer in update.added {
                    self.emit(CallEvent::ParticipantJoined(peer)).await;
                }
                for peer in update.present {
                    self.orchestrator.participant_present(&peer).await;
                }
            }
            SignalingEnvelope::WebrtcOffer { .. }
            | SignalingEnvelope::WebrtcAnswer { .. }
            | SignalingEnvelope::IceCandidate { .. } => {
                let kind = envelope.kind();
                match Signal::from_envelope(envelope) {
                    Some((from, signal)) => self.orchestrator.handle_signal(&from, signal).await,
                    None => warn!(kind, "negotiation message without sender ignored"),
                }
            }
            SignalingEnvelope::ChatMessage { .. } => {
                if let Some(message) = ChatMessage::from_envelope(&envelope) {
                    self.chat.write().await.push(message.clone());
                    self.emit(CallEvent::Chat(message)).await;
                }
            }
            other => debug!(kind = other.kind(), "envelope not handled by the call"),
        }
    }

    async fn on_session(&mut self, event: SessionEvent) {
        let event = match event {
            SessionEvent::Connected { peer } => CallEvent::PeerConnected(peer),
            SessionEvent::Failed { peer, error } => CallEvent::PeerFailed { peer, error },
            SessionEvent::RemoteTrack {
                peer,
                kind,
                track_id,
            } => CallEvent::RemoteTrack {
                peer,
                kind,
                track_id,
            },
            SessionEvent::Closed { peer } => {
                debug!(participant = %peer, "session closed");
                return;
            }
        };
        self.emit(event).await;
    }

    async fn on_screen_share(&mut self, event: ScreenShareEvent) {
        match event {
            ScreenShareEvent::Started { track_id } => {
                debug!(track = %track_id, "screen share started");
            }
            ScreenShareEvent::Stopped { reason } => {
                self.emit(CallEvent::ScreenShareStopped { reason }).await;
            }
        }
    }

    async fn emit(&self, event: CallEvent) {
        let _ = self.event_tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use huddle_common::MediaAcquisitionError;
    use tokio::net::TcpListener;

    use super::*;
    use crate::platform::MediaTrack;
    use crate::session::{GlarePolicy, SessionState};
    use crate::testing::fake_platform;

    async fn start_relay() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        tokio::spawn(huddle_relay::serve(listener));
        url
    }

    fn config(url: &str, glare_policy: GlarePolicy) -> CallConfig {
        CallConfig {
            transport: TransportConfig {
                url: url.to_string(),
                max_reconnect_attempts: 2,
                reconnect_base_delay: Duration::from_millis(10),
                max_reconnect_delay: Duration::from_millis(50),
                connect_timeout: Duration::from_secs(2),
            },
            orchestrator: OrchestratorConfig {
                ice_servers: Vec::new(),
                glare_policy,
            },
            ..CallConfig::default()
        }
    }

    /// Skip events until `pick` accepts one.
    async fn wait_for<T>(
        events: &mut mpsc::Receiver<CallEvent>,
        what: &str,
        mut pick: impl FnMut(&CallEvent) -> Option<T>,
    ) -> T {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let event = tokio::time::timeout_at(deadline, events.recv())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
                .unwrap_or_else(|| panic!("event stream ended before {what}"));
            if let Some(found) = pick(&event) {
                return found;
            }
        }
    }

    async fn both<A: Future, B: Future>(a: A, b: B) -> (A::Output, B::Output) {
        tokio::join!(a, b)
    }

    async fn pair_connects(glare_policy: GlarePolicy) {
        let url = start_relay().await;
        let room = RoomId::new("standup");

        let alice = LoginSession::begin("alice", None);
        let (a_platform, _, a_peers) = fake_platform();
        let (a, mut a_events) =
            Call::join(&alice, room.clone(), config(&url, glare_policy), a_platform)
                .await
                .unwrap();
        wait_for(&mut a_events, "alice connected", |e| {
            matches!(e, CallEvent::Connected).then_some(())
        })
        .await;

        let bob = LoginSession::begin("bob", None);
        let (b_platform, _, b_peers) = fake_platform();
        let (b, mut b_events) =
            Call::join(&bob, room.clone(), config(&url, glare_policy), b_platform)
                .await
                .unwrap();

        let a_id = alice.participant_id().clone();
        let b_id = bob.participant_id().clone();
        let (joined_b, joined_a) = both(
            wait_for(&mut a_events, "bob joined", |e| match e {
                CallEvent::ParticipantJoined(p) => Some(p.clone()),
                _ => None,
            }),
            wait_for(&mut b_events, "alice in snapshot", |e| match e {
                CallEvent::ParticipantJoined(p) => Some(p.clone()),
                _ => None,
            }),
        )
        .await;
        assert_eq!(joined_b, b_id);
        assert_eq!(joined_a, a_id);

        let (peer_of_a, peer_of_b) = both(
            wait_for(&mut a_events, "alice peer connected", |e| match e {
                CallEvent::PeerConnected(p) => Some(p.clone()),
                _ => None,
            }),
            wait_for(&mut b_events, "bob peer connected", |e| match e {
                CallEvent::PeerConnected(p) => Some(p.clone()),
                _ => None,
            }),
        )
        .await;
        assert_eq!(peer_of_a, b_id);
        assert_eq!(peer_of_b, a_id);

        // Exactly one session per pairing on each side.
        assert_eq!(a_peers.created_for(b_id.as_str()).len(), 1);
        assert_eq!(b_peers.created_for(a_id.as_str()).len(), 1);
        let a_sessions = a.sessions().await;
        assert_eq!(a_sessions.len(), 1);
        assert_eq!(a_sessions[0].state, SessionState::Connected);
        assert_eq!(a.participants().await, vec![b_id.clone()]);

        // Chat rides the same channel.
        assert!(a.send_chat("hello bob").await);
        let chat = wait_for(&mut b_events, "chat", |e| match e {
            CallEvent::Chat(m) => Some(m.clone()),
            _ => None,
        })
        .await;
        assert_eq!(chat.text, "hello bob");
        assert_eq!(chat.from, Some(a_id.clone()));
        assert_eq!(a.chat_history().await.len(), 1);

        // Alice leaves; Bob tears his session down.
        a.leave().await;
        let left = wait_for(&mut b_events, "alice left", |e| match e {
            CallEvent::ParticipantLeft(p) => Some(p.clone()),
            _ => None,
        })
        .await;
        assert_eq!(left, a_id);
        assert!(b.sessions().await.is_empty());
        assert!(b_peers.latest(a_id.as_str()).unwrap().is_closed());
        wait_for(&mut a_events, "alice closed", |e| {
            matches!(e, CallEvent::Closed).then_some(())
        })
        .await;
        assert_eq!(a.connection_state(), ConnectionState::Closed);

        b.leave().await;
    }

    #[tokio::test]
    async fn two_participants_connect_with_lower_id_initiating() {
        pair_connects(GlarePolicy::LowerIdInitiates).await;
    }

    #[tokio::test]
    async fn two_participants_connect_despite_crossing_offers() {
        pair_connects(GlarePolicy::FirstObserver).await;
    }

    #[tokio::test]
    async fn media_failure_aborts_join_before_connecting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (platform, devices, _) = fake_platform();
        devices.fail_user_media(Some(MediaAcquisitionError::PermissionDenied("camera".into())));

        let login = LoginSession::begin("carol", None);
        let result = Call::join(
            &login,
            RoomId::new("r"),
            config(&url, GlarePolicy::FirstObserver),
            platform,
        )
        .await;
        assert!(matches!(
            result,
            Err(HuddleError::Media(MediaError::Acquisition(
                MediaAcquisitionError::PermissionDenied(_)
            )))
        ));

        let attempt = tokio::time::timeout(Duration::from_millis(150), listener.accept()).await;
        assert!(attempt.is_err());
    }

    #[tokio::test]
    async fn screen_share_stop_is_reported() {
        let url = start_relay().await;
        let login = LoginSession::begin("dave", None);
        let (platform, devices, _) = fake_platform();
        let (call, mut events) = Call::join(
            &login,
            RoomId::new("r"),
            config(&url, GlarePolicy::FirstObserver),
            platform,
        )
        .await
        .unwrap();

        call.start_screen_share().await.unwrap();
        devices.last_screen().unwrap().end_externally();
        let reason = wait_for(&mut events, "screen share stopped", |e| match e {
            CallEvent::ScreenShareStopped { reason } => Some(*reason),
            _ => None,
        })
        .await;
        assert_eq!(reason, StopReason::EndedExternally);
        assert_eq!(
            call.local_media_state().await.active_video_source,
            crate::media::VideoSource::Camera
        );
        call.leave().await;
    }

    #[tokio::test]
    async fn leave_releases_local_media() {
        let url = start_relay().await;
        let login = LoginSession::begin("erin", None);
        let (platform, devices, _) = fake_platform();
        let (call, mut events) = Call::join(
            &login,
            RoomId::new("r"),
            config(&url, GlarePolicy::FirstObserver),
            platform,
        )
        .await
        .unwrap();
        wait_for(&mut events, "connected", |e| {
            matches!(e, CallEvent::Connected).then_some(())
        })
        .await;

        call.leave().await;
        assert!(devices.issued().iter().all(|t| t.is_stopped()));
        assert_eq!(call.connection_state(), ConnectionState::Closed);
        assert!(!call.send_chat("too late").await);
    }
}
