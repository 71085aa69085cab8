//! One negotiation state machine per remote participant.
//!
//! Each session runs as its own task and is the only writer of its state.
//! Signals, track updates and peer-connection events are handled one at a
//! time in arrival order. Teardown cancels the task, so a step that
//! completes afterwards never touches the session again.

use std::mem;
use std::sync::Arc;

use huddle_common::{
    IceCandidate, NegotiationError, ParticipantId, SdpType, SessionDescription, SignalingEnvelope,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::types::{SessionCommand, SessionEvent, SessionRole, SessionSnapshot, SessionState, Signal};
use crate::media::OutgoingTracks;
use crate::platform::{
    IceConnectionState, PeerConnection, PeerConnectionEvent, PeerEvents, TrackKind,
};
use crate::transport::Outbox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartMode {
    /// Seed tracks and send an offer right away.
    Initiate,
    /// Seed tracks and wait for the peer's offer.
    AwaitOffer,
}

pub(crate) struct SessionParams {
    pub peer: ParticipantId,
    pub local_id: ParticipantId,
    pub mode: StartMode,
    pub pc: Arc<dyn PeerConnection>,
    pub peer_events: PeerEvents,
    pub tracks: OutgoingTracks,
    pub outbox: Outbox,
    pub events: mpsc::Sender<SessionEvent>,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owner-side handle of a running session task.
pub(crate) struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: Arc<watch::Sender<SessionSnapshot>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    pc: Arc<dyn PeerConnection>,
}

impl SessionHandle {
    pub(crate) fn spawn(params: SessionParams) -> Self {
        let role = match params.mode {
            StartMode::Initiate => SessionRole::Initiator,
            StartMode::AwaitOffer => SessionRole::Responder,
        };
        let (state_tx, _) = watch::channel(SessionSnapshot::new(params.peer.clone(), role));
        let state = Arc::new(state_tx);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let pc = Arc::clone(&params.pc);

        let actor = SessionActor {
            peer: params.peer,
            local_id: params.local_id,
            role,
            pc: params.pc,
            outbox: params.outbox,
            state: Arc::clone(&state),
            events: params.events,
            pending: Vec::new(),
            remote_applied: false,
            awaiting_answer: None,
            answered: None,
            sent: params.tracks,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(actor.run(params.mode, command_rx, params.peer_events));

        Self {
            commands,
            state,
            cancel,
            task,
            pc,
        }
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub(crate) fn is_live(&self) -> bool {
        self.state.borrow().state.is_live()
    }

    /// Queue a command. Returns `false` once the task has exited.
    pub(crate) fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Mark the session closed, drop any in-flight step and close the
    /// connection. The state flips before the first suspension point.
    pub(crate) async fn teardown(self) {
        self.cancel.cancel();
        self.task.abort();
        mark_closed(&self.state);
        self.pc.close().await;
    }
}

fn mark_closed(state: &watch::Sender<SessionSnapshot>) {
    state.send_if_modified(|s| {
        if s.state == SessionState::Closed {
            return false;
        }
        s.state = SessionState::Closed;
        s.pending_candidates = 0;
        true
    });
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct SessionActor {
    peer: ParticipantId,
    local_id: ParticipantId,
    role: SessionRole,
    pc: Arc<dyn PeerConnection>,
    outbox: Outbox,
    state: Arc<watch::Sender<SessionSnapshot>>,
    events: mpsc::Sender<SessionEvent>,
    /// Remote candidates received before the remote description.
    pending: Vec<IceCandidate>,
    remote_applied: bool,
    /// Our offer, while its answer is outstanding.
    awaiting_answer: Option<SessionDescription>,
    /// The peer's offer we answered, and our answer to it.
    answered: Option<(SessionDescription, SessionDescription)>,
    /// What the senders currently carry.
    sent: OutgoingTracks,
    cancel: CancellationToken,
}

type StepResult = Result<(), NegotiationError>;

impl SessionActor {
    async fn run(
        mut self,
        mode: StartMode,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut peer_events: PeerEvents,
    ) {
        if let Err(e) = self.start(mode).await {
            self.fail(e).await;
            return;
        }

        let mut peer_events_open = true;
        loop {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = peer_events.recv(), if peer_events_open => match event {
                    Some(event) => self.handle_peer_event(event).await,
                    None => {
                        debug!(participant = %self.peer, "peer connection event stream ended");
                        peer_events_open = false;
                        Ok(())
                    }
                },
            };
            if let Err(e) = result {
                self.fail(e).await;
                break;
            }
        }
    }

    async fn start(&mut self, mode: StartMode) -> StepResult {
        self.pc
            .add_sender(TrackKind::Audio, self.sent.audio.clone())
            .await?;
        self.pc
            .add_sender(TrackKind::Video, self.sent.video.clone())
            .await?;
        debug!(
            participant = %self.peer,
            audio = self.sent.audio_id().unwrap_or("none"),
            video = self.sent.video_id().unwrap_or("none"),
            "outgoing tracks attached"
        );

        if mode == StartMode::Initiate {
            let offer = self.pc.create_offer().await?;
            self.pc.set_local_description(offer.clone()).await?;
            self.awaiting_answer = Some(offer.clone());
            self.signal(SignalingEnvelope::offer(self.peer.clone(), offer));
            info!(participant = %self.peer, "offer sent");
        }
        Ok(())
    }

    async fn handle_command(&mut self, command: SessionCommand) -> StepResult {
        match command {
            SessionCommand::Signal(Signal::Offer(offer)) => self.on_offer(offer).await,
            SessionCommand::Signal(Signal::Answer(answer)) => self.on_answer(answer).await,
            SessionCommand::Signal(Signal::Candidate(candidate)) => {
                self.on_remote_candidate(candidate).await
            }
            SessionCommand::UpdateTracks { tracks, done } => {
                let result = self.retarget(tracks).await;
                let _ = done.send(());
                result
            }
        }
    }

    // -- negotiation --------------------------------------------------------

    async fn on_offer(&mut self, offer: SessionDescription) -> StepResult {
        expect_description(&offer, SdpType::Offer)?;

        if let Some((answered, answer)) = &self.answered {
            if *answered == offer {
                debug!(participant = %self.peer, "offer repeated, re-sending our answer");
                let answer = answer.clone();
                self.signal(SignalingEnvelope::answer(self.peer.clone(), answer));
                return Ok(());
            }
        }

        if let Some(ours) = &self.awaiting_answer {
            if self.local_id < self.peer {
                // Ours may have been lost on the way, so it goes out again.
                info!(participant = %self.peer, "offers crossed, keeping ours and re-sending it");
                let ours = ours.clone();
                self.signal(SignalingEnvelope::offer(self.peer.clone(), ours));
                return Ok(());
            }
            info!(participant = %self.peer, "offers crossed, yielding to peer");
            self.pc
                .set_local_description(SessionDescription::rollback())
                .await?;
            self.awaiting_answer = None;
            self.role = SessionRole::Responder;
            self.update(|s| s.role = SessionRole::Responder);
        }

        self.pc.set_remote_description(offer.clone()).await?;
        self.after_remote_description().await?;

        let answer = self.pc.create_answer().await?;
        self.pc.set_local_description(answer.clone()).await?;
        self.answered = Some((offer.clone(), answer.clone()));
        self.update(|s| s.answered_offer = Some(offer));
        self.signal(SignalingEnvelope::answer(self.peer.clone(), answer));
        info!(participant = %self.peer, "answer sent");
        self.connected().await;
        Ok(())
    }

    async fn on_answer(&mut self, answer: SessionDescription) -> StepResult {
        if self.awaiting_answer.is_none() {
            debug!(participant = %self.peer, role = ?self.role, "ignoring unexpected answer");
            return Ok(());
        }
        expect_description(&answer, SdpType::Answer)?;

        self.pc.set_remote_description(answer).await?;
        self.awaiting_answer = None;
        self.after_remote_description().await?;
        self.connected().await;
        Ok(())
    }

    async fn on_remote_candidate(&mut self, candidate: IceCandidate) -> StepResult {
        if !self.remote_applied {
            self.pending.push(candidate);
            let queued = self.pending.len();
            self.update(|s| s.pending_candidates = queued);
            debug!(participant = %self.peer, queued, "candidate buffered");
            return Ok(());
        }
        self.apply_candidate(candidate).await
    }

    /// Flush buffered candidates in arrival order, exactly once.
    async fn after_remote_description(&mut self) -> StepResult {
        self.remote_applied = true;
        let buffered = mem::take(&mut self.pending);
        self.update(|s| {
            s.remote_description_applied = true;
            s.pending_candidates = 0;
        });
        if !buffered.is_empty() {
            debug!(participant = %self.peer, count = buffered.len(), "flushing buffered candidates");
        }
        for candidate in buffered {
            self.apply_candidate(candidate).await?;
        }
        Ok(())
    }

    async fn apply_candidate(&self, candidate: IceCandidate) -> StepResult {
        self.pc
            .add_ice_candidate(candidate)
            .await
            .map_err(|e| match e {
                NegotiationError::Candidate(_) => e,
                other => NegotiationError::Candidate(other.to_string()),
            })
    }

    async fn connected(&self) {
        if self.update(|s| s.state = SessionState::Connected) {
            info!(participant = %self.peer, role = ?self.role, "session connected");
            let _ = self
                .events
                .send(SessionEvent::Connected {
                    peer: self.peer.clone(),
                })
                .await;
        }
    }

    // -- tracks -------------------------------------------------------------

    async fn retarget(&mut self, tracks: OutgoingTracks) -> StepResult {
        if tracks.version <= self.sent.version {
            return Ok(());
        }
        if tracks.audio_id() != self.sent.audio_id() {
            self.pc
                .replace_track(TrackKind::Audio, tracks.audio.clone())
                .await?;
        }
        if tracks.video_id() != self.sent.video_id() {
            self.pc
                .replace_track(TrackKind::Video, tracks.video.clone())
                .await?;
        }
        debug!(
            participant = %self.peer,
            version = tracks.version,
            video = tracks.video_id().unwrap_or("none"),
            "senders retargeted"
        );
        self.sent = tracks;
        Ok(())
    }

    // -- peer connection events --------------------------------------------

    async fn handle_peer_event(&mut self, event: PeerConnectionEvent) -> StepResult {
        match event {
            PeerConnectionEvent::IceCandidate(candidate) => {
                self.signal(SignalingEnvelope::candidate(self.peer.clone(), candidate));
                Ok(())
            }
            PeerConnectionEvent::IceConnectionStateChanged(IceConnectionState::Failed) => {
                Err(NegotiationError::IceFailed)
            }
            PeerConnectionEvent::IceConnectionStateChanged(ice) => {
                debug!(participant = %self.peer, state = ?ice, "ICE state changed");
                Ok(())
            }
            PeerConnectionEvent::RemoteTrack { kind, track_id } => {
                info!(participant = %self.peer, %kind, track = %track_id, "remote track");
                let _ = self
                    .events
                    .send(SessionEvent::RemoteTrack {
                        peer: self.peer.clone(),
                        kind,
                        track_id,
                    })
                    .await;
                Ok(())
            }
        }
    }

    // -- helpers ------------------------------------------------------------

    fn signal(&self, envelope: SignalingEnvelope) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.outbox.send(envelope);
    }

    /// Apply `f` to the published snapshot unless the session is closed.
    fn update(&self, f: impl FnOnce(&mut SessionSnapshot)) -> bool {
        self.state.send_if_modified(|s| {
            if s.state == SessionState::Closed {
                return false;
            }
            f(s);
            true
        })
    }

    async fn fail(&self, error: NegotiationError) {
        let recorded = error.clone();
        if !self.update(|s| {
            s.state = SessionState::Failed;
            s.failure = Some(recorded);
        }) {
            return;
        }
        warn!(participant = %self.peer, error = %error, "session failed");
        self.pc.close().await;
        let _ = self
            .events
            .send(SessionEvent::Failed {
                peer: self.peer.clone(),
                error,
            })
            .await;
    }
}

fn expect_description(desc: &SessionDescription, expected: SdpType) -> StepResult {
    if desc.sdp_type != expected {
        return Err(NegotiationError::UnexpectedDescription {
            expected: expected.to_string(),
            actual: desc.sdp_type.to_string(),
        });
    }
    if desc.sdp.trim().is_empty() {
        return Err(NegotiationError::Malformed(format!("empty {expected} SDP")));
    }
    Ok(())
}
