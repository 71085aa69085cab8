//! In-memory fakes of the platform seams. Every call is recorded so tests
//! can assert on exactly what the call layer asked for.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use huddle_common::{
    IceCandidate, MediaAcquisitionError, NegotiationError, ParticipantId, SdpType,
    SessionDescription,
};
use tokio::sync::{mpsc, watch, Notify};

use crate::media::{DisplayMediaConstraints, MediaStreamConstraints};
use crate::platform::{
    IceServer, LocalTrack, MediaDevices, MediaTrack, PeerConnection, PeerConnectionEvent,
    PeerConnectionFactory, PeerEvents, Platform, TrackKind,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct FakeTrack {
    id: String,
    kind: TrackKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
    ended: watch::Sender<bool>,
}

impl FakeTrack {
    pub(crate) fn new(kind: TrackKind, label: &str) -> Arc<Self> {
        let n = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Arc::new(Self {
            id: format!("{label}-{kind}-{n}"),
            kind,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            ended: watch::channel(false).0,
        })
    }

    /// Simulate the platform ending the track, e.g. "stop sharing".
    pub(crate) fn end_externally(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.ended.send_replace(true);
    }
}

#[async_trait]
impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    async fn ended(&self) {
        let mut rx = self.ended.subscribe();
        let _ = rx.wait_for(|ended| *ended).await;
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct FakeDevices {
    user_media_calls: AtomicUsize,
    display_calls: AtomicUsize,
    fail_user_media: Mutex<Option<MediaAcquisitionError>>,
    fail_display: Mutex<Option<MediaAcquisitionError>>,
    omit_video: AtomicBool,
    issued: Mutex<Vec<Arc<FakeTrack>>>,
    screens: Mutex<Vec<Arc<FakeTrack>>>,
    user_media_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeDevices {
    pub(crate) fn user_media_calls(&self) -> usize {
        self.user_media_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn display_calls(&self) -> usize {
        self.display_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_user_media(&self, err: Option<MediaAcquisitionError>) {
        *self.fail_user_media.lock().unwrap() = err;
    }

    pub(crate) fn fail_display(&self, err: Option<MediaAcquisitionError>) {
        *self.fail_display.lock().unwrap() = err;
    }

    /// Make user-media captures come back without a video track.
    pub(crate) fn omit_video(&self, omit: bool) {
        self.omit_video.store(omit, Ordering::SeqCst);
    }

    /// Every camera/microphone track handed out so far.
    pub(crate) fn issued(&self) -> Vec<Arc<FakeTrack>> {
        self.issued.lock().unwrap().clone()
    }

    pub(crate) fn last_screen(&self) -> Option<Arc<FakeTrack>> {
        self.screens.lock().unwrap().last().cloned()
    }

    /// Hold every user-media capture until `ungate_user_media`, like a
    /// pending permission prompt.
    pub(crate) fn gate_user_media(&self) {
        *self.user_media_gate.lock().unwrap() = Some(Arc::new(Notify::new()));
    }

    pub(crate) fn ungate_user_media(&self) {
        if let Some(gate) = self.user_media_gate.lock().unwrap().take() {
            gate.notify_waiters();
        }
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaStreamConstraints,
    ) -> Result<Vec<LocalTrack>, MediaAcquisitionError> {
        let gate = self.user_media_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let released = gate.notified();
            self.user_media_calls.fetch_add(1, Ordering::SeqCst);
            released.await;
        } else {
            self.user_media_calls.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(err) = self.fail_user_media.lock().unwrap().clone() {
            return Err(err);
        }
        let mut tracks = Vec::new();
        if constraints.wants_audio() {
            tracks.push(FakeTrack::new(TrackKind::Audio, "mic"));
        }
        if constraints.wants_video() && !self.omit_video.load(Ordering::SeqCst) {
            tracks.push(FakeTrack::new(TrackKind::Video, "cam"));
        }
        self.issued.lock().unwrap().extend(tracks.iter().cloned());
        Ok(tracks.into_iter().map(|t| t as LocalTrack).collect())
    }

    async fn get_display_media(
        &self,
        constraints: &DisplayMediaConstraints,
    ) -> Result<Vec<LocalTrack>, MediaAcquisitionError> {
        self.display_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_display.lock().unwrap().clone() {
            return Err(err);
        }
        let screen = FakeTrack::new(TrackKind::Video, "screen");
        self.screens.lock().unwrap().push(Arc::clone(&screen));
        let mut tracks: Vec<LocalTrack> = vec![screen];
        if constraints.audio {
            tracks.push(FakeTrack::new(TrackKind::Audio, "screen"));
        }
        Ok(tracks)
    }
}

// ---------------------------------------------------------------------------
// Peer connections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PcCall {
    AddSender(TrackKind, Option<String>),
    ReplaceTrack(TrackKind, Option<String>),
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpType),
    SetRemote(SdpType),
    AddCandidate(String),
    Close,
}

pub(crate) struct FakePeerConnection {
    pub(crate) peer: ParticipantId,
    calls: Mutex<Vec<PcCall>>,
    events: mpsc::UnboundedSender<PeerConnectionEvent>,
    reject_remote: AtomicBool,
    reject_candidates: AtomicBool,
    remote_gate: Mutex<Option<Arc<Notify>>>,
    /// Signalled when `set_remote_description` reaches the gate.
    pub(crate) gate_reached: Arc<Notify>,
}

impl FakePeerConnection {
    pub(crate) fn calls(&self) -> Vec<PcCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn candidates_applied(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PcCall::AddCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Track id last put on the sender of `kind`.
    pub(crate) fn sending(&self, kind: TrackKind) -> Option<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PcCall::AddSender(k, t) | PcCall::ReplaceTrack(k, t) if k == kind => Some(t),
                _ => None,
            })
            .last()
            .flatten()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.calls().contains(&PcCall::Close)
    }

    pub(crate) fn reject_remote(&self, reject: bool) {
        self.reject_remote.store(reject, Ordering::SeqCst);
    }

    pub(crate) fn reject_candidates(&self, reject: bool) {
        self.reject_candidates.store(reject, Ordering::SeqCst);
    }

    /// Hold `set_remote_description` until the returned handle is notified.
    pub(crate) fn gate_remote(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.remote_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Inject an event as if the underlying stack produced it.
    pub(crate) fn emit(&self, event: PeerConnectionEvent) {
        let _ = self.events.send(event);
    }

    fn record(&self, call: PcCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PeerConnection for FakePeerConnection {
    async fn add_sender(
        &self,
        kind: TrackKind,
        track: Option<LocalTrack>,
    ) -> Result<(), NegotiationError> {
        self.record(PcCall::AddSender(kind, track.map(|t| t.id().to_string())));
        Ok(())
    }

    async fn replace_track(
        &self,
        kind: TrackKind,
        track: Option<LocalTrack>,
    ) -> Result<(), NegotiationError> {
        self.record(PcCall::ReplaceTrack(kind, track.map(|t| t.id().to_string())));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        self.record(PcCall::CreateOffer);
        Ok(SessionDescription::offer(format!("v=0 offer for {}", self.peer)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        self.record(PcCall::CreateAnswer);
        Ok(SessionDescription::answer(format!("v=0 answer for {}", self.peer)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), NegotiationError> {
        self.record(PcCall::SetLocal(desc.sdp_type));
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let gate = self.remote_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.gate_reached.notify_one();
            gate.notified().await;
        }
        self.record(PcCall::SetRemote(desc.sdp_type));
        if self.reject_remote.load(Ordering::SeqCst) {
            return Err(NegotiationError::Rejected("fake rejects remote".into()));
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        self.record(PcCall::AddCandidate(candidate.candidate.clone()));
        if self.reject_candidates.load(Ordering::SeqCst) {
            return Err(NegotiationError::Candidate(candidate.candidate));
        }
        Ok(())
    }

    async fn close(&self) {
        self.record(PcCall::Close);
    }
}

#[derive(Default)]
pub(crate) struct FakePeerFactory {
    created: Mutex<Vec<Arc<FakePeerConnection>>>,
    fail_create: AtomicBool,
}

impl FakePeerFactory {
    pub(crate) fn created(&self) -> Vec<Arc<FakePeerConnection>> {
        self.created.lock().unwrap().clone()
    }

    pub(crate) fn created_for(&self, peer: &str) -> Vec<Arc<FakePeerConnection>> {
        self.created()
            .into_iter()
            .filter(|pc| pc.peer.as_str() == peer)
            .collect()
    }

    pub(crate) fn latest(&self, peer: &str) -> Option<Arc<FakePeerConnection>> {
        self.created_for(peer).pop()
    }

    pub(crate) fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PeerConnectionFactory for FakePeerFactory {
    async fn create(
        &self,
        peer: &ParticipantId,
        _ice_servers: &[IceServer],
    ) -> Result<(Arc<dyn PeerConnection>, PeerEvents), NegotiationError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(NegotiationError::PeerConnection("fake factory failure".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let pc = Arc::new(FakePeerConnection {
            peer: peer.clone(),
            calls: Mutex::new(Vec::new()),
            events: tx,
            reject_remote: AtomicBool::new(false),
            reject_candidates: AtomicBool::new(false),
            remote_gate: Mutex::new(None),
            gate_reached: Arc::new(Notify::new()),
        });
        self.created.lock().unwrap().push(Arc::clone(&pc));
        Ok((pc, rx))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn fake_platform() -> (Platform, Arc<FakeDevices>, Arc<FakePeerFactory>) {
    let devices = Arc::new(FakeDevices::default());
    let peers = Arc::new(FakePeerFactory::default());
    let platform = Platform {
        devices: Arc::clone(&devices) as _,
        peers: Arc::clone(&peers) as _,
    };
    (platform, devices, peers)
}

pub(crate) fn candidate(label: &str) -> IceCandidate {
    IceCandidate {
        candidate: label.to_string(),
        sdp_mid: Some("0".into()),
        sdp_m_line_index: Some(0),
    }
}

/// Poll `check` until it holds, failing the test after a few seconds.
pub(crate) async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never held: {what}");
}
