//! Owner of the local capture tracks.
//!
//! Every mutation of what sessions send goes through here: the mutation
//! happens under one lock, the resulting [`OutgoingTracks`] snapshot is
//! published to the session layer after the lock is released. Camera
//! re-acquisition runs with the lock released and commits only if no other
//! camera change landed in the meantime.

use std::sync::Arc;

use huddle_common::{MediaAcquisitionError, MediaError};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::constraints::CaptureConstraints;
use super::{LocalMediaState, LocalTracks, OutgoingTrackSink, OutgoingTracks, VideoSource};
use crate::platform::{LocalTrack, MediaDevices, TrackKind};

/// Where outgoing video comes from, as chosen by screen sharing.
pub(crate) enum VideoRoute {
    Screen(LocalTrack),
    Camera,
}

#[derive(Default)]
struct MediaInner {
    initialized: bool,
    audio: Option<LocalTrack>,
    camera: Option<LocalTrack>,
    screen: Option<LocalTrack>,
    state: LocalMediaState,
    version: u64,
    /// Bumped on every camera on/off commit, initialize and release.
    camera_epoch: u64,
}

impl MediaInner {
    fn outgoing(&self) -> OutgoingTracks {
        let video = match self.state.active_video_source {
            VideoSource::Screen => self.screen.clone(),
            VideoSource::Camera => self.camera.clone(),
            VideoSource::None => None,
        };
        OutgoingTracks {
            version: self.version,
            audio: self.audio.clone(),
            video,
        }
    }

    fn bump(&mut self) -> OutgoingTracks {
        self.version += 1;
        self.outgoing()
    }
}

pub struct LocalMediaController {
    devices: Arc<dyn MediaDevices>,
    constraints: CaptureConstraints,
    inner: Mutex<MediaInner>,
    sink: RwLock<Option<Arc<dyn OutgoingTrackSink>>>,
}

impl LocalMediaController {
    pub fn new(devices: Arc<dyn MediaDevices>, constraints: CaptureConstraints) -> Self {
        Self {
            devices,
            constraints,
            inner: Mutex::new(MediaInner::default()),
            sink: RwLock::new(None),
        }
    }

    /// Route future outgoing-track changes to `sink`.
    pub async fn attach_sink(&self, sink: Arc<dyn OutgoingTrackSink>) {
        *self.sink.write().await = Some(sink);
    }

    /// Acquire camera and microphone in one combined capture.
    ///
    /// Calling again once initialized is a no-op.
    pub async fn initialize(&self) -> Result<(), MediaAcquisitionError> {
        let mut inner = self.inner.lock().await;
        if inner.initialized {
            return Ok(());
        }

        let tracks = self
            .devices
            .get_user_media(&self.constraints.combined())
            .await?;
        let (audio, video) = split_tracks(tracks);
        let (audio, video) = match (audio, video) {
            (Some(a), Some(v)) => (a, v),
            (a, v) => {
                let missing = if a.is_none() { "audio" } else { "video" };
                stop_all([a, v]);
                return Err(MediaAcquisitionError::MissingTrack(missing.into()));
            }
        };

        info!(audio = audio.id(), video = video.id(), "local media initialized");
        inner.audio = Some(audio);
        inner.camera = Some(video);
        inner.screen = None;
        inner.state = LocalMediaState {
            audio_enabled: true,
            camera_enabled: true,
            active_video_source: VideoSource::Camera,
        };
        inner.initialized = true;
        inner.version += 1;
        inner.camera_epoch += 1;
        Ok(())
    }

    /// Mute or unmute in place. The audio track is never replaced here, so
    /// this needs no acquisition and no renegotiation.
    pub async fn toggle_audio(&self) -> Result<bool, MediaError> {
        let mut inner = self.inner.lock().await;
        let enabled = !inner.state.audio_enabled;
        let audio = inner.audio.as_ref().ok_or(MediaError::NotInitialized)?;
        audio.set_enabled(enabled);
        inner.state.audio_enabled = enabled;
        info!(enabled, "microphone toggled");
        Ok(enabled)
    }

    /// Turn the camera off (releasing the device) or back on (fresh camera
    /// and microphone captures). Returns the new camera state.
    ///
    /// On acquisition failure nothing changes. The captures are taken with
    /// the lock released; if another toggle or a release commits first, the
    /// fresh tracks are stopped and the state that won is reported.
    pub async fn toggle_video(&self) -> Result<bool, MediaError> {
        let epoch = {
            let mut inner = self.inner.lock().await;
            if !inner.initialized {
                return Err(MediaError::NotInitialized);
            }
            if inner.state.camera_enabled {
                let snapshot = camera_off(&mut inner);
                drop(inner);
                self.publish(snapshot).await;
                return Ok(false);
            }
            inner.camera_epoch
        };

        let (video, audio) = self.acquire_camera().await?;

        let snapshot = {
            let mut inner = self.inner.lock().await;
            if !inner.initialized || inner.camera_epoch != epoch {
                debug!("camera changed during acquisition, fresh capture discarded");
                stop_all([Some(video), Some(audio)]);
                return if inner.initialized {
                    Ok(inner.state.camera_enabled)
                } else {
                    Err(MediaError::NotInitialized)
                };
            }
            camera_on(&mut inner, video, audio)
        };
        self.publish(snapshot).await;
        Ok(true)
    }

    /// Fresh camera then microphone. Nothing is left running on failure.
    async fn acquire_camera(&self) -> Result<(LocalTrack, LocalTrack), MediaError> {
        let video = self.acquire_one(TrackKind::Video).await?;
        match self.acquire_one(TrackKind::Audio).await {
            Ok(audio) => Ok((video, audio)),
            Err(e) => {
                video.stop();
                Err(e)
            }
        }
    }

    async fn acquire_one(&self, kind: TrackKind) -> Result<LocalTrack, MediaError> {
        let constraints = match kind {
            TrackKind::Video => self.constraints.video_only(),
            TrackKind::Audio => self.constraints.audio_only(),
        };
        let tracks = self.devices.get_user_media(&constraints).await?;
        let (audio, video) = split_tracks(tracks);
        let (wanted, other) = match kind {
            TrackKind::Audio => (audio, video),
            TrackKind::Video => (video, audio),
        };
        stop_all([other]);
        wanted.ok_or_else(|| MediaAcquisitionError::MissingTrack(kind.to_string()).into())
    }

    /// Switch outgoing video between a screen track and the camera.
    pub(crate) async fn route_video(&self, route: VideoRoute) -> OutgoingTracks {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            match route {
                VideoRoute::Screen(track) => {
                    inner.screen = Some(track);
                    inner.state.active_video_source = VideoSource::Screen;
                }
                VideoRoute::Camera => {
                    inner.screen = None;
                    inner.state.active_video_source = if inner.state.camera_enabled {
                        VideoSource::Camera
                    } else {
                        VideoSource::None
                    };
                }
            }
            inner.bump()
        };
        debug!(
            version = snapshot.version,
            video = snapshot.video_id().unwrap_or("none"),
            "outgoing video rerouted"
        );
        self.publish(snapshot.clone()).await;
        snapshot
    }

    async fn publish(&self, snapshot: OutgoingTracks) {
        let sink = self.sink.read().await.clone();
        match sink {
            Some(sink) => sink.publish(snapshot).await,
            None => debug!("no session sink attached, outgoing change not published"),
        }
    }

    /// Stop every track. Used on leave.
    pub async fn release(&self) {
        let mut inner = self.inner.lock().await;
        stop_all([inner.audio.take(), inner.camera.take(), inner.screen.take()]);
        inner.initialized = false;
        inner.state = LocalMediaState::default();
        inner.version += 1;
        inner.camera_epoch += 1;
        info!("local media released");
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.lock().await.initialized
    }

    /// What sessions should send, or `None` before initialization.
    pub(crate) async fn outgoing_if_initialized(&self) -> Option<OutgoingTracks> {
        let inner = self.inner.lock().await;
        inner.initialized.then(|| inner.outgoing())
    }

    /// The camera/microphone tracks: the local preview stream.
    pub async fn current_tracks(&self) -> LocalTracks {
        let inner = self.inner.lock().await;
        LocalTracks {
            audio: inner.audio.clone(),
            video: inner.camera.clone(),
        }
    }

    /// What sessions should currently send.
    pub async fn outgoing(&self) -> OutgoingTracks {
        self.inner.lock().await.outgoing()
    }

    pub async fn state(&self) -> LocalMediaState {
        self.inner.lock().await.state
    }
}

fn camera_off(inner: &mut MediaInner) -> OutgoingTracks {
    if let Some(camera) = inner.camera.take() {
        camera.stop();
    }
    inner.state.camera_enabled = false;
    if inner.state.active_video_source == VideoSource::Camera {
        inner.state.active_video_source = VideoSource::None;
    }
    inner.camera_epoch += 1;
    info!("camera off, device released");
    inner.bump()
}

fn camera_on(inner: &mut MediaInner, video: LocalTrack, audio: LocalTrack) -> OutgoingTracks {
    audio.set_enabled(inner.state.audio_enabled);
    if let Some(old) = inner.audio.replace(audio) {
        old.stop();
    }
    if let Some(old) = inner.camera.replace(video) {
        old.stop();
    }
    inner.state.camera_enabled = true;
    if inner.state.active_video_source != VideoSource::Screen {
        inner.state.active_video_source = VideoSource::Camera;
    }
    inner.camera_epoch += 1;
    info!("camera on with fresh capture");
    inner.bump()
}

fn split_tracks(tracks: Vec<LocalTrack>) -> (Option<LocalTrack>, Option<LocalTrack>) {
    let mut audio = None;
    let mut video = None;
    for track in tracks {
        let slot = match track.kind() {
            TrackKind::Audio => &mut audio,
            TrackKind::Video => &mut video,
        };
        if slot.is_none() {
            *slot = Some(track);
        } else {
            warn!(track = track.id(), "unexpected extra track, stopping it");
            track.stop();
        }
    }
    (audio, video)
}

fn stop_all<const N: usize>(tracks: [Option<LocalTrack>; N]) {
    for track in tracks.into_iter().flatten() {
        track.stop();
    }
}
