//! Screen sharing: swap outgoing video to a display capture and back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use huddle_common::{MediaAcquisitionError, MediaError};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::media::{DisplayMediaConstraints, LocalMediaController, VideoRoute};
use crate::platform::{LocalTrack, MediaDevices, TrackKind};

/// Why a share ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called.
    Local,
    /// The platform ended the capture, e.g. its own "stop sharing" control.
    EndedExternally,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenShareEvent {
    Started { track_id: String },
    Stopped { reason: StopReason },
}

struct ActiveShare {
    generation: u64,
    tracks: Vec<LocalTrack>,
    watcher: JoinHandle<()>,
}

struct Inner {
    devices: Arc<dyn MediaDevices>,
    media: Arc<LocalMediaController>,
    constraints: DisplayMediaConstraints,
    active: Mutex<Option<ActiveShare>>,
    generation: AtomicU64,
    event_tx: mpsc::Sender<ScreenShareEvent>,
}

#[derive(Clone)]
pub struct ScreenShareController {
    inner: Arc<Inner>,
}

impl ScreenShareController {
    /// Returns `(controller, event_receiver)`.
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        media: Arc<LocalMediaController>,
        constraints: DisplayMediaConstraints,
    ) -> (Self, mpsc::Receiver<ScreenShareEvent>) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let controller = Self {
            inner: Arc::new(Inner {
                devices,
                media,
                constraints,
                active: Mutex::new(None),
                generation: AtomicU64::new(0),
                event_tx,
            }),
        };
        (controller, event_rx)
    }

    /// Capture the screen and send it instead of the camera on every open
    /// session. On failure nothing changes.
    pub async fn start(&self) -> Result<(), MediaError> {
        let inner = &self.inner;
        let mut active = inner.active.lock().await;
        if active.is_some() {
            return Err(MediaError::ScreenShareActive);
        }
        if !inner.media.is_initialized().await {
            return Err(MediaError::NotInitialized);
        }

        let tracks = inner.devices.get_display_media(&inner.constraints).await?;
        let Some(video) = tracks.iter().find(|t| t.kind() == TrackKind::Video).cloned() else {
            for track in &tracks {
                track.stop();
            }
            return Err(MediaAcquisitionError::MissingTrack("screen video".into()).into());
        };

        inner.media.route_video(VideoRoute::Screen(Arc::clone(&video))).await;

        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let watcher = tokio::spawn(watch_for_external_end(
            Arc::downgrade(inner),
            Arc::clone(&video),
            generation,
        ));
        *active = Some(ActiveShare {
            generation,
            tracks,
            watcher,
        });
        drop(active);

        info!(track = video.id(), "screen share started");
        let _ = inner
            .event_tx
            .send(ScreenShareEvent::Started {
                track_id: video.id().to_string(),
            })
            .await;
        Ok(())
    }

    /// Stop sharing and restore the camera (or no video if it is off).
    pub async fn stop(&self) -> Result<(), MediaError> {
        let share = self
            .inner
            .active
            .lock()
            .await
            .take()
            .ok_or(MediaError::ScreenShareInactive)?;
        share.watcher.abort();
        self.inner.finish(share, StopReason::Local).await;
        Ok(())
    }

    pub async fn is_active(&self) -> bool {
        self.inner.active.lock().await.is_some()
    }
}

impl Inner {
    async fn finish(&self, share: ActiveShare, reason: StopReason) {
        for track in &share.tracks {
            track.stop();
        }
        let restored = self.media.route_video(VideoRoute::Camera).await;
        info!(
            reason = ?reason,
            video = restored.video_id().unwrap_or("none"),
            "screen share stopped"
        );
        let _ = self.event_tx.send(ScreenShareEvent::Stopped { reason }).await;
    }

    /// Cleanup after the platform ended the capture. A share that was
    /// already stopped, or replaced by a newer one, is left alone.
    async fn ended_externally(&self, generation: u64) {
        let share = {
            let mut active = self.active.lock().await;
            match active.as_ref() {
                Some(share) if share.generation == generation => active.take(),
                _ => None,
            }
        };
        match share {
            Some(share) => self.finish(share, StopReason::EndedExternally).await,
            None => warn!(generation, "stale screen share end notification ignored"),
        }
    }
}

async fn watch_for_external_end(inner: Weak<Inner>, video: LocalTrack, generation: u64) {
    video.ended().await;
    if let Some(inner) = inner.upgrade() {
        inner.ended_externally(generation).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::media::{CaptureConstraints, VideoSource};
    use crate::platform::MediaTrack;
    use crate::testing::{fake_platform, FakeDevices};

    async fn setup() -> (
        ScreenShareController,
        mpsc::Receiver<ScreenShareEvent>,
        Arc<LocalMediaController>,
        Arc<FakeDevices>,
    ) {
        let (platform, devices, _) = fake_platform();
        let media = Arc::new(LocalMediaController::new(
            platform.devices.clone(),
            CaptureConstraints::default(),
        ));
        media.initialize().await.unwrap();
        let (share, events) = ScreenShareController::new(
            platform.devices.clone(),
            media.clone(),
            DisplayMediaConstraints::default(),
        );
        (share, events, media, devices)
    }

    async fn next(events: &mut mpsc::Receiver<ScreenShareEvent>) -> ScreenShareEvent {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for screen share event")
            .expect("event stream closed")
    }

    #[tokio::test]
    async fn start_routes_screen_and_stop_restores_camera() {
        let (share, mut events, media, devices) = setup().await;
        let camera = media.current_tracks().await.video.unwrap();

        share.start().await.unwrap();
        let screen = devices.last_screen().unwrap();
        assert!(matches!(next(&mut events).await, ScreenShareEvent::Started { .. }));
        assert_eq!(media.outgoing().await.video_id(), Some(screen.id()));
        assert_eq!(media.state().await.active_video_source, VideoSource::Screen);
        assert!(!camera.is_stopped());

        share.stop().await.unwrap();
        assert_eq!(
            next(&mut events).await,
            ScreenShareEvent::Stopped {
                reason: StopReason::Local
            }
        );
        assert!(screen.is_stopped());
        assert_eq!(media.outgoing().await.video_id(), Some(camera.id()));
        assert!(!share.is_active().await);
    }

    #[tokio::test]
    async fn stop_restores_camera_current_at_stop_time() {
        let (share, _events, media, _) = setup().await;
        share.start().await.unwrap();

        // Camera cycled while sharing: the fresh capture is what comes back.
        media.toggle_video().await.unwrap();
        media.toggle_video().await.unwrap();
        let current = media.current_tracks().await.video.unwrap();

        share.stop().await.unwrap();
        assert_eq!(media.outgoing().await.video_id(), Some(current.id()));
    }

    #[tokio::test]
    async fn stop_with_camera_off_restores_no_video() {
        let (share, _events, media, _) = setup().await;
        share.start().await.unwrap();
        media.toggle_video().await.unwrap();

        share.stop().await.unwrap();
        assert!(media.outgoing().await.video.is_none());
        assert_eq!(media.state().await.active_video_source, VideoSource::None);
    }

    #[tokio::test]
    async fn external_end_runs_the_same_cleanup() {
        let (share, mut events, media, devices) = setup().await;
        let camera = media.current_tracks().await.video.unwrap();
        share.start().await.unwrap();
        next(&mut events).await;

        devices.last_screen().unwrap().end_externally();
        assert_eq!(
            next(&mut events).await,
            ScreenShareEvent::Stopped {
                reason: StopReason::EndedExternally
            }
        );
        assert!(!share.is_active().await);
        assert_eq!(media.outgoing().await.video_id(), Some(camera.id()));
        assert_eq!(share.stop().await, Err(MediaError::ScreenShareInactive));
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let (share, _events, _, devices) = setup().await;
        share.start().await.unwrap();
        assert_eq!(share.start().await, Err(MediaError::ScreenShareActive));
        assert_eq!(devices.display_calls(), 1);
    }

    #[tokio::test]
    async fn denied_capture_leaves_state_unchanged() {
        let (share, _events, media, devices) = setup().await;
        let before = media.outgoing().await;
        devices.fail_display(Some(MediaAcquisitionError::PermissionDenied("screen".into())));

        let err = share.start().await.unwrap_err();
        assert!(matches!(
            err,
            MediaError::Acquisition(MediaAcquisitionError::PermissionDenied(_))
        ));
        assert!(!share.is_active().await);
        let after = media.outgoing().await;
        assert_eq!(after.version, before.version);
        assert_eq!(after.video_id(), before.video_id());
    }

    #[tokio::test]
    async fn stop_without_share_is_an_error() {
        let (share, _events, _, _) = setup().await;
        assert_eq!(share.stop().await, Err(MediaError::ScreenShareInactive));
    }

    #[tokio::test]
    async fn restart_after_stop_ignores_old_end_notification() {
        let (share, mut events, _, devices) = setup().await;
        share.start().await.unwrap();
        let first = devices.last_screen().unwrap();
        share.stop().await.unwrap();
        share.start().await.unwrap();
        next(&mut events).await;
        next(&mut events).await;
        next(&mut events).await;

        first.end_externally();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(share.is_active().await);
        assert!(events.try_recv().is_err());
    }
}
