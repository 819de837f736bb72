//! Client-side interview capture: camera/microphone session, per-frame
//! presence detection with an on-video overlay, and recording upload.
//!
//! Host APIs (devices, video element, overlay canvas, alerts, frame ticks)
//! are traits in [`media`], [`overlay`] and [`clock`]; [`CaptureSession`]
//! drives them.
//!
//! Lifecycle:
//! - `start()` acquires the stream, attaches it, spawns the detection loop.
//! - `start_recording()` / `stop_recording()` buffer the stream and upload it.
//! - `stop()` cancels the loop, stops tracks, clears the overlay and resets
//!   the one-shot alert.

pub mod clock;
pub mod detector;
pub mod media;
pub mod overlay;
pub mod recording;
pub mod upload;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use self::clock::{ClockFactory, FrameClock};
use self::detector::{
    AlertLatch, DetectorState, DETECTOR_INPUT_SIZE, MULTIPLE_FACES_ALERT,
};
use self::media::{MediaConstraints, MediaDevices, MediaError, MediaStream, Notifier, VideoSink};
use self::overlay::{render_overlay, OverlaySurface};
use self::recording::{ActiveRecording, RecordingState};
use self::upload::{UploadError, UploadPipeline};

pub const CAMERA_UNSUPPORTED_ALERT: &str = "Your browser does not support camera access.";
pub const CAMERA_DENIED_ALERT: &str = "Could not access camera. Please allow camera permissions.";
pub const CAMERA_NOT_STARTED_ALERT: &str = "Camera not started.";
pub const RECORDING_FAILED_ALERT: &str = "Could not start recording.";
pub const UPLOAD_FAILED_ALERT: &str = "Upload failed.";
pub const UPLOAD_ERROR_ALERT: &str = "Upload error occurred.";
pub const UPLOAD_SUCCESS_ALERT: &str = "Video uploaded successfully!";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera is already started")]
    AlreadyStarted,

    #[error("camera is not started")]
    NotStarted,

    #[error("already recording")]
    AlreadyRecording,

    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Host implementations the session drives.
pub struct CaptureHost {
    pub devices: Arc<dyn MediaDevices>,
    pub video: Arc<dyn VideoSink>,
    pub overlay: Arc<dyn OverlaySurface>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: ClockFactory,
}

#[derive(Default)]
struct SessionInner {
    stream: Option<Arc<dyn MediaStream>>,
    detection: Option<(CancellationToken, JoinHandle<()>)>,
    recording: Option<ActiveRecording>,
}

/// One interview's capture widget.
pub struct CaptureSession {
    interview_id: String,
    user_id: Option<String>,
    host: CaptureHost,
    detector: watch::Receiver<DetectorState>,
    uploads: UploadPipeline,
    inner: Mutex<SessionInner>,
    latch: Arc<AlertLatch>,
    faces: Arc<AtomicUsize>,
    recording_state: Arc<watch::Sender<RecordingState>>,
}

impl CaptureSession {
    pub fn new(
        interview_id: impl Into<String>,
        user_id: Option<String>,
        host: CaptureHost,
        detector: watch::Receiver<DetectorState>,
        uploads: UploadPipeline,
    ) -> Self {
        let (recording_state, _) = watch::channel(RecordingState::Idle);
        Self {
            interview_id: interview_id.into(),
            user_id,
            host,
            detector,
            uploads,
            inner: Mutex::new(SessionInner::default()),
            latch: Arc::new(AlertLatch::default()),
            faces: Arc::new(AtomicUsize::new(0)),
            recording_state: Arc::new(recording_state),
        }
    }

    /// Faces seen in the most recent detected frame.
    pub fn faces_detected(&self) -> usize {
        self.faces.load(Ordering::SeqCst)
    }

    pub fn recording_state(&self) -> watch::Receiver<RecordingState> {
        self.recording_state.subscribe()
    }

    pub async fn is_started(&self) -> bool {
        self.inner.lock().await.stream.is_some()
    }

    // ────────────────────────────────────────────────────────────────────────
    // Camera
    // ────────────────────────────────────────────────────────────────────────

    /// Requests camera + microphone and starts presence detection.
    /// On failure the user is alerted and the session stays stopped.
    pub async fn start(&self) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock().await;
        if inner.stream.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }

        let stream = match self
            .host
            .devices
            .get_user_media(&MediaConstraints::default())
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                error!("Could not access camera: {e}");
                let message = match e {
                    MediaError::NotSupported => CAMERA_UNSUPPORTED_ALERT,
                    _ => CAMERA_DENIED_ALERT,
                };
                self.host.notifier.alert(message);
                return Err(e.into());
            }
        };

        self.host.video.attach(&stream);

        let cancel = CancellationToken::new();
        let detection = DetectionLoop {
            stream: stream.clone(),
            detector: self.detector.clone(),
            overlay: self.host.overlay.clone(),
            notifier: self.host.notifier.clone(),
            latch: self.latch.clone(),
            faces: self.faces.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(detection.run((self.host.clock)()));

        inner.stream = Some(stream);
        inner.detection = Some((cancel, handle));
        info!("Camera started for interview {}", self.interview_id);
        Ok(())
    }

    /// Stops detection and all tracks, detaches the video and resets the
    /// alert so the next start can alert again. An active recording is
    /// finalised and uploaded first.
    pub async fn stop(&self) -> Option<JoinHandle<()>> {
        let upload = self.stop_recording().await;

        let mut inner = self.inner.lock().await;
        if let Some((cancel, handle)) = inner.detection.take() {
            // The in-flight frame, if any, finishes before the reset below.
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!("Detection loop ended abnormally: {e}");
            }
        }
        self.faces.store(0, Ordering::SeqCst);
        self.host.overlay.clear();

        if let Some(stream) = inner.stream.take() {
            stream.stop_tracks();
        }
        self.host.video.detach();
        self.latch.reset();
        debug!("Camera stopped for interview {}", self.interview_id);
        upload
    }

    // ────────────────────────────────────────────────────────────────────────
    // Recording
    // ────────────────────────────────────────────────────────────────────────

    pub async fn start_recording(&self) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock().await;
        let Some(stream) = inner.stream.clone() else {
            self.host.notifier.alert(CAMERA_NOT_STARTED_ALERT);
            return Err(CaptureError::NotStarted);
        };
        if inner.recording.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let recorder = match stream.record() {
            Ok(r) => r,
            Err(e) => {
                error!("Recording start error: {e}");
                self.host.notifier.alert(RECORDING_FAILED_ALERT);
                return Err(e.into());
            }
        };

        inner.recording = Some(ActiveRecording::start(recorder));
        self.recording_state.send_replace(RecordingState::Recording);
        info!("Recording started for interview {}", self.interview_id);
        Ok(())
    }

    /// Finalises the recording and starts its upload in the background.
    /// Returns the upload task, or `None` when nothing was recording.
    /// Dropping the handle does not cancel the upload.
    pub async fn stop_recording(&self) -> Option<JoinHandle<()>> {
        let recording = self.inner.lock().await.recording.take()?;

        self.recording_state
            .send_replace(RecordingState::Uploading { progress: 0.0 });

        let uploads = self.uploads.clone();
        let notifier = self.host.notifier.clone();
        let state = self.recording_state.clone();
        let interview_id = self.interview_id.clone();
        let user_id = self.user_id.clone();

        Some(tokio::spawn(async move {
            let blob = recording.finish().await;
            let progress_state = state.clone();
            let on_progress = move |progress: f64| {
                progress_state.send_replace(RecordingState::Uploading { progress });
            };

            match uploads
                .upload_recording(user_id.as_deref(), &interview_id, blob, &on_progress)
                .await
            {
                Ok(url) => {
                    state.send_replace(RecordingState::Uploaded { url });
                    notifier.alert(UPLOAD_SUCCESS_ALERT);
                }
                Err(e) => {
                    error!("Upload failed for interview {interview_id}: {e}");
                    state.send_replace(RecordingState::Failed {
                        reason: e.to_string(),
                    });
                    notifier.alert(match e {
                        UploadError::Storage(_) => UPLOAD_FAILED_ALERT,
                        UploadError::Feedback(_) => UPLOAD_ERROR_ALERT,
                    });
                }
            }
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Detection loop
// ────────────────────────────────────────────────────────────────────────────

struct DetectionLoop {
    stream: Arc<dyn MediaStream>,
    detector: watch::Receiver<DetectorState>,
    overlay: Arc<dyn OverlaySurface>,
    notifier: Arc<dyn Notifier>,
    latch: Arc<AlertLatch>,
    faces: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl DetectionLoop {
    async fn run(self, mut clock: Box<dyn FrameClock>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                alive = clock.tick() => if !alive { break },
            }
            self.step().await;
        }
        debug!("Detection loop ended");
    }

    /// One frame. Skips until the model is ready and a frame exists;
    /// detector errors are logged and the loop carries on.
    async fn step(&self) {
        let detector = self.detector.borrow().detector();
        let Some(detector) = detector else {
            return;
        };
        let Some(frame) = self.stream.current_frame() else {
            return;
        };

        let faces = match detector.detect(&frame, DETECTOR_INPUT_SIZE).await {
            Ok(faces) => faces,
            Err(e) => {
                warn!("Face detection error: {e}");
                return;
            }
        };
        if self.cancel.is_cancelled() {
            return;
        }

        if let Some(overlay) = render_overlay(&faces, frame.width, frame.height) {
            self.overlay.present(&overlay);
        }

        let count = faces.len();
        self.faces.store(count, Ordering::SeqCst);
        if self.latch.observe(count) {
            self.notifier.alert(MULTIPLE_FACES_ALERT);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;
    use tokio::sync::watch;

    use super::clock::IntervalClock;
    use super::detector::{ready_detector, DetectError, DetectorState, FaceBox, FaceDetector};
    use super::media::{
        MediaConstraints, MediaDevices, MediaError, MediaRecorder, MediaStream, Notifier, VideoFrame,
        VideoSink,
    };
    use super::overlay::{Overlay, OverlaySurface};
    use super::recording::RecordingState;
    use super::upload::UploadPipeline;
    use super::*;
    use crate::backend::memory::{MemoryBlobStore, MemoryDocumentStore};
    use crate::backend::{BlobStore, DocumentStore};
    use crate::models::feedback::FEEDBACK_COLLECTION;

    // ── fakes ──────────────────────────────────────────────────────────────────

    struct FakeRecorder {
        queued: VecDeque<Bytes>,
        stopped: bool,
    }

    #[async_trait]
    impl MediaRecorder for FakeRecorder {
        async fn next_chunk(&mut self) -> Option<Bytes> {
            if let Some(chunk) = self.queued.pop_front() {
                return Some(chunk);
            }
            if self.stopped {
                return None;
            }
            std::future::pending().await
        }

        fn stop(&mut self) {
            self.stopped = true;
        }
    }

    struct FakeStream {
        chunks: Vec<Bytes>,
        can_record: bool,
        tracks_stopped: AtomicBool,
    }

    impl FakeStream {
        fn new(chunks: &[&'static [u8]]) -> Arc<Self> {
            Arc::new(Self {
                chunks: chunks.iter().map(|c| Bytes::from_static(c)).collect(),
                can_record: true,
                tracks_stopped: AtomicBool::new(false),
            })
        }
    }

    impl MediaStream for FakeStream {
        fn current_frame(&self) -> Option<VideoFrame> {
            Some(VideoFrame {
                width: 4,
                height: 4,
                rgba: Bytes::from(vec![0u8; 4 * 4 * 4]),
            })
        }

        fn record(&self) -> Result<Box<dyn MediaRecorder>, MediaError> {
            if !self.can_record {
                return Err(MediaError::Device("encoder unavailable".to_string()));
            }
            Ok(Box::new(FakeRecorder {
                queued: self.chunks.iter().cloned().collect(),
                stopped: false,
            }))
        }

        fn stop_tracks(&self) {
            self.tracks_stopped.store(true, Ordering::SeqCst);
        }
    }

    enum Access {
        Granted(Arc<FakeStream>),
        Unsupported,
        Denied,
    }

    struct FakeDevices(Access);

    #[async_trait]
    impl MediaDevices for FakeDevices {
        async fn get_user_media(
            &self,
            _constraints: &MediaConstraints,
        ) -> Result<Arc<dyn MediaStream>, MediaError> {
            match &self.0 {
                Access::Granted(stream) => Ok(stream.clone() as Arc<dyn MediaStream>),
                Access::Unsupported => Err(MediaError::NotSupported),
                Access::Denied => Err(MediaError::PermissionDenied("NotAllowedError".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct FakeVideo {
        attached: AtomicBool,
    }

    impl VideoSink for FakeVideo {
        fn attach(&self, _stream: &Arc<dyn MediaStream>) {
            self.attached.store(true, Ordering::SeqCst);
        }

        fn detach(&self) {
            self.attached.store(false, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeSurface {
        last: Mutex<Option<Overlay>>,
        clears: AtomicUsize,
    }

    impl OverlaySurface for FakeSurface {
        fn present(&self, overlay: &Overlay) {
            *self.last.lock().unwrap() = Some(overlay.clone());
        }

        fn clear(&self) {
            *self.last.lock().unwrap() = None;
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Alerts(Mutex<Vec<String>>);

    impl Alerts {
        fn messages(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Notifier for Alerts {
        fn alert(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    struct FixedDetector {
        faces: usize,
        calls: AtomicUsize,
    }

    impl FixedDetector {
        fn new(faces: usize) -> Arc<Self> {
            Arc::new(Self {
                faces,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl FaceDetector for FixedDetector {
        async fn detect(&self, _frame: &VideoFrame, input_size: u32) -> Result<Vec<FaceBox>, DetectError> {
            assert_eq!(input_size, DETECTOR_INPUT_SIZE);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..self.faces)
                .map(|i| FaceBox {
                    x: i as f32,
                    y: 1.0,
                    width: 1.0,
                    height: 1.0,
                    score: 0.9,
                })
                .collect())
        }
    }

    struct Harness {
        session: CaptureSession,
        video: Arc<FakeVideo>,
        surface: Arc<FakeSurface>,
        alerts: Arc<Alerts>,
    }

    fn harness(
        access: Access,
        detector: watch::Receiver<DetectorState>,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Harness {
        let video = Arc::new(FakeVideo::default());
        let surface = Arc::new(FakeSurface::default());
        let alerts = Arc::new(Alerts::default());
        let host = CaptureHost {
            devices: Arc::new(FakeDevices(access)),
            video: video.clone(),
            overlay: surface.clone(),
            notifier: alerts.clone(),
            clock: IntervalClock::factory(60),
        };
        let session = CaptureSession::new(
            "int-1",
            Some("user-1".to_string()),
            host,
            detector,
            UploadPipeline::new(documents, blobs),
        );
        Harness {
            session,
            video,
            surface,
            alerts,
        }
    }

    fn simple(access: Access, faces: usize) -> Harness {
        harness(
            access,
            ready_detector(FixedDetector::new(faces)),
            Arc::new(MemoryDocumentStore::default()),
            Arc::new(MemoryBlobStore::default()),
        )
    }

    async fn run_frames() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // ── camera ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_unsupported_device_alerts_and_stays_stopped() {
        let h = simple(Access::Unsupported, 0);

        let err = h.session.start().await.unwrap_err();
        assert!(matches!(err, CaptureError::Media(MediaError::NotSupported)));
        assert_eq!(h.alerts.messages(), vec![CAMERA_UNSUPPORTED_ALERT]);
        assert!(!h.session.is_started().await);
        assert!(!h.video.attached.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_denied_permission_alerts() {
        let h = simple(Access::Denied, 0);

        assert!(h.session.start().await.is_err());
        assert_eq!(h.alerts.messages(), vec![CAMERA_DENIED_ALERT]);
        assert!(!h.session.is_started().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected() {
        let h = simple(Access::Granted(FakeStream::new(&[])), 1);

        h.session.start().await.unwrap();
        assert!(matches!(
            h.session.start().await,
            Err(CaptureError::AlreadyStarted)
        ));
        h.session.stop().await;
    }

    // ── detection ──────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_single_face_draws_overlay_without_alert() {
        let h = simple(Access::Granted(FakeStream::new(&[])), 1);

        h.session.start().await.unwrap();
        run_frames().await;

        assert_eq!(h.session.faces_detected(), 1);
        let overlay = h.surface.last.lock().unwrap().clone().unwrap();
        assert_eq!((overlay.width, overlay.height), (4, 4));
        assert_eq!(overlay.markers.len(), 1);
        assert!(h.alerts.messages().is_empty());
        h.session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_multiple_faces_alert_once_per_session() {
        let stream = FakeStream::new(&[]);
        let detector = FixedDetector::new(2);
        let h = harness(
            Access::Granted(stream.clone()),
            ready_detector(detector.clone()),
            Arc::new(MemoryDocumentStore::default()),
            Arc::new(MemoryBlobStore::default()),
        );

        h.session.start().await.unwrap();
        run_frames().await;
        assert!(detector.calls.load(Ordering::SeqCst) > 1);
        assert_eq!(h.alerts.messages(), vec![MULTIPLE_FACES_ALERT]);

        h.session.stop().await;
        assert!(stream.tracks_stopped.load(Ordering::SeqCst));
        assert!(!h.video.attached.load(Ordering::SeqCst));
        assert!(h.surface.last.lock().unwrap().is_none());
        assert_eq!(h.session.faces_detected(), 0);

        // a new session may alert again
        h.session.start().await.unwrap();
        run_frames().await;
        assert_eq!(
            h.alerts.messages(),
            vec![MULTIPLE_FACES_ALERT, MULTIPLE_FACES_ALERT]
        );
        h.session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_are_skipped_until_detector_is_ready() {
        let detector = FixedDetector::new(2);
        let (tx, rx) = watch::channel(DetectorState::Loading);
        let h = harness(
            Access::Granted(FakeStream::new(&[])),
            rx,
            Arc::new(MemoryDocumentStore::default()),
            Arc::new(MemoryBlobStore::default()),
        );

        h.session.start().await.unwrap();
        run_frames().await;
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
        assert!(h.surface.last.lock().unwrap().is_none());

        tx.send_replace(DetectorState::Ready(detector.clone()));
        run_frames().await;
        assert!(detector.calls.load(Ordering::SeqCst) > 0);
        assert_eq!(h.session.faces_detected(), 2);
        h.session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_detector_keeps_camera_running() {
        let (_tx, rx) = watch::channel(DetectorState::Failed("timed out".to_string()));
        let h = harness(
            Access::Granted(FakeStream::new(&[])),
            rx,
            Arc::new(MemoryDocumentStore::default()),
            Arc::new(MemoryBlobStore::default()),
        );

        h.session.start().await.unwrap();
        run_frames().await;
        assert!(h.session.is_started().await);
        assert!(h.video.attached.load(Ordering::SeqCst));
        assert_eq!(h.session.faces_detected(), 0);
        h.session.stop().await;
        assert!(h.surface.clears.load(Ordering::SeqCst) >= 1);
    }

    // ── recording ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_recording_requires_started_camera() {
        let h = simple(Access::Granted(FakeStream::new(&[])), 0);

        assert!(matches!(
            h.session.start_recording().await,
            Err(CaptureError::NotStarted)
        ));
        assert_eq!(h.alerts.messages(), vec![CAMERA_NOT_STARTED_ALERT]);
        assert!(h.session.stop_recording().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recorder_failure_alerts() {
        let stream = Arc::new(FakeStream {
            chunks: Vec::new(),
            can_record: false,
            tracks_stopped: AtomicBool::new(false),
        });
        let h = simple(Access::Granted(stream), 0);

        h.session.start().await.unwrap();
        assert!(h.session.start_recording().await.is_err());
        assert_eq!(h.alerts.messages(), vec![RECORDING_FAILED_ALERT]);
        assert_eq!(*h.session.recording_state().borrow(), RecordingState::Idle);
        h.session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_recording_uploads_and_links_feedback() {
        let documents = Arc::new(MemoryDocumentStore::default());
        documents.insert(FEEDBACK_COLLECTION, "int-1", json!({ "totalScore": 80 }));
        let blobs = Arc::new(MemoryBlobStore::default());
        let h = harness(
            Access::Granted(FakeStream::new(&[b"ab", b"cd", b"ef"])),
            ready_detector(FixedDetector::new(0)),
            documents.clone(),
            blobs.clone(),
        );

        h.session.start().await.unwrap();
        h.session.start_recording().await.unwrap();
        assert_eq!(*h.session.recording_state().borrow(), RecordingState::Recording);
        assert!(matches!(
            h.session.start_recording().await,
            Err(CaptureError::AlreadyRecording)
        ));
        run_frames().await;

        let upload = h.session.stop_recording().await.unwrap();
        upload.await.unwrap();

        let url = "memory://interviews/user-1/int-1.webm".to_string();
        assert_eq!(
            *h.session.recording_state().borrow(),
            RecordingState::Uploaded { url: url.clone() }
        );
        let (content_type, blob) = blobs.blob("interviews/user-1/int-1.webm").unwrap();
        assert_eq!(content_type, "video/webm");
        assert_eq!(blob, Bytes::from_static(b"abcdef"));
        assert_eq!(
            documents.collection(FEEDBACK_COLLECTION),
            vec![("int-1".to_string(), json!({ "totalScore": 80, "videoUrl": url }))]
        );
        assert_eq!(h.alerts.messages(), vec![UPLOAD_SUCCESS_ALERT]);
        h.session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopping_camera_uploads_active_recording() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let h = harness(
            Access::Granted(FakeStream::new(&[b"xy"])),
            ready_detector(FixedDetector::new(0)),
            Arc::new(MemoryDocumentStore::default()),
            blobs.clone(),
        );

        h.session.start().await.unwrap();
        h.session.start_recording().await.unwrap();
        let upload = h.session.stop().await.unwrap();
        upload.await.unwrap();

        assert!(!h.session.is_started().await);
        assert!(blobs.blob("interviews/user-1/int-1.webm").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_upload_reports_and_alerts() {
        let documents = Arc::new(MemoryDocumentStore::default());
        let h = harness(
            Access::Granted(FakeStream::new(&[b"ab"])),
            ready_detector(FixedDetector::new(0)),
            documents.clone(),
            Arc::new(MemoryBlobStore::failing()),
        );

        h.session.start().await.unwrap();
        h.session.start_recording().await.unwrap();
        let upload = h.session.stop_recording().await.unwrap();
        upload.await.unwrap();

        assert!(matches!(
            &*h.session.recording_state().borrow(),
            RecordingState::Failed { .. }
        ));
        assert_eq!(h.alerts.messages(), vec![UPLOAD_FAILED_ALERT]);
        assert!(documents.collection(FEEDBACK_COLLECTION).is_empty());
        h.session.stop().await;
    }

    /// Fails every other frame.
    struct FlakyDetector {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FaceDetector for FlakyDetector {
        async fn detect(&self, _frame: &VideoFrame, _input_size: u32) -> Result<Vec<FaceBox>, DetectError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                return Err(DetectError::Request("backend hiccup".to_string()));
            }
            Ok(vec![
                FaceBox { x: 0.0, y: 1.0, width: 1.0, height: 1.0, score: 0.9 },
                FaceBox { x: 2.0, y: 1.0, width: 1.0, height: 1.0, score: 0.8 },
            ])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_errors_are_skipped_and_detection_continues() {
        let detector = Arc::new(FlakyDetector {
            calls: AtomicUsize::new(0),
        });
        let h = harness(
            Access::Granted(FakeStream::new(&[])),
            ready_detector(detector.clone()),
            Arc::new(MemoryDocumentStore::default()),
            Arc::new(MemoryBlobStore::default()),
        );

        h.session.start().await.unwrap();
        run_frames().await;

        assert!(detector.calls.load(Ordering::SeqCst) > 2);
        assert_eq!(h.session.faces_detected(), 2);
        let overlay = h.surface.last.lock().unwrap().clone().unwrap();
        assert_eq!(overlay.markers.len(), 2);
        assert_eq!(h.alerts.messages(), vec![MULTIPLE_FACES_ALERT]);
        h.session.stop().await;
    }

    /// Holds the worker inside `present` so a stop can land mid-frame.
    struct SlowSurface {
        entered: Arc<tokio::sync::Notify>,
        painted: AtomicBool,
    }

    impl OverlaySurface for SlowSurface {
        fn present(&self, _overlay: &Overlay) {
            self.entered.notify_one();
            std::thread::sleep(Duration::from_millis(150));
            self.painted.store(true, Ordering::SeqCst);
        }

        fn clear(&self) {
            self.painted.store(false, Ordering::SeqCst);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_waits_for_in_flight_frame_before_resetting() {
        let entered = Arc::new(tokio::sync::Notify::new());
        let surface = Arc::new(SlowSurface {
            entered: entered.clone(),
            painted: AtomicBool::new(false),
        });
        let alerts = Arc::new(Alerts::default());
        let host = CaptureHost {
            devices: Arc::new(FakeDevices(Access::Granted(FakeStream::new(&[])))),
            video: Arc::new(FakeVideo::default()),
            overlay: surface.clone(),
            notifier: alerts.clone(),
            clock: IntervalClock::factory(60),
        };
        let session = CaptureSession::new(
            "int-1",
            None,
            host,
            ready_detector(FixedDetector::new(2)),
            UploadPipeline::new(
                Arc::new(MemoryDocumentStore::default()),
                Arc::new(MemoryBlobStore::default()),
            ),
        );

        session.start().await.unwrap();
        entered.notified().await;
        // the first frame is now blocked inside present()
        session.stop().await;

        assert_eq!(session.faces_detected(), 0);
        assert!(!surface.painted.load(Ordering::SeqCst));
        assert_eq!(alerts.messages(), vec![MULTIPLE_FACES_ALERT]);

        session.start().await.unwrap();
        let realerted = tokio::time::timeout(Duration::from_secs(5), async {
            while alerts.messages().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(realerted.is_ok(), "no alert after restart: {:?}", alerts.messages());
        session.stop().await;
    }
}
