//! Presence detection: the face detector seam, explicit model loading with a
//! definite outcome, the one-shot multiple-face alert, and an HTTP client for
//! a hosted pretrained detector.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::capture::media::VideoFrame;

/// Detector input resolution. Smaller is faster and less accurate.
pub const DETECTOR_INPUT_SIZE: u32 = 224;

/// Face count at which the proctoring alert fires.
pub const MULTIPLE_FACES_THRESHOLD: usize = 2;
pub const MULTIPLE_FACES_ALERT: &str = "Multiple faces detected!";

/// A detected face in video pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub score: f32,
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("frame has {actual} bytes, expected {expected}")]
    BadFrame { expected: usize, actual: usize },

    #[error("frame encoding failed: {0}")]
    Encode(String),

    #[error("detector request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum DetectorLoadError {
    #[error("detector model failed to load: {0}")]
    Failed(String),

    #[error("detector model did not load within {0:?}")]
    TimedOut(Duration),
}

#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect(&self, frame: &VideoFrame, input_size: u32) -> Result<Vec<FaceBox>, DetectError>;
}

/// Fetches and initialises a detector model.
#[async_trait]
pub trait DetectorLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn FaceDetector>, DetectorLoadError>;
}

#[derive(Clone)]
pub enum DetectorState {
    Loading,
    Ready(Arc<dyn FaceDetector>),
    Failed(String),
}

impl DetectorState {
    pub fn detector(&self) -> Option<Arc<dyn FaceDetector>> {
        match self {
            DetectorState::Ready(d) => Some(d.clone()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for DetectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorState::Loading => write!(f, "Loading"),
            DetectorState::Ready(_) => write!(f, "Ready"),
            DetectorState::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Loading
// ────────────────────────────────────────────────────────────────────────────

/// Loads the model, giving up after `timeout`.
pub async fn load_detector(
    loader: &dyn DetectorLoader,
    timeout: Duration,
) -> Result<Arc<dyn FaceDetector>, DetectorLoadError> {
    match tokio::time::timeout(timeout, loader.load()).await {
        Ok(result) => result,
        Err(_) => Err(DetectorLoadError::TimedOut(timeout)),
    }
}

/// Starts loading in the background and publishes the outcome.
/// Detection loops read the receiver and skip frames until it is `Ready`.
pub fn spawn_detector_load(
    loader: Arc<dyn DetectorLoader>,
    timeout: Duration,
) -> watch::Receiver<DetectorState> {
    let (tx, rx) = watch::channel(DetectorState::Loading);
    tokio::spawn(async move {
        let state = match load_detector(loader.as_ref(), timeout).await {
            Ok(detector) => {
                info!("Face detector model loaded");
                DetectorState::Ready(detector)
            }
            Err(e) => {
                warn!("Face detector unavailable: {e}");
                DetectorState::Failed(e.to_string())
            }
        };
        let _ = tx.send(state);
    });
    rx
}

/// A receiver that is already settled, for hosts that load synchronously.
pub fn ready_detector(detector: Arc<dyn FaceDetector>) -> watch::Receiver<DetectorState> {
    let (_tx, rx) = watch::channel(DetectorState::Ready(detector));
    rx
}

// ────────────────────────────────────────────────────────────────────────────
// Alert rule
// ────────────────────────────────────────────────────────────────────────────

/// Fires once per capture session when multiple faces are first seen.
#[derive(Debug, Default)]
pub struct AlertLatch {
    fired: AtomicBool,
}

impl AlertLatch {
    /// Records a face count. Returns `true` exactly once until `reset`.
    pub fn observe(&self, face_count: usize) -> bool {
        face_count >= MULTIPLE_FACES_THRESHOLD && !self.fired.swap(true, Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.fired.store(false, Ordering::SeqCst);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Hosted detector
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<FaceBox>,
}

/// Client for a hosted pretrained face detector.
///
/// Frames are shrunk so the longest side equals the input size, sent as PNG,
/// and the returned boxes are scaled back to video coordinates.
pub struct HttpFaceDetector {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFaceDetector {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FaceDetector for HttpFaceDetector {
    async fn detect(&self, frame: &VideoFrame, input_size: u32) -> Result<Vec<FaceBox>, DetectError> {
        let (png, scale) = encode_for_detection(frame, input_size)?;

        let response = self
            .client
            .post(format!("{}/detect", self.base_url))
            .json(&json!({
                "image": base64::engine::general_purpose::STANDARD.encode(png),
                "inputSize": input_size,
            }))
            .send()
            .await
            .map_err(|e| DetectError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| DetectError::Request(e.to_string()))?;

        let body: DetectResponse = response
            .json()
            .await
            .map_err(|e| DetectError::Request(e.to_string()))?;

        Ok(body
            .detections
            .into_iter()
            .map(|b| FaceBox {
                x: b.x * scale,
                y: b.y * scale,
                width: b.width * scale,
                height: b.height * scale,
                score: b.score,
            })
            .collect())
    }
}

/// Loads by checking that the hosted model answers its health check.
pub struct HttpDetectorLoader {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDetectorLoader {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl DetectorLoader for HttpDetectorLoader {
    async fn load(&self) -> Result<Arc<dyn FaceDetector>, DetectorLoadError> {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DetectorLoadError::Failed(e.to_string()))?;
        Ok(Arc::new(HttpFaceDetector::new(self.client.clone(), &self.base_url)))
    }
}

/// Downscales to fit `input_size` and encodes as PNG. Returns the bytes and
/// the factor that maps detector coordinates back to the frame.
fn encode_for_detection(frame: &VideoFrame, input_size: u32) -> Result<(Vec<u8>, f32), DetectError> {
    let expected = frame.width as usize * frame.height as usize * 4;
    if frame.rgba.len() != expected || expected == 0 {
        return Err(DetectError::BadFrame {
            expected,
            actual: frame.rgba.len(),
        });
    }
    let img = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.to_vec()).ok_or(
        DetectError::BadFrame {
            expected,
            actual: frame.rgba.len(),
        },
    )?;

    let longest = frame.width.max(frame.height);
    let (img, scale) = if longest > input_size {
        let scale = longest as f32 / input_size as f32;
        let w = ((frame.width as f32 / scale).round() as u32).max(1);
        let h = ((frame.height as f32 / scale).round() as u32).max(1);
        (image::imageops::resize(&img, w, h, FilterType::Triangle), scale)
    } else {
        (img, 1.0)
    };

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut png, ImageOutputFormat::Png)
        .map_err(|e| DetectError::Encode(e.to_string()))?;
    Ok((png.into_inner(), scale))
}
