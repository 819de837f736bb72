//! Host media seams: device access, live streams, recorders, video output
//! and user alerts. A browser (wasm), desktop shell or test harness provides
//! the implementations.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: VideoConstraints,
    pub audio: bool,
}

impl Default for MediaConstraints {
    /// Camera at an ideal 1280×720 plus microphone.
    fn default() -> Self {
        Self {
            video: VideoConstraints {
                ideal_width: 1280,
                ideal_height: 720,
            },
            audio: true,
        }
    }
}

/// One decoded video frame, tightly packed RGBA8.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Bytes,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media capture is not supported on this device")]
    NotSupported,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device error: {0}")]
    Device(String),
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Arc<dyn MediaStream>, MediaError>;
}

/// A live camera + microphone stream.
pub trait MediaStream: Send + Sync {
    /// The most recent frame, or `None` until the first frame has arrived.
    fn current_frame(&self) -> Option<VideoFrame>;

    /// Starts an encoder over the stream.
    fn record(&self) -> Result<Box<dyn MediaRecorder>, MediaError>;

    /// Stops every audio and video track.
    fn stop_tracks(&self);
}

/// Encoded output of a running recorder.
#[async_trait]
pub trait MediaRecorder: Send {
    /// Next encoded chunk; `None` once the recorder has stopped and flushed.
    /// Must be cancel-safe.
    async fn next_chunk(&mut self) -> Option<Bytes>;

    /// Asks the recorder to flush and finish. Remaining chunks are still
    /// delivered through `next_chunk`.
    fn stop(&mut self);
}

/// The element the live stream is shown in.
pub trait VideoSink: Send + Sync {
    fn attach(&self, stream: &Arc<dyn MediaStream>);
    fn detach(&self);
}

/// Blocking, user-facing notifications.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}
