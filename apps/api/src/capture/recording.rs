use bytes::{Bytes, BytesMut};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::capture::media::MediaRecorder;

/// `Idle → Recording → Uploading → Uploaded | Failed`
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingState {
    Idle,
    Recording,
    Uploading { progress: f64 },
    Uploaded { url: String },
    Failed { reason: String },
}

/// A recorder plus the task buffering its chunks.
pub(crate) struct ActiveRecording {
    stop: CancellationToken,
    collector: JoinHandle<Vec<Bytes>>,
}

impl ActiveRecording {
    pub(crate) fn start(mut recorder: Box<dyn MediaRecorder>) -> Self {
        let stop = CancellationToken::new();
        let token = stop.clone();

        let collector = tokio::spawn(async move {
            let mut chunks = Vec::new();
            let mut stopping = false;
            loop {
                tokio::select! {
                    _ = token.cancelled(), if !stopping => {
                        recorder.stop();
                        stopping = true;
                    }
                    chunk = recorder.next_chunk() => match chunk {
                        Some(c) if !c.is_empty() => chunks.push(c),
                        Some(_) => {}
                        None => break,
                    }
                }
            }
            debug!("Recorder finished with {} chunk(s)", chunks.len());
            chunks
        });

        Self { stop, collector }
    }

    /// Stops the recorder, waits for the final chunks and joins them.
    pub(crate) async fn finish(self) -> Bytes {
        self.stop.cancel();
        match self.collector.await {
            Ok(chunks) => finalize(chunks),
            Err(e) => {
                warn!("Recording collector failed: {e}");
                Bytes::new()
            }
        }
    }
}

/// Concatenates recorded chunks into one blob.
pub fn finalize(chunks: Vec<Bytes>) -> Bytes {
    let size = chunks.iter().map(Bytes::len).sum();
    let mut blob = BytesMut::with_capacity(size);
    for chunk in chunks {
        blob.extend_from_slice(&chunk);
    }
    blob.freeze()
}
