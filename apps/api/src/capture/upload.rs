//! Recording upload: push the blob to storage, then merge its URL into the
//! interview's feedback document.
//!
//! Single attempt. A failed upload leaves the feedback document untouched.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::backend::{BackendError, BlobStore, DocumentStore, StorageError, UploadSnapshot};
use crate::models::feedback::{FEEDBACK_COLLECTION, VIDEO_URL_FIELD};

pub const VIDEO_CONTENT_TYPE: &str = "video/webm";
pub const ANONYMOUS_USER: &str = "anonymous";

/// Highest progress reported while bytes are moving. 100 means the video URL
/// is recorded too.
const TRANSFER_PROGRESS_CEILING: f64 = 99.0;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload failed: {0}")]
    Storage(#[from] StorageError),

    #[error("could not record video URL: {0}")]
    Feedback(#[from] BackendError),
}

/// `interviews/{userId}/{interviewId}.webm`
pub fn recording_path(user_id: Option<&str>, interview_id: &str) -> String {
    let user_id = user_id.filter(|u| !u.is_empty()).unwrap_or(ANONYMOUS_USER);
    format!("interviews/{user_id}/{interview_id}.webm")
}

#[derive(Clone)]
pub struct UploadPipeline {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
}

impl UploadPipeline {
    pub fn new(documents: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { documents, blobs }
    }

    /// Uploads a finished recording and returns its access URL.
    ///
    /// `on_progress` receives percentages from 0 that never decrease and end
    /// at 100 once the feedback document has been updated.
    pub async fn upload_recording(
        &self,
        user_id: Option<&str>,
        interview_id: &str,
        blob: Bytes,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<String, UploadError> {
        let path = recording_path(user_id, interview_id);
        let size = blob.len();
        let high_water = Mutex::new(f64::NEG_INFINITY);

        let report = |snap: UploadSnapshot| {
            // Chunk callbacks may land out of order; only forward progress.
            let mut last = high_water.lock().unwrap_or_else(|e| e.into_inner());
            let percent = snap.percent().min(TRANSFER_PROGRESS_CEILING);
            if percent > *last {
                *last = percent;
                on_progress(percent);
            }
        };

        let url = self
            .blobs
            .upload_resumable(&path, VIDEO_CONTENT_TYPE, blob, &report)
            .await?;
        info!("Uploaded recording {path} ({size} bytes)");

        let mut fields = Map::new();
        fields.insert(VIDEO_URL_FIELD.to_string(), Value::String(url.clone()));
        self.documents
            .merge(FEEDBACK_COLLECTION, interview_id, &fields)
            .await?;

        on_progress(100.0);
        Ok(url)
    }
}
