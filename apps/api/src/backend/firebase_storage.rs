//! Firebase Storage client speaking the resumable upload protocol:
//! one `start` request returns a session URL, then the blob is sent in
//! fixed-size chunks with the last one carrying `finalize`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{BlobStore, ProgressFn, StorageError, UploadSnapshot};

/// Chunks must be multiples of 256 KiB except for the last one.
pub const CHUNK_SIZE: usize = 4 * 256 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    download_tokens: Option<String>,
}

pub struct FirebaseStorage {
    client: Client,
    base_url: String,
    bucket: String,
    id_token: String,
    chunk_size: usize,
}

impl FirebaseStorage {
    pub fn new(client: Client, base_url: &str, bucket: &str, id_token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            id_token,
            chunk_size: CHUNK_SIZE,
        }
    }

    #[cfg(test)]
    fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    fn download_url(&self, name: &str, token: &str) -> String {
        format!(
            "{}/v0/b/{}/o/{}?alt=media&token={}",
            self.base_url,
            self.bucket,
            urlencoding::encode(name),
            token
        )
    }

    async fn start_session(
        &self,
        path: &str,
        content_type: &str,
        total: usize,
    ) -> Result<String, StorageError> {
        let response = self
            .client
            .post(format!("{}/v0/b/{}/o", self.base_url, self.bucket))
            .query(&[("name", path)])
            .header("Authorization", format!("Firebase {}", self.id_token))
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", total.to_string())
            .header("X-Goog-Upload-Header-Content-Type", content_type)
            .json(&json!({ "name": path, "contentType": content_type }))
            .send()
            .await?;
        let response = check(response).await?;

        response
            .headers()
            .get("X-Goog-Upload-URL")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| StorageError::Protocol("missing X-Goog-Upload-URL header".to_string()))
    }
}

#[async_trait]
impl BlobStore for FirebaseStorage {
    async fn upload_resumable(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
        progress: ProgressFn<'_>,
    ) -> Result<String, StorageError> {
        let total = data.len();
        let session_url = self.start_session(path, content_type, total).await?;
        debug!("Resumable upload session opened for {path} ({total} bytes)");

        progress(UploadSnapshot {
            bytes_transferred: 0,
            total_bytes: total as u64,
        });

        let mut offset = 0usize;
        let metadata = loop {
            let end = (offset + self.chunk_size).min(total);
            let last = end == total;
            let command = if last { "upload, finalize" } else { "upload" };

            let response = self
                .client
                .post(&session_url)
                .header("X-Goog-Upload-Command", command)
                .header("X-Goog-Upload-Offset", offset.to_string())
                .body(data.slice(offset..end))
                .send()
                .await?;
            let response = check(response).await?;

            offset = end;
            progress(UploadSnapshot {
                bytes_transferred: offset as u64,
                total_bytes: total as u64,
            });

            if last {
                break response.json::<ObjectMetadata>().await?;
            }
        };

        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|t| t.split(',').next())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StorageError::Protocol("upload finished without a download token".to_string()))?;

        Ok(self.download_url(&metadata.name, token))
    }
}

async fn check(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Api {
        status: status.as_u16(),
        message: body,
    })
}
