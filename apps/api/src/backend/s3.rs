use std::time::Duration;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;
use tracing::{info, warn};

use super::{BlobStore, ProgressFn, SelfHostedConfig, StorageError, UploadSnapshot};

/// S3 requires every part but the last to be at least 5 MiB.
pub const PART_SIZE: usize = 5 * 1024 * 1024;
const URL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// S3 / MinIO storage. Large blobs go through a multipart upload so progress
/// can be reported per part; the access URL is a presigned GET.
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3BlobStore {
    /// Constructs a client configured for MinIO (local) or AWS (production).
    pub async fn connect(config: &SelfHostedConfig) -> Self {
        let credentials = Credentials::new(
            &config.aws_access_key_id,
            &config.aws_secret_access_key,
            None,
            None,
            "interview-static",
        );

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(&config.s3_endpoint)
            .load()
            .await;

        // MinIO serves buckets as path segments, not subdomains.
        let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.s3_bucket.clone(),
        }
    }

    async fn put_single(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("put_object failed: {e}")))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        path: &str,
        content_type: &str,
        data: &Bytes,
        progress: ProgressFn<'_>,
    ) -> Result<(), StorageError> {
        let total = data.len() as u64;
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(path)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("create_multipart_upload failed: {e}")))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::Protocol("S3 returned no upload id".to_string()))?
            .to_string();

        let mut parts = Vec::new();
        let mut offset = 0usize;
        for (index, chunk) in data.chunks(PART_SIZE).enumerate() {
            let part_number = index as i32 + 1;
            let result = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(path)
                .upload_id(&upload_id)
                .part_number(part_number)
                .body(ByteStream::from(data.slice(offset..offset + chunk.len())))
                .send()
                .await;

            let uploaded = match result {
                Ok(out) => out,
                Err(e) => {
                    self.abort(path, &upload_id).await;
                    return Err(StorageError::S3(format!("upload_part {part_number} failed: {e}")));
                }
            };

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(String::from))
                    .part_number(part_number)
                    .build(),
            );
            offset += chunk.len();
            progress(UploadSnapshot {
                bytes_transferred: offset as u64,
                total_bytes: total,
            });
        }

        let completed = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(path)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await;
        if let Err(e) = completed {
            self.abort(path, &upload_id).await;
            return Err(StorageError::S3(format!("complete_multipart_upload failed: {e}")));
        }
        Ok(())
    }

    /// Releases the parts of a failed multipart upload. Not a retry.
    async fn abort(&self, path: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(path)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!("Could not abort multipart upload {upload_id} for {path}: {e}");
        }
    }

    async fn presigned_url(&self, path: &str) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(URL_TTL)
            .map_err(|e| StorageError::S3(format!("invalid presigning config: {e}")))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::S3(format!("presign failed: {e}")))?;
        Ok(request.uri().to_string())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload_resumable(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
        progress: ProgressFn<'_>,
    ) -> Result<String, StorageError> {
        let total = data.len() as u64;
        progress(UploadSnapshot {
            bytes_transferred: 0,
            total_bytes: total,
        });

        if data.len() <= PART_SIZE {
            self.put_single(path, content_type, data).await?;
            progress(UploadSnapshot {
                bytes_transferred: total,
                total_bytes: total,
            });
        } else {
            self.put_multipart(path, content_type, &data, progress).await?;
        }

        info!("Uploaded s3://{}/{} ({total} bytes)", self.bucket, path);
        self.presigned_url(path).await
    }
}
