//! Hosted backend access: anonymous session, document store, blob storage.
//!
//! Everything is built explicitly by [`BackendContext::initialize`] and passed
//! to the components that need it. There are no process-wide singletons.
//!
//! Two deployments are supported:
//! - `firebase`: Identity Toolkit anonymous sign-in, Firestore REST, Firebase
//!   Storage resumable uploads.
//! - `self-hosted`: PostgreSQL JSONB documents and S3 multipart uploads.

pub mod auth;
pub mod firebase_storage;
pub mod firestore;
#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use self::auth::FirebaseAuth;
use self::firebase_storage::FirebaseStorage;
use self::firestore::Firestore;
use self::postgres::PgDocumentStore;
use self::s3::S3BlobStore;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum BackendConfig {
    Firebase(FirebaseConfig),
    SelfHosted(SelfHostedConfig),
}

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub endpoints: FirebaseEndpoints,
}

/// Base URLs of the Google services. Overridable for emulators and tests.
#[derive(Debug, Clone)]
pub struct FirebaseEndpoints {
    pub identity: String,
    pub firestore: String,
    pub storage: String,
}

impl Default for FirebaseEndpoints {
    fn default() -> Self {
        Self {
            identity: "https://identitytoolkit.googleapis.com".to_string(),
            firestore: "https://firestore.googleapis.com".to_string(),
            storage: "https://firebasestorage.googleapis.com".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelfHostedConfig {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Anonymous sign-in failed: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Could not decode document: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Upload protocol error: {0}")]
    Protocol(String),

    #[error("S3 error: {0}")]
    S3(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Session and store traits
// ────────────────────────────────────────────────────────────────────────────

/// The identity the backend calls are made under.
#[derive(Debug, Clone)]
pub struct Session {
    pub uid: String,
    /// Bearer token for Firebase services; `None` for self-hosted.
    pub id_token: Option<String>,
}

/// Bytes transferred so far for one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSnapshot {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadSnapshot {
    /// Percentage complete in `0.0..=100.0`. An empty upload counts as done.
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0).clamp(0.0, 100.0)
    }
}

pub type ProgressFn<'a> = &'a (dyn Fn(UploadSnapshot) + Send + Sync);

/// A document database with collections of JSON objects.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Appends a new document with a generated id and returns the id.
    async fn add(&self, collection: &str, document: &Map<String, Value>)
        -> Result<String, BackendError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, BackendError>;

    /// Writes `fields` into the document, creating it if needed. Fields not
    /// named in `fields` are left untouched.
    async fn merge(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), BackendError>;
}

/// Remote blob storage with resumable, progress-reporting uploads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads `data` to `path` in a single attempt and returns an access URL.
    /// `progress` is invoked after every transferred chunk.
    async fn upload_resumable(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
        progress: ProgressFn<'_>,
    ) -> Result<String, StorageError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Context
// ────────────────────────────────────────────────────────────────────────────

/// Explicitly constructed client context for storage and auth access.
#[derive(Clone)]
pub struct BackendContext {
    pub session: Session,
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl BackendContext {
    /// Connects to the configured backend. For Firebase this performs the
    /// anonymous sign-in and fails if it does not succeed.
    pub async fn initialize(config: &BackendConfig) -> Result<Self, BackendError> {
        match config {
            BackendConfig::Firebase(fb) => {
                let http = reqwest::Client::new();
                let auth = FirebaseAuth::new(http.clone(), &fb.api_key, &fb.endpoints.identity);
                let session = auth.sign_in_anonymously().await?;
                info!("Signed in anonymously as {}", session.uid);

                let token = session.id_token.clone().unwrap_or_default();
                let documents = Firestore::new(
                    http.clone(),
                    &fb.endpoints.firestore,
                    &fb.project_id,
                    token.clone(),
                );
                let blobs =
                    FirebaseStorage::new(http, &fb.endpoints.storage, &fb.storage_bucket, token);

                Ok(Self {
                    session,
                    documents: Arc::new(documents),
                    blobs: Arc::new(blobs),
                })
            }
            BackendConfig::SelfHosted(sh) => {
                let pool = postgres::create_pool(&sh.database_url).await?;
                let blobs = S3BlobStore::connect(sh).await;
                info!("S3 client initialized (bucket: {})", sh.s3_bucket);

                Ok(Self {
                    session: Session {
                        uid: "service".to_string(),
                        id_token: None,
                    },
                    documents: Arc::new(PgDocumentStore::new(pool)),
                    blobs: Arc::new(blobs),
                })
            }
        }
    }
}
