//! In-memory stores for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};

use super::{BackendError, BlobStore, DocumentStore, ProgressFn, StorageError, UploadSnapshot};

#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<(String, String), Map<String, Value>>>,
    next_id: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail_writes.store(true, Ordering::SeqCst);
        store
    }

    pub fn insert(&self, collection: &str, id: &str, doc: Value) {
        let map = doc.as_object().cloned().unwrap_or_default();
        self.docs
            .lock()
            .unwrap()
            .insert((collection.to_string(), id.to_string()), map);
    }

    pub fn collection(&self, collection: &str) -> Vec<(String, Value)> {
        let docs = self.docs.lock().unwrap();
        let mut found: Vec<_> = docs
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), doc)| (id.clone(), Value::Object(doc.clone())))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }

    fn check_writable(&self) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: 503,
                message: "document store unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn add(
        &self,
        collection: &str,
        document: &Map<String, Value>,
    ) -> Result<String, BackendError> {
        self.check_writable()?;
        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.docs
            .lock()
            .unwrap()
            .insert((collection.to_string(), id.clone()), document.clone());
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, BackendError> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .get(&(collection.to_string(), id.to_string()))
            .map(|doc| Value::Object(doc.clone())))
    }

    async fn merge(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), BackendError> {
        self.check_writable()?;
        let mut docs = self.docs.lock().unwrap();
        let doc = docs
            .entry((collection.to_string(), id.to_string()))
            .or_default();
        for (k, v) in fields {
            doc.insert(k.clone(), v.clone());
        }
        Ok(())
    }
}

/// Uploads in `chunk` sized steps, reporting progress after each one.
pub struct MemoryBlobStore {
    pub chunk: usize,
    blobs: Mutex<HashMap<String, (String, Bytes)>>,
    fail: AtomicBool,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self {
            chunk: 4,
            blobs: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
        }
    }
}

impl MemoryBlobStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail.store(true, Ordering::SeqCst);
        store
    }

    pub fn blob(&self, path: &str) -> Option<(String, Bytes)> {
        self.blobs.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
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
        let mut sent = 0u64;
        for chunk in data.chunks(self.chunk.max(1)) {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Api {
                    status: 403,
                    message: "storage/unauthorized".to_string(),
                });
            }
            sent += chunk.len() as u64;
            progress(UploadSnapshot {
                bytes_transferred: sent,
                total_bytes: total,
            });
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Api {
                status: 403,
                message: "storage/unauthorized".to_string(),
            });
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), (content_type.to_string(), data));
        Ok(format!("memory://{path}"))
    }
}
