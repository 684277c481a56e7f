//! In-memory document collection with an optional JSON snapshot.
//!
//! `memory://` keeps everything in process. `file://<path>` loads the
//! snapshot (a JSON array of documents) on open and writes it back on close.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use rand::RngCore;
use serde_json::{Map, Value};

use crate::config::DatabaseConfig;
use crate::store::{DataStore, StoreError};

/// A stored record. Always carries a string `_id`.
pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";

/// Concurrent document collection.
pub struct MemoryStore {
    name: String,
    documents: DashMap<String, Document>,
    snapshot: Option<PathBuf>,
    closed: AtomicBool,
    counter: AtomicU32,
    process_id: [u8; 5],
}

impl MemoryStore {
    /// Empty store that never touches disk.
    pub fn in_memory(name: impl Into<String>) -> Self {
        let mut process_id = [0u8; 5];
        rand::thread_rng().fill_bytes(&mut process_id);
        Self {
            name: name.into(),
            documents: DashMap::new(),
            snapshot: None,
            closed: AtomicBool::new(false),
            counter: AtomicU32::new(rand::random::<u32>() & 0x007f_ffff),
            process_id,
        }
    }

    /// Open per `config.url`, loading the snapshot if one exists.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut store = Self::in_memory(config.name.clone());

        if config.url.starts_with("memory://") {
            return Ok(store);
        }
        let Some(path) = config.url.strip_prefix("file://") else {
            return Err(StoreError::UnsupportedUrl(config.url.clone()));
        };

        let path = PathBuf::from(path);
        if path.exists() {
            let loaded = tokio::task::spawn_blocking({
                let path = path.clone();
                move || load_snapshot(&path)
            })
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;

            for doc in loaded {
                let id = doc.get(ID_FIELD).and_then(Value::as_str).map(String::from);
                if let Some(id) = id {
                    store.documents.insert(id, doc);
                }
            }
            tracing::info!(path = %path.display(), count = store.documents.len(), "Loaded snapshot");
        }
        store.snapshot = Some(path);
        Ok(store)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// ObjectId-shaped id: 4 bytes of seconds, 5 random, 3 counter.
    fn next_id(&self) -> String {
        let secs = chrono::Utc::now().timestamp() as u32;
        let count = self.counter.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = Vec::with_capacity(12);
        bytes.extend_from_slice(&secs.to_be_bytes());
        bytes.extend_from_slice(&self.process_id);
        bytes.extend_from_slice(&count.to_be_bytes()[1..]);
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Insert a new document, assigning its id.
    pub fn insert(&self, mut doc: Document) -> Result<Document, StoreError> {
        self.ensure_open()?;
        let id = self.next_id();
        doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        self.documents.insert(id, doc.clone());
        Ok(doc)
    }

    pub fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.ensure_open()?;
        Ok(self.documents.get(id).map(|doc| doc.value().clone()))
    }

    /// Documents accepted by `filter`, in insertion order.
    pub fn find<F>(&self, filter: F) -> Result<Vec<Document>, StoreError>
    where
        F: Fn(&Document) -> bool,
    {
        self.ensure_open()?;
        Ok(self.collect(filter))
    }

    fn collect<F>(&self, filter: F) -> Vec<Document>
    where
        F: Fn(&Document) -> bool,
    {
        let mut docs: Vec<(String, Document)> = self
            .documents
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        docs.into_iter().map(|(_, doc)| doc).collect()
    }

    /// Merge `patch` into an existing document. The id is never changed.
    pub fn update(&self, id: &str, patch: Document) -> Result<Option<Document>, StoreError> {
        self.ensure_open()?;
        Ok(self.documents.get_mut(id).map(|mut entry| {
            for (key, value) in patch {
                if key != ID_FIELD {
                    entry.insert(key, value);
                }
            }
            entry.value().clone()
        }))
    }

    pub fn remove(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.ensure_open()?;
        Ok(self.documents.remove(id).map(|(_, doc)| doc))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let docs = self.collect(|_| true);
        let bytes = serde_json::to_vec_pretty(&docs)?;
        tokio::fs::write(path, bytes).await?;
        tracing::info!(path = %path.display(), count = docs.len(), "Saved snapshot");
        Ok(())
    }
}

fn load_snapshot(path: &Path) -> Result<Vec<Document>, StoreError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

impl DataStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            self.flush().await?;
            tracing::info!(name = %self.name, "Data store connection closed");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_assigns_object_id() {
        let store = MemoryStore::in_memory("test");
        let saved = store.insert(doc(json!({ "question": "Q" }))).unwrap();

        let id = saved[ID_FIELD].as_str().unwrap();
        assert!(crate::validation::is_object_id(id));
        assert_eq!(store.get(id).unwrap().unwrap()["question"], "Q");
    }

    #[test]
    fn test_find_keeps_insertion_order() {
        let store = MemoryStore::in_memory("test");
        for n in 0..5 {
            store.insert(doc(json!({ "n": n }))).unwrap();
        }

        let ns: Vec<_> = store
            .find(|_| true)
            .unwrap()
            .iter()
            .map(|d| d["n"].as_i64().unwrap())
            .collect();
        assert_eq!(ns, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_update_merges_and_keeps_id() {
        let store = MemoryStore::in_memory("test");
        let saved = store.insert(doc(json!({ "a": 1, "b": 2 }))).unwrap();
        let id = saved[ID_FIELD].as_str().unwrap();

        let updated = store
            .update(id, doc(json!({ "b": 3, "_id": "forged" })))
            .unwrap()
            .unwrap();
        assert_eq!(updated["a"], 1);
        assert_eq!(updated["b"], 3);
        assert_eq!(updated[ID_FIELD], id);
        assert!(store.update("missing", Document::new()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_rejects_operations() {
        let store = MemoryStore::in_memory("test");
        assert!(store.is_ready());

        store.close().await.unwrap();
        store.close().await.unwrap();

        assert!(!store.is_ready());
        assert!(matches!(store.get("x"), Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let path = std::env::temp_dir().join(format!("quiz-store-{}.json", uuid::Uuid::new_v4()));
        let config = DatabaseConfig {
            url: format!("file://{}", path.display()),
            name: "snap".into(),
        };

        let store = MemoryStore::open(&config).await.unwrap();
        store.insert(doc(json!({ "question": "persisted?" }))).unwrap();
        store.close().await.unwrap();

        let reopened = MemoryStore::open(&config).await.unwrap();
        let docs = reopened.find(|_| true).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["question"], "persisted?");

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[tokio::test]
    async fn test_unsupported_url() {
        let config = DatabaseConfig {
            url: "mongodb://localhost".into(),
            name: "x".into(),
        };
        assert!(matches!(
            MemoryStore::open(&config).await,
            Err(StoreError::UnsupportedUrl(_))
        ));
    }
}
