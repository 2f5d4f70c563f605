//! In-process document store, optionally persisted to a JSON file.
//!
//! `LocalStore` stands in for the remote store in tests and in the CLI. It
//! honours the full [`FieldStore`] contract: store-assigned ids, server
//! timestamps from its own clock, shallow-merge updates, equality queries,
//! and write denial per collection (a minimal stand-in for access rules).

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::document::{resolve_server_timestamps, Document, Query, StoredDocument};
use crate::error::StoreError;
use crate::traits::FieldStore;

const ID_LEN: usize = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    collections: BTreeMap<String, BTreeMap<String, Document>>,
}

#[derive(Default)]
struct Inner {
    data: StoreData,
    last_stamp: Option<OffsetDateTime>,
    write_denied: HashSet<String>,
}

/// A [`FieldStore`] held in memory, optionally mirrored to a JSON file after
/// every write.
#[derive(Default)]
pub struct LocalStore {
    inner: Mutex<Inner>,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// An empty, purely in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a file-backed store. A missing file is an empty store; it is
    /// created on the first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                StoreError::Backend(format!("could not read '{}': {}", path.display(), e))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                StoreError::Backend(format!("could not parse '{}': {}", path.display(), e))
            })?
        } else {
            StoreData::default()
        };
        tracing::debug!(path = %path.display(), "opened local store");
        Ok(Self {
            inner: Mutex::new(Inner {
                data,
                ..Inner::default()
            }),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reject every subsequent write to `collection` with
    /// [`StoreError::PermissionDenied`]. Reads are unaffected.
    pub fn deny_writes(&self, collection: &str) -> Result<(), StoreError> {
        self.lock()?.write_denied.insert(collection.to_string());
        Ok(())
    }

    /// Insert a document under a caller-chosen id, bypassing access rules.
    ///
    /// Used to load reference data (properties, plots, crop cycles) and to
    /// reproduce store states in tests. Sentinels are resolved as for a
    /// normal write.
    pub fn seed(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        validate_collection(collection)?;
        let mut inner = self.lock()?;
        let before = self.snapshot(&inner);
        let now = next_stamp(&mut inner)?;
        let mut document = document;
        document.remove("id");
        resolve_server_timestamps(&mut document, &now);
        inner
            .data
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        self.persist_or_rollback(&mut inner, before)
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> Result<usize, StoreError> {
        Ok(self
            .lock()?
            .data
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("local store lock poisoned".to_string()))
    }

    fn check_writable(inner: &Inner, collection: &str) -> Result<(), StoreError> {
        if inner.write_denied.contains(collection) {
            return Err(StoreError::PermissionDenied {
                collection: collection.to_string(),
            });
        }
        Ok(())
    }

    /// Copy of the data to roll back to if persisting fails. In-memory
    /// stores never persist, so they take none.
    fn snapshot(&self, inner: &Inner) -> Option<StoreData> {
        self.path.as_ref().map(|_| inner.data.clone())
    }

    /// Mirror the current data to disk. On failure the in-memory data is
    /// restored to `before` so memory and file never diverge.
    fn persist_or_rollback(
        &self,
        inner: &mut Inner,
        before: Option<StoreData>,
    ) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let result = write_atomically(path, &inner.data);
        if result.is_err() {
            if let Some(before) = before {
                inner.data = before;
            }
        }
        result
    }
}

fn write_atomically(path: &Path, data: &StoreData) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| StoreError::Backend(format!("serialization error: {}", e)))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .map_err(|e| StoreError::Backend(format!("could not write '{}': {}", tmp.display(), e)))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        StoreError::Backend(format!("could not replace '{}': {}", path.display(), e))
    })
}

fn validate_collection(path: &str) -> Result<(), StoreError> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) || segments.len() % 2 == 0 {
        return Err(StoreError::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(())
}

/// Strictly increasing UTC timestamp with fixed nanosecond width, so stored
/// timestamps order correctly as strings.
fn next_stamp(inner: &mut Inner) -> Result<String, StoreError> {
    let mut now = OffsetDateTime::now_utc();
    if let Some(last) = inner.last_stamp {
        if now <= last {
            now = last + time::Duration::nanoseconds(1);
        }
    }
    inner.last_stamp = Some(now);
    now.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
    ))
    .map_err(|e| StoreError::Backend(format!("timestamp formatting failed: {}", e)))
}

fn new_id(existing: Option<&BTreeMap<String, Document>>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let id: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(ID_LEN)
            .map(char::from)
            .collect();
        if existing.map_or(true, |docs| !docs.contains_key(&id)) {
            return id;
        }
    }
}

#[async_trait]
impl FieldStore for LocalStore {
    async fn create(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<StoredDocument, StoreError> {
        validate_collection(collection)?;
        let mut inner = self.lock()?;
        Self::check_writable(&inner, collection)?;

        let before = self.snapshot(&inner);
        let now = next_stamp(&mut inner)?;
        let mut document = document;
        document.remove("id");
        resolve_server_timestamps(&mut document, &now);

        let id = new_id(inner.data.collections.get(collection));
        inner
            .data
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), document.clone());
        self.persist_or_rollback(&mut inner, before)?;

        tracing::debug!(collection, id = %id, "created document");
        Ok(StoredDocument {
            collection: collection.to_string(),
            id,
            data: document,
        })
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<StoredDocument, StoreError> {
        validate_collection(collection)?;
        let mut inner = self.lock()?;
        Self::check_writable(&inner, collection)?;

        let before = self.snapshot(&inner);
        let now = next_stamp(&mut inner)?;
        let mut patch = patch;
        patch.remove("id");
        resolve_server_timestamps(&mut patch, &now);

        let doc = inner
            .data
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        for (key, value) in patch {
            doc.insert(key, value);
        }
        let data = doc.clone();
        self.persist_or_rollback(&mut inner, before)?;

        tracing::debug!(collection, id, "updated document");
        Ok(StoredDocument {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        })
    }

    async fn get(&self, collection: &str, id: &str) -> Result<StoredDocument, StoreError> {
        validate_collection(collection)?;
        let inner = self.lock()?;
        inner
            .data
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| StoredDocument {
                collection: collection.to_string(),
                id: id.to_string(),
                data: data.clone(),
            })
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        validate_collection(collection)?;
        let inner = self.lock()?;
        let docs = inner
            .data
            .collections
            .get(collection)
            .into_iter()
            .flat_map(|docs| docs.iter())
            .map(|(id, data)| StoredDocument {
                collection: collection.to_string(),
                id: id.clone(),
                data: data.clone(),
            });
        Ok(query.apply(docs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::server_timestamp;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn collection_paths_must_have_odd_segment_count() {
        assert!(validate_collection("visits").is_ok());
        assert!(validate_collection("visits/v1/observations").is_ok());
        assert!(validate_collection("visits/v1").is_err());
        assert!(validate_collection("").is_err());
        assert!(validate_collection("visits//observations").is_err());
    }

    #[test]
    fn stamps_are_strictly_increasing_and_fixed_width() {
        let mut inner = Inner::default();
        let a = next_stamp(&mut inner).unwrap();
        let b = next_stamp(&mut inner).unwrap();
        assert!(a < b, "{a} !< {b}");
        assert_eq!(a.len(), b.len());
        assert!(a.ends_with('Z'));
    }

    #[tokio::test]
    async fn denied_collection_rejects_writes_but_not_reads() {
        let store = LocalStore::new();
        store
            .seed("plots", "p1", doc(json!({"property_id": "prop", "name": "A"})))
            .unwrap();
        store.deny_writes("plots").unwrap();

        let err = store.create("plots", Document::new()).await.unwrap_err();
        assert!(err.is_permission_denied());
        assert!(store.get("plots", "p1").await.is_ok());
    }

    #[tokio::test]
    async fn file_backed_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let id = {
            let store = LocalStore::open(&path).unwrap();
            let created = store
                .create(
                    "visits",
                    doc(json!({"status": "in_progress", "check_in_time": server_timestamp()})),
                )
                .await
                .unwrap();
            created.id
        };

        let reopened = LocalStore::open(&path).unwrap();
        let stored = reopened.get("visits", &id).await.unwrap();
        assert_eq!(stored.data["status"], json!("in_progress"));
        assert!(stored.data["check_in_time"].is_string());
    }

    #[test]
    fn only_file_backed_stores_snapshot_before_writing() {
        let memory = LocalStore::new();
        assert!(memory.snapshot(&memory.lock().unwrap()).is_none());

        let dir = tempfile::tempdir().unwrap();
        let file = LocalStore::open(dir.path().join("store.json")).unwrap();
        assert!(file.snapshot(&file.lock().unwrap()).is_some());
    }

    #[tokio::test]
    async fn failed_persist_rolls_back_the_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("store.json")).unwrap();
        store
            .create("visits", doc(json!({"status": "in_progress"})))
            .await
            .unwrap();

        std::fs::remove_dir_all(dir.path()).unwrap();
        let err = store
            .create("visits", doc(json!({"status": "completed"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert_eq!(store.count("visits").unwrap(), 1);
    }

    #[tokio::test]
    async fn client_supplied_id_is_ignored() {
        let store = LocalStore::new();
        let created = store
            .create("tasks", doc(json!({"id": "mine", "title": "t"})))
            .await
            .unwrap();
        assert_ne!(created.id, "mine");
        assert!(!created.data.contains_key("id"));
    }
}
