//! File-backed key/value datastore.
//!
//! # Responsibilities
//! - Verify the store directory is writable before opening
//! - Serve reads and writes from an in-memory index
//! - Persist the index atomically on flush and close
//!
//! # Design Decisions
//! - Cheap to clone: the provider and monitor hold back-references
//! - Writers flush after each committed record so a forced exit keeps them
//! - Flushes are serialized; each one writes a full snapshot
//! - Operations after `close` fail instead of silently recreating state
//! - Values are opaque bytes, base64-encoded on disk

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;

/// The only supported backend kind.
pub const SUPPORTED_BACKEND: &str = "levelds";

const RECORDS_FILE: &str = "records.json";
const WRITE_CHECK_FILE: &str = ".write-check";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store directory {} is not writable: {source}", .path.display())]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt records file: {0}")]
    Corrupt(String),

    #[error("datastore is closed")]
    Closed,
}

struct Inner {
    dir: PathBuf,
    records: DashMap<String, Vec<u8>>,
    dirty: AtomicBool,
    closed: AtomicBool,
    flush_lock: Mutex<()>,
}

/// Handle to an opened datastore.
#[derive(Clone)]
pub struct Datastore {
    inner: Arc<Inner>,
}

/// Ensure `dir` exists and that files can be created inside it.
pub fn check_writable(dir: &Path) -> Result<(), StoreError> {
    let not_writable = |source| StoreError::NotWritable {
        path: dir.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(not_writable)?;
    let check = dir.join(WRITE_CHECK_FILE);
    std::fs::write(&check, b"").map_err(not_writable)?;
    std::fs::remove_file(&check).map_err(not_writable)?;
    Ok(())
}

impl Datastore {
    /// Open the datastore in `dir`, loading any persisted records.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let records = DashMap::new();
        let file = dir.join(RECORDS_FILE);
        if file.exists() {
            let content = std::fs::read(&file)?;
            let persisted: BTreeMap<String, String> = serde_json::from_slice(&content)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            for (key, value) in persisted {
                let value = STANDARD
                    .decode(value)
                    .map_err(|e| StoreError::Corrupt(format!("{key}: {e}")))?;
                records.insert(key, value);
            }
        }

        tracing::info!(
            path = %dir.display(),
            records = records.len(),
            "Datastore opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                dir: dir.to_path_buf(),
                records,
                dirty: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                flush_lock: Mutex::new(()),
            }),
        })
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_open()?;
        Ok(self.inner.records.get(key).map(|r| r.value().clone()))
    }

    pub fn has(&self, key: &str) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(self.inner.records.contains_key(key))
    }

    pub fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.inner.records.insert(key.to_string(), value);
        self.inner.dirty.store(true, Ordering::Release);
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.inner.records.remove(key).is_some() {
            self.inner.dirty.store(true, Ordering::Release);
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Write pending changes to disk.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.persist().await
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let _guard = self.inner.flush_lock.lock().await;
        if !self.inner.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let snapshot: BTreeMap<String, String> = self
            .inner
            .records
            .iter()
            .map(|r| (r.key().clone(), STANDARD.encode(r.value())))
            .collect();
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let file = self.inner.dir.join(RECORDS_FILE);
        let tmp = file.with_extension("json.tmp");
        let result = async {
            tokio::fs::write(&tmp, &bytes).await?;
            tokio::fs::rename(&tmp, &file).await
        }
        .await;
        if let Err(e) = result {
            self.inner.dirty.store(true, Ordering::Release);
            return Err(StoreError::Io(e));
        }

        tracing::debug!(records = snapshot.len(), "Datastore flushed");
        Ok(())
    }

    /// Flush and close the datastore. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Ok(());
        }
        let flushed = self.persist().await;
        self.inner.closed.store(true, Ordering::Release);
        tracing::info!(path = %self.inner.dir.display(), "Datastore closed");
        flushed
    }
}

impl std::fmt::Debug for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datastore")
            .field("dir", &self.inner.dir)
            .field("records", &self.inner.records.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_writable_creates_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested/store");
        check_writable(&dir).unwrap();
        assert!(dir.is_dir());
        assert!(!dir.join(WRITE_CHECK_FILE).exists());
    }

    #[test]
    fn test_check_writable_rejects_file_path() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            check_writable(&file),
            Err(StoreError::NotWritable { .. })
        ));
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = Datastore::open(dir.path()).unwrap();
        store.put("/a", b"alpha".to_vec()).unwrap();
        store.put("/b", vec![0, 255]).unwrap();
        store.delete("/b").unwrap();
        store.close().await.unwrap();

        let reopened = Datastore::open(dir.path()).unwrap();
        assert_eq!(reopened.get("/a").unwrap(), Some(b"alpha".to_vec()));
        assert!(!reopened.has("/b").unwrap());
    }

    #[tokio::test]
    async fn test_flush_persists_without_close() {
        let dir = tempfile::tempdir().unwrap();
        let store = Datastore::open(dir.path()).unwrap();
        store.put("/sync/latest", b"head".to_vec()).unwrap();
        store.flush().await.unwrap();

        let concurrent = store.clone();
        store.put("/monitor/last", b"fp".to_vec()).unwrap();
        let (a, b) = tokio::join!(store.flush(), concurrent.flush());
        a.unwrap();
        b.unwrap();

        // No close: the handle is simply abandoned.
        std::mem::forget(store);
        let reopened = Datastore::open(dir.path()).unwrap();
        assert_eq!(reopened.get("/sync/latest").unwrap(), Some(b"head".to_vec()));
        assert_eq!(reopened.get("/monitor/last").unwrap(), Some(b"fp".to_vec()));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let dir = tempfile::tempdir().unwrap();
        let store = Datastore::open(dir.path()).unwrap();
        let other = store.clone();

        store.close().await.unwrap();
        store.close().await.unwrap();

        assert!(other.is_closed());
        assert!(matches!(other.get("/a"), Err(StoreError::Closed)));
        assert!(matches!(other.put("/a", vec![]), Err(StoreError::Closed)));
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(RECORDS_FILE), b"{not json").unwrap();
        assert!(matches!(
            Datastore::open(dir.path()),
            Err(StoreError::Corrupt(_))
        ));
    }
}
