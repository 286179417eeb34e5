use std::{
    io::Error,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// How long a document read from disk is served from memory.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Failures while persisting a [`JsonStore`] document.
///
/// Reads never fail: a missing or unparsable file is reported as absent
/// instead. Only writes and removals surface these.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: Error,
    },
    #[error("cannot serialize document for {path}: {source}")]
    SerdeError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("written document at {path} failed validation: {source}")]
    ValidationError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Last document seen on disk and when it was loaded.
struct CacheSlot<T> {
    value: Option<T>,
    loaded_at: Option<Instant>,
}

impl<T> CacheSlot<T> {
    fn fresh(&self, ttl: Duration) -> Option<&T> {
        match (&self.value, self.loaded_at) {
            (Some(value), Some(at)) if at.elapsed() < ttl => Some(value),
            _ => None,
        }
    }

    fn fill(&mut self, value: Option<T>) {
        self.loaded_at = Some(Instant::now());
        self.value = value;
    }

    fn clear(&mut self) {
        self.value = None;
        self.loaded_at = None;
    }
}

/// A JSON document on disk with atomic replacement and a short-lived cache.
///
/// Every operation takes the store's lock, so reads and writes of one file
/// are serialized within the process. Only one `JsonStore` may exist per
/// path; nothing else should write the file.
pub struct JsonStore<T> {
    path: PathBuf,
    ttl: Duration,
    slot: Mutex<CacheSlot<T>>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send,
{
    /// Creates a store for `path` with the [`DEFAULT_CACHE_TTL`].
    ///
    /// Nothing is touched on disk until the first read or write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_ttl(path, DEFAULT_CACHE_TTL)
    }

    /// Creates a store with a custom cache lifetime.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the JSON file
    /// * `ttl` - How long a loaded document is served without re-reading;
    ///   `Duration::ZERO` disables caching
    ///
    /// # Example
    ///
    /// ```rust
    /// let store: JsonStore<LedgerDocument> =
    ///     JsonStore::with_ttl(data_dir.join("notified_2024.json"), Duration::ZERO);
    /// ```
    pub fn with_ttl(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            slot: Mutex::new(CacheSlot {
                value: None,
                loaded_at: None,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the document, or `T::default()` when the file is missing or
    /// cannot be parsed.
    pub async fn read(&self) -> T {
        self.read_existing().await.unwrap_or_default()
    }

    /// Returns the document, or `None` when the file is missing or cannot be
    /// parsed, so callers can decide to rebuild it.
    pub async fn read_existing(&self) -> Option<T> {
        let mut slot = self.slot.lock().await;
        self.load_locked(&mut slot).await
    }

    /// Atomically replaces the file with `document`.
    ///
    /// The JSON is written to `<path>.tmp`, read back and validated, then
    /// renamed over the target. On failure the previous file is left as it
    /// was and the temporary file is removed.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The new document is on disk and cached
    /// * `Err(StoreError)` - Serialization, I/O or validation failed
    pub async fn write(&self, document: &T) -> Result<(), StoreError> {
        let mut slot = self.slot.lock().await;
        self.write_locked(&mut slot, document).await
    }

    /// Locked read-modify-write. The transform sees the current document (or
    /// the default one) and its result is written back and returned.
    ///
    /// # Example
    ///
    /// ```rust
    /// let doc = store
    ///     .update(|mut doc| {
    ///         doc.notified_albums.push(entry);
    ///         doc
    ///     })
    ///     .await?;
    /// ```
    pub async fn update<F>(&self, transform: F) -> Result<T, StoreError>
    where
        F: FnOnce(T) -> T,
    {
        let mut slot = self.slot.lock().await;
        let current = self.load_locked(&mut slot).await.unwrap_or_default();
        let updated = transform(current);
        self.write_locked(&mut slot, &updated).await?;
        Ok(updated)
    }

    /// Whether the backing file is present, valid or not.
    pub async fn exists(&self) -> bool {
        let _slot = self.slot.lock().await;
        async_fs::metadata(&self.path).await.is_ok()
    }

    /// Drops the cached copy so the next read goes to disk.
    pub async fn invalidate(&self) {
        self.slot.lock().await.clear();
    }

    /// Deletes the backing file. A missing file is not an error.
    pub async fn remove(&self) -> Result<(), StoreError> {
        let mut slot = self.slot.lock().await;
        slot.clear();
        match async_fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn load_locked(&self, slot: &mut CacheSlot<T>) -> Option<T> {
        if let Some(cached) = slot.fresh(self.ttl) {
            return Some(cached.clone());
        }

        let loaded = match async_fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str::<T>(&content) {
                Ok(document) => Some(document),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "invalid JSON document, treating as absent");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "document not found");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read document, treating as absent");
                None
            }
        };

        slot.fill(loaded.clone());
        loaded
    }

    async fn write_locked(&self, slot: &mut CacheSlot<T>, document: &T) -> Result<(), StoreError> {
        let tmp = self.tmp_path();
        match self.commit(&tmp, document).await {
            Ok(()) => {
                slot.fill(Some(document.clone()));
                debug!(path = %self.path.display(), "document written");
                Ok(())
            }
            Err(e) => {
                // the previous file is still in place; drop whatever we left behind
                let _ = async_fs::remove_file(&tmp).await;
                slot.clear();
                warn!(path = %self.path.display(), error = %e, "document write failed");
                Err(e)
            }
        }
    }

    /// tmp write, read back, validate, rename
    async fn commit(&self, tmp: &Path, document: &T) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                async_fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }

        let json = serde_json::to_string_pretty(document).map_err(|e| StoreError::SerdeError {
            path: self.path.clone(),
            source: e,
        })?;
        async_fs::write(tmp, json)
            .await
            .map_err(|e| self.io_error(e))?;

        let written = async_fs::read_to_string(tmp)
            .await
            .map_err(|e| self.io_error(e))?;
        serde_json::from_str::<serde_json::Value>(&written).map_err(|e| {
            StoreError::ValidationError {
                path: tmp.to_path_buf(),
                source: e,
            }
        })?;

        async_fs::rename(tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_error(&self, source: Error) -> StoreError {
        StoreError::IoError {
            path: self.path.clone(),
            source,
        }
    }
}
