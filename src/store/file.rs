//! JSON file backend guarded by a sibling lock file.

use super::{Snapshot, StoreBackend, StoreError};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

/// Contents of the lock file.
#[derive(Debug, Serialize, Deserialize)]
struct LockRecord {
    owner: Uuid,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Stores the snapshot as one JSON document.
///
/// Writers take `<file>.lock` with an exclusive create, write a temporary
/// sibling, fsync it and rename it over the document. Contended locks are
/// retried with exponential backoff until `lock_timeout`; locks older than
/// `stale_after` are considered abandoned and removed.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    stale_after: Duration,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sibling(&path, "", ".lock");
        Self {
            path,
            lock_path,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    async fn acquire_lock(&self) -> Result<LockGuard, StoreError> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(500),
            max_elapsed_time: Some(self.lock_timeout),
            ..Default::default()
        };

        retry(backoff, || async { self.try_acquire_lock().await }).await
    }

    async fn try_acquire_lock(&self) -> Result<LockGuard, backoff::Error<StoreError>> {
        let opened = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .await;

        match opened {
            Ok(mut file) => {
                let record = LockRecord {
                    owner: Uuid::new_v4(),
                    pid: std::process::id(),
                    acquired_at: Utc::now(),
                };
                let guard = LockGuard {
                    path: self.lock_path.clone(),
                    owner: record.owner,
                    released: false,
                };
                let bytes = serde_json::to_vec(&record)
                    .map_err(|e| backoff::Error::permanent(StoreError::from(e)))?;
                file.write_all(&bytes)
                    .await
                    .map_err(|e| backoff::Error::permanent(self.lock_io(e)))?;
                file.sync_all()
                    .await
                    .map_err(|e| backoff::Error::permanent(self.lock_io(e)))?;
                debug!("Acquired store lock {}", self.lock_path.display());
                Ok(guard)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if let Some(observed) = self.stale_lock().await {
                    self.reclaim_stale_lock(&observed)
                        .await
                        .map_err(backoff::Error::permanent)?;
                }
                Err(backoff::Error::transient(StoreError::LockTimeout {
                    path: self.lock_path.clone(),
                    waited: self.lock_timeout,
                }))
            }
            Err(e) => Err(backoff::Error::permanent(self.lock_io(e))),
        }
    }

    /// Contents of the current lock when it is older than `stale_after`.
    ///
    /// Age comes from the record, or from the file's modification time when
    /// the record is unreadable.
    async fn stale_lock(&self) -> Option<Vec<u8>> {
        let contents = fs::read(&self.lock_path).await.ok()?;
        let stale = match serde_json::from_slice::<LockRecord>(&contents) {
            Ok(record) => Utc::now()
                .signed_duration_since(record.acquired_at)
                .to_std()
                .map(|age| age > self.stale_after)
                .unwrap_or(false),
            Err(_) => match fs::metadata(&self.lock_path).await.and_then(|m| m.modified()) {
                Ok(modified) => SystemTime::now()
                    .duration_since(modified)
                    .map(|age| age > self.stale_after)
                    .unwrap_or(false),
                Err(_) => false,
            },
        };
        stale.then_some(contents)
    }

    /// Removes the lock only if it still holds the `observed` stale record.
    ///
    /// The lock is first renamed aside, so of several reclaimers only one
    /// gets the file. A lock that turns out to be a live writer's is linked
    /// back into place.
    async fn reclaim_stale_lock(&self, observed: &[u8]) -> Result<(), StoreError> {
        let aside = sibling(
            &self.lock_path,
            ".",
            &format!(".{}.stale", Uuid::new_v4().simple()),
        );
        match fs::rename(&self.lock_path, &aside).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(self.lock_io(e)),
        }

        let moved = fs::read(&aside).await.map_err(|e| self.lock_io(e))?;
        if moved == observed {
            warn!(
                "Removed stale store lock {} (older than {:?})",
                self.lock_path.display(),
                self.stale_after
            );
        } else {
            debug!(
                "Store lock {} was retaken before reclaim, restoring it",
                self.lock_path.display()
            );
            match fs::hard_link(&aside, &self.lock_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    warn!(
                        "Store lock {} was retaken twice during reclaim",
                        self.lock_path.display()
                    );
                }
                Err(e) => return Err(self.lock_io(e)),
            }
        }

        match fs::remove_file(&aside).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.lock_io(e)),
        }
    }

    fn lock_io(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.lock_path.clone(),
            source,
        }
    }

    fn io(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = sibling(&self.path, ".", ".tmp");

        {
            let mut file = fs::File::create(&tmp_path).await.map_err(|e| self.io(e))?;
            file.write_all(&bytes).await.map_err(|e| self.io(e))?;
            file.sync_all().await.map_err(|e| self.io(e))?;
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(self.io(e));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for FileBackend {
    async fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io(e)),
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| self.io(e))?;
            }
        }

        let guard = self.acquire_lock().await?;
        let result = self.write_snapshot(snapshot).await;
        guard.release().await;
        result
    }
}

/// Held store lock. Released explicitly, or on drop as a fallback.
#[derive(Debug)]
struct LockGuard {
    path: PathBuf,
    owner: Uuid,
    released: bool,
}

impl LockGuard {
    async fn release(mut self) {
        self.released = true;
        match fs::read(&self.path).await {
            Ok(contents) if self.owns(&contents) => {
                if let Err(e) = fs::remove_file(&self.path).await {
                    warn!("Failed to remove store lock {}: {}", self.path.display(), e);
                }
            }
            Ok(_) => warn!(
                "Store lock {} was taken over by another writer",
                self.path.display()
            ),
            Err(e) => warn!("Store lock {} vanished: {}", self.path.display(), e),
        }
    }

    fn owns(&self, contents: &[u8]) -> bool {
        serde_json::from_slice::<LockRecord>(contents)
            .map(|record| record.owner == self.owner)
            .unwrap_or(false)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Ok(contents) = std::fs::read(&self.path) {
            if self.owns(&contents) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }
}

/// `dir/<prefix><file name><suffix>` next to `path`.
fn sibling(path: &Path, prefix: &str, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "deposits.json".to_string());
    path.with_file_name(format!("{}{}{}", prefix, file_name, suffix))
}
