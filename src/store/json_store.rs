use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use super::document::TaskDocument;
use super::lock::StoreLock;
use crate::error::{Result, WardenError};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistence seam for the task document. Callers must hold the store lock
/// across any load-mutate-save sequence.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn load(&self) -> Result<TaskDocument>;
    async fn save(&self, doc: &TaskDocument) -> Result<()>;
}

pub struct JsonStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn lock_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "warden.json".to_string());
        self.path.with_file_name(format!("{}.lock", name))
    }

    /// Acquire the exclusive writer lock. The returned guard must be held
    /// until the save completes.
    pub async fn lock(&self) -> Result<StoreLock> {
        let path = self.lock_path();
        let timeout = self.lock_timeout;
        tokio::task::spawn_blocking(move || StoreLock::acquire(&path, timeout))
            .await
            .map_err(|e| WardenError::Store(format!("lock task panicked: {}", e)))?
    }

    /// Create the backing directory and clean up temp files left behind by
    /// interrupted writes. Does not create the document itself.
    pub async fn init(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        self.recover_interrupted_writes().await;
        Ok(())
    }

    async fn recover_interrupted_writes(&self) {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if let Ok(mut entries) = fs::read_dir(&dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "tmp") {
                    debug!(path = %path.display(), "Removing interrupted write");
                    let _ = fs::remove_file(&path).await;
                }
            }
        }
    }

    /// Write a timestamped backup of the current document, named
    /// `<original>.backup.<epoch-ms>`. Call before destructive operations.
    pub async fn write_backup(&self) -> Result<PathBuf> {
        let content = fs::read(&self.path)
            .await
            .map_err(|e| WardenError::Store(format!("read for backup: {}", e)))?;

        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "warden.json".to_string());
        let backup_path = self
            .path
            .with_file_name(format!("{}.backup.{}", name, chrono::Utc::now().timestamp_millis()));

        fs::write(&backup_path, content)
            .await
            .map_err(|e| WardenError::Write {
                path: backup_path.clone(),
                source: e,
            })?;

        warn!(path = %backup_path.display(), "Pre-mutation backup written");
        Ok(backup_path)
    }

    async fn write_atomic(&self, content: String) -> Result<()> {
        let tmp_path = self.path.with_extension("json.tmp");

        fs::write(&tmp_path, content)
            .await
            .map_err(|e| WardenError::Write {
                path: tmp_path.clone(),
                source: e,
            })?;

        // Sync before rename so the rename never publishes an empty file.
        let tmp_for_sync = tmp_path.clone();
        let sync_result = tokio::task::spawn_blocking(move || {
            std::fs::File::open(&tmp_for_sync).and_then(|file| file.sync_all())
        })
        .await;
        match sync_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to sync temp file to disk"),
            Err(e) => warn!(error = %e, "Sync task failed"),
        }

        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| WardenError::Write {
                path: self.path.clone(),
                source: e,
            })?;

        debug!(path = %self.path.display(), "Atomic write completed");
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for JsonStore {
    /// Loads the document. A doubly-encoded payload (a JSON string whose
    /// content is itself JSON) is decoded once more and the corrected form
    /// persisted immediately; anything that does not resolve to an object
    /// after that one repair pass is corruption, and the file is left
    /// untouched.
    async fn load(&self) -> Result<TaskDocument> {
        if !self.path.exists() {
            return Err(WardenError::NotInitialized);
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| WardenError::Store(format!("read {}: {}", self.path.display(), e)))?;

        let value: Value = serde_json::from_str(&content)
            .map_err(|e| WardenError::Corruption(format!("unparseable document: {}", e)))?;

        let (value, repaired) = match value {
            Value::String(inner) => {
                let decoded: Value = serde_json::from_str(&inner).map_err(|e| {
                    WardenError::Corruption(format!(
                        "document is a JSON string that does not decode to an object: {}",
                        e
                    ))
                })?;
                if !decoded.is_object() {
                    return Err(WardenError::Corruption(
                        "document is a JSON string that does not decode to an object".into(),
                    ));
                }
                warn!(path = %self.path.display(), "Double-encoded document detected, repairing");
                (decoded, true)
            }
            v if v.is_object() => (v, false),
            _ => {
                return Err(WardenError::Corruption(
                    "document root is not a JSON object".into(),
                ));
            }
        };

        let doc: TaskDocument = serde_json::from_value(value)
            .map_err(|e| WardenError::Corruption(format!("schema mismatch: {}", e)))?;

        if repaired {
            self.save(&doc).await?;
        }

        Ok(doc)
    }

    async fn save(&self, doc: &TaskDocument) -> Result<()> {
        let value = serde_json::to_value(doc)?;
        if !value.is_object() && !value.is_array() {
            return Err(WardenError::Corruption(
                "refusing to persist non-object payload".into(),
            ));
        }

        let content = serde_json::to_string_pretty(&value)?;
        self.write_atomic(content).await
    }
}
