use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use crate::error::{Result, WardenError};

const INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_millis(250);

/// Advisory exclusive lock on the store's sibling `.lock` file. Held for the
/// duration of one load-mutate-save cycle; released on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    file: Option<File>,
}

impl StoreLock {
    /// Acquire the lock, retrying with backoff until `timeout` elapses.
    /// Blocks the calling thread; run under `spawn_blocking` from async code.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        let start = Instant::now();
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(path)
                .map_err(|e| WardenError::Store(format!("open lock file: {}", e)))?;

            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %path.display(), "Lock acquired");
                    return Ok(Self {
                        path: path.to_path_buf(),
                        file: Some(file),
                    });
                }
                Err(_) => {
                    let elapsed = start.elapsed();
                    if elapsed >= timeout {
                        return Err(WardenError::LockTimeout {
                            path: path.to_path_buf(),
                            waited_ms: elapsed.as_millis() as u64,
                        });
                    }
                    let remaining = timeout - elapsed;
                    std::thread::sleep(backoff.min(remaining));
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = fs2::FileExt::unlock(&file);
            debug!(path = %self.path.display(), "Lock released");
        }
    }
}
