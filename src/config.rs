use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{DbError, DbResult};
use crate::file::{DEFAULT_PAGE_SIZE, DEFAULT_POOL_CAPACITY};

/// Upper bound of the randomized lock wait, in milliseconds
pub const DEFAULT_LOCK_WAIT_MAX_MS: u64 = 2000;

/// Settings shared by the buffer pool and every heap file it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Bytes per page, header included. Must match the files being opened.
    pub page_size: usize,
    // Maximum number of pages cached by the buffer pool.
    pub pool_capacity: usize,
    // Each page request waits for its lock a random time in
    // [0, lock_wait_max_ms] before giving up and aborting.
    pub lock_wait_max_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            lock_wait_max_ms: DEFAULT_LOCK_WAIT_MAX_MS,
        }
    }
}

impl StorageConfig {
    #[inline]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    #[inline]
    pub fn pool_capacity(mut self, pool_capacity: usize) -> Self {
        self.pool_capacity = pool_capacity;
        self
    }

    #[inline]
    pub fn lock_wait_max(mut self, wait: Duration) -> Self {
        self.lock_wait_max_ms = wait.as_millis() as u64;
        self
    }

    pub fn lock_wait_max_duration(&self) -> Duration {
        Duration::from_millis(self.lock_wait_max_ms)
    }

    /// Reject settings no component can work with
    pub fn validate(&self) -> DbResult<()> {
        if self.page_size == 0 {
            return Err(DbError::Config("page_size must be positive".to_string()));
        }
        if self.pool_capacity == 0 {
            return Err(DbError::Config("pool_capacity must be positive".to_string()));
        }
        Ok(())
    }

    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DbError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        let config: Self =
            serde_json::from_str(&text).map_err(|e| DbError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
