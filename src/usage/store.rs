//! On-disk cache of the last aggregated payload.

use super::types::Payload;
use crate::usage_reset::now_ms;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const CACHE_FILENAME: &str = "usage-cache.json";

/// A cached payload older than this is served but revalidated.
pub const STALE_CACHE_MS: i64 = 180_000;

pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Cache file inside the plugin directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CACHE_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached payload, or `None` when absent or unusable.
    pub fn read(&self) -> Option<Payload> {
        if !self.path.exists() {
            return None;
        }
        match self.read_inner() {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::debug!("Ignoring usage cache: {:#}", e);
                None
            }
        }
    }

    fn read_inner(&self) -> Result<Payload> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    /// Overwrites the cache. Failures are logged, never returned.
    pub fn write(&self, payload: &Payload) {
        if let Err(e) = self.write_inner(payload) {
            tracing::warn!("Failed to write usage cache: {:#}", e);
        }
    }

    fn write_inner(&self, payload: &Payload) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(payload).context("Failed to serialize usage cache")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

/// Whether `payload` should be revalidated now.
pub fn is_stale(payload: &Payload) -> bool {
    is_stale_at(payload, now_ms())
}

pub fn is_stale_at(payload: &Payload, now_ms: i64) -> bool {
    payload.fetched_at_ms <= 0 || now_ms - payload.fetched_at_ms >= STALE_CACHE_MS
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
