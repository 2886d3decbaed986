//! # Configuration
//!
//! Options for the `Ranker` facade and the score store. The structs are
//! serde-ready so embedders can load them from whatever configuration
//! source they use; Podium itself never reads config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Options for a `Ranker` instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankerOptions {
    /// Identifier for this instance, used in log output. Defaults to a
    /// freshly generated UUID.
    pub id: String,
    /// Directory holding the score store. Created on `start()` if missing.
    pub storage_dir: PathBuf,
    /// Score store tuning.
    pub store: StoreConfig,
}

impl Default for RankerOptions {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            storage_dir: PathBuf::from(".rank"),
            store: StoreConfig::default(),
        }
    }
}

impl RankerOptions {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }
}

/// Score store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Rotate the active segment once it exceeds this many bytes.
    pub max_segment_size: u64,
    /// Fsync after every record. Off by default: writes are buffered to the
    /// OS and durability is bounded by `flush()` and `close()`.
    pub sync_on_write: bool,
    /// Write buffer capacity in bytes.
    pub buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_segment_size: 256 * 1024 * 1024, // 256MB
            sync_on_write: false,
            buffer_size: 64 * 1024, // 64KB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = RankerOptions::default();
        assert_eq!(opts.storage_dir, PathBuf::from(".rank"));
        assert!(!opts.id.is_empty());
        assert!(!opts.store.sync_on_write);

        // Two defaults draw distinct ids.
        assert_ne!(opts.id, RankerOptions::default().id);
    }

    #[test]
    fn test_builder_overrides() {
        let opts = RankerOptions::default()
            .with_id("league-42")
            .with_storage_dir("/tmp/league");
        assert_eq!(opts.id, "league-42");
        assert_eq!(opts.storage_dir, PathBuf::from("/tmp/league"));
    }
}
