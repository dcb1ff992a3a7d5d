use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::path::DEFAULT_SHARD_DEPTH;

/// Settings for opening a [`FileChunkStore`](crate::FileChunkStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the chunk tree. Created on open.
    pub root: PathBuf,
    /// Number of nested directory levels chunks are sharded across.
    pub shard_depth: usize,
    /// Track repeated stores of the same chunk as separate references.
    ///
    /// Stores opened on the same root with different settings do not see
    /// each other's chunks.
    pub reference_counting: bool,
    /// Byte budget for stored chunks. `0` means unlimited.
    pub capacity: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("chunks"),
            shard_depth: DEFAULT_SHARD_DEPTH,
            reference_counting: false,
            capacity: 0,
        }
    }
}

impl StoreConfig {
    /// A default configuration rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn with_reference_counting(mut self, enabled: bool) -> Self {
        self.reference_counting = enabled;
        self
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_shard_depth(mut self, shard_depth: usize) -> Self {
        self.shard_depth = shard_depth;
        self
    }

    /// Parse a TOML document. Missing keys take their default values.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.root, PathBuf::from("chunks"));
        assert_eq!(c.shard_depth, 5);
        assert!(!c.reference_counting);
        assert_eq!(c.capacity, 0);
    }

    #[test]
    fn builder_methods() {
        let c = StoreConfig::new("/var/chunks")
            .with_reference_counting(true)
            .with_capacity(1 << 20)
            .with_shard_depth(3);
        assert_eq!(c.root, PathBuf::from("/var/chunks"));
        assert!(c.reference_counting);
        assert_eq!(c.capacity, 1 << 20);
        assert_eq!(c.shard_depth, 3);
    }

    #[test]
    fn parse_toml() {
        let c = StoreConfig::from_toml_str(
            r#"
            root = "/data/chunks"
            reference_counting = true
            capacity = 4096
            "#,
        )
        .unwrap();
        assert_eq!(c.root, PathBuf::from("/data/chunks"));
        assert!(c.reference_counting);
        assert_eq!(c.capacity, 4096);
        assert_eq!(c.shard_depth, 5);
    }

    #[test]
    fn parse_toml_rejects_bad_types() {
        assert!(StoreConfig::from_toml_str("capacity = \"lots\"").is_err());
    }
}
