//! Rebuilding accounting from the chunk directory tree.
//!
//! There is no index file. When a store is initialized it walks its root and
//! counts every file that is a chunk in its own mode. A reference-counted
//! chunk counts once and contributes its file size once, however many
//! references it holds.

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::ledger::ReferenceLedger;

/// Chunk count and total size found by a scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveredInfo {
    pub chunk_count: u64,
    pub total_size: u64,
}

/// Walks chunk directories on behalf of one [`ReferenceLedger`].
#[derive(Clone, Copy, Debug)]
pub struct RecoveryScanner {
    ledger: ReferenceLedger,
}

impl RecoveryScanner {
    pub fn new(ledger: ReferenceLedger) -> Self {
        Self { ledger }
    }

    /// Count chunks below `root`.
    ///
    /// A root that is missing or unreadable yields an empty result. Entries
    /// further down that cannot be read are skipped.
    pub fn scan(&self, root: &Path) -> RecoveredInfo {
        let mut info = RecoveredInfo::default();
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    debug!(root = %root.display(), error = %e, "chunk root not readable, nothing recovered");
                    return RecoveredInfo::default();
                }
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "skipping unreadable entry during recovery");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            if self.ledger.classify(file_name).is_none() {
                continue;
            }
            match entry.metadata() {
                Ok(meta) => {
                    info.chunk_count += 1;
                    info.total_size += meta.len();
                }
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "skipping chunk without metadata");
                }
            }
        }
        debug!(
            root = %root.display(),
            chunks = info.chunk_count,
            bytes = info.total_size,
            "recovered chunk accounting"
        );
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ChunkMode;
    use std::fs;

    fn scanner(mode: ChunkMode) -> RecoveryScanner {
        RecoveryScanner::new(ReferenceLedger::new(mode))
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let info = scanner(ChunkMode::Plain).scan(&dir.path().join("non existent"));
        assert_eq!(info, RecoveredInfo::default());
    }

    #[test]
    fn empty_root_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(scanner(ChunkMode::ReferenceCounted).scan(dir.path()), RecoveredInfo::default());
    }

    #[test]
    fn counts_files_in_nested_shards() {
        let dir = tempfile::TempDir::new().unwrap();
        let shard = dir.path().join("a").join("b");
        fs::create_dir_all(&shard).unwrap();
        fs::write(shard.join("cdef"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("a").join("99"), vec![0u8; 5]).unwrap();

        let info = scanner(ChunkMode::Plain).scan(dir.path());
        assert_eq!(info.chunk_count, 2);
        assert_eq!(info.total_size, 15);
    }

    #[test]
    fn reference_counts_do_not_multiply_size() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("abcd.7"), vec![1u8; 20]).unwrap();
        fs::write(dir.path().join("ef01.1"), vec![1u8; 3]).unwrap();

        let info = scanner(ChunkMode::ReferenceCounted).scan(dir.path());
        assert_eq!(info.chunk_count, 2);
        assert_eq!(info.total_size, 23);
    }

    #[test]
    fn ignores_other_mode_and_stray_files() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("abcd"), b"plain").unwrap();
        fs::write(dir.path().join("ef01.2"), b"counted").unwrap();
        fs::write(dir.path().join(".tmpQwErTy"), b"in flight").unwrap();
        fs::write(dir.path().join("notes.txt"), b"stray").unwrap();

        let plain = scanner(ChunkMode::Plain).scan(dir.path());
        assert_eq!(plain, RecoveredInfo { chunk_count: 1, total_size: 5 });

        let counted = scanner(ChunkMode::ReferenceCounted).scan(dir.path());
        assert_eq!(counted, RecoveredInfo { chunk_count: 1, total_size: 7 });
    }
}
