//! On-disk chunk representations and reference counts.
//!
//! A plain chunk is the file `{stem}`. A reference-counted chunk is the file
//! `{stem}.{count}` with `count >= 1`; taking or dropping a reference renames
//! the file. The count therefore survives restarts without an index, and the
//! two modes never recognize each other's files.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::debug;

use crate::error::StoreResult;
use crate::path::{is_chunk_stem, parse_number, ChunkLocation};

/// Physical representation used by a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkMode {
    /// One file per chunk; repeated stores are deduplicated.
    Plain,
    /// One file per chunk carrying its reference count in the file name.
    ReferenceCounted,
}

impl ChunkMode {
    pub fn from_reference_counting(reference_counting: bool) -> Self {
        if reference_counting {
            Self::ReferenceCounted
        } else {
            Self::Plain
        }
    }
}

/// A chunk file found on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkEntry {
    pub path: PathBuf,
    /// References held. Always `1` for plain chunks.
    pub count: u64,
    /// File size in bytes.
    pub size: u64,
}

/// Reads and updates chunk files for one [`ChunkMode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceLedger {
    mode: ChunkMode,
}

impl ReferenceLedger {
    pub fn new(mode: ChunkMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ChunkMode {
        self.mode
    }

    pub fn is_counted(&self) -> bool {
        self.mode == ChunkMode::ReferenceCounted
    }

    /// Reference count encoded by `file_name`, or `None` if the file is not
    /// a chunk in this mode.
    ///
    /// Hidden files (in-flight temporaries) are never chunks.
    pub fn classify(&self, file_name: &str) -> Option<u64> {
        if file_name.starts_with('.') {
            return None;
        }
        match self.mode {
            ChunkMode::Plain => is_chunk_stem(file_name).then_some(1),
            ChunkMode::ReferenceCounted => {
                let (stem, count) = file_name.rsplit_once('.')?;
                let digits_only = !count.is_empty() && count.bytes().all(|b| b.is_ascii_digit());
                if !digits_only || !is_chunk_stem(stem) {
                    return None;
                }
                match parse_number(count) {
                    0 => None,
                    n => Some(n),
                }
            }
        }
    }

    /// Path of a chunk file holding `count` references.
    pub fn path_for(&self, location: &ChunkLocation, count: u64) -> PathBuf {
        match self.mode {
            ChunkMode::Plain => location.plain_path(),
            ChunkMode::ReferenceCounted => location.counted_path(count),
        }
    }

    /// Look up the chunk file at `location`.
    pub fn find(&self, location: &ChunkLocation) -> StoreResult<Option<ChunkEntry>> {
        match self.mode {
            ChunkMode::Plain => {
                let path = location.plain_path();
                match fs::metadata(&path) {
                    Ok(meta) if meta.is_file() => Ok(Some(ChunkEntry {
                        path,
                        count: 1,
                        size: meta.len(),
                    })),
                    Ok(_) => Ok(None),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(e.into()),
                }
            }
            ChunkMode::ReferenceCounted => {
                let entries = match fs::read_dir(&location.dir) {
                    Ok(entries) => entries,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                for entry in entries {
                    let entry = entry?;
                    let file_name = entry.file_name();
                    let Some(file_name) = file_name.to_str() else {
                        continue;
                    };
                    let Some(suffix) = file_name.strip_prefix(location.stem.as_str()) else {
                        continue;
                    };
                    if !suffix.starts_with('.') {
                        continue;
                    }
                    let Some(count) = self.classify(file_name) else {
                        continue;
                    };
                    let meta = entry.metadata()?;
                    if !meta.is_file() {
                        continue;
                    }
                    return Ok(Some(ChunkEntry {
                        path: entry.path(),
                        count,
                        size: meta.len(),
                    }));
                }
                Ok(None)
            }
        }
    }

    /// Take one more reference on an existing chunk. Returns the new count.
    ///
    /// Plain chunks are left untouched and stay at `1`.
    pub fn acquire(&self, location: &ChunkLocation, entry: &ChunkEntry) -> StoreResult<u64> {
        if !self.is_counted() {
            return Ok(1);
        }
        let count = entry.count + 1;
        fs::rename(&entry.path, self.path_for(location, count))?;
        debug!(stem = %location.stem, count, "chunk reference acquired");
        Ok(count)
    }

    /// Drop one reference. Returns the remaining count; the file is removed
    /// when it reaches zero.
    pub fn release(&self, location: &ChunkLocation, entry: &ChunkEntry) -> StoreResult<u64> {
        if self.is_counted() && entry.count > 1 {
            let count = entry.count - 1;
            fs::rename(&entry.path, self.path_for(location, count))?;
            debug!(stem = %location.stem, count, "chunk reference released");
            return Ok(count);
        }
        fs::remove_file(&entry.path)?;
        debug!(stem = %location.stem, "chunk file removed");
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathMapper;

    fn location(dir: &std::path::Path) -> ChunkLocation {
        PathMapper::new(dir, 2).locate(b"ledger test chunk").unwrap()
    }

    #[test]
    fn mode_from_flag() {
        assert_eq!(ChunkMode::from_reference_counting(true), ChunkMode::ReferenceCounted);
        assert_eq!(ChunkMode::from_reference_counting(false), ChunkMode::Plain);
    }

    // -----------------------------------------------------------------------
    // classify
    // -----------------------------------------------------------------------

    #[test]
    fn plain_mode_accepts_bare_stems_only() {
        let ledger = ReferenceLedger::new(ChunkMode::Plain);
        assert_eq!(ledger.classify("abc123"), Some(1));
        assert_eq!(ledger.classify("abc123.2"), None);
        assert_eq!(ledger.classify(".tmpX1y2Z3"), None);
        assert_eq!(ledger.classify("chunk.dat"), None);
    }

    #[test]
    fn counted_mode_accepts_positive_counts_only() {
        let ledger = ReferenceLedger::new(ChunkMode::ReferenceCounted);
        assert_eq!(ledger.classify("abc123.1"), Some(1));
        assert_eq!(ledger.classify("abc123.42"), Some(42));
        assert_eq!(ledger.classify("abc123"), None);
        assert_eq!(ledger.classify("abc123.0"), None);
        assert_eq!(ledger.classify("abc123.tmp"), None);
        assert_eq!(ledger.classify("abc123.3x"), None);
        assert_eq!(ledger.classify("abc123."), None);
        assert_eq!(ledger.classify(".abc123.1"), None);
    }

    // -----------------------------------------------------------------------
    // find / acquire / release
    // -----------------------------------------------------------------------

    #[test]
    fn find_missing_directory_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let loc = location(dir.path());
        for mode in [ChunkMode::Plain, ChunkMode::ReferenceCounted] {
            assert!(ReferenceLedger::new(mode).find(&loc).unwrap().is_none());
        }
    }

    #[test]
    fn counted_lifecycle_renames_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let loc = location(dir.path());
        let ledger = ReferenceLedger::new(ChunkMode::ReferenceCounted);
        fs::create_dir_all(&loc.dir).unwrap();
        fs::write(ledger.path_for(&loc, 1), b"data").unwrap();

        let entry = ledger.find(&loc).unwrap().unwrap();
        assert_eq!(entry.count, 1);
        assert_eq!(entry.size, 4);

        assert_eq!(ledger.acquire(&loc, &entry).unwrap(), 2);
        assert!(loc.counted_path(2).is_file());
        assert!(!loc.counted_path(1).exists());

        let entry = ledger.find(&loc).unwrap().unwrap();
        assert_eq!(ledger.release(&loc, &entry).unwrap(), 1);
        let entry = ledger.find(&loc).unwrap().unwrap();
        assert_eq!(ledger.release(&loc, &entry).unwrap(), 0);
        assert!(ledger.find(&loc).unwrap().is_none());
    }

    #[test]
    fn modes_do_not_see_each_other() {
        let dir = tempfile::TempDir::new().unwrap();
        let loc = location(dir.path());
        fs::create_dir_all(&loc.dir).unwrap();
        fs::write(loc.plain_path(), b"plain").unwrap();

        let plain = ReferenceLedger::new(ChunkMode::Plain);
        let counted = ReferenceLedger::new(ChunkMode::ReferenceCounted);
        assert!(plain.find(&loc).unwrap().is_some());
        assert!(counted.find(&loc).unwrap().is_none());

        fs::remove_file(loc.plain_path()).unwrap();
        fs::write(loc.counted_path(1), b"counted").unwrap();
        assert!(plain.find(&loc).unwrap().is_none());
        assert!(counted.find(&loc).unwrap().is_some());
    }

    #[test]
    fn plain_release_removes_immediately() {
        let dir = tempfile::TempDir::new().unwrap();
        let loc = location(dir.path());
        let ledger = ReferenceLedger::new(ChunkMode::Plain);
        fs::create_dir_all(&loc.dir).unwrap();
        fs::write(loc.plain_path(), b"x").unwrap();

        let entry = ledger.find(&loc).unwrap().unwrap();
        assert_eq!(ledger.acquire(&loc, &entry).unwrap(), 1);
        assert_eq!(ledger.release(&loc, &entry).unwrap(), 0);
        assert!(!loc.plain_path().exists());
    }
}
