//! Chunk name to filesystem path mapping.
//!
//! Names are hex-encoded. Each of the first `shard_depth` hex characters
//! becomes one directory level and the rest of the encoding is the file stem:
//!
//! ```text
//! name = [0xab, 0xcd, 0xef], depth 2  ->  {root}/a/b/cdef
//! ```
//!
//! The depth is clamped so the stem always keeps at least one character.
//! The mapping is reversible: joining the directory components and the stem
//! gives back the hex encoding of the name.

use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};

/// Number of directory levels used when none is given.
pub const DEFAULT_SHARD_DEPTH: usize = 5;

/// Where a chunk lives: its shard directory and its file stem.
///
/// The stem alone is the plain representation. The reference-counted
/// representation appends `.N` (see [`ReferenceLedger`](crate::ReferenceLedger)).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkLocation {
    /// Shard directory containing the chunk file.
    pub dir: PathBuf,
    /// Hex file stem (the part of the encoded name not used for sharding).
    pub stem: String,
}

impl ChunkLocation {
    /// Path of the plain chunk file.
    pub fn plain_path(&self) -> PathBuf {
        self.dir.join(&self.stem)
    }

    /// Path of the reference-counted chunk file holding `count` references.
    pub fn counted_path(&self, count: u64) -> PathBuf {
        self.dir.join(format!("{}.{count}", self.stem))
    }
}

/// Deterministic mapping from chunk names to paths below a root directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathMapper {
    root: PathBuf,
    shard_depth: usize,
}

impl PathMapper {
    pub fn new(root: impl Into<PathBuf>, shard_depth: usize) -> Self {
        Self {
            root: root.into(),
            shard_depth,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn shard_depth(&self) -> usize {
        self.shard_depth
    }

    /// Shard directory and file stem for a name.
    pub fn locate(&self, name: &[u8]) -> StoreResult<ChunkLocation> {
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        let encoded = hex::encode(name);
        let depth = self.shard_depth.min(encoded.len() - 1);
        let mut dir = self.root.clone();
        for level in encoded[..depth].chars() {
            dir.push(level.to_string());
        }
        Ok(ChunkLocation {
            dir,
            stem: encoded[depth..].to_string(),
        })
    }

    /// Path of the plain chunk file for a name.
    ///
    /// With `create_if_missing` the shard directories are created. Creating
    /// directories that already exist is not an error.
    pub fn to_path(&self, name: &[u8], create_if_missing: bool) -> StoreResult<PathBuf> {
        let location = self.locate(name)?;
        if create_if_missing {
            std::fs::create_dir_all(&location.dir)?;
        }
        Ok(location.plain_path())
    }
}

/// Parse the leading run of ASCII digits in `text`.
///
/// Returns `0` when `text` does not start with a digit or the value does not
/// fit in a `u64`.
pub fn parse_number(text: &str) -> u64 {
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    text[..digits].parse().unwrap_or(0)
}

/// Whether `stem` could have been produced by [`PathMapper::locate`].
pub(crate) fn is_chunk_stem(stem: &str) -> bool {
    !stem.is_empty()
        && stem
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
