//! Content-addressed chunk storage.
//!
//! A chunk is an immutable byte blob named by a digest of its own content.
//! This crate stores chunks in a local directory tree, enforces an optional
//! byte budget and can track several logical owners of one physical chunk
//! through reference counting.
//!
//! # Storage Backends
//!
//! All backends implement the [`ChunkStore`] trait:
//!
//! - [`FileChunkStore`] -- one file per chunk, sharded below a root directory
//! - [`MemoryChunkStore`] -- `HashMap`-based store for tests and embedding
//!
//! # On-disk Layout
//!
//! Chunk names are hex-encoded; the first `shard_depth` characters become
//! nested directories and the rest is the file name. With reference counting
//! enabled the file name carries the count as an extension (`{stem}.{n}`).
//! Stores in the two modes never see each other's chunks.
//!
//! # Design Rules
//!
//! 1. There is no index file. Count and size are recovered by scanning the
//!    tree whenever a store is initialized.
//! 2. Capacity is checked before any byte is written; a refused store has no
//!    side effects.
//! 3. Chunks are written to a temporary file and renamed into place.
//! 4. Every [`ChunkStore`] operation is safe to call speculatively: failures
//!    are `false` or empty results, logged through `tracing`. The `try_*`
//!    methods on the concrete stores return the [`StoreError`] instead.
//! 5. The digest algorithm is injected as a [`cks_crypto::ChunkHasher`] and
//!    is only consulted by `validate`.

pub mod capacity;
pub mod config;
pub mod error;
pub mod file;
pub mod ledger;
pub mod memory;
pub mod path;
pub mod recovery;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use capacity::CapacityTracker;
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use file::FileChunkStore;
pub use ledger::{ChunkEntry, ChunkMode, ReferenceLedger};
pub use memory::MemoryChunkStore;
pub use path::{parse_number, ChunkLocation, PathMapper, DEFAULT_SHARD_DEPTH};
pub use recovery::{RecoveredInfo, RecoveryScanner};
pub use traits::ChunkStore;
