use std::path::PathBuf;

/// Errors from chunk store operations.
///
/// The [`ChunkStore`](crate::ChunkStore) trait collapses these into `false`
/// or empty returns; the `try_*` methods on the concrete stores surface them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store has not been given a root directory yet.
    #[error("chunk store is not initialized")]
    NotInitialized,

    /// Chunk names must be non-empty.
    #[error("chunk name is empty")]
    EmptyName,

    /// Chunk content must be non-empty.
    #[error("chunk content is empty")]
    EmptyContent,

    /// The requested chunk was not found.
    #[error("chunk not found: {0}")]
    NotFound(String),

    /// Storing the chunk would exceed the configured capacity.
    #[error("capacity exceeded: need {needed} bytes, only {available} available")]
    CapacityExceeded { needed: u64, available: u64 },

    /// The receiving store refused a moved chunk.
    #[error("sink store refused chunk {0}")]
    SinkRefused(String),

    /// The file to store a chunk from does not exist.
    #[error("source file not found: {0}")]
    SourceMissing(PathBuf),

    /// The root directory is empty or not usable.
    #[error("invalid root directory: {0:?}")]
    InvalidRoot(PathBuf),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A temporary chunk file could not be moved into place.
    #[error("failed to persist chunk file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Whether this error is an environmental fault rather than an expected
    /// refusal (missing chunk, full store, bad input).
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Persist(_) | Self::Config(_))
    }
}

/// Short hex form of a chunk name for log fields.
pub(crate) fn display_name(name: &[u8]) -> String {
    hex::encode(&name[..name.len().min(8)])
}

/// Collapse a fallible store operation into an `Option`, logging why it
/// did not succeed.
pub(crate) fn report<T>(op: &'static str, name: &[u8], result: StoreResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_fault() => {
            tracing::warn!(op, name = %display_name(name), error = %e, "chunk operation failed");
            None
        }
        Err(e) => {
            tracing::debug!(op, name = %display_name(name), reason = %e, "chunk operation refused");
            None
        }
    }
}
