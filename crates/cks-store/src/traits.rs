use std::path::Path;

/// Content-addressed chunk store.
///
/// Every operation is safe to call speculatively: preconditions that do not
/// hold (empty names, an uninitialized store, a missing chunk) produce
/// `false`, `0` or an empty buffer, never a panic.
///
/// All implementations must satisfy these invariants:
/// - A chunk is keyed only by its name; the store does not check that the
///   name matches the content until [`validate`](ChunkStore::validate).
/// - A refused `store` (capacity, empty input) leaves the store unchanged.
/// - `size()` and `count()` track distinct physical chunks. A chunk held by
///   several references is counted once.
pub trait ChunkStore: Send + Sync {
    /// Chunk content, or an empty buffer if absent.
    fn get(&self, name: &[u8]) -> Vec<u8>;

    /// Write chunk content to `sink`, overwriting an existing file.
    ///
    /// Returns `true` only if the chunk exists and was fully written.
    fn get_to_file(&self, name: &[u8], sink: &Path) -> bool;

    /// Store `content` under `name`.
    ///
    /// Returns `true` if the chunk was stored or already existed.
    fn store(&self, name: &[u8], content: &[u8]) -> bool;

    /// Store the contents of `source` under `name`.
    ///
    /// On success `source` is removed if `delete_source` is set.
    fn store_file(&self, name: &[u8], source: &Path, delete_source: bool) -> bool;

    /// Drop one reference to a chunk. Returns `true` if the chunk was
    /// deleted, dereferenced, or never existed.
    fn delete(&self, name: &[u8]) -> bool;

    /// Hand a chunk over to `sink` and remove it from this store.
    fn move_to(&self, name: &[u8], sink: &dyn ChunkStore) -> bool;

    /// Whether a chunk exists.
    fn has(&self, name: &[u8]) -> bool;

    /// Confirm that the stored content hashes to `name`.
    ///
    /// An invalid chunk is not repaired; callers decide whether to delete it.
    fn validate(&self, name: &[u8]) -> bool;

    /// Size of one stored chunk in bytes, or `0` if absent.
    fn size_of(&self, name: &[u8]) -> u64;

    /// Number of references currently held on a chunk.
    ///
    /// `0` if absent. Stores without reference counting report `1` for any
    /// present chunk.
    fn ref_count(&self, name: &[u8]) -> u64;

    /// Total size of all stored chunks in bytes.
    fn size(&self) -> u64;

    /// Number of stored chunks.
    fn count(&self) -> u64;

    /// Returns `true` if no chunks are stored.
    fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Maximum storage capacity in bytes. `0` means unlimited.
    fn capacity(&self) -> u64;

    /// Change the capacity. Existing chunks are never evicted, even when the
    /// new capacity is below current usage.
    fn set_capacity(&self, capacity: u64);

    /// Delete every stored chunk.
    fn clear(&self);
}
