use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use cks_crypto::ChunkHasher;

use crate::capacity::CapacityTracker;
use crate::error::{report, StoreError, StoreResult};
use crate::traits::ChunkStore;

struct MemoryChunk {
    content: Vec<u8>,
    count: u64,
}

#[derive(Default)]
struct MemoryState {
    chunks: HashMap<Vec<u8>, MemoryChunk>,
    tracker: CapacityTracker,
}

/// In-memory, HashMap-based chunk store.
///
/// Intended for tests and embedding. Always initialized; nothing survives a
/// drop. Capacity and reference counting behave as in
/// [`FileChunkStore`](crate::FileChunkStore).
pub struct MemoryChunkStore {
    reference_counting: bool,
    hasher: Arc<dyn ChunkHasher>,
    state: RwLock<MemoryState>,
}

impl MemoryChunkStore {
    pub fn new(reference_counting: bool, hasher: Arc<dyn ChunkHasher>) -> Self {
        Self {
            reference_counting,
            hasher,
            state: RwLock::new(MemoryState::default()),
        }
    }

    pub fn reference_counting(&self) -> bool {
        self.reference_counting
    }

    /// Sorted list of all chunk names in the store.
    pub fn names(&self) -> Vec<Vec<u8>> {
        let state = self.state.read().expect("lock poisoned");
        let mut names: Vec<Vec<u8>> = state.chunks.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn try_store(&self, name: &[u8], content: &[u8]) -> StoreResult<()> {
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        if content.is_empty() {
            return Err(StoreError::EmptyContent);
        }
        let mut state = self.state.write().expect("lock poisoned");
        if let Some(chunk) = state.chunks.get_mut(name) {
            if self.reference_counting {
                chunk.count += 1;
            }
            return Ok(());
        }
        let size = content.len() as u64;
        state.tracker.ensure_room(size)?;
        state.chunks.insert(
            name.to_vec(),
            MemoryChunk {
                content: content.to_vec(),
                count: 1,
            },
        );
        state.tracker.add(size);
        Ok(())
    }

    pub fn try_store_file(&self, name: &[u8], source: &Path, delete_source: bool) -> StoreResult<()> {
        let content = match std::fs::read(source) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::SourceMissing(source.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        self.try_store(name, &content)?;
        if delete_source {
            std::fs::remove_file(source)?;
        }
        Ok(())
    }

    pub fn try_get(&self, name: &[u8]) -> StoreResult<Vec<u8>> {
        let state = self.state.read().expect("lock poisoned");
        state
            .chunks
            .get(name)
            .map(|chunk| chunk.content.clone())
            .ok_or_else(|| StoreError::NotFound(hex::encode(name)))
    }

    pub fn try_move_to(&self, name: &[u8], sink: &dyn ChunkStore) -> StoreResult<()> {
        let content = self.try_get(name)?;
        if std::ptr::addr_eq(sink, self) {
            return Ok(());
        }
        if !sink.store(name, &content) {
            return Err(StoreError::SinkRefused(hex::encode(name)));
        }
        self.delete(name);
        Ok(())
    }
}

impl ChunkStore for MemoryChunkStore {
    fn get(&self, name: &[u8]) -> Vec<u8> {
        report("get", name, self.try_get(name)).unwrap_or_default()
    }

    fn get_to_file(&self, name: &[u8], sink: &Path) -> bool {
        let result = self
            .try_get(name)
            .and_then(|content| Ok(std::fs::write(sink, content)?));
        report("get_to_file", name, result).is_some()
    }

    fn store(&self, name: &[u8], content: &[u8]) -> bool {
        report("store", name, self.try_store(name, content)).is_some()
    }

    fn store_file(&self, name: &[u8], source: &Path, delete_source: bool) -> bool {
        report("store_file", name, self.try_store_file(name, source, delete_source)).is_some()
    }

    fn delete(&self, name: &[u8]) -> bool {
        let mut state = self.state.write().expect("lock poisoned");
        let remaining = match state.chunks.get_mut(name) {
            None => return true,
            Some(chunk) if self.reference_counting && chunk.count > 1 => {
                chunk.count -= 1;
                chunk.count
            }
            Some(_) => 0,
        };
        if remaining == 0 {
            if let Some(chunk) = state.chunks.remove(name) {
                state.tracker.remove(chunk.content.len() as u64);
            }
        }
        true
    }

    fn move_to(&self, name: &[u8], sink: &dyn ChunkStore) -> bool {
        report("move_to", name, self.try_move_to(name, sink)).is_some()
    }

    fn has(&self, name: &[u8]) -> bool {
        let state = self.state.read().expect("lock poisoned");
        state.chunks.contains_key(name)
    }

    fn validate(&self, name: &[u8]) -> bool {
        let state = self.state.read().expect("lock poisoned");
        state
            .chunks
            .get(name)
            .is_some_and(|chunk| self.hasher.verify(&chunk.content, name))
    }

    fn size_of(&self, name: &[u8]) -> u64 {
        let state = self.state.read().expect("lock poisoned");
        state
            .chunks
            .get(name)
            .map_or(0, |chunk| chunk.content.len() as u64)
    }

    fn ref_count(&self, name: &[u8]) -> u64 {
        let state = self.state.read().expect("lock poisoned");
        state.chunks.get(name).map_or(0, |chunk| chunk.count)
    }

    fn size(&self) -> u64 {
        self.state.read().expect("lock poisoned").tracker.total_size()
    }

    fn count(&self) -> u64 {
        self.state.read().expect("lock poisoned").tracker.chunk_count()
    }

    fn capacity(&self) -> u64 {
        self.state.read().expect("lock poisoned").tracker.capacity()
    }

    fn set_capacity(&self, capacity: u64) {
        self.state
            .write()
            .expect("lock poisoned")
            .tracker
            .set_capacity(capacity);
    }

    fn clear(&self) {
        let mut state = self.state.write().expect("lock poisoned");
        state.chunks.clear();
        state.tracker.clear();
    }
}

impl std::fmt::Debug for MemoryChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChunkStore")
            .field("reference_counting", &self.reference_counting)
            .field("chunk_count", &self.count())
            .finish()
    }
}
