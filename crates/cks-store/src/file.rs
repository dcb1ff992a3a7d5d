//! File-backed chunk store.
//!
//! One file per chunk, sharded below a root directory by [`PathMapper`].
//! Writes go to a hidden temporary file in the target shard directory and
//! are renamed into place, so a crash never leaves a partially written chunk
//! where the store would find it. Accounting is rebuilt by scanning the tree
//! on every [`init`](FileChunkStore::init).

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use cks_crypto::ChunkHasher;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::capacity::CapacityTracker;
use crate::config::StoreConfig;
use crate::error::{display_name, report, StoreError, StoreResult};
use crate::ledger::{ChunkEntry, ChunkMode, ReferenceLedger};
use crate::path::{ChunkLocation, PathMapper, DEFAULT_SHARD_DEPTH};
use crate::recovery::{RecoveredInfo, RecoveryScanner};
use crate::traits::ChunkStore;

/// Chunk store keeping each chunk in its own file.
///
/// A new store is unusable until [`init`](Self::init) gives it a root.
/// Several stores may share a root; each keeps private accounting that is
/// reconciled with the disk only at `init`.
pub struct FileChunkStore {
    ledger: ReferenceLedger,
    hasher: Arc<dyn ChunkHasher>,
    mapper: RwLock<Option<PathMapper>>,
    /// Held for the duration of every mutation.
    tracker: Mutex<CapacityTracker>,
}

impl FileChunkStore {
    /// Create an uninitialized store.
    pub fn new(reference_counting: bool, hasher: Arc<dyn ChunkHasher>) -> Self {
        Self {
            ledger: ReferenceLedger::new(ChunkMode::from_reference_counting(reference_counting)),
            hasher,
            mapper: RwLock::new(None),
            tracker: Mutex::new(CapacityTracker::default()),
        }
    }

    /// Create and initialize a store from a configuration.
    pub fn open(config: &StoreConfig, hasher: Arc<dyn ChunkHasher>) -> StoreResult<Self> {
        let store = Self::new(config.reference_counting, hasher);
        store.set_capacity(config.capacity);
        store.try_init(&config.root, config.shard_depth)?;
        Ok(store)
    }

    /// Point the store at `root`, creating it if needed, and recover its
    /// accounting from the files found there.
    pub fn init(&self, root: impl AsRef<Path>, shard_depth: usize) -> bool {
        let root = root.as_ref();
        match self.try_init(root, shard_depth) {
            Ok(_) => true,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "chunk store init failed");
                false
            }
        }
    }

    /// [`init`](Self::init) with [`DEFAULT_SHARD_DEPTH`].
    pub fn init_default(&self, root: impl AsRef<Path>) -> bool {
        self.init(root, DEFAULT_SHARD_DEPTH)
    }

    /// Fallible form of [`init`](Self::init). A failed init leaves the store
    /// uninitialized.
    pub fn try_init(&self, root: &Path, shard_depth: usize) -> StoreResult<RecoveredInfo> {
        let mut tracker = self.lock_tracker();
        let mut mapper = self.mapper.write().expect("lock poisoned");
        *mapper = None;
        tracker.clear();

        if root.as_os_str().is_empty() {
            return Err(StoreError::InvalidRoot(root.to_path_buf()));
        }
        fs::create_dir_all(root)?;
        if !root.is_dir() {
            return Err(StoreError::InvalidRoot(root.to_path_buf()));
        }

        let recovered = RecoveryScanner::new(self.ledger).scan(root);
        tracker.reset(recovered);
        *mapper = Some(PathMapper::new(root, shard_depth));
        info!(
            root = %root.display(),
            shard_depth,
            reference_counting = self.ledger.is_counted(),
            chunks = recovered.chunk_count,
            bytes = recovered.total_size,
            "chunk store initialized"
        );
        Ok(recovered)
    }

    /// Whether a root has been set by a successful `init`.
    pub fn is_initialized(&self) -> bool {
        self.mapper.read().expect("lock poisoned").is_some()
    }

    /// Whether chunks carry a reference count.
    pub fn reference_counting(&self) -> bool {
        self.ledger.is_counted()
    }

    /// Root directory, once initialized.
    pub fn root(&self) -> Option<PathBuf> {
        self.mapper
            .read()
            .expect("lock poisoned")
            .as_ref()
            .map(|m| m.root().to_path_buf())
    }

    /// Path of the file holding `name` in this store's representation.
    ///
    /// For an absent reference-counted chunk this is where its first
    /// reference would be written. `None` if the store is uninitialized or
    /// the name is empty.
    pub fn chunk_path(&self, name: &[u8], create_if_missing: bool) -> Option<PathBuf> {
        let result = self.mapper().and_then(|mapper| {
            mapper.to_path(name, create_if_missing)?;
            let location = mapper.locate(name)?;
            Ok(match self.ledger.find(&location)? {
                Some(entry) => entry.path,
                None => self.ledger.path_for(&location, 1),
            })
        });
        report("chunk_path", name, result)
    }

    /// Count the chunks below any directory, as this store's mode sees them.
    pub fn scan(&self, dir: &Path) -> RecoveredInfo {
        RecoveryScanner::new(self.ledger).scan(dir)
    }

    fn lock_tracker(&self) -> MutexGuard<'_, CapacityTracker> {
        self.tracker.lock().expect("lock poisoned")
    }

    fn mapper(&self) -> StoreResult<PathMapper> {
        self.mapper
            .read()
            .expect("lock poisoned")
            .clone()
            .ok_or(StoreError::NotInitialized)
    }

    fn find(&self, name: &[u8]) -> StoreResult<(ChunkLocation, Option<ChunkEntry>)> {
        let location = self.mapper()?.locate(name)?;
        let entry = self.ledger.find(&location)?;
        Ok((location, entry))
    }

    fn require(&self, name: &[u8]) -> StoreResult<(ChunkLocation, ChunkEntry)> {
        match self.find(name)? {
            (location, Some(entry)) => Ok((location, entry)),
            (_, None) => Err(StoreError::NotFound(hex::encode(name))),
        }
    }

    // -----------------------------------------------------------------------
    // Fallible operations
    // -----------------------------------------------------------------------

    pub fn try_get(&self, name: &[u8]) -> StoreResult<Vec<u8>> {
        let (_, entry) = self.require(name)?;
        Ok(fs::read(&entry.path)?)
    }

    /// Write a chunk's content to `sink`. The sink is replaced only once the
    /// full content has been written next to it.
    pub fn try_get_to_file(&self, name: &[u8], sink: &Path) -> StoreResult<()> {
        let (_, entry) = self.require(name)?;
        if is_same_file(&entry.path, sink) {
            return Ok(());
        }
        let dir = match sink.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        copy_into(dir, &entry.path, sink)?;
        Ok(())
    }

    pub fn try_store(&self, name: &[u8], content: &[u8]) -> StoreResult<()> {
        let mut tracker = self.lock_tracker();
        let mapper = self.mapper()?;
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        if content.is_empty() {
            return Err(StoreError::EmptyContent);
        }

        let location = mapper.locate(name)?;
        if let Some(entry) = self.ledger.find(&location)? {
            self.ledger.acquire(&location, &entry)?;
            return Ok(());
        }

        let size = content.len() as u64;
        tracker.ensure_room(size)?;
        fs::create_dir_all(&location.dir)?;
        let mut tmp = NamedTempFile::new_in(&location.dir)?;
        tmp.write_all(content)?;
        tmp.persist(self.ledger.path_for(&location, 1))?;
        tracker.add(size);
        debug!(name = %display_name(name), size, "chunk stored");
        Ok(())
    }

    pub fn try_store_file(&self, name: &[u8], source: &Path, delete_source: bool) -> StoreResult<()> {
        let mut tracker = self.lock_tracker();
        let mapper = self.mapper()?;
        let location = mapper.locate(name)?;
        let size = match fs::metadata(source) {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Err(StoreError::SourceMissing(source.to_path_buf())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::SourceMissing(source.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        if size == 0 {
            return Err(StoreError::EmptyContent);
        }

        if let Some(entry) = self.ledger.find(&location)? {
            let same_file = is_same_file(&entry.path, source);
            self.ledger.acquire(&location, &entry)?;
            if delete_source && !same_file {
                discard_source(name, source);
            }
            return Ok(());
        }

        tracker.ensure_room(size)?;
        fs::create_dir_all(&location.dir)?;
        let target = self.ledger.path_for(&location, 1);
        let renamed = delete_source && fs::rename(source, &target).is_ok();
        let stored = if renamed {
            size
        } else {
            copy_into(&location.dir, source, &target)?
        };
        tracker.add(stored);
        debug!(name = %display_name(name), size = stored, renamed, "chunk stored from file");

        if delete_source && !renamed {
            discard_source(name, source);
        }
        Ok(())
    }

    pub fn try_delete(&self, name: &[u8]) -> StoreResult<()> {
        let mut tracker = self.lock_tracker();
        let mapper = self.mapper()?;
        if name.is_empty() {
            return Ok(());
        }
        let location = mapper.locate(name)?;
        let Some(entry) = self.ledger.find(&location)? else {
            return Ok(());
        };
        if self.ledger.release(&location, &entry)? == 0 {
            tracker.remove(entry.size);
            debug!(name = %display_name(name), size = entry.size, "chunk deleted");
        }
        Ok(())
    }

    /// Hand a chunk to `sink` and drop this store's reference.
    ///
    /// When this store holds the last reference the chunk file itself is
    /// handed over for `sink` to take, which is a rename when `sink` is file
    /// backed on the same filesystem. Otherwise `sink` receives a copy.
    pub fn try_move_to(&self, name: &[u8], sink: &dyn ChunkStore) -> StoreResult<()> {
        let (location, entry) = self.require(name)?;
        if std::ptr::addr_eq(sink, self) {
            return Ok(());
        }

        let last_reference = entry.count <= 1;
        if !sink.store_file(name, &entry.path, last_reference) {
            return Err(StoreError::SinkRefused(hex::encode(name)));
        }

        // The sink may share this root and have renamed the file.
        let mut tracker = self.lock_tracker();
        match self.ledger.find(&location)? {
            None => tracker.remove(entry.size),
            Some(current) if self.ledger.is_counted() => {
                if self.ledger.release(&location, &current)? == 0 {
                    tracker.remove(current.size);
                }
            }
            Some(_) => {}
        }
        debug!(name = %display_name(name), last_reference, "chunk moved");
        Ok(())
    }

    /// Whether the stored content hashes to `name`.
    pub fn try_validate(&self, name: &[u8]) -> StoreResult<bool> {
        let (_, entry) = self.require(name)?;
        Ok(self.hasher.digest_file(&entry.path)? == name)
    }

    /// Remove everything below the root. The accounting is rebuilt from
    /// whatever is left, so it stays accurate if removal fails part way.
    pub fn try_clear(&self) -> StoreResult<()> {
        let mut tracker = self.lock_tracker();
        let mapper = self.mapper()?;
        let root = mapper.root();
        let result = remove_children(root);
        tracker.reset(RecoveryScanner::new(self.ledger).scan(root));
        result?;
        info!(root = %root.display(), "chunk store cleared");
        Ok(())
    }
}

/// Remove a source file whose content is already stored. Failure does not
/// undo the store.
fn discard_source(name: &[u8], source: &Path) {
    if let Err(e) = fs::remove_file(source) {
        warn!(
            name = %display_name(name),
            source = %source.display(),
            error = %e,
            "chunk stored but source file not removed"
        );
    }
}

fn remove_children(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Copy `source` to `target` through a temporary file in `dir`.
fn copy_into(dir: &Path, source: &Path, target: &Path) -> StoreResult<u64> {
    let mut input = File::open(source)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    let copied = io::copy(&mut input, &mut tmp)?;
    tmp.persist(target)?;
    Ok(copied)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl ChunkStore for FileChunkStore {
    fn get(&self, name: &[u8]) -> Vec<u8> {
        report("get", name, self.try_get(name)).unwrap_or_default()
    }

    fn get_to_file(&self, name: &[u8], sink: &Path) -> bool {
        report("get_to_file", name, self.try_get_to_file(name, sink)).is_some()
    }

    fn store(&self, name: &[u8], content: &[u8]) -> bool {
        report("store", name, self.try_store(name, content)).is_some()
    }

    fn store_file(&self, name: &[u8], source: &Path, delete_source: bool) -> bool {
        report("store_file", name, self.try_store_file(name, source, delete_source)).is_some()
    }

    fn delete(&self, name: &[u8]) -> bool {
        report("delete", name, self.try_delete(name)).is_some()
    }

    fn move_to(&self, name: &[u8], sink: &dyn ChunkStore) -> bool {
        report("move_to", name, self.try_move_to(name, sink)).is_some()
    }

    fn has(&self, name: &[u8]) -> bool {
        report("has", name, self.find(name)).is_some_and(|(_, entry)| entry.is_some())
    }

    fn validate(&self, name: &[u8]) -> bool {
        report("validate", name, self.try_validate(name)).unwrap_or(false)
    }

    fn size_of(&self, name: &[u8]) -> u64 {
        report("size_of", name, self.require(name)).map_or(0, |(_, entry)| entry.size)
    }

    fn ref_count(&self, name: &[u8]) -> u64 {
        report("ref_count", name, self.find(name))
            .and_then(|(_, entry)| entry)
            .map_or(0, |entry| entry.count)
    }

    fn size(&self) -> u64 {
        self.lock_tracker().total_size()
    }

    fn count(&self) -> u64 {
        self.lock_tracker().chunk_count()
    }

    fn capacity(&self) -> u64 {
        self.lock_tracker().capacity()
    }

    fn set_capacity(&self, capacity: u64) {
        self.lock_tracker().set_capacity(capacity);
    }

    fn clear(&self) {
        report("clear", &[], self.try_clear());
    }
}

impl std::fmt::Debug for FileChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tracker = *self.lock_tracker();
        f.debug_struct("FileChunkStore")
            .field("root", &self.root())
            .field("reference_counting", &self.reference_counting())
            .field("chunk_count", &tracker.chunk_count())
            .field("total_size", &tracker.total_size())
            .finish()
    }
}
