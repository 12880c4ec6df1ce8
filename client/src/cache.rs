//! Local cache adapters.
//!
//! The cache is a durable key-value store with one slot per list kind. It
//! is read once when a controller starts and written synchronously after
//! every mutating call. Failures never reach callers: a broken value reads
//! as "nothing cached", a failed write is logged.

use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tote_engine::{decode_items, encode_items, ItemList, LineItem};

/// Raw key-value storage for serialized lists.
pub trait LocalCache: Send + Sync {
    /// Read the value stored under `key`.
    fn load(&self, key: &str) -> io::Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &str) -> io::Result<()>;

    /// Remove the value under `key`.
    fn purge(&self, key: &str) -> io::Result<()>;
}

/// Process-scoped cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, String>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl LocalCache for MemoryCache {
    fn load(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.get(key).map(|value| value.clone()))
    }

    fn save(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn purge(&self, key: &str) -> io::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Cache backed by one `<key>.json` file per slot in a directory.
///
/// Values are written to a temporary file and renamed into place, so a
/// crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Open (and create if needed) a cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The directory holding the cache files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl LocalCache for FileCache {
    fn load(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, key: &str, value: &str) -> io::Result<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)
    }

    fn purge(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Typed view of one cache slot.
pub struct ListCache<T> {
    backend: Arc<dyn LocalCache>,
    key: &'static str,
    _items: PhantomData<fn() -> T>,
}

impl<T> Clone for ListCache<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            key: self.key,
            _items: PhantomData,
        }
    }
}

impl<T: LineItem> ListCache<T> {
    /// Bind the slot for `T`'s list kind.
    pub fn new(backend: Arc<dyn LocalCache>) -> Self {
        Self {
            backend,
            key: T::KIND.cache_key(),
            _items: PhantomData,
        }
    }

    /// Slot key.
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Read the cached list.
    ///
    /// Returns `None` if nothing is cached, the value cannot be read, or it
    /// does not parse.
    pub fn load(&self) -> Option<ItemList<T>> {
        let raw = match self.backend.load(self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = self.key, error = %e, "Failed to read local cache");
                return None;
            }
        };

        match decode_items(&raw) {
            Ok(list) => Some(list),
            Err(e) => {
                tracing::warn!(key = self.key, error = %e, "Ignoring malformed local cache value");
                None
            }
        }
    }

    /// Replace the cached list.
    pub fn save(&self, items: &[T]) {
        let raw = match encode_items(items) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(key = self.key, error = %e, "Failed to encode list for local cache");
                return;
            }
        };
        if let Err(e) = self.backend.save(self.key, &raw) {
            tracing::warn!(key = self.key, error = %e, "Failed to write local cache");
        }
    }

    /// Remove the cached list.
    pub fn purge(&self) {
        if let Err(e) = self.backend.purge(self.key) {
            tracing::warn!(key = self.key, error = %e, "Failed to purge local cache");
        }
    }
}
