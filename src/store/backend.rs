//! Key-value persistence backends
//!
//! The registry only needs three primitives: point reads, point writes and a
//! synchronous flush. `SledBackend` is used by the node, `MemoryBackend` by tests
//! and ephemeral runs.

use crate::error::{DirectorError, DirectorResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

const TREE_TESTNETS: &str = "testnets";

/// Ordered byte-key/byte-value store
pub trait KvBackend: Send + Sync {
    fn get(&self, key: &[u8]) -> DirectorResult<Option<Vec<u8>>>;

    fn set(&self, key: &[u8], value: &[u8]) -> DirectorResult<()>;

    /// Block until every previous `set` is durable
    fn flush(&self) -> DirectorResult<()>;
}

/// sled-backed store, one tree for all testnet records
pub struct SledBackend {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledBackend {
    /// Open (or create) the database directory
    pub fn open(path: &Path) -> DirectorResult<Self> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path).map_err(|e| {
            DirectorError::Persistence(format!("Failed to open database {:?}: {}", path, e))
        })?;
        let backend = Self::from_db(db)?;
        info!("Opened sled database at {:?}", path);
        Ok(backend)
    }

    pub fn from_db(db: sled::Db) -> DirectorResult<Self> {
        let tree = db.open_tree(TREE_TESTNETS).map_err(|e| {
            DirectorError::Persistence(format!("Failed to open testnets tree: {}", e))
        })?;
        Ok(Self { db, tree })
    }
}

impl KvBackend for SledBackend {
    fn get(&self, key: &[u8]) -> DirectorResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|value| value.to_vec()))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> DirectorResult<()> {
        self.tree.insert(key, value)?;
        Ok(())
    }

    fn flush(&self) -> DirectorResult<()> {
        self.db
            .flush()
            .map_err(|e| DirectorError::Persistence(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `set` and `flush` fail until reset
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check_writable(&self) -> DirectorResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DirectorError::Persistence(
                "memory backend is read-only".to_string(),
            ));
        }
        Ok(())
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &[u8]) -> DirectorResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> DirectorResult<()> {
        self.check_writable()?;
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn flush(&self) -> DirectorResult<()> {
        self.check_writable()
    }
}
