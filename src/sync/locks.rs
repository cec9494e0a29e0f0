use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

const DEFAULT_SHARDS: usize = 64;

/// Single-writer-per-key discipline over a fixed set of async mutexes.
///
/// Keys hash onto shards, so two distinct keys may share a mutex. That only
/// over-serializes; it never lets two holders of the same key run at once.
/// Never hold two guards from the same `KeyedLocks` at a time: colliding
/// keys would deadlock.
pub struct KeyedLocks {
    shards: Vec<Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub fn with_shards(count: usize) -> Self {
        let shards = (0..count.max(1)).map(|_| Arc::new(Mutex::new(()))).collect();
        Self { shards }
    }

    /// Waits until no other task holds `key`.
    pub async fn lock<K: Hash + ?Sized>(&self, key: &K) -> OwnedMutexGuard<()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        Arc::clone(&self.shards[index]).lock_owned().await
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new()
    }
}
