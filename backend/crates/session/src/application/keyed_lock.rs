//! Sharded async locks keyed by string

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::sync::{Mutex, MutexGuard};

const DEFAULT_SHARDS: usize = 64;

/// Fixed set of async mutexes; a key always maps to the same shard.
///
/// Operations on the same key are serialized. Different keys usually land on
/// different shards and run in parallel.
pub struct KeyedLocks {
    shards: Vec<Mutex<()>>,
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }
}

impl KeyedLocks {
    pub fn with_shards(count: usize) -> Self {
        let shards = (0..count.max(1)).map(|_| Mutex::new(())).collect();
        Self { shards }
    }

    /// Held across store calls, so this is an async lock
    pub async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        self.shards[self.shard_index(key)].lock().await
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_same_shard() {
        let locks = KeyedLocks::default();
        assert_eq!(locks.shard_index("user-1"), locks.shard_index("user-1"));
    }

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = KeyedLocks::with_shards(4);
        let guard = locks.lock("user-1").await;
        let second = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            locks.lock("user-1"),
        )
        .await;
        assert!(second.is_err());
        drop(guard);

        let third = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            locks.lock("user-1"),
        )
        .await;
        assert!(third.is_ok());
    }
}
