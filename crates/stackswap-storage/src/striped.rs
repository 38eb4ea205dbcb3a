//! Sharded LRU with one lock per stripe
//!
//! A key always maps to the same stripe, so per-key semantics match
//! [`SimpleLru`]. Recency and eviction are per stripe.

use crate::error::{StorageError, StorageResult};
use crate::thread_safe::ThreadSafeLru;
use crate::Storage;

use stackswap_core::kdebug;

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;

pub struct StripedLru {
    stripes: Vec<ThreadSafeLru>,
    hasher: RandomState,
}

impl StripedLru {
    /// Smallest memory share a stripe may get
    pub const MIN_STRIPE_BYTES: usize = 1024 * 1024;

    /// Split `memory_limit` evenly across `stripe_count` stripes
    pub fn build(memory_limit: usize, stripe_count: usize) -> StorageResult<Self> {
        if stripe_count == 0 {
            return Err(StorageError::NoStripes);
        }
        let per_stripe = memory_limit / stripe_count;
        if per_stripe < Self::MIN_STRIPE_BYTES {
            return Err(StorageError::StripeTooSmall { per_stripe });
        }

        kdebug!(
            "striped lru: {} stripes x {} bytes",
            stripe_count,
            per_stripe
        );
        Ok(Self {
            stripes: (0..stripe_count)
                .map(|_| ThreadSafeLru::new(per_stripe))
                .collect(),
            hasher: RandomState::new(),
        })
    }

    #[inline]
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Bytes stored across all stripes
    pub fn size(&self) -> usize {
        self.stripes.iter().map(ThreadSafeLru::size).sum()
    }

    pub fn len(&self) -> usize {
        self.stripes.iter().map(ThreadSafeLru::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stripes.iter().all(ThreadSafeLru::is_empty)
    }

    #[inline]
    fn stripe(&self, key: &str) -> &ThreadSafeLru {
        let n = self.stripes.len() as u64;
        &self.stripes[(self.hasher.hash_one(key) % n) as usize]
    }
}

impl Storage for StripedLru {
    fn put(&self, key: &str, value: &str) -> bool {
        self.stripe(key).put(key, value)
    }

    fn put_if_absent(&self, key: &str, value: &str) -> bool {
        self.stripe(key).put_if_absent(key, value)
    }

    fn set(&self, key: &str, value: &str) -> bool {
        self.stripe(key).set(key, value)
    }

    fn delete(&self, key: &str) -> bool {
        self.stripe(key).delete(key)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.stripe(key).get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const MB: usize = 1024 * 1024;

    #[test]
    fn test_build_validation() {
        assert_eq!(StripedLru::build(8 * MB, 0).err(), Some(StorageError::NoStripes));
        assert_eq!(
            StripedLru::build(4 * MB, 8).err(),
            Some(StorageError::StripeTooSmall { per_stripe: MB / 2 })
        );
        let lru = StripedLru::build(8 * MB, 8).unwrap();
        assert_eq!(lru.stripe_count(), 8);
    }

    #[test]
    fn test_key_routes_to_one_stripe() {
        let lru = StripedLru::build(4 * MB, 4).unwrap();
        for i in 0..100 {
            assert!(lru.put(&format!("key{}", i), "value"));
        }
        assert_eq!(lru.len(), 100);
        for i in 0..100 {
            assert_eq!(lru.get(&format!("key{}", i)).as_deref(), Some("value"));
        }
        assert!(lru.set("key7", "other"));
        assert!(!lru.put_if_absent("key7", "again"));
        assert_eq!(lru.get("key7").as_deref(), Some("other"));
        assert!(lru.delete("key7"));
        assert_eq!(lru.len(), 99);
    }

    #[test]
    fn test_parallel_access() {
        let lru = Arc::new(StripedLru::build(8 * MB, 8).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let lru = lru.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        let key = format!("{}:{}", t, i);
                        assert!(lru.put(&key, "x"));
                        assert_eq!(lru.get(&key).as_deref(), Some("x"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(lru.len(), 4000);
        assert!(!lru.is_empty());
    }
}
