//! `SimpleLru` behind a single mutex

use crate::simple::SimpleLru;
use crate::Storage;

use std::sync::{Mutex, MutexGuard};

pub struct ThreadSafeLru {
    inner: Mutex<SimpleLru>,
}

impl ThreadSafeLru {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(SimpleLru::new(max_size)),
        }
    }

    /// Bytes currently stored
    pub fn size(&self) -> usize {
        self.lock().size()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Poisoned locks are recovered
    #[inline]
    fn lock(&self) -> MutexGuard<'_, SimpleLru> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Storage for ThreadSafeLru {
    fn put(&self, key: &str, value: &str) -> bool {
        self.lock().put(key, value)
    }

    fn put_if_absent(&self, key: &str, value: &str) -> bool {
        self.lock().put_if_absent(key, value)
    }

    fn set(&self, key: &str, value: &str) -> bool {
        self.lock().set(key, value)
    }

    fn delete(&self, key: &str) -> bool {
        self.lock().delete(key)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_storage_trait() {
        let lru = ThreadSafeLru::new(64);
        let storage: &dyn Storage = &lru;
        assert!(storage.put("a", "1"));
        assert!(!storage.put_if_absent("a", "2"));
        assert!(storage.set("a", "3"));
        assert_eq!(storage.get("a").as_deref(), Some("3"));
        assert!(storage.delete("a"));
        assert!(lru.is_empty());
    }

    #[test]
    fn test_concurrent_writers() {
        let lru = Arc::new(ThreadSafeLru::new(1 << 20));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let lru = lru.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        assert!(lru.put(&format!("{}-{}", t, i), "v"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(lru.len(), 1000);
        assert_eq!(lru.get("3-249").as_deref(), Some("v"));
    }
}
