//! Single-threaded LRU bounded by total key + value bytes
//!
//! Entries live in a [`Slab`] and are threaded onto a recency [`List`]
//! (head = most recently used). A `HashMap` maps keys to slab indices.

use stackswap_core::list::{Linked, Links, List};
use stackswap_core::slot::Slab;
use stackswap_core::ktrace;

use std::collections::HashMap;

struct Entry {
    key: String,
    value: String,
    links: Links,
}

impl Entry {
    #[inline]
    fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

impl Linked for Entry {
    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

/// LRU cache holding at most `max_size` bytes of keys and values
pub struct SimpleLru {
    max_size: usize,
    size: usize,
    index: HashMap<String, u32>,
    entries: Slab<Entry>,
    recency: List,
}

impl SimpleLru {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            size: 0,
            index: HashMap::new(),
            entries: Slab::new(),
            recency: List::new(),
        }
    }

    /// Insert or overwrite
    pub fn put(&mut self, key: &str, value: &str) -> bool {
        match self.index.get(key).copied() {
            Some(slot) => self.replace(slot, value),
            None => self.insert(key, value),
        }
    }

    /// Insert only if absent
    pub fn put_if_absent(&mut self, key: &str, value: &str) -> bool {
        if self.index.contains_key(key) {
            return false;
        }
        self.insert(key, value)
    }

    /// Overwrite only if present
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        match self.index.get(key).copied() {
            Some(slot) => self.replace(slot, value),
            None => false,
        }
    }

    pub fn delete(&mut self, key: &str) -> bool {
        let Some(slot) = self.index.remove(key) else {
            return false;
        };
        self.unlink(slot);
        true
    }

    /// Read a value and mark it most recently used
    pub fn get(&mut self, key: &str) -> Option<String> {
        let slot = *self.index.get(key)?;
        self.recency.move_to_front(&mut self.entries, slot);
        self.entries.get(slot).map(|e| e.value.clone())
    }

    /// Bytes currently accounted
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys from most to least recently used
    pub fn keys(&self) -> Vec<String> {
        self.recency
            .iter(&self.entries)
            .filter_map(|i| self.entries.get(i).map(|e| e.key.clone()))
            .collect()
    }

    fn insert(&mut self, key: &str, value: &str) -> bool {
        let needed = key.len() + value.len();
        if needed > self.max_size {
            return false;
        }
        self.evict_until(self.max_size - needed);

        let slot = self.entries.insert(Entry {
            key: key.to_string(),
            value: value.to_string(),
            links: Links::default(),
        });
        self.recency.push_front(&mut self.entries, slot);
        self.index.insert(key.to_string(), slot);
        self.size += needed;
        true
    }

    fn replace(&mut self, slot: u32, value: &str) -> bool {
        let Some(entry) = self.entries.get(slot) else {
            return false;
        };
        let old = entry.size();
        let new = entry.key.len() + value.len();
        if new > self.max_size {
            return false;
        }

        // Pin the entry at the head so eviction takes everything else first
        self.recency.move_to_front(&mut self.entries, slot);
        self.evict_until((self.max_size + old).saturating_sub(new));

        if let Some(entry) = self.entries.get_mut(slot) {
            entry.value.clear();
            entry.value.push_str(value);
        }
        self.size = self.size - old + new;
        true
    }

    /// Drop least recently used entries until `size <= limit`
    fn evict_until(&mut self, limit: usize) {
        while self.size > limit {
            let Some(slot) = self.recency.pop_back(&mut self.entries) else {
                break;
            };
            if let Some(entry) = self.entries.remove(slot) {
                ktrace!("lru evict {:?} ({} bytes)", entry.key, entry.size());
                self.index.remove(&entry.key);
                self.size -= entry.size();
            }
        }
    }

    fn unlink(&mut self, slot: u32) {
        self.recency.remove(&mut self.entries, slot);
        if let Some(entry) = self.entries.remove(slot) {
            self.size -= entry.size();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let mut lru = SimpleLru::new(100);
        assert!(lru.put("a", "1"));
        assert!(lru.put("b", "22"));
        assert_eq!(lru.get("a").as_deref(), Some("1"));
        assert_eq!(lru.size(), 2 + 3);

        assert!(lru.delete("a"));
        assert!(!lru.delete("a"));
        assert_eq!(lru.get("a"), None);
        assert_eq!(lru.size(), 3);
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_put_if_absent_and_set() {
        let mut lru = SimpleLru::new(100);
        assert!(!lru.set("k", "v"));
        assert!(lru.put_if_absent("k", "v"));
        assert!(!lru.put_if_absent("k", "w"));
        assert_eq!(lru.get("k").as_deref(), Some("v"));
        assert!(lru.set("k", "longer"));
        assert_eq!(lru.get("k").as_deref(), Some("longer"));
        assert_eq!(lru.size(), 1 + 6);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        // Each entry is 4 bytes
        let mut lru = SimpleLru::new(12);
        lru.put("k1", "v1");
        lru.put("k2", "v2");
        lru.put("k3", "v3");

        // Touch k1 so k2 becomes the oldest
        assert!(lru.get("k1").is_some());
        lru.put("k4", "v4");

        assert_eq!(lru.get("k2"), None);
        assert_eq!(lru.keys(), vec!["k4", "k1", "k3"]);
        assert_eq!(lru.size(), 12);
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let mut lru = SimpleLru::new(8);
        assert!(lru.put("key", "val"));
        assert!(!lru.put("big", "0123456789"));
        assert!(!lru.set("key", "0123456789"));
        assert_eq!(lru.get("key").as_deref(), Some("val"));
    }

    #[test]
    fn test_growing_value_evicts_others_not_itself() {
        let mut lru = SimpleLru::new(10);
        lru.put("a", "1111");
        lru.put("b", "2222");
        assert_eq!(lru.size(), 10);

        // "a" is the oldest, but it is the one being replaced
        assert!(lru.put("a", "111111111"));
        assert_eq!(lru.keys(), vec!["a"]);
        assert_eq!(lru.size(), 10);
        assert_eq!(lru.get("b"), None);
    }

    #[test]
    fn test_reuses_freed_slots() {
        let mut lru = SimpleLru::new(6);
        for i in 0..100 {
            let key = format!("{:02}", i % 50);
            assert!(lru.put(&key, "x"));
        }
        assert_eq!(lru.len(), 2);
        assert!(lru.size() <= lru.max_size());
    }
}
