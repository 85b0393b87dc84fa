//! Bounded memoization of decoded chunks

use crate::types::ChunkData;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Least-recently-used cache of decoded chunks keyed by leading coordinate.
///
/// A hit only bumps a recency stamp. Eviction scans for the oldest stamp, so
/// it costs O(capacity) but only happens on inserts, which follow a decode.
///
/// Only successful loads are stored and nothing is ever invalidated; the
/// files behind an array are assumed not to change while it is alive.
#[derive(Debug)]
pub struct ChunkCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<Vec<usize>, CacheEntry>,
    clock: u64,
    hits: u64,
    misses: u64,
}

#[derive(Debug)]
struct CacheEntry {
    chunk: Arc<ChunkData>,
    last_used: u64,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub capacity: usize,
    pub len: usize,
    pub hits: u64,
    pub misses: u64,
}

impl ChunkCache {
    /// Create a cache holding at most `capacity` chunks (0 disables caching)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Look up a chunk, marking it most recently used
    pub fn get(&self, coords: &[usize]) -> Option<Arc<ChunkData>> {
        if !self.is_enabled() {
            return None;
        }

        let mut inner = self.inner.lock();
        inner.clock += 1;
        let now = inner.clock;
        let found = inner.entries.get_mut(coords).map(|entry| {
            entry.last_used = now;
            Arc::clone(&entry.chunk)
        });
        match found {
            Some(_) => inner.hits += 1,
            None => inner.misses += 1,
        }
        found
    }

    /// Store a chunk, evicting the least recently used one when full
    pub fn insert(&self, coords: &[usize], chunk: Arc<ChunkData>) {
        if !self.is_enabled() {
            return;
        }

        let mut inner = self.inner.lock();
        if inner.entries.contains_key(coords) {
            // A concurrent load of the same chunk got here first
            return;
        }

        while inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    inner.entries.remove(&key);
                }
                None => break,
            }
        }

        inner.clock += 1;
        let last_used = inner.clock;
        inner
            .entries
            .insert(coords.to_vec(), CacheEntry { chunk, last_used });
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            capacity: self.capacity,
            len: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn chunk(value: u8) -> Arc<ChunkData> {
        Arc::new(ChunkData::U8(ArrayD::from_elem(IxDyn(&[1, 2, 2]), value)))
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = ChunkCache::new(4);
        assert!(cache.get(&[0]).is_none());
        cache.insert(&[0], chunk(1));
        assert_eq!(cache.get(&[0]).unwrap().view::<u8>().unwrap()[[0, 0, 0]], 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.len), (1, 1, 1));
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ChunkCache::new(2);
        cache.insert(&[0], chunk(0));
        cache.insert(&[1], chunk(1));
        // Touch [0] so [1] becomes the eviction candidate
        assert!(cache.get(&[0]).is_some());
        cache.insert(&[2], chunk(2));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&[0]).is_some());
        assert!(cache.get(&[1]).is_none());
        assert!(cache.get(&[2]).is_some());
    }

    #[test]
    fn test_disabled() {
        let cache = ChunkCache::new(0);
        cache.insert(&[0], chunk(0));
        assert!(cache.is_empty());
        assert!(cache.get(&[0]).is_none());
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_duplicate_insert_keeps_single_entry() {
        let cache = ChunkCache::new(2);
        cache.insert(&[3, 1], chunk(0));
        cache.insert(&[3, 1], chunk(0));
        cache.insert(&[0, 0], chunk(0));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&[3, 1]).is_some());
    }

    #[test]
    fn test_repeated_hits_keep_entry_fresh() {
        let cache = ChunkCache::new(3);
        for i in 0..3 {
            cache.insert(&[i], chunk(i as u8));
        }
        for _ in 0..5 {
            assert!(cache.get(&[0]).is_some());
        }
        assert!(cache.get(&[2]).is_some());
        cache.insert(&[3], chunk(3));
        cache.insert(&[4], chunk(4));

        // [1] and then [0] were the least recently used
        assert!(cache.get(&[1]).is_none());
        assert!(cache.get(&[0]).is_none());
        assert!(cache.get(&[2]).is_some());
        assert_eq!(cache.stats().hits, 7);
    }
}
