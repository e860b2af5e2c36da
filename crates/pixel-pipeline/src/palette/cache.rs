//! Memoization of nearest-color lookups.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::color::Color32;

/// Storage for nearest-color results of one [`Palette`](super::Palette).
///
/// Implementations are shared between row-parallel workers, so every method
/// takes `&self`. Values are deterministic for a given palette, which means
/// two workers inserting the same key always insert the same index.
pub trait ColorIndexCache: Send + Sync {
    fn get(&self, color: Color32) -> Option<usize>;

    /// Remember `index` for `color`. May be ignored (a full cache, for example).
    fn insert(&self, color: Color32, index: usize);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default number of colors remembered by [`RwLockColorCache`].
pub const DEFAULT_CACHE_CAPACITY: usize = 1 << 16;

/// Bounded, append-only cache behind a [`RwLock`].
///
/// Once `capacity` colors are stored, further inserts are dropped and
/// lookups for new colors are recomputed every time.
pub struct RwLockColorCache {
    map: RwLock<HashMap<Color32, usize>>,
    capacity: usize,
}

impl RwLockColorCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RwLockColorCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ColorIndexCache for RwLockColorCache {
    fn get(&self, color: Color32) -> Option<usize> {
        // A poisoned lock still holds consistent entries: inserts are single map operations.
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&color).copied()
    }

    fn insert(&self, color: Color32, index: usize) {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        if map.len() < self.capacity {
            map.entry(color).or_insert(index);
        }
    }

    fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl std::fmt::Debug for RwLockColorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RwLockColorCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let cache = RwLockColorCache::default();
        assert!(cache.is_empty());
        cache.insert(Color32::WHITE, 3);
        assert_eq!(cache.get(Color32::WHITE), Some(3));
        assert_eq!(cache.get(Color32::BLACK), None);
    }

    #[test]
    fn test_first_insert_wins() {
        let cache = RwLockColorCache::default();
        cache.insert(Color32::WHITE, 3);
        cache.insert(Color32::WHITE, 4);
        assert_eq!(cache.get(Color32::WHITE), Some(3));
    }

    #[test]
    fn test_capacity_bound() {
        let cache = RwLockColorCache::new(2);
        for v in 0..10u8 {
            cache.insert(Color32::from_gray(v), v as usize);
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(Color32::from_gray(9)), None);
    }
}
