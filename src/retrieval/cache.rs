//! Bounded LRU cache of per-user candidate shortlists.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::items::Item;

/// Cache key: one user's shortlist for one retrieval context.
///
/// The context hash covers the occasion context plus the slot, catalog
/// allowance, and shortlist size, so distinct retrievals never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShortlistKey {
    pub user_id: String,
    pub ruleset_version: u64,
    pub context_hash: String,
}

#[derive(Debug, Default)]
struct Inner {
    map: HashMap<ShortlistKey, Arc<Vec<Arc<Item>>>>,
    /// Recency order, least recent at the front.
    order: VecDeque<ShortlistKey>,
}

impl Inner {
    fn touch(&mut self, key: &ShortlistKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let key = self.order.remove(pos).expect("position just found");
            self.order.push_back(key);
        }
    }
}

/// Process-wide, thread-safe LRU for candidate shortlists.
///
/// Invalidation is event-driven: wardrobe changes evict one user's
/// entries, rule set publishes clear everything.
#[derive(Debug)]
pub struct ShortlistCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl ShortlistCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Cached shortlist for a key, refreshing its recency.
    pub fn get(&self, key: &ShortlistKey) -> Option<Arc<Vec<Arc<Item>>>> {
        let mut inner = self.inner.lock();
        let hit = inner.map.get(key).cloned();
        if hit.is_some() {
            inner.touch(key);
        }
        hit
    }

    /// Store a shortlist, evicting the least recently used beyond capacity.
    pub fn put(&self, key: ShortlistKey, shortlist: Arc<Vec<Arc<Item>>>) {
        let mut inner = self.inner.lock();
        if inner.map.insert(key.clone(), shortlist).is_none() {
            inner.order.push_back(key);
        } else {
            inner.touch(&key);
        }
        while inner.map.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.map.remove(&oldest);
        }
    }

    /// Drop every entry for one user.
    pub fn invalidate_user(&self, user_id: &str) {
        let mut inner = self.inner.lock();
        inner.map.retain(|k, _| k.user_id != user_id);
        inner.order.retain(|k| k.user_id != user_id);
    }

    /// Drop everything (rule set publish).
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(user: &str, hash: &str) -> ShortlistKey {
        ShortlistKey {
            user_id: user.to_string(),
            ruleset_version: 1,
            context_hash: hash.to_string(),
        }
    }

    fn list() -> Arc<Vec<Arc<Item>>> {
        Arc::new(Vec::new())
    }

    #[test]
    fn test_lru_evicts_least_recent() {
        let cache = ShortlistCache::new(2);
        cache.put(key("u1", "a"), list());
        cache.put(key("u1", "b"), list());
        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get(&key("u1", "a")).is_some());
        cache.put(key("u1", "c"), list());
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("u1", "a")).is_some());
        assert!(cache.get(&key("u1", "b")).is_none());
        assert!(cache.get(&key("u1", "c")).is_some());
    }

    #[test]
    fn test_invalidate_user_only_hits_that_user() {
        let cache = ShortlistCache::new(8);
        cache.put(key("u1", "a"), list());
        cache.put(key("u2", "a"), list());
        cache.invalidate_user("u1");
        assert!(cache.get(&key("u1", "a")).is_none());
        assert!(cache.get(&key("u2", "a")).is_some());
    }

    #[test]
    fn test_clear_drops_everything() {
        let cache = ShortlistCache::new(8);
        cache.put(key("u1", "a"), list());
        cache.put(key("u2", "b"), list());
        cache.clear();
        assert!(cache.is_empty());
    }
}
