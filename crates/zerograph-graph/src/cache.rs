//! Per-graph identity cache: remote id → canonical local proxy.
//!
//! Entries are weak, so a proxy nobody holds any more does not stay alive
//! because of the cache. Dead entries are swept when the map has grown past
//! a threshold, or removed when found on lookup.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

const MIN_PRUNE_THRESHOLD: usize = 64;

pub(crate) struct IdentityCache<T> {
    entries: HashMap<i64, Weak<RwLock<T>>>,
    prune_at: usize,
}

impl<T> Default for IdentityCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            prune_at: MIN_PRUNE_THRESHOLD,
        }
    }
}

impl<T> IdentityCache<T> {
    /// The live proxy for `id`, if any.
    pub fn get(&mut self, id: i64) -> Option<Arc<RwLock<T>>> {
        let weak = self.entries.get(&id)?;
        match weak.upgrade() {
            Some(state) => Some(state),
            None => {
                self.entries.remove(&id);
                None
            }
        }
    }

    /// Make `state` the canonical proxy for `id`.
    pub fn insert(&mut self, id: i64, state: &Arc<RwLock<T>>) {
        self.entries.insert(id, Arc::downgrade(state));
        if self.entries.len() >= self.prune_at {
            self.prune();
            self.prune_at = MIN_PRUNE_THRESHOLD.max(self.entries.len() * 2);
        }
    }

    /// Evict the entry for `id` regardless of which proxy it points at.
    pub fn release(&mut self, id: i64) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Evict the entry for `id` only if it points at `state`.
    pub fn release_if_same(&mut self, id: i64, state: &Arc<RwLock<T>>) -> bool {
        let same = self
            .entries
            .get(&id)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(state)));
        if same {
            self.entries.remove(&id);
        }
        same
    }

    /// Number of live entries.
    #[cfg(test)]
    pub fn len(&mut self) -> usize {
        self.prune();
        self.entries.len()
    }

    fn prune(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        let swept = before - self.entries.len();
        if swept > 0 {
            tracing::trace!(swept, remaining = self.entries.len(), "Pruned identity cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(v: u32) -> Arc<RwLock<u32>> {
        Arc::new(RwLock::new(v))
    }

    #[test]
    fn returns_live_entry() {
        let mut cache = IdentityCache::default();
        let s = state(1);
        cache.insert(7, &s);
        let found = cache.get(7).unwrap();
        assert!(Arc::ptr_eq(&found, &s));
    }

    #[test]
    fn dead_entries_disappear() {
        let mut cache = IdentityCache::default();
        {
            let s = state(1);
            cache.insert(7, &s);
        }
        assert!(cache.get(7).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn release_if_same_ignores_other_proxies() {
        let mut cache = IdentityCache::default();
        let a = state(1);
        let b = state(2);
        cache.insert(7, &a);
        assert!(!cache.release_if_same(7, &b));
        assert!(cache.get(7).is_some());
        assert!(cache.release_if_same(7, &a));
        assert!(cache.get(7).is_none());
    }

    #[test]
    fn pruning_bounds_growth() {
        let mut cache = IdentityCache::default();
        let keep = state(0);
        cache.insert(0, &keep);
        for id in 1..1000 {
            let s = state(id as u32);
            cache.insert(id, &s);
        }
        assert!(cache.entries.len() < MIN_PRUNE_THRESHOLD * 2);
        assert_eq!(cache.len(), 1);
    }
}
