//! Session-scoped resolution cache.
//!
//! Construct one per signed-in session and call [`ResolverCache::clear`] on
//! logout. Entries are keyed by `(reference, consumer)` and hold either a
//! displayable URL or the error classification that was reached.
//!
//! When the cache grows past its high-water mark it keeps only the most
//! recently *inserted* entries. Reads do not refresh an entry's position.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use crate::ResolveError;

/// Outcome of resolving one reference
pub type Resolution = Result<String, ResolveError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub reference: String,
    pub consumer: String,
}

impl CacheKey {
    pub fn new<R: Into<String>, C: Into<String>>(reference: R, consumer: C) -> Self {
        Self {
            reference: reference.into(),
            consumer: consumer.into(),
        }
    }
}

/// Size bounds for a [`ResolverCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    /// Prune once the entry count exceeds this
    pub high_water: usize,
    /// Entries kept after pruning
    pub retain: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            high_water: 100,
            retain: 50,
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, Resolution>,
    order: VecDeque<CacheKey>,
}

pub struct ResolverCache {
    state: Mutex<CacheState>,
    limits: CacheLimits,
}

impl Default for ResolverCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::with_limits(CacheLimits::default())
    }

    pub fn with_limits(limits: CacheLimits) -> Self {
        let limits = CacheLimits {
            high_water: limits.high_water,
            retain: limits.retain.min(limits.high_water),
        };
        Self {
            state: Mutex::new(CacheState::default()),
            limits,
        }
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    pub fn get(&self, reference: &str, consumer: &str) -> Option<Resolution> {
        let key = CacheKey::new(reference, consumer);
        self.state.lock().entries.get(&key).cloned()
    }

    pub fn contains(&self, reference: &str, consumer: &str) -> bool {
        let key = CacheKey::new(reference, consumer);
        self.state.lock().entries.contains_key(&key)
    }

    /// Insert or overwrite an entry. Overwriting moves it to the newest position.
    pub fn insert(&self, reference: &str, consumer: &str, resolution: Resolution) {
        let key = CacheKey::new(reference, consumer);
        let mut state = self.state.lock();

        if state.entries.insert(key.clone(), resolution).is_some() {
            state.order.retain(|existing| existing != &key);
        }
        state.order.push_back(key);

        if state.entries.len() > self.limits.high_water {
            let excess = state.order.len().saturating_sub(self.limits.retain);
            let evicted: Vec<CacheKey> = state.order.drain(..excess).collect();
            for key in evicted {
                state.entries.remove(&key);
            }
        }
    }

    /// Drop one entry so the next resolution re-derives it
    pub fn invalidate(&self, reference: &str, consumer: &str) -> bool {
        let key = CacheKey::new(reference, consumer);
        let mut state = self.state.lock();
        let removed = state.entries.remove(&key).is_some();
        if removed {
            state.order.retain(|existing| existing != &key);
        }
        removed
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
