//! Time-bounded in-memory cache for fetched datasets.
//!
//! Entries live for a fixed TTL and are purged by the read that finds them
//! expired. There is no eviction beyond TTL unless a capacity cap is set, in
//! which case the oldest entry makes room for a new key.
//!
//! Every `invalidate`/`clear` advances a generation counter. A loader that
//! captured the generation before going to the network commits with
//! `set_if_generation`, which refuses the write if an invalidation happened
//! in between.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Source of "now" for TTL checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    Hit(V),
    /// Nothing stored under the key.
    Missing,
    /// An entry existed but outlived the TTL; it has been removed.
    Expired,
}

impl<V> Lookup<V> {
    pub fn into_option(self) -> Option<V> {
        match self {
            Lookup::Hit(v) => Some(v),
            Lookup::Missing | Lookup::Expired => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    generation: u64,
}

pub struct CacheStore<V> {
    ttl: Duration,
    capacity: Option<usize>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> CacheStore<V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            capacity: None,
            clock,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                generation: 0,
            }),
        }
    }

    /// Cap the number of entries; the oldest one is dropped to make room.
    pub fn with_capacity_limit(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let now = self.clock.now();
        let mut inner = self.lock();
        self.insert(&mut inner, key.into(), value, now);
    }

    /// Store `value` only if nothing was invalidated since `generation` was read.
    pub fn set_if_generation(&self, key: impl Into<String>, value: V, generation: u64) -> bool {
        let now = self.clock.now();
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        self.insert(&mut inner, key.into(), value, now);
        true
    }

    pub fn get(&self, key: &str) -> Lookup<V> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let fresh = match inner.entries.get(key) {
            None => return Lookup::Missing,
            Some(entry) => now.saturating_duration_since(entry.stored_at) < self.ttl,
        };
        if fresh {
            match inner.entries.get(key) {
                Some(entry) => Lookup::Hit(entry.value.clone()),
                None => Lookup::Missing,
            }
        } else {
            inner.entries.remove(key);
            Lookup::Expired
        }
    }

    /// Remove `key` regardless of freshness.
    pub fn invalidate(&self, key: &str) {
        let mut inner = self.lock();
        inner.entries.remove(key);
        inner.generation += 1;
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, inner: &mut Inner<V>, key: String, value: V, now: Instant) {
        if let Some(capacity) = self.capacity {
            if !inner.entries.contains_key(&key) && inner.entries.len() >= capacity {
                let oldest = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    inner.entries.remove(&oldest);
                }
            }
        }
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
            },
        );
    }

    // A poisoned map only means another thread panicked mid-insert; the map itself is intact.
    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
