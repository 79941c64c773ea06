//! Per-key cache for asynchronously resolved values.
//!
//! Lookups are started with [`ResolutionCache::begin`] and finished with
//! [`ResolutionCache::complete`]. Invalidation bumps a generation counter, so a
//! lookup that was in flight when its key was invalidated (e.g. on sign-out)
//! cannot write its stale result back. Between completions for the same
//! generation, the most recently completed value wins.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use crate::Loadable;

/// Proof that a lookup was started at a given cache generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket<K> {
    key: K,
    epoch: u64,
    generation: u64,
}

#[derive(Debug)]
struct Slot<V> {
    generation: u64,
    state: Option<Loadable<V>>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            generation: 0,
            state: None,
        }
    }
}

#[derive(Debug)]
struct Inner<K, V> {
    epoch: u64,
    slots: HashMap<K, Slot<V>>,
}

/// Thread-safe cache of [`Loadable`] values keyed by `K`.
#[derive(Debug)]
pub struct ResolutionCache<K, V> {
    inner: RwLock<Inner<K, V>>,
}

impl<K, V> Default for ResolutionCache<K, V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                epoch: 0,
                slots: HashMap::new(),
            }),
        }
    }
}

impl<K, V> ResolutionCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for `key`. Keys never looked up read as `Loading`.
    ///
    /// A poisoned lock also reads as `Loading`: callers wait rather than
    /// receive an answer that was never resolved.
    pub fn get(&self, key: &K) -> Loadable<V> {
        let Ok(inner) = self.inner.read() else {
            return Loadable::Loading;
        };
        inner
            .slots
            .get(key)
            .and_then(|slot| slot.state.clone())
            .unwrap_or(Loadable::Loading)
    }

    /// Whether a completed value (ready or failed) is cached for `key`.
    pub fn is_settled(&self, key: &K) -> bool {
        !self.get(key).is_loading()
    }

    /// Start a lookup for `key`.
    pub fn begin(&self, key: K) -> Ticket<K> {
        let (epoch, generation) = match self.inner.read() {
            Ok(inner) => (
                inner.epoch,
                inner.slots.get(&key).map(|s| s.generation).unwrap_or(0),
            ),
            // Never matches a live generation, so the completion is dropped.
            Err(_) => (u64::MAX, u64::MAX),
        };
        Ticket {
            key,
            epoch,
            generation,
        }
    }

    /// Store the result of a lookup started with `ticket`.
    ///
    /// Returns `false` (and stores nothing) when the key or the whole cache was
    /// invalidated after the ticket was issued.
    pub fn complete(&self, ticket: Ticket<K>, value: Loadable<V>) -> bool {
        let Ok(mut inner) = self.inner.write() else {
            return false;
        };
        if inner.epoch != ticket.epoch {
            return false;
        }
        let slot = inner.slots.entry(ticket.key).or_default();
        if slot.generation != ticket.generation {
            return false;
        }
        slot.state = Some(value);
        true
    }

    /// Forget the value for `key` and fence off in-flight lookups for it.
    pub fn invalidate(&self, key: &K) {
        if let Ok(mut inner) = self.inner.write() {
            let slot = inner.slots.entry(key.clone()).or_default();
            slot.generation = slot.generation.wrapping_add(1);
            slot.state = None;
        }
    }

    /// Forget every value and fence off every in-flight lookup.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.epoch = inner.epoch.wrapping_add(1);
            inner.slots.clear();
        }
    }
}
