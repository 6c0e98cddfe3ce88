//! Keyed query cache with staleness tracking and cancellable fetches.

use std::collections::HashMap;
use std::hash::Hash;

struct Entry<V> {
    value: Option<V>,
    stale: bool,
    /// Bumped on cancel; a fetch only lands if its ticket still matches.
    generation: u64,
}

impl<V> Default for Entry<V> {
    fn default() -> Self {
        Self {
            value: None,
            stale: true,
            generation: 0,
        }
    }
}

/// Proof that a fetch was started for `key` at some generation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct FetchTicket<K> {
    key: K,
    generation: u64,
}

impl<K> FetchTicket<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

pub struct QueryCache<K, V> {
    entries: HashMap<K, Entry<V>>,
}

impl<K, V> Default for QueryCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).and_then(|e| e.value.as_ref())
    }

    /// Stores a fresh value.
    pub fn set(&mut self, key: K, value: V) {
        let entry = self.entries.entry(key).or_default();
        entry.value = Some(value);
        entry.stale = false;
    }

    /// Mutates the cached value in place; false when nothing is cached.
    pub fn update(&mut self, key: &K, patch: impl FnOnce(&mut V)) -> bool {
        match self.entries.get_mut(key).and_then(|e| e.value.as_mut()) {
            Some(value) => {
                patch(value);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).and_then(|e| e.value)
    }

    /// Missing entries count as stale.
    pub fn is_stale(&self, key: &K) -> bool {
        self.entries.get(key).map_or(true, |e| e.stale)
    }

    pub fn invalidate(&mut self, key: &K) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.stale = true;
        }
    }

    pub fn invalidate_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.stale = true;
        }
    }

    pub fn begin_fetch(&mut self, key: K) -> FetchTicket<K> {
        let generation = self.entries.entry(key.clone()).or_default().generation;
        FetchTicket { key, generation }
    }

    /// Stores the fetched value unless the fetch was cancelled meanwhile.
    pub fn complete_fetch(&mut self, ticket: FetchTicket<K>, value: V) -> bool {
        let current = self.entries.get(&ticket.key).map(|e| e.generation);
        if current != Some(ticket.generation) {
            tracing::debug!("discarding result of a cancelled fetch");
            return false;
        }
        self.set(ticket.key, value);
        true
    }

    /// Invalidates every outstanding ticket for `key`.
    pub fn cancel_fetches(&mut self, key: &K) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.generation += 1;
        }
    }
}
