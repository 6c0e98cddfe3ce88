use std::hash::Hash;

use crate::cache::QueryCache;

/// A patch applied to the cache ahead of server confirmation.
///
/// Created by [`Optimistic::apply`]; resolve it with [`commit`](Self::commit)
/// once the server accepts the mutation, or [`revert`](Self::revert) to put
/// back exactly what was cached before.
#[must_use = "an optimistic patch must be committed or reverted"]
pub struct Optimistic<K, V> {
    key: K,
    snapshot: Option<V>,
}

impl<K, V> Optimistic<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn apply(cache: &mut QueryCache<K, V>, key: K, patch: impl FnOnce(&mut V)) -> Self {
        // A refetch landing mid-mutation would overwrite the patch with old data
        cache.cancel_fetches(&key);
        let snapshot = cache.get(&key).cloned();
        cache.update(&key, patch);
        Self { key, snapshot }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn commit(self) {}

    pub fn revert(self, cache: &mut QueryCache<K, V>) {
        match self.snapshot {
            Some(previous) => cache.set(self.key, previous),
            None => {
                cache.remove(&self.key);
            }
        }
    }
}
