//! Named response caches shared by every fetch the worker handles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::worker::StoredResponse;

// == Named Cache ==
/// One cache: URL to response, with insertion order for eviction.
#[derive(Debug, Default)]
struct NamedCache {
    entries: HashMap<String, (u64, StoredResponse)>,
    next_seq: u64,
}

impl NamedCache {
    /// Stores `response`, evicting the oldest insert when a new URL would
    /// exceed `max_entries`. Overwriting a URL never evicts.
    fn insert(&mut self, url: String, response: StoredResponse, max_entries: usize) {
        if !self.entries.contains_key(&url) && self.entries.len() >= max_entries {
            self.evict_oldest();
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(url, (seq, response));
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, (seq, _))| *seq)
            .map(|(url, _)| url.clone());

        if let Some(url) = oldest {
            self.entries.remove(&url);
            debug!(%url, "evicted oldest cached response");
        }
    }

    fn get(&self, url: &str) -> Option<StoredResponse> {
        self.entries.get(url).map(|(_, response)| response.clone())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// == Cache Storage ==
/// Ordered set of named caches keyed by request URL.
///
/// Clones share the same caches and the same per-cache cap. Writes to one
/// URL simply overwrite; there is no transaction spanning several puts
/// except [`CacheStorage::put_all`].
#[derive(Debug, Clone)]
pub struct CacheStorage {
    // Creation order is the lookup order of `match_any`
    caches: Arc<RwLock<Vec<(String, NamedCache)>>>,
    max_entries: Arc<AtomicUsize>,
}

impl Default for CacheStorage {
    fn default() -> Self {
        Self {
            caches: Arc::default(),
            max_entries: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps every named cache at `max_entries` responses (at least 1).
    /// Caches already over the cap shrink on their next insert.
    pub fn set_max_entries(&self, max_entries: usize) {
        self.max_entries.store(max_entries.max(1), Ordering::SeqCst);
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries.load(Ordering::SeqCst)
    }

    /// Creates the named cache if it does not exist yet.
    pub async fn open(&self, name: &str) {
        let mut caches = self.caches.write().await;
        if !caches.iter().any(|(n, _)| n == name) {
            caches.push((name.to_string(), NamedCache::default()));
        }
    }

    /// Names of all caches, oldest first.
    pub async fn keys(&self) -> Vec<String> {
        self.caches
            .read()
            .await
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.caches.read().await.iter().any(|(n, _)| n == name)
    }

    /// Drops a whole cache. Returns whether it existed.
    pub async fn delete(&self, name: &str) -> bool {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|(n, _)| n != name);
        caches.len() != before
    }

    /// Stores `response` under `url`, opening the cache if needed.
    pub async fn put(&self, name: &str, url: &str, response: StoredResponse) {
        self.put_all(name, vec![(url.to_string(), response)]).await;
    }

    /// Stores several responses under one lock acquisition.
    pub async fn put_all(&self, name: &str, responses: Vec<(String, StoredResponse)>) {
        let mut caches = self.caches.write().await;
        let index = match caches.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                caches.push((name.to_string(), NamedCache::default()));
                caches.len() - 1
            }
        };
        let max_entries = self.max_entries();
        let cache = &mut caches[index].1;
        for (url, response) in responses {
            cache.insert(url, response, max_entries);
        }
    }

    /// Looks up `url` in one cache.
    pub async fn get(&self, name: &str, url: &str) -> Option<StoredResponse> {
        self.caches
            .read()
            .await
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, cache)| cache.get(url))
    }

    /// Looks up `url` across every cache, oldest cache first.
    pub async fn match_any(&self, url: &str) -> Option<StoredResponse> {
        self.caches
            .read()
            .await
            .iter()
            .find_map(|(_, cache)| cache.get(url))
    }

    /// Empties one cache, keeping its name. Returns the number of entries dropped.
    pub async fn clear(&self, name: &str) -> usize {
        let mut caches = self.caches.write().await;
        caches
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, cache)| {
                let removed = cache.len();
                cache.entries.clear();
                removed
            })
            .unwrap_or(0)
    }

    /// `(name, entry count)` for every cache.
    pub async fn entry_counts(&self) -> Vec<(String, usize)> {
        self.caches
            .read()
            .await
            .iter()
            .map(|(name, cache)| (name.clone(), cache.len()))
            .collect()
    }
}
