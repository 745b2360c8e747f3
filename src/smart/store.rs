//! Smart Cache Store Module
//!
//! Main cache engine: HashMap storage with TTL and version validity,
//! oldest-write eviction, a tag index, and a durable snapshot.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::smart::{
    CacheEntry, CacheStats, Clock, Storage, SystemClock, TagIndex, MAX_KEY_LENGTH,
    MAX_VALUE_SIZE, STORAGE_KEY,
};

// == Smart Cache Config ==
/// Tunables for a [`SmartCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct SmartCacheConfig {
    /// Maximum number of entries held at once
    pub max_size: usize,
    /// TTL in milliseconds for entries written without one
    pub default_ttl_ms: u64,
    /// Active cache-format version
    pub version: String,
    /// Accepted but payloads are stored uncompressed
    pub enable_compression: bool,
}

impl Default for SmartCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            default_ttl_ms: 5 * 60 * 1000,
            version: "1.0.0".to_string(),
            enable_compression: false,
        }
    }
}

// == Smart Cache ==
/// TTL and version bounded key/value cache persisted to durable storage.
///
/// Constructed explicitly by the application and shared behind a lock;
/// there is no process-wide instance.
pub struct SmartCache {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Tag to keys
    tags: TagIndex,
    /// Request and hit counters
    stats: CacheStats,
    config: SmartCacheConfig,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for SmartCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartCache")
            .field("entries", &self.entries.len())
            .field("stats", &self.stats)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SmartCache {
    // == Constructor ==
    /// Creates a cache on the wall clock, rehydrated from `storage`.
    pub fn new(config: SmartCacheConfig, storage: Arc<dyn Storage>) -> Self {
        Self::with_clock(config, storage, Arc::new(SystemClock))
    }

    /// Creates a cache with an explicit time source.
    pub fn with_clock(
        mut config: SmartCacheConfig,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if config.max_size == 0 {
            warn!("SmartCache max_size of 0 raised to 1");
            config.max_size = 1;
        }
        if config.enable_compression {
            debug!("SmartCache compression requested; payloads are stored as plain JSON");
        }

        let mut cache = Self {
            entries: HashMap::new(),
            tags: TagIndex::new(),
            stats: CacheStats::new(),
            config,
            storage,
            clock,
        };
        cache.rehydrate();
        cache
    }

    /// Loads the stored snapshot. Unreadable or corrupt snapshots are
    /// dropped and the cache starts empty.
    fn rehydrate(&mut self) {
        let raw = match self.storage.get_item(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                warn!("SmartCache snapshot unreadable, starting empty: {}", e);
                return;
            }
        };

        let snapshot: HashMap<String, CacheEntry> = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("SmartCache snapshot corrupt, discarding: {}", e);
                if let Err(e) = self.storage.remove_item(STORAGE_KEY) {
                    warn!("SmartCache could not remove corrupt snapshot: {}", e);
                }
                return;
            }
        };

        for (key, entry) in snapshot {
            self.tags.insert(&key, &entry.tags);
            self.entries.insert(key, entry);
        }
        let trimmed = self.entries.len() > self.config.max_size;
        while self.entries.len() > self.config.max_size {
            self.evict_oldest();
        }
        self.stats.set_size(self.entries.len());
        // The stored snapshot must not keep what was just evicted
        if trimmed {
            if let Err(e) = self.persist() {
                warn!("SmartCache could not store trimmed snapshot: {}", e);
            }
        }
        debug!("SmartCache rehydrated {} entries", self.entries.len());
    }

    // == Set ==
    /// Stores `data` under `key` with an optional TTL in milliseconds.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, data: &T, ttl: Option<u64>) -> Result<()> {
        self.set_tagged(key, data, ttl, &[])
    }

    /// Stores `data` and indexes it under `tags` in addition to the key's
    /// own segments.
    ///
    /// Writing a new key into a full cache first evicts the entry with the
    /// oldest write timestamp. Overwrites never evict.
    pub fn set_tagged<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        data: &T,
        ttl: Option<u64>,
        tags: &[&str],
    ) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        let payload = self.encode(data)?;
        if payload.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        if self.remove_entry(key).is_none() && self.entries.len() >= self.config.max_size {
            self.evict_oldest();
        }

        let entry = CacheEntry::new(
            payload,
            self.clock.now_ms(),
            ttl.unwrap_or(self.config.default_ttl_ms),
            self.config.version.clone(),
        )
        .with_tags(tags.iter().map(|t| t.to_string()).collect());

        self.tags.insert(key, &entry.tags);
        self.entries.insert(key.to_string(), entry);
        self.stats.set_size(self.entries.len());

        self.persist()
    }

    // == Get ==
    /// Retrieves and decodes the value under `key`.
    ///
    /// Every call counts as a request. Missing, expired and
    /// version-mismatched entries all read as `None`; the invalid ones are
    /// deleted on the way.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        self.stats.record_request();

        let now = self.clock.now_ms();
        let valid = match self.entries.get(key) {
            Some(entry) => entry.is_valid(now, &self.config.version),
            None => return Ok(None),
        };

        if !valid {
            debug!(key, "SmartCache entry stale, removing");
            self.remove_entry(key);
            self.stats.set_size(self.entries.len());
            self.persist()?;
            return Ok(None);
        }

        let value = match self.entries.get(key) {
            Some(entry) => Self::decode(&entry.data)?,
            None => return Ok(None),
        };
        self.stats.record_hit();
        Ok(Some(value))
    }

    /// Retrieves the value as untyped JSON.
    pub fn get_raw(&mut self, key: &str) -> Result<Option<serde_json::Value>> {
        self.get(key)
    }

    // == Has ==
    /// True when a valid entry exists. Does not touch the counters.
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.entries
            .get(key)
            .is_some_and(|entry| entry.is_valid(now, &self.config.version))
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        if self.remove_entry(key).is_none() {
            return Ok(false);
        }
        self.stats.set_size(self.entries.len());
        self.persist()?;
        Ok(true)
    }

    // == Clear ==
    /// Drops every entry and the stored snapshot.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.tags.clear();
        self.stats.set_size(0);
        self.storage.remove_item(STORAGE_KEY)
    }

    // == Invalidate By Tag ==
    /// Removes every entry indexed under `tag`. Returns how many were removed.
    pub fn invalidate_by_tag(&mut self, tag: &str) -> Result<usize> {
        let keys = self.tags.keys_for(tag);
        let removed = keys
            .iter()
            .filter(|key| self.remove_entry(key).is_some())
            .count();

        if removed > 0 {
            debug!(tag, removed, "SmartCache invalidated tag");
            self.stats.set_size(self.entries.len());
            self.persist()?;
        }
        Ok(removed)
    }

    // == Cleanup ==
    /// Removes every expired or version-mismatched entry.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&mut self) -> Result<usize> {
        let now = self.clock.now_ms();
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_valid(now, &self.config.version))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            self.remove_entry(key);
        }

        if !stale.is_empty() {
            self.stats.set_size(self.entries.len());
            self.persist()?;
        }
        Ok(stale.len())
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_size(self.entries.len());
        stats
    }

    /// Switches the active version; entries written under any other version
    /// become invalid.
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.config.version = version.into();
    }

    pub fn config(&self) -> &SmartCacheConfig {
        &self.config
    }

    /// Stored keys, valid or not, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.tags.remove(key, &entry.tags);
        Some(entry)
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by(|(ka, a), (kb, b)| a.timestamp.cmp(&b.timestamp).then_with(|| ka.cmp(kb)))
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            self.remove_entry(&key);
            self.stats.record_eviction();
            debug!(key = %key, "SmartCache evicted oldest entry");
        }
    }

    /// Writes the snapshot. A failed write wipes the cache and the stored
    /// snapshot so memory and storage never disagree.
    fn persist(&mut self) -> Result<()> {
        let written = serde_json::to_string(&self.entries)
            .map_err(CacheError::from)
            .and_then(|snapshot| self.storage.set_item(STORAGE_KEY, &snapshot));

        let Err(e) = written else {
            return Ok(());
        };

        warn!("SmartCache snapshot write failed, clearing cache: {}", e);
        self.entries.clear();
        self.tags.clear();
        self.stats.set_size(0);
        if let Err(remove_err) = self.storage.remove_item(STORAGE_KEY) {
            warn!("SmartCache could not remove stale snapshot: {}", remove_err);
        }
        Err(match e {
            CacheError::Storage(msg) => CacheError::Storage(msg),
            other => CacheError::Storage(other.to_string()),
        })
    }

    // Compression is a pass-through: the payload is plain JSON either way.
    fn encode<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        Ok(serde_json::to_string(data)?)
    }

    fn decode<T: DeserializeOwned>(payload: &str) -> Result<T> {
        Ok(serde_json::from_str(payload)?)
    }
}
