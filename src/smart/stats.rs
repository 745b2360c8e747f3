//! Cache Statistics Module
//!
//! Tracks request, hit and eviction counters for the smart cache.

use serde::Serialize;

// == Cache Stats ==
/// Smart cache performance counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of `get` calls
    pub total_requests: u64,
    /// Number of `get` calls that returned a value
    pub hits: u64,
    /// Number of entries evicted to make room
    pub evictions: u64,
    /// Current number of entries in the cache
    pub size: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / total_requests, or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_requests as f64
        }
    }

    /// Misses derived from the two counters.
    pub fn misses(&self) -> u64 {
        self.total_requests.saturating_sub(self.hits)
    }

    // == Record Request ==
    /// Counts one `get` call.
    pub fn record_request(&mut self) {
        self.total_requests += 1;
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Eviction ==
    /// Increments the eviction counter.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Updates the entry count.
    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }
}
