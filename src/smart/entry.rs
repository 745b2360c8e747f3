//! Cache Entry Module
//!
//! Defines the structure for individual smart cache entries with TTL and
//! version stamping.

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A single stored payload with the metadata that decides its validity.
///
/// Serialized as-is into the durable snapshot, so field names are part of
/// the on-disk format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// JSON-encoded payload
    pub data: String,
    /// Creation timestamp (Unix milliseconds)
    pub timestamp: u64,
    /// Time to live in milliseconds
    pub ttl: u64,
    /// Cache-format version the entry was written under
    pub version: String,
    /// Explicit tags the entry was stored under
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped at `now`.
    pub fn new(data: String, now: u64, ttl: u64, version: impl Into<String>) -> Self {
        Self {
            data,
            timestamp: now,
            ttl,
            version: version.into(),
            tags: Vec::new(),
        }
    }

    /// Attaches explicit tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    // == Is Expired ==
    /// Checks whether the TTL has elapsed at `now`.
    ///
    /// An entry aged exactly `ttl` milliseconds is still fresh; it expires
    /// once the age strictly exceeds the TTL.
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.timestamp) > self.ttl
    }

    // == Is Valid ==
    /// Fresh and written under the active version.
    pub fn is_valid(&self, now: u64, active_version: &str) -> bool {
        !self.is_expired(now) && self.version == active_version
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> u64 {
        self.timestamp.saturating_add(self.ttl).saturating_sub(now)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("\"v\"".to_string(), 1_000, 500, "1.0.0");

        assert_eq!(entry.data, "\"v\"");
        assert_eq!(entry.timestamp, 1_000);
        assert_eq!(entry.ttl, 500);
        assert!(entry.tags.is_empty());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new("1".to_string(), 1_000, 2_000, "1.0.0");

        assert!(!entry.is_expired(3_000), "age == ttl is still fresh");
        assert!(entry.is_expired(3_001));
    }

    #[test]
    fn test_version_mismatch_is_invalid() {
        let entry = CacheEntry::new("1".to_string(), 1_000, 60_000, "1.0.0");

        assert!(entry.is_valid(1_500, "1.0.0"));
        assert!(!entry.is_valid(1_500, "2.0.0"));
    }

    #[test]
    fn test_clock_skew_does_not_expire() {
        // Clock moved backwards since the write
        let entry = CacheEntry::new("1".to_string(), 5_000, 100, "1.0.0");
        assert!(!entry.is_expired(4_000));
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = CacheEntry::new("1".to_string(), 1_000, 500, "1.0.0");

        assert_eq!(entry.ttl_remaining_ms(1_200), 300);
        assert_eq!(entry.ttl_remaining_ms(9_000), 0);
    }

    #[test]
    fn test_ttl_remaining_saturates_for_huge_ttl() {
        let entry = CacheEntry::new("1".to_string(), 1_000, u64::MAX, "1.0.0");

        assert_eq!(entry.ttl_remaining_ms(1_000), u64::MAX - 1_000);
        assert!(entry.is_valid(u64::MAX - 1, "1.0.0"));
    }

    #[test]
    fn test_snapshot_format() {
        let entry = CacheEntry::new("{\"id\":1}".to_string(), 42, 10, "1.0.0");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["version"], "1.0.0");
        assert!(json.get("tags").is_none());

        let tagged = entry.with_tags(vec!["products".to_string()]);
        let json = serde_json::to_value(&tagged).unwrap();
        assert_eq!(json["tags"][0], "products");
    }
}
