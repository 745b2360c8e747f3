//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::smart::SmartCacheConfig;
use crate::worker::{WorkerConfig, DEFAULT_MAX_CACHE_ENTRIES};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the smart cache can hold
    pub max_size: usize,
    /// Default TTL in milliseconds for entries without explicit TTL
    pub default_ttl_ms: u64,
    /// Active cache-format version; entries stamped with another version are invalid
    pub cache_version: String,
    /// Accepted for compatibility, payloads are never compressed
    pub enable_compression: bool,
    /// Directory backing durable local storage
    pub storage_dir: PathBuf,
    /// Byte quota for a single stored snapshot
    pub storage_quota_bytes: usize,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Origin the worker fetches from on cache misses
    pub origin_url: String,
    /// Version suffix of the worker's named caches
    pub cache_version_suffix: String,
    /// Entry cap of each of the worker's named caches
    pub worker_cache_max_entries: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SMART_CACHE_MAX_SIZE` - Maximum cache entries (default: 100)
    /// - `SMART_CACHE_DEFAULT_TTL_MS` - Default TTL in ms (default: 300000)
    /// - `SMART_CACHE_VERSION` - Active cache version (default: 1.0.0)
    /// - `SMART_CACHE_COMPRESSION` - Compression flag (default: false)
    /// - `STORAGE_DIR` - Durable storage directory (default: .storefront-cache)
    /// - `STORAGE_QUOTA_BYTES` - Snapshot quota (default: 5 MiB)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    /// - `ORIGIN_URL` - Origin base URL (default: http://127.0.0.1:8080)
    /// - `CACHE_VERSION_SUFFIX` - Named cache suffix (default: v1)
    /// - `WORKER_CACHE_MAX_ENTRIES` - Entries per named cache (default: 200)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_size: env_or("SMART_CACHE_MAX_SIZE", defaults.max_size),
            default_ttl_ms: env_or("SMART_CACHE_DEFAULT_TTL_MS", defaults.default_ttl_ms),
            cache_version: env::var("SMART_CACHE_VERSION").unwrap_or(defaults.cache_version),
            enable_compression: env_or("SMART_CACHE_COMPRESSION", defaults.enable_compression),
            storage_dir: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            storage_quota_bytes: env_or("STORAGE_QUOTA_BYTES", defaults.storage_quota_bytes),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            origin_url: env::var("ORIGIN_URL").unwrap_or(defaults.origin_url),
            cache_version_suffix: env::var("CACHE_VERSION_SUFFIX")
                .unwrap_or(defaults.cache_version_suffix),
            worker_cache_max_entries: env_or(
                "WORKER_CACHE_MAX_ENTRIES",
                defaults.worker_cache_max_entries,
            ),
        }
    }

    /// Settings consumed by the smart cache.
    pub fn smart_cache(&self) -> SmartCacheConfig {
        SmartCacheConfig {
            max_size: self.max_size,
            default_ttl_ms: self.default_ttl_ms,
            version: self.cache_version.clone(),
            enable_compression: self.enable_compression,
        }
    }

    /// Settings consumed by the service worker router.
    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            max_cache_entries: self.worker_cache_max_entries,
            ..WorkerConfig::with_suffix(&self.cache_version_suffix)
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_size: 100,
            default_ttl_ms: 300_000,
            cache_version: "1.0.0".to_string(),
            enable_compression: false,
            storage_dir: PathBuf::from(".storefront-cache"),
            storage_quota_bytes: 5 * 1024 * 1024,
            server_port: 3000,
            cleanup_interval: 60,
            origin_url: "http://127.0.0.1:8080".to_string(),
            cache_version_suffix: "v1".to_string(),
            worker_cache_max_entries: DEFAULT_MAX_CACHE_ENTRIES,
        }
    }
}
