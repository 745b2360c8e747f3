//! Service Worker Module
//!
//! Cache router in front of the origin: classifies GET requests, serves
//! them through cache-first, stale-while-revalidate or network-first,
//! manages the install/activate lifecycle of the named caches and drains
//! the queued form submissions on background sync.

mod cache_storage;
mod exchange;
mod lifecycle;
mod network;
mod route;
mod strategies;
mod sync;

#[cfg(test)]
pub(crate) mod test_support;

use std::time::Duration;

pub use cache_storage::CacheStorage;
pub use exchange::{FetchRequest, StoredResponse, NETWORK_ERROR_BODY, OFFLINE_CONTENT_BODY};
pub use lifecycle::{MessageReply, ServiceWorker, WorkerMessage, WorkerState};
pub use network::{HttpNetwork, Network};
pub use route::{RouteTable, Strategy};
pub use strategies::{cache_first, network_first, stale_while_revalidate};
pub use sync::{
    drain_form_queue, FileFormQueue, FormQueue, FormSubmission, MemoryFormQueue, SyncFailure,
    SyncReport,
};

#[cfg(feature = "debug-inspect")]
pub use lifecycle::WorkerSnapshot;

/// Background-sync tag that drains the contact form queue.
pub const CONTACT_SYNC_TAG: &str = "contact-form-sync";

/// Default entry cap of each named cache
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 200;

// == Worker Config ==
/// Cache names and routing rules.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Cache filled at install with the critical assets
    pub static_cache: String,
    /// Cache filled at runtime
    pub dynamic_cache: String,
    /// Paths served cache-first and precached at install
    pub critical_assets: Vec<String>,
    /// Regexes over the full URL selecting stale-while-revalidate
    pub dynamic_patterns: Vec<String>,
    /// Sync tag that drains the form queue
    pub sync_tag: String,
    /// Origin path queued forms are posted to
    pub sync_endpoint: String,
    /// Per-request network timeout
    pub fetch_timeout: Duration,
    /// Hosts besides the origin that requests may be forwarded to
    pub allowed_hosts: Vec<String>,
    /// Entry cap of each named cache; the oldest insert is evicted first
    pub max_cache_entries: usize,
}

impl WorkerConfig {
    /// Default rules with cache names ending in `-{suffix}`.
    ///
    /// Bumping the suffix makes the next activation drop the old caches.
    pub fn with_suffix(suffix: &str) -> Self {
        Self {
            static_cache: format!("static-{}", suffix),
            dynamic_cache: format!("dynamic-{}", suffix),
            critical_assets: [
                "/",
                "/index.html",
                "/manifest.json",
                "/favicon.ico",
                "/fonts/inter-var.woff2",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            dynamic_patterns: vec![
                r"\.(?:png|jpe?g|webp|avif|gif|svg|ico|woff2?|ttf|mp4|webm)(?:\?.*)?$".to_string(),
                r"^https://fonts\.googleapis\.com/".to_string(),
                r"^https://fonts\.gstatic\.com/".to_string(),
                r"^https://images\.unsplash\.com/".to_string(),
            ],
            sync_tag: CONTACT_SYNC_TAG.to_string(),
            sync_endpoint: "/api/contact".to_string(),
            fetch_timeout: Duration::from_secs(10),
            allowed_hosts: [
                "fonts.googleapis.com",
                "fonts.gstatic.com",
                "images.unsplash.com",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_cache_entries: DEFAULT_MAX_CACHE_ENTRIES,
        }
    }

    /// True for the two caches the current version owns.
    pub fn is_current_cache(&self, name: &str) -> bool {
        name == self.static_cache || name == self.dynamic_cache
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::with_suffix("v1")
    }
}
