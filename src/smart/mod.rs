//! Smart Cache Module
//!
//! Application-level key/value cache with TTL and version validity,
//! oldest-write eviction, tag invalidation and a durable snapshot.

mod clock;
mod entry;
mod preload;
mod stats;
mod storage;
mod store;
mod tags;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use preload::{preload, PreloadOutcome, PreloadReport};
pub use stats::CacheStats;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{SmartCache, SmartCacheConfig};
pub use tags::TagIndex;

// == Public Constants ==
/// Durable storage key holding the snapshot
pub const STORAGE_KEY: &str = "smartCache";

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed encoded value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
