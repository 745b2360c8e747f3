//! Smart cache cleanup task
//!
//! Background task that periodically removes expired and outdated entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::smart::SmartCache;

/// Shortest pause between two sweeps.
pub const MIN_CLEANUP_INTERVAL_SECS: u64 = 1;

/// Spawns a background task that periodically runs [`SmartCache::cleanup`].
///
/// The task sleeps for `cleanup_interval_secs` (at least
/// [`MIN_CLEANUP_INTERVAL_SECS`]) between runs and holds the
/// write lock only for the sweep itself. A sweep whose snapshot write fails
/// is logged and the loop keeps going.
///
/// Returns a JoinHandle the caller aborts on shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(SmartCache::new(config, storage)));
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(
    cache: Arc<RwLock<SmartCache>>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    if cleanup_interval_secs < MIN_CLEANUP_INTERVAL_SECS {
        warn!(
            "Cleanup interval {}s raised to {}s",
            cleanup_interval_secs, MIN_CLEANUP_INTERVAL_SECS
        );
    }
    let interval_secs = cleanup_interval_secs.max(MIN_CLEANUP_INTERVAL_SECS);
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting smart cache cleanup task with interval of {} seconds",
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let result = {
                let mut cache_guard = cache.write().await;
                cache_guard.cleanup()
            };

            match result {
                Ok(0) => debug!("Cleanup: no invalid entries found"),
                Ok(removed) => info!("Cleanup: removed {} invalid entries", removed),
                Err(e) => warn!("Cleanup failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smart::{ManualClock, MemoryStorage, SmartCacheConfig};

    fn manual_cache() -> (Arc<RwLock<SmartCache>>, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        let cache = SmartCache::with_clock(
            SmartCacheConfig::default(),
            Arc::new(MemoryStorage::new()),
            Arc::new(clock.clone()),
        );
        (Arc::new(RwLock::new(cache)), clock)
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let (cache, clock) = manual_cache();
        {
            let mut cache_guard = cache.write().await;
            cache_guard.set("expire_soon", "value", Some(1_000)).unwrap();
            cache_guard.set("long_lived", "value", Some(3_600_000)).unwrap();
        }
        clock.advance(1_001);

        let handle = spawn_cleanup_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        {
            let cache_guard = cache.read().await;
            assert_eq!(cache_guard.keys(), vec!["long_lived".to_string()]);
            // The sweep removes directly, without counting reads
            assert_eq!(cache_guard.stats().total_requests, 0);
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_outdated_versions() {
        let (cache, _clock) = manual_cache();
        {
            let mut cache_guard = cache.write().await;
            cache_guard.set("old", &42, None).unwrap();
            cache_guard.set_version("2.0.0");
        }

        let handle = spawn_cleanup_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(cache.read().await.is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn test_zero_interval_is_raised_to_minimum() {
        let (cache, clock) = manual_cache();
        cache
            .write()
            .await
            .set("expire_soon", "value", Some(1_000))
            .unwrap();
        clock.advance(1_001);

        let handle = spawn_cleanup_task(cache.clone(), 0);
        tokio::time::sleep(Duration::from_millis(300)).await;

        // No sweep has run yet: the loop waits a full second first
        assert_eq!(cache.read().await.len(), 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let (cache, _clock) = manual_cache();

        let handle = spawn_cleanup_task(cache, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
