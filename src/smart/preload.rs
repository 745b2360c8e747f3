//! Batch preloading into the smart cache.

use std::fmt::Display;
use std::future::Future;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::smart::SmartCache;

/// What happened to one key during a preload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum PreloadOutcome {
    /// A valid entry was already present; the fetcher was not called
    AlreadyCached,
    /// Fetched and stored
    Loaded,
    /// The fetch or the store failed
    Failed(String),
}

/// Per-key preload result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreloadReport {
    pub key: String,
    #[serde(flatten)]
    pub outcome: PreloadOutcome,
}

/// Fetches every key that is not currently cached and stores the results.
///
/// Fetches run concurrently and settle independently: a failing key is
/// reported as [`PreloadOutcome::Failed`] and never stops its siblings.
/// Reports come back in the order of `keys`.
pub async fn preload<K, F, Fut, T, E>(
    cache: &RwLock<SmartCache>,
    keys: &[K],
    ttl: Option<u64>,
    fetcher: F,
) -> Vec<PreloadReport>
where
    K: AsRef<str>,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Serialize,
    E: Display,
{
    let missing: Vec<bool> = {
        let guard = cache.read().await;
        keys.iter().map(|k| !guard.has(k.as_ref())).collect()
    };

    let fetches = keys
        .iter()
        .zip(&missing)
        .filter(|(_, missing)| **missing)
        .map(|(key, _)| {
            let key = key.as_ref().to_string();
            let fetch = fetcher(key.clone());
            async move { (key, fetch.await) }
        });
    let mut fetched = join_all(fetches).await.into_iter();

    let mut reports = Vec::with_capacity(keys.len());
    let mut guard = cache.write().await;
    for (key, missing) in keys.iter().zip(missing) {
        let key = key.as_ref().to_string();
        if !missing {
            reports.push(PreloadReport {
                key,
                outcome: PreloadOutcome::AlreadyCached,
            });
            continue;
        }

        let outcome = match fetched.next() {
            Some((_, Ok(value))) => match guard.set(&key, &value, ttl) {
                Ok(()) => PreloadOutcome::Loaded,
                Err(e) => PreloadOutcome::Failed(e.to_string()),
            },
            Some((_, Err(e))) => PreloadOutcome::Failed(e.to_string()),
            None => PreloadOutcome::Failed("fetch result missing".to_string()),
        };

        match &outcome {
            PreloadOutcome::Failed(reason) => warn!(key = %key, "preload failed: {}", reason),
            _ => debug!(key = %key, "preloaded"),
        }
        reports.push(PreloadReport { key, outcome });
    }
    reports
}
