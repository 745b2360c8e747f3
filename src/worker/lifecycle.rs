//! Worker lifecycle and event dispatch.
//!
//! Owns the named caches, the route table and the form queue, and exposes
//! one method per worker event: install, activate, fetch, sync, message.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{CacheError, Result};
use crate::worker::{
    cache_first, drain_form_queue, network_first, stale_while_revalidate, CacheStorage,
    FetchRequest, FormQueue, Network, RouteTable, Strategy, StoredResponse, SyncReport,
    WorkerConfig,
};

// == Worker State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    Waiting,
    Activating,
    Active,
    /// Install failed; the worker never takes control
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Messages a page can post to the worker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Activate a waiting worker now
    SkipWaiting,
    /// Report the cache names in use
    GetVersion,
    /// Drop the runtime cache
    ClearDynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageReply {
    Activated { deleted_caches: Vec<String> },
    /// SKIP_WAITING arrived while the worker was not waiting
    NotWaiting { state: WorkerState },
    Version { static_cache: String, dynamic_cache: String },
    Cleared { removed: usize },
}

/// Cache and lifecycle view for debugging.
#[cfg(feature = "debug-inspect")]
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    pub state: WorkerState,
    pub clients_claimed: bool,
    pub caches: Vec<(String, usize)>,
}

// == Service Worker ==
pub struct ServiceWorker {
    config: WorkerConfig,
    routes: RouteTable,
    caches: CacheStorage,
    network: Arc<dyn Network>,
    forms: Arc<dyn FormQueue>,
    origin: Url,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
}

impl fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("config", &self.config)
            .field("origin", &self.origin.as_str())
            .finish_non_exhaustive()
    }
}

impl ServiceWorker {
    /// Builds a worker in the `Installing` state over `caches`.
    ///
    /// `caches` may already hold caches from an earlier version; they
    /// survive until [`ServiceWorker::activate`].
    pub fn new(
        config: WorkerConfig,
        origin: Url,
        caches: CacheStorage,
        network: Arc<dyn Network>,
        forms: Arc<dyn FormQueue>,
    ) -> Result<Self> {
        let routes = RouteTable::new(&config)?;
        // The static cache must hold every critical asset
        caches.set_max_entries(config.max_cache_entries.max(config.critical_assets.len()));
        Ok(Self {
            config,
            routes,
            caches,
            network,
            forms,
            origin,
            state: Mutex::new(WorkerState::Installing),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn caches(&self) -> &CacheStorage {
        &self.caches
    }

    pub fn forms(&self) -> &Arc<dyn FormQueue> {
        &self.forms
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.lock().await
    }

    /// Whether the worker took control of already-open clients.
    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    /// Resolves a path or absolute URL against the origin.
    ///
    /// The result must stay on the origin or on one of
    /// `WorkerConfig::allowed_hosts`; anything else is `Forbidden`.
    pub fn resolve(&self, target: &str) -> Result<Url> {
        let url = self
            .origin
            .join(target)
            .map_err(|e| CacheError::InvalidRequest(format!("bad URL '{}': {}", target, e)))?;
        if !self.is_allowed(&url) {
            warn!(%url, "refusing request outside origin");
            return Err(CacheError::Forbidden(url.to_string()));
        }
        Ok(url)
    }

    fn is_allowed(&self, url: &Url) -> bool {
        if url.origin() == self.origin.origin() {
            return true;
        }
        matches!(url.scheme(), "http" | "https")
            && url
                .host_str()
                .is_some_and(|host| self.config.allowed_hosts.iter().any(|h| h == host))
    }

    /// Fetches `target` from the origin as JSON, bypassing every named
    /// cache. Non-2xx answers are errors.
    pub async fn fetch_json(&self, target: &str) -> Result<serde_json::Value> {
        let request = FetchRequest::get(self.resolve(target)?);
        let response = self.network.fetch(&request).await?;
        if !response.status.is_success() {
            return Err(CacheError::Network(format!(
                "{} answered {}",
                request.url, response.status
            )));
        }
        Ok(serde_json::from_slice(&response.body)?)
    }

    // == Install ==
    /// Precaches every critical asset into the static cache, then skips
    /// the waiting phase.
    ///
    /// All or nothing: if any asset fails to load, nothing is stored and
    /// the worker becomes redundant.
    pub async fn install(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state != WorkerState::Installing {
            return Err(CacheError::InvalidRequest(format!(
                "cannot install from state {}",
                state
            )));
        }

        info!(
            cache = %self.config.static_cache,
            assets = self.config.critical_assets.len(),
            "installing worker"
        );

        match self.precache().await {
            Ok(responses) => {
                self.caches.open(&self.config.static_cache).await;
                self.caches
                    .put_all(&self.config.static_cache, responses)
                    .await;
                *state = WorkerState::Waiting;
                self.skip_waiting.store(true, Ordering::SeqCst);
                info!("worker installed, skipping wait");
                Ok(())
            }
            Err(e) => {
                *state = WorkerState::Redundant;
                warn!("worker install failed: {}", e);
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<Vec<(String, StoredResponse)>> {
        let requests = self
            .config
            .critical_assets
            .iter()
            .map(|path| self.resolve(path).map(FetchRequest::get))
            .collect::<Result<Vec<_>>>()?;

        let fetches = requests.iter().map(|request| async move {
            let response = self.network.fetch(request).await?;
            if !response.is_cacheable() {
                return Err(CacheError::Install(format!(
                    "{} answered {}",
                    request.url, response.status
                )));
            }
            Ok((request.cache_key().to_string(), response))
        });

        join_all(fetches)
            .await
            .into_iter()
            .map(|result| {
                result.map_err(|e| match e {
                    CacheError::Install(msg) => CacheError::Install(msg),
                    other => CacheError::Install(other.to_string()),
                })
            })
            .collect()
    }

    // == Activate ==
    /// Deletes every cache the current version does not own and claims
    /// open clients. Returns the deleted cache names.
    pub async fn activate(&self) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        if *state != WorkerState::Waiting || !self.skip_waiting.load(Ordering::SeqCst) {
            return Err(CacheError::InvalidRequest(format!(
                "cannot activate from state {}",
                state
            )));
        }
        *state = WorkerState::Activating;

        let mut deleted = Vec::new();
        for name in self.caches.keys().await {
            if !self.config.is_current_cache(&name) && self.caches.delete(&name).await {
                info!(cache = %name, "deleted outdated cache");
                deleted.push(name);
            }
        }

        self.clients_claimed.store(true, Ordering::SeqCst);
        *state = WorkerState::Active;
        info!(deleted = deleted.len(), "worker active, clients claimed");
        Ok(deleted)
    }

    // == Fetch ==
    /// Serves one intercepted request.
    ///
    /// GETs always resolve to a response. Other methods go straight to the
    /// network and fail only when no response arrives.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<StoredResponse> {
        let Some(strategy) = self.routes.classify(&request.method, &request.url) else {
            debug!(method = %request.method, url = %request.url, "passing through");
            return self.network.fetch(request).await;
        };

        debug!(%strategy, url = %request.url, "routing request");
        let response = match strategy {
            Strategy::CacheFirst => {
                cache_first(
                    &self.caches,
                    self.network.as_ref(),
                    &self.config.static_cache,
                    request,
                )
                .await
            }
            Strategy::StaleWhileRevalidate => {
                stale_while_revalidate(
                    &self.caches,
                    &self.network,
                    &self.config.dynamic_cache,
                    request,
                )
                .await
            }
            Strategy::NetworkFirst => {
                network_first(
                    &self.caches,
                    self.network.as_ref(),
                    &self.config.dynamic_cache,
                    request,
                )
                .await
            }
        };
        Ok(response)
    }

    // == Sync ==
    /// Runs a background-sync event. Unknown tags do nothing.
    pub async fn handle_sync(&self, tag: &str) -> Result<SyncReport> {
        if tag != self.config.sync_tag {
            debug!(tag, "ignoring unknown sync tag");
            return Ok(SyncReport::empty(tag));
        }

        let endpoint = self.resolve(&self.config.sync_endpoint)?;
        drain_form_queue(tag, self.forms.as_ref(), self.network.as_ref(), &endpoint).await
    }

    // == Message ==
    pub async fn handle_message(&self, message: WorkerMessage) -> Result<MessageReply> {
        match message {
            WorkerMessage::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                let state = self.state().await;
                if state == WorkerState::Waiting {
                    let deleted_caches = self.activate().await?;
                    Ok(MessageReply::Activated { deleted_caches })
                } else {
                    Ok(MessageReply::NotWaiting { state })
                }
            }
            WorkerMessage::GetVersion => Ok(MessageReply::Version {
                static_cache: self.config.static_cache.clone(),
                dynamic_cache: self.config.dynamic_cache.clone(),
            }),
            WorkerMessage::ClearDynamic => {
                let removed = self.caches.clear(&self.config.dynamic_cache).await;
                info!(removed, "dynamic cache cleared");
                Ok(MessageReply::Cleared { removed })
            }
        }
    }

    #[cfg(feature = "debug-inspect")]
    pub async fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            state: self.state().await,
            clients_claimed: self.clients_claimed(),
            caches: self.caches.entry_counts().await,
        }
    }
}
