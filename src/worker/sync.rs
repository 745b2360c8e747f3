//! Queued form submissions and their background-sync delivery.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{CacheError, Result};
use crate::worker::{FetchRequest, Network};

// == Form Submission ==
/// A form the page could not send, waiting for connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSubmission {
    pub id: u64,
    pub payload: Value,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueState {
    next_id: u64,
    forms: Vec<FormSubmission>,
}

impl QueueState {
    fn enqueue(&mut self, payload: Value) -> FormSubmission {
        self.next_id += 1;
        let submission = FormSubmission {
            id: self.next_id,
            payload,
            queued_at: Utc::now(),
        };
        self.forms.push(submission.clone());
        submission
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.forms.len();
        self.forms.retain(|f| f.id != id);
        self.forms.len() != before
    }
}

// == Form Queue Trait ==
/// Durable store of pending submissions (the `forms` object store).
#[async_trait]
pub trait FormQueue: Send + Sync {
    /// Queues a payload and returns the stored record with its new id.
    async fn enqueue(&self, payload: Value) -> Result<FormSubmission>;

    /// Pending records, oldest first.
    async fn pending(&self) -> Result<Vec<FormSubmission>>;

    /// Removes a delivered record. Returns whether it was present.
    async fn remove(&self, id: u64) -> Result<bool>;
}

// == Memory Form Queue ==
#[derive(Debug, Default)]
pub struct MemoryFormQueue {
    state: Mutex<QueueState>,
}

impl MemoryFormQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FormQueue for MemoryFormQueue {
    async fn enqueue(&self, payload: Value) -> Result<FormSubmission> {
        Ok(self.state.lock().await.enqueue(payload))
    }

    async fn pending(&self) -> Result<Vec<FormSubmission>> {
        Ok(self.state.lock().await.forms.clone())
    }

    async fn remove(&self, id: u64) -> Result<bool> {
        Ok(self.state.lock().await.remove(id))
    }
}

// == File Form Queue ==
/// Queue persisted as one JSON document, rewritten on every change.
#[derive(Debug)]
pub struct FileFormQueue {
    path: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileFormQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<QueueState> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(QueueState::default()),
            Err(e) => Err(CacheError::Storage(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn store(&self, state: &QueueState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                CacheError::Storage(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let raw = serde_json::to_string(state)?;
        tokio::fs::write(&self.path, raw).await.map_err(|e| {
            CacheError::Storage(format!("cannot write {}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl FormQueue for FileFormQueue {
    async fn enqueue(&self, payload: Value) -> Result<FormSubmission> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        let submission = state.enqueue(payload);
        self.store(&state).await?;
        Ok(submission)
    }

    async fn pending(&self) -> Result<Vec<FormSubmission>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.forms)
    }

    async fn remove(&self, id: u64) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        let removed = state.remove(id);
        if removed {
            self.store(&state).await?;
        }
        Ok(removed)
    }
}

// == Sync Report ==
/// A record that stayed queued.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncFailure {
    pub id: u64,
    pub reason: String,
}

/// Outcome of one background-sync run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub tag: String,
    pub delivered: Vec<u64>,
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn empty(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }
}

/// Posts every pending submission to `endpoint`, removing the ones the
/// endpoint accepts with a 2xx.
///
/// Records that fail stay queued for the next sync and are listed in the
/// report; only a queue that cannot be read fails the whole run.
pub async fn drain_form_queue(
    tag: &str,
    queue: &dyn FormQueue,
    network: &dyn Network,
    endpoint: &Url,
) -> Result<SyncReport> {
    let mut report = SyncReport::empty(tag);
    let pending = queue.pending().await?;
    debug!(tag, pending = pending.len(), "draining form queue");

    for form in pending {
        let delivery = match FetchRequest::post_json(endpoint.clone(), &form) {
            Ok(request) => network.fetch(&request).await,
            Err(e) => Err(e),
        };

        let failure = match delivery {
            Ok(response) if response.status.is_success() => match queue.remove(form.id).await {
                Ok(_) => {
                    report.delivered.push(form.id);
                    continue;
                }
                Err(e) => format!("delivered but not dequeued: {}", e),
            },
            Ok(response) => format!("endpoint answered {}", response.status),
            Err(e) => e.to_string(),
        };

        warn!(id = form.id, "form delivery failed: {}", failure);
        report.failed.push(SyncFailure {
            id: form.id,
            reason: failure,
        });
    }

    info!(
        tag,
        delivered = report.delivered.len(),
        failed = report.failed.len(),
        "form queue sync finished"
    );
    Ok(report)
}
