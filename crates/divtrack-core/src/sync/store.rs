//! Client-side dividend cache kept in step with the server.
//!
//! Loads and local mutations are distinct events. A load replaces the cache
//! without writing anything back; a mutation updates the cache and queues a
//! save on a single worker, so saves reach the server in the order they were
//! made. Mutations made while a load is still in flight are kept and laid
//! over the loaded records once they arrive.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch, Mutex};

use super::client::{DividendsRemote, SyncError, SyncResult};
use crate::merge::merge;
use crate::models::{Dividend, DividendId};
use crate::state::SyncState;

/// What produced the current cache contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOrigin {
    Initial,
    /// Replaced with the server's records for the current identity
    Loaded,
    /// Emptied because the identity went away
    Cleared,
    /// Changed locally and queued for saving
    Mutated,
}

/// The derived read-only view published to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub identity: Option<String>,
    /// Cached dividends owned by `identity`
    pub dividends: Vec<Dividend>,
    pub origin: CacheOrigin,
    pub state: SyncState,
}

enum Job {
    Save(Vec<Dividend>),
    Delete { user_id: String, id: DividendId },
}

struct SyncJob {
    job: Job,
    respond_to: oneshot::Sender<SyncResult<usize>>,
}

/// Local changes made while a load is in flight
#[derive(Debug, Default)]
struct LoadOverlay {
    removed: HashSet<DividendId>,
    replaced: bool,
}

impl LoadOverlay {
    fn apply(self, loaded: Vec<Dividend>, local: Vec<Dividend>) -> Vec<Dividend> {
        if self.replaced {
            return local;
        }
        let mut base = loaded;
        base.retain(|record| !self.removed.contains(&record.id));
        merge(base, &local)
    }
}

struct Inner {
    identity: Option<String>,
    cache: Vec<Dividend>,
    identity_generation: u64,
    pending_load: Option<LoadOverlay>,
}

pub struct SyncStore {
    remote: Arc<dyn DividendsRemote>,
    inner: Mutex<Inner>,
    view: watch::Sender<CacheSnapshot>,
    jobs: mpsc::UnboundedSender<SyncJob>,
}

impl SyncStore {
    /// Create the store and spawn its save worker on the current tokio runtime
    pub fn new(remote: Arc<dyn DividendsRemote>) -> Self {
        let (jobs, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_sync_worker(remote.clone(), receiver));

        let (view, _) = watch::channel(CacheSnapshot {
            identity: None,
            dividends: Vec::new(),
            origin: CacheOrigin::Initial,
            state: SyncState::Offline,
        });

        Self {
            remote,
            inner: Mutex::new(Inner {
                identity: None,
                cache: Vec::new(),
                identity_generation: 0,
                pending_load: None,
            }),
            view,
            jobs,
        }
    }

    /// Switch to `identity`, loading its records or clearing the cache.
    ///
    /// A failed load is logged and leaves the cache empty. If the identity
    /// changes again before the load completes, the stale result is dropped.
    /// Upserts and removals made during the load win over loaded records, and
    /// a `replace_all` made during the load wins over the whole load.
    pub async fn set_identity(&self, identity: Option<String>) {
        let generation = {
            let mut inner = self.inner.lock().await;
            inner.identity.clone_from(&identity);
            inner.identity_generation += 1;
            inner.cache.clear();
            inner.pending_load = identity.as_ref().map(|_| LoadOverlay::default());
            let state = if identity.is_some() {
                SyncState::Syncing
            } else {
                SyncState::Offline
            };
            self.publish(&inner, CacheOrigin::Cleared, state);
            inner.identity_generation
        };

        let Some(user_id) = identity else {
            return;
        };

        let (loaded, state) = match self.remote.load(&user_id).await {
            Ok(records) => (records, SyncState::Synced),
            Err(error) => {
                tracing::warn!("Failed to load dividends: {}", error);
                (Vec::new(), SyncState::Error)
            }
        };

        let mut inner = self.inner.lock().await;
        if inner.identity_generation != generation {
            tracing::debug!("Discarding dividends loaded for a previous identity");
            return;
        }
        tracing::debug!(count = loaded.len(), "Loaded dividends");
        let local = std::mem::take(&mut inner.cache);
        inner.cache = match inner.pending_load.take() {
            Some(overlay) => overlay.apply(loaded, local),
            None => loaded,
        };
        self.publish(&inner, CacheOrigin::Loaded, state);
    }

    /// Insert or replace one record and save the cache
    pub async fn upsert(&self, record: Dividend) -> SyncResult<()> {
        self.upsert_many(vec![record]).await
    }

    /// Insert or replace several records and save the cache
    pub async fn upsert_many(&self, records: Vec<Dividend>) -> SyncResult<()> {
        self.mutate(false, |cache| {
            let existing = std::mem::take(cache);
            *cache = merge(existing, &records);
        })
        .await
    }

    /// Replace the whole cache and save it
    pub async fn replace_all(&self, records: Vec<Dividend>) -> SyncResult<()> {
        self.mutate(true, |cache| *cache = records).await
    }

    /// Remove one record locally and on the server.
    ///
    /// Returns whether the server removed anything.
    pub async fn remove(&self, id: DividendId) -> SyncResult<bool> {
        let receiver = {
            let mut inner = self.inner.lock().await;
            let user_id = inner.identity.clone().ok_or_else(|| {
                SyncError::InvalidConfiguration("no identity is set".to_string())
            })?;
            inner.cache.retain(|record| record.id != id);
            if let Some(overlay) = inner.pending_load.as_mut() {
                overlay.removed.insert(id);
            }
            self.publish(&inner, CacheOrigin::Mutated, SyncState::Syncing);
            self.enqueue(Job::Delete { user_id, id })?
        };

        let result = self.finish(receiver).await;
        result.map(|deleted| deleted > 0)
    }

    /// The derived view for the current identity
    pub fn dividends(&self) -> Vec<Dividend> {
        self.view.borrow().dividends.clone()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.view.borrow().clone()
    }

    /// Receive a new snapshot whenever the cache or the identity changes
    pub fn subscribe(&self) -> watch::Receiver<CacheSnapshot> {
        self.view.subscribe()
    }

    async fn mutate(
        &self,
        replaces_all: bool,
        apply: impl FnOnce(&mut Vec<Dividend>),
    ) -> SyncResult<()> {
        // The job is queued while the lock is held so save order matches
        // mutation order.
        let receiver = {
            let mut inner = self.inner.lock().await;
            apply(&mut inner.cache);
            if replaces_all {
                if let Some(overlay) = inner.pending_load.as_mut() {
                    overlay.replaced = true;
                }
            }
            self.publish(&inner, CacheOrigin::Mutated, SyncState::Syncing);
            self.enqueue(Job::Save(inner.cache.clone()))?
        };

        self.finish(receiver).await.map(|_| ())
    }

    fn enqueue(&self, job: Job) -> SyncResult<oneshot::Receiver<SyncResult<usize>>> {
        let (respond_to, receiver) = oneshot::channel();
        self.jobs
            .send(SyncJob { job, respond_to })
            .map_err(|_| SyncError::WorkerStopped)?;
        Ok(receiver)
    }

    async fn finish(&self, receiver: oneshot::Receiver<SyncResult<usize>>) -> SyncResult<usize> {
        let result = receiver.await.unwrap_or(Err(SyncError::WorkerStopped));
        let state = match &result {
            Ok(_) => SyncState::Synced,
            Err(error) => {
                tracing::error!("Failed to save dividends: {}", error);
                SyncState::Error
            }
        };
        self.view.send_modify(|snapshot| snapshot.state = state);
        result
    }

    fn publish(&self, inner: &Inner, origin: CacheOrigin, state: SyncState) {
        let dividends = inner.identity.as_deref().map_or_else(Vec::new, |user_id| {
            inner
                .cache
                .iter()
                .filter(|record| record.belongs_to(user_id))
                .cloned()
                .collect()
        });
        self.view.send_replace(CacheSnapshot {
            identity: inner.identity.clone(),
            dividends,
            origin,
            state,
        });
    }
}

async fn run_sync_worker(
    remote: Arc<dyn DividendsRemote>,
    mut jobs: mpsc::UnboundedReceiver<SyncJob>,
) {
    while let Some(SyncJob { job, respond_to }) = jobs.recv().await {
        let result = match job {
            Job::Save(records) => remote.save(&records).await.map(|()| records.len()),
            Job::Delete { user_id, id } => remote.delete(&user_id, id).await,
        };
        // The caller may have stopped waiting; the job still ran.
        let _ = respond_to.send(result);
    }
    tracing::debug!("Sync worker stopped");
}
