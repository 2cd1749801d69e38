//! # Sync Coordinator
//!
//! Drives remote deltas through the reconciliation engine and fronts the
//! local store for host applications.
//!
//! ## Overview
//!
//! A sync call takes a caller-supplied fetch function, invokes it under a
//! bounded retry budget, and reconciles the returned deltas into the store
//! one by one, in order. The fetch is re-invoked from scratch on every
//! retry, so a transient failure re-fetches and re-reconciles the whole
//! batch; reconciliation is idempotent, which makes the rerun safe.
//!
//! ## Workflow
//!
//! 1. Raise the busy signal (a counter, overlapping calls stack)
//! 2. Invoke the fetch; classify any failure by its [`FetchError`] variant
//! 3. On success, reconcile each delta sequentially and tally a report
//! 4. Drop the busy signal, success or not
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = SyncCoordinator::new(store, SyncConfig::default());
//!
//! let report = coordinator
//!     .sync_list(|| client.fetch_changed_claims())
//!     .await?;
//! info!(added = report.items_added, "Claims synced");
//! ```

use crate::connectivity::ConnectivityMonitor;
use crate::delta::Delta;
use crate::error::{FetchError, Result, SyncError};
use crate::reconcile::{ReconcileOutcome, Reconciler};
use chrono::{DateTime, Utc};
use offsync_store::{LocalStore, Record, RecordFilter};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

// ===== Configuration =====

/// Sync coordinator configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum fetch attempts per sync call, counting the first one.
    /// Treated as at least 1.
    pub max_attempts: u32,

    /// Fixed delay between fetch attempts.
    pub retry_delay: Duration,

    /// Default staleness threshold for [`SyncCoordinator::is_sync_needed`].
    pub staleness_threshold: Duration,

    /// Persist record ids as `<id>:<kind>`, for stores shared by several
    /// kinds whose raw ids may collide.
    pub qualify_record_ids: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_millis(200),
            staleness_threshold: Duration::from_secs(5 * 60),
            qualify_record_ids: false,
        }
    }
}

impl SyncConfig {
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn staleness_threshold(mut self, staleness_threshold: Duration) -> Self {
        self.staleness_threshold = staleness_threshold;
        self
    }

    pub fn qualify_record_ids(mut self, qualify_record_ids: bool) -> Self {
        self.qualify_record_ids = qualify_record_ids;
        self
    }
}

// ===== Report =====

/// Statistics from one completed sync call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Records inserted by `new` deltas.
    pub items_added: u64,
    /// Records overwritten by `modified` deltas.
    pub items_updated: u64,
    /// Records whose `last_synced` moved on a `not-modified` delta.
    pub items_refreshed: u64,
    /// Records removed by `deleted` deltas.
    pub items_deleted: u64,
    /// Deltas that changed nothing: duplicate `new`, already-absent
    /// `deleted`, `not-modified` with no base record.
    pub items_skipped: u64,
    /// Remote ids of `not-modified` deltas that had no base record.
    /// Callers wanting those records re-request them as `new`.
    pub missing_base: Vec<String>,
    /// Fetch attempts spent, 1 when the first try succeeds.
    pub attempts: u32,
}

impl SyncReport {
    /// Deltas that changed the store.
    pub fn total_applied(&self) -> u64 {
        self.items_added + self.items_updated + self.items_refreshed + self.items_deleted
    }

    fn tally(&mut self, outcome: ReconcileOutcome, remote_id: &str) {
        match outcome {
            ReconcileOutcome::Added => self.items_added += 1,
            ReconcileOutcome::Updated => self.items_updated += 1,
            ReconcileOutcome::Refreshed => self.items_refreshed += 1,
            ReconcileOutcome::Removed { existed: true } => self.items_deleted += 1,
            ReconcileOutcome::Removed { existed: false } | ReconcileOutcome::AlreadyExists => {
                self.items_skipped += 1;
            }
            ReconcileOutcome::MissingBase => {
                self.items_skipped += 1;
                self.missing_base.push(remote_id.to_string());
            }
        }
    }
}

// ===== Busy Signal =====

/// RAII release of the in-flight sync counter.
struct SyncGuard<'a> {
    active: &'a AtomicUsize,
}

impl<'a> SyncGuard<'a> {
    fn enter(active: &'a AtomicUsize) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// ===== Coordinator =====

/// Orchestrates fetch, retry and reconciliation over one local store.
pub struct SyncCoordinator {
    config: SyncConfig,
    store: LocalStore,
    connectivity: Option<Arc<dyn ConnectivityMonitor>>,
    active_syncs: AtomicUsize,
}

impl SyncCoordinator {
    /// Create a coordinator over an existing store handle.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let store = LocalStore::with_default_catalog(pool, "claims")?;
    /// let coordinator = SyncCoordinator::new(store, SyncConfig::default());
    /// ```
    pub fn new(store: LocalStore, config: SyncConfig) -> Self {
        Self {
            config,
            store,
            connectivity: None,
            active_syncs: AtomicUsize::new(0),
        }
    }

    /// Attach a platform connectivity monitor, consulted by
    /// [`is_offline`](Self::is_offline).
    pub fn with_connectivity(mut self, monitor: Arc<dyn ConnectivityMonitor>) -> Self {
        self.connectivity = Some(monitor);
        self
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ===== Sync Entry Points =====

    /// Fetch and reconcile a batch of deltas.
    ///
    /// `fetch` is called again from scratch after every transient failure,
    /// up to the configured attempt budget, sleeping the fixed retry delay
    /// in between.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Cancelled`] when the fetch reports cancellation;
    ///   never retried
    /// - [`SyncError::Fetch`] when the fetch fails fatally; never retried
    /// - [`SyncError::RetriesExhausted`] when every attempt failed
    ///   transiently
    /// - [`SyncError::Store`] / [`SyncError::Payload`] when reconciliation
    ///   fails; the batch stops at the failing delta
    #[instrument(skip(self, fetch), fields(store = %self.store.name()))]
    pub async fn sync_list<P, F, Fut>(&self, fetch: F) -> Result<SyncReport>
    where
        P: Serialize,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<Delta<P>>, FetchError>>,
    {
        self.run_sync(fetch).await
    }

    /// Fetch and reconcile a single delta.
    ///
    /// Same retry and error behavior as [`sync_list`](Self::sync_list).
    #[instrument(skip(self, fetch), fields(store = %self.store.name()))]
    pub async fn sync_item<P, F, Fut>(&self, mut fetch: F) -> Result<SyncReport>
    where
        P: Serialize,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<Delta<P>, FetchError>>,
    {
        self.run_sync(|| {
            let item = fetch();
            async move { item.await.map(|delta| vec![delta]) }
        })
        .await
    }

    /// Shared sync loop: bounded fetch retries, then sequential
    /// reconciliation.
    async fn run_sync<P, F, Fut>(&self, mut fetch: F) -> Result<SyncReport>
    where
        P: Serialize,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<Delta<P>>, FetchError>>,
    {
        let _guard = SyncGuard::enter(&self.active_syncs);
        let max_attempts = self.config.max_attempts.max(1);
        let reconciler = Reconciler::new(&self.store);
        let mut attempt = 0u32;

        let deltas = loop {
            attempt += 1;
            match fetch().await {
                Ok(deltas) => break deltas,
                Err(FetchError::Cancelled) => {
                    info!(attempt, "Fetch cancelled, sync abandoned");
                    return Err(SyncError::Cancelled);
                }
                Err(err @ FetchError::Fatal(_)) => {
                    warn!(attempt, error = %err, "Fetch failed permanently");
                    return Err(SyncError::Fetch(err));
                }
                Err(err) if attempt < max_attempts => {
                    warn!(attempt, error = %err, "Fetch failed, retrying after delay");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "Fetch retry budget exhausted");
                    return Err(SyncError::RetriesExhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
            }
        };

        let mut report = SyncReport {
            attempts: attempt,
            ..SyncReport::default()
        };
        for delta in &deltas {
            let outcome = reconciler
                .reconcile(delta, self.config.qualify_record_ids)
                .await?;
            report.tally(outcome, &delta.id);
        }

        debug!(
            added = report.items_added,
            updated = report.items_updated,
            refreshed = report.items_refreshed,
            deleted = report.items_deleted,
            skipped = report.items_skipped,
            attempts = report.attempts,
            "Sync pass complete"
        );
        Ok(report)
    }

    // ===== Status =====

    /// Whether any sync on this coordinator is currently in flight.
    ///
    /// Purely a signal. Overlapping sync calls run concurrently and are not
    /// serialized here; callers that want mutual exclusion check this first.
    pub fn is_syncing(&self) -> bool {
        self.active_syncs.load(Ordering::SeqCst) > 0
    }

    /// Whether the platform reports the device offline.
    ///
    /// Advisory only, nothing in the engine gates on it. Without an attached
    /// monitor this reports `false`.
    pub async fn is_offline(&self) -> bool {
        match &self.connectivity {
            Some(monitor) => !monitor.is_online().await,
            None => false,
        }
    }

    /// Whether `last_synced` is stale enough to warrant a sync.
    ///
    /// `delay` falls back to the configured staleness threshold. The
    /// boundary is inclusive: an age exactly equal to the delay already
    /// counts as stale.
    pub fn is_sync_needed(&self, last_synced: DateTime<Utc>, delay: Option<Duration>) -> bool {
        is_sync_needed_at(
            Utc::now(),
            last_synced,
            delay.unwrap_or(self.config.staleness_threshold),
        )
    }

    // ===== Store Passthrough =====

    /// Fetch one record by id. Absence is `Ok(None)`.
    pub async fn get(&self, id: &str) -> Result<Option<Record>> {
        Ok(self.store.get(id).await?)
    }

    /// List records, optionally narrowed by an exact-equality filter.
    pub async fn get_list(&self, filter: Option<&RecordFilter>) -> Result<Vec<Record>> {
        Ok(self.store.get_list(filter).await?)
    }

    /// All records matching a secondary-index lookup; `None` uses the
    /// catalog's default index.
    pub async fn get_list_by_index(
        &self,
        index: Option<&str>,
        key_value: &str,
    ) -> Result<Vec<Record>> {
        Ok(self.store.get_by_index(index, key_value).await?)
    }

    /// First record matching a secondary-index lookup, in the store's
    /// natural order.
    pub async fn get_by_index(
        &self,
        index: Option<&str>,
        key_value: &str,
    ) -> Result<Option<Record>> {
        let mut records = self.store.get_by_index(index, key_value).await?;
        if records.is_empty() {
            Ok(None)
        } else {
            Ok(Some(records.remove(0)))
        }
    }

    /// Insert a record; `Ok(false)` when the id already exists.
    pub async fn add(&self, record: &Record) -> Result<bool> {
        Ok(self.store.add(record).await?)
    }

    /// Write a record unconditionally.
    pub async fn update(&self, record: &Record) -> Result<()> {
        Ok(self.store.update(record).await?)
    }

    /// Delete by id; missing records are not an error.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete(id).await?)
    }

    /// Destroy a store irreversibly; `None` targets the coordinator's own
    /// store, which re-initializes empty on next use.
    pub async fn delete_database(&self, name: Option<&str>) -> Result<()> {
        Ok(self.store.drop_store(name).await?)
    }
}

/// Staleness check with an injected clock.
///
/// Inclusive boundary: an age exactly equal to `delay` counts as stale. A
/// `last_synced` in the future never does.
pub fn is_sync_needed_at(now: DateTime<Utc>, last_synced: DateTime<Utc>, delay: Duration) -> bool {
    match now.signed_duration_since(last_synced).to_std() {
        Ok(age) => age >= delay,
        Err(_) => false,
    }
}

// ===== Tests =====
