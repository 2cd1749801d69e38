//! # Reconciliation Engine
//!
//! Deterministic mapping from one remote delta to one local store mutation.
//! Planning is pure apart from serializing the payload, so the state table
//! is testable without a database; applying talks to the store. Retry
//! policy lives in the coordinator, nothing here loops or sleeps.
//!
//! The mapping, by delta state:
//!
//! - `new`: insert a freshly composed record; an existing id wins and the
//!   insert is skipped
//! - `modified`: overwrite unconditionally (last-write-wins)
//! - `not-modified`: refresh `last_synced` on the stored record, replacing
//!   its payload only when the delta carries one; a missing base record is
//!   reported, never invented
//! - `deleted`: remove by id; already-absent is fine

use crate::delta::{Delta, DeltaState};
use crate::error::Result;
use chrono::{DateTime, Utc};
use offsync_store::{LocalStore, Record};
use serde::Serialize;
use tracing::{debug, warn};

/// One planned local mutation, fully determined by a delta.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert a composed record.
    Insert(Record),
    /// Overwrite with a composed record.
    Overwrite(Record),
    /// Stamp `last_synced` on an existing record, optionally replacing its
    /// payload.
    Refresh {
        id: String,
        data: Option<String>,
        at: DateTime<Utc>,
    },
    /// Remove by id.
    Remove { id: String },
}

/// What applying one mutation did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A `new` delta inserted a record.
    Added,
    /// A `new` delta found its id already present; nothing changed.
    AlreadyExists,
    /// A `modified` delta overwrote (or first wrote) the record.
    Updated,
    /// A `not-modified` delta refreshed `last_synced`.
    Refreshed,
    /// A `not-modified` delta found no base record; nothing changed.
    MissingBase,
    /// A `deleted` delta ran; `existed` tells whether a row was removed.
    Removed { existed: bool },
}

/// The id a delta's record is persisted under.
///
/// Qualification appends the kind so that raw ids colliding across kinds in
/// a shared store stay distinct. It applies to every state uniformly: a
/// record written qualified is also refreshed and deleted qualified.
pub(crate) fn persisted_id<P>(delta: &Delta<P>, qualify: bool) -> String {
    if qualify {
        format!("{}:{}", delta.id, delta.kind)
    } else {
        delta.id.clone()
    }
}

/// Plan the store mutation for one delta.
///
/// `now` becomes the record's `last_synced` stamp; it is a parameter so the
/// mapping stays testable.
///
/// # Errors
///
/// Returns [`crate::SyncError::Payload`] when the delta payload does not
/// serialize.
pub fn plan<P: Serialize>(
    delta: &Delta<P>,
    qualify_ids: bool,
    now: DateTime<Utc>,
) -> Result<Mutation> {
    let id = persisted_id(delta, qualify_ids);
    match delta.state {
        DeltaState::Deleted => Ok(Mutation::Remove { id }),
        DeltaState::NotModified => Ok(Mutation::Refresh {
            id,
            data: serialize_payload(delta)?,
            at: now,
        }),
        DeltaState::New | DeltaState::Modified => {
            let record = Record {
                id,
                kind: delta.kind.clone(),
                last_modified: delta.last_modified,
                last_synced: Some(now),
                data: serialize_payload(delta)?.unwrap_or_default(),
                user_id: delta.user_id.clone(),
            };
            if delta.state == DeltaState::New {
                Ok(Mutation::Insert(record))
            } else {
                Ok(Mutation::Overwrite(record))
            }
        }
    }
}

fn serialize_payload<P: Serialize>(delta: &Delta<P>) -> Result<Option<String>> {
    delta
        .data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(Into::into)
}

/// Applies planned mutations against a [`LocalStore`].
pub struct Reconciler<'a> {
    store: &'a LocalStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a LocalStore) -> Self {
        Self { store }
    }

    /// Apply one planned mutation.
    pub async fn apply(&self, mutation: Mutation) -> Result<ReconcileOutcome> {
        match mutation {
            Mutation::Insert(record) => {
                if self.store.add(&record).await? {
                    Ok(ReconcileOutcome::Added)
                } else {
                    debug!(id = %record.id, "New delta targets an existing record, skipped");
                    Ok(ReconcileOutcome::AlreadyExists)
                }
            }
            Mutation::Overwrite(record) => {
                self.store.update(&record).await?;
                Ok(ReconcileOutcome::Updated)
            }
            Mutation::Refresh { id, data, at } => match self.store.get(&id).await? {
                Some(mut existing) => {
                    existing.last_synced = Some(at);
                    if let Some(data) = data {
                        existing.data = data;
                    }
                    self.store.update(&existing).await?;
                    Ok(ReconcileOutcome::Refreshed)
                }
                None => {
                    warn!(id = %id, "No base record for a not-modified delta");
                    Ok(ReconcileOutcome::MissingBase)
                }
            },
            Mutation::Remove { id } => {
                let existed = self.store.delete(&id).await?;
                Ok(ReconcileOutcome::Removed { existed })
            }
        }
    }

    /// Plan and apply one delta.
    pub async fn reconcile<P: Serialize>(
        &self,
        delta: &Delta<P>,
        qualify_ids: bool,
    ) -> Result<ReconcileOutcome> {
        let mutation = plan(delta, qualify_ids, Utc::now())?;
        self.apply(mutation).await
    }
}

// ===== Tests =====
