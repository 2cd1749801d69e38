//! # Remote Delta Model
//!
//! What a fetch hands the engine: per-record change descriptions tagged with
//! the server-side state. A delta carries the same envelope as a stored
//! record minus `last_synced`, which the engine stamps itself.
//!
//! The payload type `P` is chosen by the caller and serialized exactly once
//! when a delta becomes a stored record. The engine never deserializes a
//! payload it wrote.

use crate::error::SyncError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ===== Delta State =====

/// Server-side status of a record, deciding how it reconciles locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeltaState {
    /// The record does not exist locally yet.
    New,
    /// The record changed remotely and must overwrite the local copy.
    Modified,
    /// The record was removed remotely.
    Deleted,
    /// The record is unchanged; only its sync timestamp moves.
    NotModified,
}

impl DeltaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaState::New => "new",
            DeltaState::Modified => "modified",
            DeltaState::Deleted => "deleted",
            DeltaState::NotModified => "not-modified",
        }
    }

    /// Whether reconciling this state writes record content (as opposed to
    /// deleting or touching timestamps).
    pub fn carries_content(&self) -> bool {
        matches!(self, DeltaState::New | DeltaState::Modified)
    }
}

impl FromStr for DeltaState {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(DeltaState::New),
            "modified" => Ok(DeltaState::Modified),
            "deleted" => Ok(DeltaState::Deleted),
            "not-modified" => Ok(DeltaState::NotModified),
            other => Err(SyncError::InvalidState(other.to_string())),
        }
    }
}

impl fmt::Display for DeltaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ===== Delta =====

/// One record's remote change description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta<P> {
    /// Remote record id. May be qualified with the kind at persistence time,
    /// see `SyncConfig::qualify_record_ids`.
    pub id: String,
    /// Record category.
    #[serde(rename = "type")]
    pub kind: String,
    /// When the source of truth last modified the record.
    pub last_modified: DateTime<Utc>,
    /// Server-side status driving reconciliation.
    pub state: DeltaState,
    /// Payload for states that carry content. `None` on `not-modified`
    /// deltas means "keep what is stored".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<P>,
    /// Owning user; empty when the remote does not partition by user.
    #[serde(default)]
    pub user_id: String,
}

impl<P> Delta<P> {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        state: DeltaState,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            last_modified,
            state,
            data: None,
            user_id: String::new(),
        }
    }

    pub fn with_data(mut self, data: P) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Deletion marker; carries no payload.
    pub fn tombstone(
        id: impl Into<String>,
        kind: impl Into<String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self::new(id, kind, DeltaState::Deleted, last_modified)
    }
}

// ===== Tests =====
