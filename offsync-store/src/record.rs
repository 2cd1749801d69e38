//! # Record Model
//!
//! The unit of persistence shared by every store: a keyed envelope around an
//! opaque payload, carrying the timestamps the sync engine reasons about.
//! The payload is stored and returned verbatim; nothing in this crate ever
//! parses it.

use crate::error::{Result, StoreError};
use crate::schema::RecordField;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A persisted record in a local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Primary key, unique within one store.
    pub id: String,
    /// Record category, the usual filtering and indexing axis.
    #[serde(rename = "type")]
    pub kind: String,
    /// When the source of truth last modified this record.
    pub last_modified: DateTime<Utc>,
    /// When this record last went through a successful sync, if ever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
    /// Opaque serialized payload.
    pub data: String,
    /// Owning user, for partitioning shared stores.
    pub user_id: String,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        last_modified: DateTime<Utc>,
        data: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            last_modified,
            last_synced: None,
            data: data.into(),
            user_id: user_id.into(),
        }
    }

    pub fn with_last_synced(mut self, at: DateTime<Utc>) -> Self {
        self.last_synced = Some(at);
        self
    }
}

/// Database row representation of a record.
///
/// Timestamps travel as RFC 3339 text; conversion to [`Record`] is where a
/// corrupt row surfaces as an error instead of a panic.
#[derive(Debug, FromRow)]
pub(crate) struct RecordRow {
    pub(crate) id: String,
    pub(crate) kind: String,
    pub(crate) last_modified: String,
    pub(crate) last_synced: Option<String>,
    pub(crate) data: String,
    pub(crate) user_id: String,
}

impl TryFrom<RecordRow> for Record {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self> {
        let last_modified = parse_timestamp(&row.last_modified, "last_modified", &row.id)?;
        let last_synced = row
            .last_synced
            .as_deref()
            .map(|value| parse_timestamp(value, "last_synced", &row.id))
            .transpose()?;
        Ok(Record {
            id: row.id,
            kind: row.kind,
            last_modified,
            last_synced,
            data: row.data,
            user_id: row.user_id,
        })
    }
}

fn parse_timestamp(value: &str, column: &str, id: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidTimestamp {
            column: column.to_string(),
            id: id.to_string(),
            message: e.to_string(),
        })
}

/// Exact-equality filter for list queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub field: RecordField,
    pub value: String,
}

impl RecordFilter {
    pub fn new(field: RecordField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    /// Filter by record kind, the most common case.
    pub fn kind(value: impl Into<String>) -> Self {
        Self::new(RecordField::Kind, value)
    }

    /// Filter by owning user.
    pub fn user(value: impl Into<String>) -> Self {
        Self::new(RecordField::UserId, value)
    }
}

// ===== Tests =====

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_record_builder() {
        let record = Record::new("1", "claim", sample_time(), "{}", "user-1")
            .with_last_synced(sample_time());

        assert_eq!(record.id, "1");
        assert_eq!(record.kind, "claim");
        assert_eq!(record.last_synced, Some(sample_time()));
    }

    #[test]
    fn test_record_wire_shape() {
        let record = Record::new("1", "claim", sample_time(), "{\"a\":1}", "user-1");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["type"], "claim");
        assert_eq!(json["lastModified"], "2024-05-14T09:30:00Z");
        assert_eq!(json["userId"], "user-1");
        assert!(json.get("lastSynced").is_none());
    }

    #[test]
    fn test_row_conversion_round_trip() {
        let row = RecordRow {
            id: "1".to_string(),
            kind: "claim".to_string(),
            last_modified: sample_time().to_rfc3339(),
            last_synced: Some(sample_time().to_rfc3339()),
            data: "{\"a\":1}".to_string(),
            user_id: "user-1".to_string(),
        };

        let record = Record::try_from(row).unwrap();
        assert_eq!(record.last_modified, sample_time());
        assert_eq!(record.last_synced, Some(sample_time()));
    }

    #[test]
    fn test_row_conversion_rejects_corrupt_timestamp() {
        let row = RecordRow {
            id: "1".to_string(),
            kind: "claim".to_string(),
            last_modified: "not-a-time".to_string(),
            last_synced: None,
            data: String::new(),
            user_id: String::new(),
        };

        let err = Record::try_from(row).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTimestamp { ref column, .. } if column == "last_modified"
        ));
    }

    #[test]
    fn test_filter_constructors() {
        assert_eq!(
            RecordFilter::kind("claim"),
            RecordFilter::new(RecordField::Kind, "claim")
        );
        assert_eq!(
            RecordFilter::user("u-1"),
            RecordFilter::new(RecordField::UserId, "u-1")
        );
    }
}
