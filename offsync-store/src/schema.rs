//! # Store Schema & Index Catalog
//!
//! Declarative description of a store's backing table and its secondary
//! indexes. The catalog is fixed when a [`crate::store::LocalStore`] handle
//! is created and applied lazily, with `IF NOT EXISTS` DDL throughout, so
//! re-opening an existing store is always safe.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the index every default catalog declares.
pub const DEFAULT_INDEX_NAME: &str = "by_id";

// ===== Record Fields =====

/// A column of the record table that an index or filter may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordField {
    Id,
    #[serde(rename = "type")]
    Kind,
    LastModified,
    LastSynced,
    Data,
    UserId,
}

impl RecordField {
    /// Column name in the backing table.
    pub fn column(&self) -> &'static str {
        match self {
            RecordField::Id => "id",
            RecordField::Kind => "kind",
            RecordField::LastModified => "last_modified",
            RecordField::LastSynced => "last_synced",
            RecordField::Data => "data",
            RecordField::UserId => "user_id",
        }
    }
}

impl FromStr for RecordField {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "id" => Ok(RecordField::Id),
            "type" | "kind" => Ok(RecordField::Kind),
            "last_modified" => Ok(RecordField::LastModified),
            "last_synced" => Ok(RecordField::LastSynced),
            "data" => Ok(RecordField::Data),
            "user_id" => Ok(RecordField::UserId),
            other => Err(StoreError::InvalidName {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

// ===== Index Catalog =====

/// A named secondary index over one record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub field: RecordField,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, field: RecordField) -> Self {
        Self {
            name: name.into(),
            field,
        }
    }
}

/// Ordered set of secondary indexes declared at store creation.
///
/// The first declared entry is the catalog's default index, used whenever a
/// lookup names no index explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCatalog {
    indexes: Vec<IndexSpec>,
}

impl IndexCatalog {
    /// Validate and build a catalog.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyCatalog`] for an empty declaration,
    /// [`StoreError::InvalidName`] for a name that is not a plain
    /// identifier, and [`StoreError::DuplicateIndex`] for a repeated name.
    pub fn new(indexes: Vec<IndexSpec>) -> Result<Self> {
        if indexes.is_empty() {
            return Err(StoreError::EmptyCatalog);
        }
        for (position, spec) in indexes.iter().enumerate() {
            validate_identifier(&spec.name)?;
            if indexes[..position].iter().any(|other| other.name == spec.name) {
                return Err(StoreError::DuplicateIndex {
                    name: spec.name.clone(),
                });
            }
        }
        Ok(Self { indexes })
    }

    /// The index used when a lookup names none.
    pub fn default_index(&self) -> &IndexSpec {
        &self.indexes[0]
    }

    pub fn get(&self, name: &str) -> Option<&IndexSpec> {
        self.indexes.iter().find(|spec| spec.name == name)
    }

    /// Resolve a lookup's index choice; `None` falls back to the default.
    pub fn resolve(&self, name: Option<&str>) -> Result<&IndexSpec> {
        match name {
            None => Ok(self.default_index()),
            Some(n) => self.get(n).ok_or_else(|| StoreError::UnknownIndex {
                name: n.to_string(),
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexSpec> {
        self.indexes.iter()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// DDL creating the backing table and every declared index.
    ///
    /// Index names are prefixed with the store name because SQLite keeps a
    /// single index namespace per database, not per table.
    pub(crate) fn schema_statements(&self, store: &str) -> Vec<String> {
        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {store} (
                id TEXT PRIMARY KEY NOT NULL,
                kind TEXT NOT NULL,
                last_modified TEXT NOT NULL,
                last_synced TEXT,
                data TEXT NOT NULL DEFAULT '',
                user_id TEXT NOT NULL DEFAULT ''
            )"
        )];
        for spec in &self.indexes {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS idx_{store}_{name} ON {store}({column})",
                name = spec.name,
                column = spec.field.column()
            ));
        }
        statements
    }
}

impl Default for IndexCatalog {
    /// Single index over the primary key.
    fn default() -> Self {
        Self {
            indexes: vec![IndexSpec::new(DEFAULT_INDEX_NAME, RecordField::Id)],
        }
    }
}

/// Store and index names are interpolated into SQL, so anything beyond a
/// plain identifier is rejected up front.
pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if starts_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::InvalidName {
            name: name.to_string(),
        })
    }
}

// ===== Tests =====
