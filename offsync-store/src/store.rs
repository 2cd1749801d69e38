//! # Local Store Engine
//!
//! Durable CRUD over one named store. A store is a single SQLite table plus
//! the secondary indexes its catalog declares. Creation is lazy: the first
//! operation on a handle runs the schema DDL, so callers never sequence an
//! explicit "open" step, and a dropped store comes back empty on next use.
//!
//! Every operation runs in its own transaction. Operations on different
//! records are independent; no cross-record atomicity is promised.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pool = create_pool(DatabaseConfig::in_memory()).await?;
//! let store = LocalStore::with_default_catalog(pool, "claims")?;
//!
//! store.add(&record).await?;
//! let found = store.get("claim-1").await?;
//! ```

use crate::error::Result;
use crate::record::{Record, RecordFilter, RecordRow};
use crate::schema::{validate_identifier, IndexCatalog};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, instrument, warn};

/// Handle to one named store backed by SQLite.
pub struct LocalStore {
    pool: SqlitePool,
    name: String,
    catalog: IndexCatalog,
    initialized: AtomicBool,
}

impl LocalStore {
    /// Create a handle over `pool` for the store `name`.
    ///
    /// The name and catalog are validated here; the backing table and
    /// indexes are created lazily by the first operation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::InvalidName`] when `name` is not a plain
    /// identifier.
    pub fn new(pool: SqlitePool, name: impl Into<String>, catalog: IndexCatalog) -> Result<Self> {
        let name = name.into();
        validate_identifier(&name)?;
        Ok(Self {
            pool,
            name,
            catalog,
            initialized: AtomicBool::new(false),
        })
    }

    /// Handle with the default single-index catalog over the primary key.
    pub fn with_default_catalog(pool: SqlitePool, name: impl Into<String>) -> Result<Self> {
        Self::new(pool, name, IndexCatalog::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &IndexCatalog {
        &self.catalog
    }

    /// Create the backing table and catalog indexes if missing.
    ///
    /// The flag only skips re-running DDL on this handle; the statements are
    /// all `IF NOT EXISTS`, so racing handles converge on the same schema.
    async fn ensure_schema(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        debug!(store = %self.name, "Initializing store schema");
        let mut tx = self.pool.begin().await?;
        for statement in self.catalog.schema_statements(&self.name) {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT id, kind, last_modified, last_synced, data, user_id FROM {}",
            self.name
        )
    }

    // ===== Read Operations =====

    /// Fetch one record by primary key.
    ///
    /// Absence is `Ok(None)`, never an error.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn get(&self, id: &str) -> Result<Option<Record>> {
        self.ensure_schema().await?;
        let sql = format!("{} WHERE id = ?", self.select_sql());

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;

        row.map(Record::try_from).transpose()
    }

    /// List every record, optionally narrowed by an exact-equality filter.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn get_list(&self, filter: Option<&RecordFilter>) -> Result<Vec<Record>> {
        self.ensure_schema().await?;

        let mut tx = self.pool.begin().await?;
        let rows = match filter {
            Some(filter) => {
                let sql = format!("{} WHERE {} = ?", self.select_sql(), filter.field.column());
                sqlx::query_as::<_, RecordRow>(&sql)
                    .bind(&filter.value)
                    .fetch_all(&mut *tx)
                    .await?
            }
            None => {
                let sql = self.select_sql();
                sqlx::query_as::<_, RecordRow>(&sql)
                    .fetch_all(&mut *tx)
                    .await?
            }
        };
        tx.commit().await?;

        rows.into_iter().map(Record::try_from).collect()
    }

    /// Look up records through a declared secondary index.
    ///
    /// `None` falls back to the catalog's default index. Naming an index the
    /// catalog never declared is a configuration error
    /// ([`crate::StoreError::UnknownIndex`]), distinct from a lookup that
    /// simply matches nothing. Results come back in SQLite's natural order;
    /// callers wanting "first match" semantics take the head of the list.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn get_by_index(&self, index: Option<&str>, key_value: &str) -> Result<Vec<Record>> {
        let spec = self.catalog.resolve(index)?;
        self.ensure_schema().await?;
        let sql = format!("{} WHERE {} = ?", self.select_sql(), spec.field.column());

        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(key_value)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        rows.into_iter().map(Record::try_from).collect()
    }

    // ===== Write Operations =====

    /// Insert a record.
    ///
    /// Returns `Ok(false)` when the primary key already exists, leaving the
    /// stored record untouched. Duplicates are an expected outcome of
    /// re-running a sync, not an error.
    #[instrument(skip(self, record), fields(store = %self.name, id = %record.id))]
    pub async fn add(&self, record: &Record) -> Result<bool> {
        self.ensure_schema().await?;
        let sql = format!(
            "INSERT INTO {} (id, kind, last_modified, last_synced, data, user_id)
             VALUES (?, ?, ?, ?, ?, ?)",
            self.name
        );

        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(&sql)
            .bind(&record.id)
            .bind(&record.kind)
            .bind(record.last_modified.to_rfc3339())
            .bind(record.last_synced.map(|t| t.to_rfc3339()))
            .bind(&record.data)
            .bind(&record.user_id)
            .execute(&mut *tx)
            .await;

        match inserted {
            Ok(_) => {
                tx.commit().await?;
                Ok(true)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(id = %record.id, "Record already exists, add skipped");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write a record unconditionally, inserting or overwriting.
    #[instrument(skip(self, record), fields(store = %self.name, id = %record.id))]
    pub async fn update(&self, record: &Record) -> Result<()> {
        self.ensure_schema().await?;
        let sql = format!(
            "INSERT INTO {} (id, kind, last_modified, last_synced, data, user_id)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 kind = excluded.kind,
                 last_modified = excluded.last_modified,
                 last_synced = excluded.last_synced,
                 data = excluded.data,
                 user_id = excluded.user_id",
            self.name
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query(&sql)
            .bind(&record.id)
            .bind(&record.kind)
            .bind(record.last_modified.to_rfc3339())
            .bind(record.last_synced.map(|t| t.to_rfc3339()))
            .bind(&record.data)
            .bind(&record.user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete by primary key.
    ///
    /// Deleting a missing record is not an error; the return value tells
    /// whether a row was actually removed.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.ensure_schema().await?;
        let sql = format!("DELETE FROM {} WHERE id = ?", self.name);

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    /// Irreversibly destroy a store and its indexes.
    ///
    /// `None` targets this handle's own store, which then re-initializes
    /// empty on the next operation. Dropping another store by name leaves
    /// any live handle over it stale; expected topology is one handle per
    /// store name.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn drop_store(&self, name: Option<&str>) -> Result<()> {
        let target = match name {
            Some(other) => {
                validate_identifier(other)?;
                other
            }
            None => self.name.as_str(),
        };
        warn!(store = %target, "Dropping store");
        let sql = format!("DROP TABLE IF EXISTS {target}");

        let mut tx = self.pool.begin().await?;
        sqlx::query(&sql).execute(&mut *tx).await?;
        tx.commit().await?;

        if target == self.name {
            self.initialized.store(false, Ordering::Release);
        }
        Ok(())
    }
}

// ===== Tests =====

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::error::StoreError;
    use crate::schema::{IndexSpec, RecordField};
    use chrono::Utc;

    async fn setup_store() -> LocalStore {
        let pool = create_test_pool().await.unwrap();
        let catalog = IndexCatalog::new(vec![
            IndexSpec::new("by_id", RecordField::Id),
            IndexSpec::new("by_kind", RecordField::Kind),
            IndexSpec::new("by_user", RecordField::UserId),
        ])
        .unwrap();
        LocalStore::new(pool, "claims", catalog).unwrap()
    }

    fn claim(id: &str, data: &str) -> Record {
        Record::new(id, "claim", Utc::now(), data, "user-1").with_last_synced(Utc::now())
    }

    #[tokio::test]
    async fn test_get_on_fresh_store_returns_none() {
        let store = setup_store().await;
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_then_get_round_trip() {
        let store = setup_store().await;
        let record = claim("1", "{\"amount\":120}");

        assert!(store.add(&record).await.unwrap());
        let found = store.get("1").await.unwrap().unwrap();
        assert_eq!(found, record);
    }

    #[tokio::test]
    async fn test_add_duplicate_returns_false_and_keeps_original() {
        let store = setup_store().await;
        let original = claim("1", "original");
        let imposter = claim("1", "imposter");

        assert!(store.add(&original).await.unwrap());
        assert!(!store.add(&imposter).await.unwrap());

        let found = store.get("1").await.unwrap().unwrap();
        assert_eq!(found.data, "original");
    }

    #[tokio::test]
    async fn test_update_inserts_when_missing() {
        let store = setup_store().await;
        let record = claim("1", "fresh");

        store.update(&record).await.unwrap();
        assert_eq!(store.get("1").await.unwrap().unwrap().data, "fresh");
    }

    #[tokio::test]
    async fn test_update_overwrites_every_field() {
        let store = setup_store().await;
        store.add(&claim("1", "before")).await.unwrap();

        let mut replacement = Record::new("1", "invoice", Utc::now(), "after", "user-2");
        replacement.last_synced = Some(Utc::now());
        store.update(&replacement).await.unwrap();

        let found = store.get("1").await.unwrap().unwrap();
        assert_eq!(found.kind, "invoice");
        assert_eq!(found.data, "after");
        assert_eq!(found.user_id, "user-2");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = setup_store().await;
        store.add(&claim("1", "{}")).await.unwrap();

        assert!(store.delete("1").await.unwrap());
        assert!(store.get("1").await.unwrap().is_none());
        assert!(!store.delete("1").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_list_with_and_without_filter() {
        let store = setup_store().await;
        store.add(&claim("1", "{}")).await.unwrap();
        store.add(&claim("2", "{}")).await.unwrap();
        store
            .add(&Record::new("3", "invoice", Utc::now(), "{}", "user-2"))
            .await
            .unwrap();

        let all = store.get_list(None).await.unwrap();
        assert_eq!(all.len(), 3);

        let claims = store
            .get_list(Some(&RecordFilter::kind("claim")))
            .await
            .unwrap();
        assert_eq!(claims.len(), 2);

        let theirs = store
            .get_list(Some(&RecordFilter::user("user-2")))
            .await
            .unwrap();
        assert_eq!(theirs.len(), 1);
        assert_eq!(theirs[0].id, "3");

        let none = store
            .get_list(Some(&RecordFilter::kind("receipt")))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_get_by_index_uses_default_and_named_entries() {
        let store = setup_store().await;
        store.add(&claim("1", "{}")).await.unwrap();
        store.add(&claim("2", "{}")).await.unwrap();

        // Default index is the first declared entry, over the primary key.
        let by_default = store.get_by_index(None, "1").await.unwrap();
        assert_eq!(by_default.len(), 1);
        assert_eq!(by_default[0].id, "1");

        let by_kind = store.get_by_index(Some("by_kind"), "claim").await.unwrap();
        assert_eq!(by_kind.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_index_is_an_error_not_an_empty_result() {
        let store = setup_store().await;
        store.add(&claim("1", "{}")).await.unwrap();

        let empty = store.get_by_index(Some("by_kind"), "receipt").await.unwrap();
        assert!(empty.is_empty());

        let err = store.get_by_index(Some("by_amount"), "120").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnknownIndex { ref name } if name == "by_amount"
        ));
    }

    #[tokio::test]
    async fn test_drop_store_then_lazy_reinitialize() {
        let store = setup_store().await;
        store.add(&claim("1", "old")).await.unwrap();

        store.drop_store(None).await.unwrap();

        // Next operation recreates the schema from scratch.
        assert!(store.get("1").await.unwrap().is_none());
        assert!(store.add(&claim("2", "new")).await.unwrap());

        let all = store.get_list(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "2");
    }

    #[tokio::test]
    async fn test_drop_other_store_by_name() {
        let pool = create_test_pool().await.unwrap();
        let claims = LocalStore::with_default_catalog(pool.clone(), "claims").unwrap();
        let receipts = LocalStore::with_default_catalog(pool, "receipts").unwrap();

        claims.add(&claim("1", "{}")).await.unwrap();
        receipts.add(&claim("1", "{}")).await.unwrap();

        claims.drop_store(Some("receipts")).await.unwrap();

        assert!(claims.get("1").await.unwrap().is_some());
        assert!(matches!(
            claims.drop_store(Some("bad name")).await,
            Err(StoreError::InvalidName { .. })
        ));
    }

    #[tokio::test]
    async fn test_store_name_is_validated() {
        let pool = create_test_pool().await.unwrap();
        assert!(matches!(
            LocalStore::with_default_catalog(pool, "claims; DROP TABLE x"),
            Err(StoreError::InvalidName { .. })
        ));
    }
}
