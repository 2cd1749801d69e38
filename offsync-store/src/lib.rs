//! # Local Store
//!
//! On-device record persistence for offline-first applications.
//!
//! ## Overview
//!
//! A store is a named table of [`Record`]s in a SQLite database, created
//! lazily on first use and queryable through the secondary indexes its
//! [`IndexCatalog`] declares. Payloads are opaque strings; the sync engine
//! layered on top decides what they mean.
//!
//! ## Components
//!
//! - **Connection pool** (`db`): pool configuration and pragma setup
//! - **Record model** (`record`): the persisted envelope and list filters
//! - **Schema** (`schema`): record fields, index catalog, DDL generation
//! - **Store engine** (`store`): transactional CRUD over one named store

pub mod db;
pub mod error;
pub mod record;
pub mod schema;
pub mod store;

pub use db::{create_pool, create_test_pool, health_check, DatabaseConfig};
pub use error::{Result, StoreError};
pub use record::{Record, RecordFilter};
pub use schema::{IndexCatalog, IndexSpec, RecordField, DEFAULT_INDEX_NAME};
pub use store::LocalStore;
