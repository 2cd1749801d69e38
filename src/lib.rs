//! # offsync
//!
//! Offline-first local persistence and synchronization.
//!
//! Facade over the workspace members, so host applications depend on one
//! crate:
//!
//! - `offsync-store`: SQLite-backed record stores with declared secondary
//!   indexes
//! - `offsync-engine`: delta reconciliation and the retrying sync
//!   coordinator

pub use offsync_engine::{
    is_sync_needed_at, ConnectivityMonitor, Delta, DeltaState, FetchError, Mutation,
    ReconcileOutcome, Reconciler, StaticConnectivity, SyncConfig, SyncCoordinator, SyncError,
    SyncReport,
};
pub use offsync_store::{
    create_pool, create_test_pool, health_check, DatabaseConfig, IndexCatalog, IndexSpec,
    LocalStore, Record, RecordField, RecordFilter, StoreError, DEFAULT_INDEX_NAME,
};
