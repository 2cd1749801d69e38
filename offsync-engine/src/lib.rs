//! # Offline Sync Engine
//!
//! Reconciles remote change feeds into an on-device record store.
//!
//! ## Overview
//!
//! Applications stay readable and writable offline against a local store;
//! when a remote is reachable, a sync call fetches per-record deltas and
//! replays them locally. Fetching is caller-supplied, so the engine works
//! against any transport that can produce a `Vec<Delta<P>>`.
//!
//! ## Components
//!
//! - **Delta model** (`delta`): per-record change descriptions and states
//! - **Reconciliation** (`reconcile`): the delta-to-mutation state table
//! - **Coordinator** (`coordinator`): retry loop, busy signal, store facade
//! - **Connectivity** (`connectivity`): advisory online/offline signal

pub mod connectivity;
pub mod coordinator;
pub mod delta;
pub mod error;
pub mod reconcile;

pub use connectivity::{ConnectivityMonitor, StaticConnectivity};
pub use coordinator::{is_sync_needed_at, SyncConfig, SyncCoordinator, SyncReport};
pub use delta::{Delta, DeltaState};
pub use error::{FetchError, Result, SyncError};
pub use reconcile::{plan, Mutation, ReconcileOutcome, Reconciler};
