//! Offline-first sync walkthrough against an in-memory store.
//!
//! Run with:
//!
//! ```bash
//! cargo run --example sync_demo
//! RUST_LOG=debug cargo run --example sync_demo
//! ```

use offsync_engine::{Delta, DeltaState, StaticConnectivity, SyncConfig, SyncCoordinator};
use offsync_store::{create_pool, DatabaseConfig, IndexCatalog, IndexSpec, LocalStore, RecordField};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let pool = create_pool(DatabaseConfig::in_memory()).await?;
    let catalog = IndexCatalog::new(vec![
        IndexSpec::new("by_id", RecordField::Id),
        IndexSpec::new("by_kind", RecordField::Kind),
        IndexSpec::new("by_user", RecordField::UserId),
    ])?;
    let store = LocalStore::new(pool, "claims", catalog)?;

    let connectivity = Arc::new(StaticConnectivity::default());
    let coordinator = SyncCoordinator::new(store, SyncConfig::default())
        .with_connectivity(connectivity.clone());

    info!(offline = coordinator.is_offline().await, "Starting demo sync");

    // Stand-in for a real backend: one batch of per-record deltas.
    let now = chrono::Utc::now();
    let report = coordinator
        .sync_list(move || async move {
            Ok(vec![
                Delta::new("1", "claim", DeltaState::New, now)
                    .with_data(serde_json::json!({"amount": 120}))
                    .with_user("user-1"),
                Delta::new("2", "claim", DeltaState::New, now)
                    .with_data(serde_json::json!({"amount": 80}))
                    .with_user("user-1"),
                Delta::new("1", "claim", DeltaState::NotModified, now),
            ])
        })
        .await?;

    info!(
        added = report.items_added,
        refreshed = report.items_refreshed,
        attempts = report.attempts,
        "Sync complete"
    );

    for record in coordinator.get_list(None).await? {
        info!(id = %record.id, kind = %record.kind, data = %record.data, "Stored record");
    }

    // Losing the link does not block local reads.
    connectivity.set_online(false);
    info!(
        offline = coordinator.is_offline().await,
        "Connectivity lost, store stays readable"
    );
    if let Some(claim) = coordinator.get("1").await? {
        info!(data = %claim.data, "Read while offline");
    }

    Ok(())
}
