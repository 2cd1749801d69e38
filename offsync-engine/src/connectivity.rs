//! Connectivity signal abstraction.
//!
//! The engine only ever reads this signal. Being offline never blocks a
//! sync or a local operation; callers decide what to do with the answer.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Read-only view of platform connectivity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectivityMonitor: Send + Sync {
    /// Current link state as the platform reports it.
    async fn is_online(&self) -> bool;
}

/// Monitor backed by a caller-updated flag.
///
/// Hosts wire their platform's network events to [`set_online`]; with no
/// events it reports online.
///
/// [`set_online`]: StaticConnectivity::set_online
#[derive(Debug)]
pub struct StaticConnectivity {
    online: AtomicBool,
}

impl StaticConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }
}

impl Default for StaticConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConnectivityMonitor for StaticConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_monitor_defaults_to_online() {
        let monitor = StaticConnectivity::default();
        assert!(monitor.is_online().await);

        monitor.set_online(false);
        assert!(!monitor.is_online().await);
    }

    #[tokio::test]
    async fn test_mock_monitor_reports_configured_state() {
        let mut mock = MockConnectivityMonitor::new();
        mock.expect_is_online().times(1).returning(|| false);

        assert!(!mock.is_online().await);
    }
}
