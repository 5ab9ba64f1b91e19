//! Network reachability monitor.
//!
//! Driven by connectivity events from the host environment; nothing here polls.

use std::sync::Arc;

use tokio::sync::watch;

/// A connectivity event reported by the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

/// Snapshot of the monitor's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkStatus {
    /// Current reachability
    pub is_online: bool,
    /// Sticky: set by any disconnect since the last reset
    pub was_offline: bool,
}

impl NetworkStatus {
    /// Back online after a disconnect that has not been handled yet
    pub const fn just_reconnected(self) -> bool {
        self.is_online && self.was_offline
    }
}

/// Tracks `is_online` and the sticky `was_offline` flag.
///
/// Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    status: Arc<watch::Sender<NetworkStatus>>,
}

impl NetworkMonitor {
    /// A monitor that starts offline counts as having seen a disconnect
    pub fn new(initially_online: bool) -> Self {
        let (status, _) = watch::channel(NetworkStatus {
            is_online: initially_online,
            was_offline: !initially_online,
        });
        Self {
            status: Arc::new(status),
        }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    pub fn status(&self) -> NetworkStatus {
        *self.status.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online
    }

    pub fn was_offline(&self) -> bool {
        self.status().was_offline
    }

    /// Apply a connectivity event. Repeated events of the same kind are no-ops.
    pub fn handle(&self, event: Connectivity) {
        self.status.send_if_modified(|status| match event {
            Connectivity::Offline if status.is_online => {
                tracing::info!("Network: offline");
                status.is_online = false;
                status.was_offline = true;
                true
            }
            Connectivity::Online if !status.is_online => {
                tracing::info!("Network: online");
                status.is_online = true;
                true
            }
            _ => false,
        });
    }

    pub fn set_online(&self) {
        self.handle(Connectivity::Online);
    }

    pub fn set_offline(&self) {
        self.handle(Connectivity::Offline);
    }

    /// Clear the sticky flag once a reconnect has been handled
    pub fn reset_was_offline(&self) {
        self.status.send_if_modified(|status| {
            let changed = status.was_offline;
            status.was_offline = false;
            changed
        });
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.status.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_sets_sticky_flag() {
        let monitor = NetworkMonitor::online();
        assert!(!monitor.was_offline());

        monitor.set_offline();
        assert!(!monitor.is_online());
        assert!(monitor.was_offline());

        monitor.set_online();
        assert!(monitor.is_online());
        assert!(monitor.was_offline(), "reconnect must not clear the flag");
        assert!(monitor.status().just_reconnected());

        monitor.reset_was_offline();
        assert!(!monitor.was_offline());
    }

    #[test]
    fn starting_offline_counts_as_disconnect() {
        let monitor = NetworkMonitor::offline();
        assert!(monitor.was_offline());
        monitor.set_online();
        assert!(monitor.status().just_reconnected());
    }

    #[tokio::test]
    async fn subscribers_see_transitions_only() {
        let monitor = NetworkMonitor::online();
        let mut rx = monitor.subscribe();

        monitor.set_online();
        assert!(!rx.has_changed().unwrap());

        monitor.set_offline();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_online);
    }

    #[test]
    fn clones_share_state() {
        let monitor = NetworkMonitor::online();
        let clone = monitor.clone();
        clone.set_offline();
        assert!(!monitor.is_online());
    }
}
