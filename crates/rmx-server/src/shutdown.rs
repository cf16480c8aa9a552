//! Coordinated shutdown of the listener and the jam rooms behind it.
//!
//! Order matters: the listener stops accepting first, then the broker closes
//! every room (which ends every upgraded socket), then the server tasks are
//! awaited. Upgraded sockets outlive axum's graceful shutdown, so the broker
//! cascade is what lets the listener task finish.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::jam::JamBroker;

/// How long to wait for server tasks once the rooms are closed.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Stops the listener and tears down the broker in a fixed order.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator whose token has not fired.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token the listener watches; cancelled by [`shutdown`](Self::shutdown).
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop accepting connections. Rooms stay up.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether the listener has been told to stop.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop the listener, close every room and connection in `broker`, then
    /// wait up to `timeout` for `handles`.
    pub async fn graceful_shutdown(
        &self,
        broker: &JamBroker,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);

        self.shutdown();
        let rooms = broker.room_count();
        broker.shutdown().await;
        info!(
            rooms,
            task_count = handles.len(),
            timeout_secs = timeout.as_secs(),
            "rooms closed, waiting for server tasks"
        );

        let drain = futures::future::join_all(handles);
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(?timeout, "server tasks still running after shutdown timeout");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmx_broker::RoomState;

    use crate::jam::Jam;

    #[test]
    fn token_fires_once_and_stays_fired() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        assert!(!coord.is_shutting_down());
        coord.shutdown();
        coord.shutdown();
        assert!(token.is_cancelled());
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn graceful_shutdown_closes_rooms_and_awaits_tasks() {
        let coord = ShutdownCoordinator::new();
        let broker = JamBroker::default();
        let id = broker.create_room(2, Jam::default()).unwrap();
        let room = broker.get_room(&id).unwrap();

        let token = coord.token();
        let listener = tokio::spawn(async move {
            token.cancelled().await;
        });

        coord.graceful_shutdown(&broker, vec![listener], None).await;
        assert!(coord.is_shutting_down());
        assert!(broker.is_shutting_down());
        assert_eq!(broker.room_count(), 0);
        assert_eq!(room.state(), RoomState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_shutdown_gives_up_on_stuck_tasks() {
        let coord = ShutdownCoordinator::new();
        let broker = JamBroker::default();
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });

        coord
            .graceful_shutdown(&broker, vec![stuck], Some(Duration::from_millis(100)))
            .await;
        assert!(coord.is_shutting_down());
    }
}
