use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// A browser tab watching run progress over WebSocket.
#[derive(Debug)]
pub struct Viewer {
    /// Id reported to the page in its welcome message.
    pub id: Uuid,
    /// Outbound queue drained by the socket's send task.
    pub tx: mpsc::UnboundedSender<String>,
}

impl Viewer {
    /// A viewer with a fresh id, plus the receiving end of its queue.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }
}

/// Open viewers, keyed by id. Every run event is fanned out to all of them.
#[derive(Default)]
pub struct ConnectionManager {
    viewers: RwLock<HashMap<Uuid, Viewer>>,
}

impl ConnectionManager {
    /// An empty, shareable manager.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `viewer` and returns its id.
    pub async fn add(&self, viewer: Viewer) -> Uuid {
        let id = viewer.id;
        let count = {
            let mut viewers = self.viewers.write().await;
            viewers.insert(id, viewer);
            viewers.len()
        };
        info!(viewer_id = %id, viewers = count, "Viewer joined");
        id
    }

    /// Forgets a viewer. Unknown ids are ignored.
    pub async fn remove(&self, id: Uuid) {
        if self.viewers.write().await.remove(&id).is_some() {
            info!(viewer_id = %id, "Viewer left");
        }
    }

    /// Queues `message` for one viewer. Returns false if it is gone.
    pub async fn send_to(&self, id: Uuid, message: &str) -> bool {
        self.viewers
            .read()
            .await
            .get(&id)
            .is_some_and(|viewer| viewer.tx.send(message.to_string()).is_ok())
    }

    /// Number of open viewers.
    pub async fn viewer_count(&self) -> usize {
        self.viewers.read().await.len()
    }

    /// Queues `message` for every viewer and drops those whose socket closed.
    ///
    /// Returns how many viewers received it.
    pub async fn broadcast(&self, message: &str) -> usize {
        let mut viewers = self.viewers.write().await;
        let before = viewers.len();
        viewers.retain(|_, viewer| viewer.tx.send(message.to_string()).is_ok());
        let stale = before - viewers.len();
        if stale > 0 {
            debug!(stale, "Pruned closed viewers");
        }
        viewers.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_every_viewer() {
        let manager = ConnectionManager::new();
        let (first, mut rx1) = Viewer::channel();
        let (second, mut rx2) = Viewer::channel();
        manager.add(first).await;
        manager.add(second).await;

        assert_eq!(manager.broadcast("progress").await, 2);
        assert_eq!(rx1.recv().await.unwrap(), "progress");
        assert_eq!(rx2.recv().await.unwrap(), "progress");
    }

    #[tokio::test]
    async fn test_closed_viewers_are_pruned() {
        let manager = ConnectionManager::new();
        let (open, _rx_open) = Viewer::channel();
        let (closed, rx_closed) = Viewer::channel();
        manager.add(open).await;
        manager.add(closed).await;
        drop(rx_closed);

        assert_eq!(manager.broadcast("tick").await, 1);
        assert_eq!(manager.viewer_count().await, 1);
    }

    #[tokio::test]
    async fn test_send_to_single_viewer() {
        let manager = ConnectionManager::new();
        let (viewer, mut rx) = Viewer::channel();
        let id = manager.add(viewer).await;

        assert!(manager.send_to(id, "hello").await);
        assert_eq!(rx.recv().await.unwrap(), "hello");
        assert!(!manager.send_to(Uuid::new_v4(), "nobody").await);
    }

    #[tokio::test]
    async fn test_remove_viewer() {
        let manager = ConnectionManager::new();
        let (viewer, _rx) = Viewer::channel();
        let id = manager.add(viewer).await;
        assert_eq!(manager.viewer_count().await, 1);
        manager.remove(id).await;
        assert_eq!(manager.viewer_count().await, 0);
    }
}
