//! Notification feed boundary.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::events::Notification;

/// Ordered notification feed for one debugging session.
///
/// The transport guarantees in-order, exactly-once delivery; the mirror
/// consumes the feed from a single task, so ordering is preserved end to end.
#[async_trait]
pub trait NoticeSource: Send + Sync {
    /// Next notification, or `None` once the session is over.
    async fn next_notice(&self) -> Option<Notification>;
}

/// Channel-backed source for transports that push notifications.
pub struct QueueSource {
    rx: Mutex<mpsc::Receiver<Notification>>,
}

impl QueueSource {
    pub fn channel(capacity: usize) -> (mpsc::Sender<Notification>, Arc<Self>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            Arc::new(Self {
                rx: Mutex::new(rx),
            }),
        )
    }
}

#[async_trait]
impl NoticeSource for QueueSource {
    async fn next_notice(&self) -> Option<Notification> {
        let mut guard = self.rx.lock().await;
        guard.recv().await
    }
}
