//! Fan-out bus for derived page events.
//!
//! Publishing is synchronous and fire-and-forget: a slow or absent subscriber
//! must never stall the notification dispatcher that feeds the bus. Lagging
//! subscribers lose the oldest events, which is the broadcast-channel
//! contract consumers already have to handle.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

/// Payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

pub struct Bus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> Bus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    /// Publish without blocking; returns how many subscribers were reached.
    pub fn publish(&self, event: E) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Bridge a subscription into an mpsc receiver so callers can await events
/// without dealing with broadcast lag semantics directly.
pub fn pipe<E>(bus: &Arc<Bus<E>>, capacity: usize) -> mpsc::Receiver<E>
where
    E: Event,
{
    let mut rx = bus.subscribe();
    let (tx, out_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });
    out_rx
}
