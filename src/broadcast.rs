//! Fan-out of notifications to connected observers

use crate::types::Notification;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Buffered notifications per observer before it counts as failed
pub const OBSERVER_BUFFER: usize = 256;

/// Set of connected observers.
///
/// Each observer is a bounded channel. Delivery is a non-blocking send; an
/// observer that is closed or whose buffer is full is removed during the
/// broadcast and never retried.
#[derive(Default)]
pub struct Broadcaster {
    observers: Mutex<HashMap<Uuid, mpsc::Sender<Notification>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer and return its id and receiving end
    pub fn subscribe(&self) -> (Uuid, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(OBSERVER_BUFFER);
        let id = Uuid::new_v4();
        let mut observers = self.observers.lock();
        observers.insert(id, tx);
        info!(observer = %id, total = observers.len(), "Observer connected");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: &Uuid) {
        let mut observers = self.observers.lock();
        if observers.remove(id).is_some() {
            info!(observer = %id, total = observers.len(), "Observer disconnected");
        }
    }

    /// Deliver `notification` to every observer, dropping those that fail.
    /// Returns the number of successful deliveries.
    pub fn broadcast(&self, notification: &Notification) -> usize {
        let mut observers = self.observers.lock();
        let before = observers.len();

        observers.retain(|id, tx| match tx.try_send(notification.clone()) {
            Ok(()) => true,
            Err(e) => {
                debug!(observer = %id, error = %e, "Dropping observer after failed delivery");
                false
            }
        });

        let delivered = observers.len();
        debug!(
            kind = notification.kind(),
            delivered,
            dropped = before - delivered,
            "Notification broadcast"
        );
        delivered
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FraudAlert;

    fn notification() -> Notification {
        Notification::FraudAlert(FraudAlert::new("tx_1", "user_1", 0.4, vec![]))
    }

    #[tokio::test]
    async fn test_all_observers_receive() {
        let broadcaster = Broadcaster::new();
        let (_, mut first) = broadcaster.subscribe();
        let (_, mut second) = broadcaster.subscribe();

        assert_eq!(broadcaster.broadcast(&notification()), 2);
        assert_eq!(first.recv().await.unwrap().kind(), "fraud_alert");
        assert_eq!(second.recv().await.unwrap().kind(), "fraud_alert");
    }

    #[tokio::test]
    async fn test_closed_observer_is_dropped() {
        let broadcaster = Broadcaster::new();
        let (_, closed) = broadcaster.subscribe();
        let (_, mut open) = broadcaster.subscribe();
        drop(closed);

        assert_eq!(broadcaster.broadcast(&notification()), 1);
        assert_eq!(broadcaster.observer_count(), 1);
        assert!(open.recv().await.is_some());
    }

    #[test]
    fn test_full_observer_is_dropped() {
        let broadcaster = Broadcaster::new();
        let (_, _slow) = broadcaster.subscribe();

        for _ in 0..OBSERVER_BUFFER {
            assert_eq!(broadcaster.broadcast(&notification()), 1);
        }
        assert_eq!(broadcaster.broadcast(&notification()), 0);
        assert_eq!(broadcaster.observer_count(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let broadcaster = Broadcaster::new();
        let (id, _rx) = broadcaster.subscribe();
        broadcaster.unsubscribe(&id);
        assert_eq!(broadcaster.observer_count(), 0);
        assert_eq!(broadcaster.broadcast(&notification()), 0);
    }
}
