//! In-process subscriber registry.
//!
//! ```text
//! user A ──┬── conn-1 (tab)       publish(A, n)
//!          └── conn-2 (phone)  ◄──────────────── broadcaster
//! user B ───── conn-3
//! ```
//!
//! The registry is one `Mutex<HashMap<UserId, Vec<Subscriber>>>` owned by the
//! broker instance and shared by cloning the broker. Sends use `try_send`, so
//! the lock is never held across an await and a slow client can never stall a
//! publisher: a full or closed channel is dropped from the registry instead.

use crate::metrics::NotificationMetrics;
use bookings_core::broker::{ConnectionId, NotificationBroker};
use bookings_core::{Notification, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};

#[derive(Debug)]
struct Subscriber {
    id: ConnectionId,
    tx: mpsc::Sender<Notification>,
}

type Registry = HashMap<UserId, Vec<Subscriber>>;

/// [`NotificationBroker`] backed by a mutex-guarded map in this process.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    registry: Arc<Mutex<Registry>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // Entries are only ever pushed or retained, so a poisoned map is still consistent.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends to every channel in `subscribers`, dropping the dead ones.
    /// Returns `(delivered, dropped)`.
    fn fan_out(user: UserId, subscribers: &mut Vec<Subscriber>, notification: &Notification) -> (usize, usize) {
        let before = subscribers.len();
        let mut delivered = 0;
        subscribers.retain(|sub| match sub.tx.try_send(notification.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(user_id = %user, connection = %sub.id, "Subscriber channel full, dropping");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(user_id = %user, connection = %sub.id, "Subscriber channel closed, dropping");
                false
            }
        });
        (delivered, before - subscribers.len())
    }
}

impl NotificationBroker for InMemoryBroker {
    fn subscribe(&self, user: UserId, channel: mpsc::Sender<Notification>) -> ConnectionId {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry()
            .entry(user)
            .or_default()
            .push(Subscriber { id, tx: channel });
        tracing::debug!(user_id = %user, connection = %id, "Subscribed");
        id
    }

    fn unsubscribe(&self, user: UserId, connection: ConnectionId) -> bool {
        let mut registry = self.registry();
        let Some(subscribers) = registry.get_mut(&user) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|sub| sub.id != connection);
        let removed = subscribers.len() != before;
        if subscribers.is_empty() {
            registry.remove(&user);
        }
        if removed {
            tracing::debug!(user_id = %user, connection = %connection, "Unsubscribed");
        }
        removed
    }

    fn publish(&self, user: UserId, notification: &Notification) -> usize {
        let mut registry = self.registry();
        let Some(subscribers) = registry.get_mut(&user) else {
            return 0;
        };
        let (delivered, dropped) = Self::fan_out(user, subscribers, notification);
        if subscribers.is_empty() {
            registry.remove(&user);
        }
        NotificationMetrics::record_deliveries(delivered, dropped);
        delivered
    }

    fn publish_all(&self, notification: &Notification) -> usize {
        let mut registry = self.registry();
        let mut delivered = 0;
        let mut dropped = 0;
        for (user, subscribers) in registry.iter_mut() {
            let (ok, gone) = Self::fan_out(*user, subscribers, notification);
            delivered += ok;
            dropped += gone;
        }
        registry.retain(|_, subscribers| !subscribers.is_empty());
        NotificationMetrics::record_deliveries(delivered, dropped);
        delivered
    }

    fn connection_count(&self, user: Option<UserId>) -> usize {
        let registry = self.registry();
        match user {
            Some(user) => registry.get(&user).map_or(0, Vec::len),
            None => registry.values().map(Vec::len).sum(),
        }
    }

    fn connected_users(&self) -> Vec<UserId> {
        self.registry().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use bookings_core::{NotificationDraft, NotificationId, NotificationType};
    use chrono::Utc;

    fn notification(user: UserId, title: &str) -> Notification {
        NotificationDraft {
            user_id: user,
            notification_type: NotificationType::BookingCreated,
            title: title.to_string(),
            message: String::new(),
            data: serde_json::Value::Null,
        }
        .into_notification(NotificationId::new(), Utc::now())
    }

    #[tokio::test]
    async fn test_publish_reaches_every_channel_of_the_user() {
        let broker = InMemoryBroker::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        let (tx3, mut rx3) = mpsc::channel(4);
        broker.subscribe(alice, tx1);
        broker.subscribe(alice, tx2);
        broker.subscribe(bob, tx3);

        assert_eq!(broker.publish(alice, &notification(alice, "hi")), 2);
        assert_eq!(rx1.recv().await.unwrap().title, "hi");
        assert_eq!(rx2.recv().await.unwrap().title, "hi");
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_preserves_per_user_order() {
        let broker = InMemoryBroker::new();
        let user = UserId::new();
        let (tx, mut rx) = mpsc::channel(16);
        broker.subscribe(user, tx);

        for i in 0..10 {
            broker.publish(user, &notification(user, &i.to_string()));
        }
        for i in 0..10 {
            assert_eq!(rx.recv().await.unwrap().title, i.to_string());
        }
    }

    #[test]
    fn test_closed_channel_is_removed_on_publish() {
        let broker = InMemoryBroker::new();
        let user = UserId::new();
        let (tx, rx) = mpsc::channel(1);
        broker.subscribe(user, tx);
        drop(rx);

        assert_eq!(broker.publish(user, &notification(user, "x")), 0);
        assert_eq!(broker.connection_count(Some(user)), 0);
        assert!(broker.connected_users().is_empty());
    }

    #[test]
    fn test_full_channel_is_removed_on_publish() {
        let broker = InMemoryBroker::new();
        let user = UserId::new();
        let (tx, _rx) = mpsc::channel(1);
        broker.subscribe(user, tx);

        assert_eq!(broker.publish(user, &notification(user, "first")), 1);
        assert_eq!(broker.publish(user, &notification(user, "second")), 0);
        assert_eq!(broker.connection_count(None), 0);
    }

    #[test]
    fn test_unsubscribe_and_counts() {
        let broker = InMemoryBroker::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let (tx1, _rx1) = mpsc::channel(1);
        let (tx2, _rx2) = mpsc::channel(1);
        let (tx3, _rx3) = mpsc::channel(1);
        let first = broker.subscribe(alice, tx1);
        broker.subscribe(alice, tx2);
        broker.subscribe(bob, tx3);

        assert_eq!(broker.connection_count(None), 3);
        assert_eq!(broker.connection_count(Some(alice)), 2);
        assert_eq!(broker.connected_users().len(), 2);

        assert!(broker.unsubscribe(alice, first));
        assert!(!broker.unsubscribe(alice, first));
        assert_eq!(broker.connection_count(Some(alice)), 1);
    }

    #[tokio::test]
    async fn test_publish_all_reaches_everyone() {
        let broker = InMemoryBroker::new();
        let (tx1, mut rx1) = mpsc::channel(1);
        let (tx2, mut rx2) = mpsc::channel(1);
        broker.subscribe(UserId::new(), tx1);
        broker.subscribe(UserId::new(), tx2);

        let announcement = notification(UserId::new(), "maintenance");
        assert_eq!(broker.publish_all(&announcement), 2);
        assert_eq!(rx1.recv().await.unwrap().title, "maintenance");
        assert_eq!(rx2.recv().await.unwrap().title, "maintenance");
    }
}
