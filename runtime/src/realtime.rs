//! Long-lived per-connection notification streams.
//!
//! Each open connection gets its own bounded channel registered with the
//! broker. The stream returned by [`RealtimeTransport::open_connection`]
//! waits on that channel for up to the heartbeat interval, yields a
//! notification frame when one arrives and a ping frame otherwise.
//!
//! The subscription is owned by the stream: however the stream ends
//! (client gone, channel evicted as full, server shutdown, or the consumer
//! simply dropping it) the channel is unsubscribed exactly once.

use crate::broadcaster::NotificationBroadcaster;
use crate::metrics::RealtimeMetrics;
use bookings_core::broker::ConnectionId;
use bookings_core::environment::Clock;
use bookings_core::{Notification, UserId};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Default keep-alive cadence.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default capacity of a connection's delivery channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Lets the transport ask whether the client is still there.
pub trait ConnectionContext: Send + 'static {
    /// `true` once the client has gone away.
    fn is_disconnected(&self) -> bool;
}

/// Shared flag a connection owner flips when the client disconnects.
#[derive(Debug, Clone, Default)]
pub struct DisconnectFlag(Arc<AtomicBool>);

impl DisconnectFlag {
    /// A flag in the connected state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the connection as gone.
    pub fn disconnect(&self) {
        self.0.store(true, Ordering::Release);
    }
}

impl ConnectionContext for DisconnectFlag {
    fn is_disconnected(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Keep-alive frame body: `{"type":"ping","timestamp":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heartbeat {
    #[serde(rename = "type")]
    kind: &'static str,
    /// When the ping was emitted
    pub timestamp: DateTime<Utc>,
}

impl Heartbeat {
    /// A ping stamped with `timestamp`.
    #[must_use]
    pub const fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: "ping",
            timestamp,
        }
    }
}

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Frame {
    /// A domain notification
    Notification(Notification),
    /// A keep-alive
    Heartbeat(Heartbeat),
}

impl Frame {
    /// Event-stream framing: `data: <json>` followed by a blank line.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

/// Opens and tracks live notification streams.
#[derive(Clone)]
pub struct RealtimeTransport {
    broadcaster: NotificationBroadcaster,
    clock: Arc<dyn Clock>,
    heartbeat: Duration,
    capacity: usize,
    shutdown: Arc<watch::Sender<bool>>,
}

impl RealtimeTransport {
    /// Transport with the default heartbeat and channel capacity.
    #[must_use]
    pub fn new(broadcaster: NotificationBroadcaster, clock: Arc<dyn Clock>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            broadcaster,
            clock,
            heartbeat: HEARTBEAT_INTERVAL,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Override the keep-alive cadence.
    #[must_use]
    pub const fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Override the per-connection channel capacity (minimum 1).
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Subscribes `user` and returns the frame stream for one connection.
    ///
    /// The subscription is registered before this returns, so notifications
    /// dispatched afterwards are not missed even if the stream is polled late.
    pub fn open_connection<C: ConnectionContext>(
        &self,
        user: UserId,
        ctx: C,
    ) -> impl Stream<Item = Frame> + Send + 'static + use<C> {
        let (tx, mut rx) = mpsc::channel(self.capacity);
        let connection = self.broadcaster.subscribe(user, tx);
        RealtimeMetrics::record_open();
        tracing::info!(user_id = %user, connection = %connection, "Realtime connection opened");

        let guard = SubscriptionGuard {
            broadcaster: self.broadcaster.clone(),
            user,
            connection,
        };
        let clock = Arc::clone(&self.clock);
        let heartbeat = self.heartbeat;
        let mut shutdown = self.shutdown.subscribe();

        async_stream::stream! {
            let _guard = guard;
            loop {
                if ctx.is_disconnected() || *shutdown.borrow() {
                    break;
                }
                let received = tokio::select! {
                    biased;
                    _ = shutdown.changed() => None,
                    received = tokio::time::timeout(heartbeat, rx.recv()) => Some(received),
                };
                let frame = match received {
                    None => break,
                    Some(Ok(Some(notification))) => Frame::Notification(notification),
                    Some(Ok(None)) => {
                        tracing::debug!(user_id = %user, connection = %connection, "Delivery channel closed");
                        break;
                    }
                    Some(Err(_)) => Frame::Heartbeat(Heartbeat::at(clock.now())),
                };
                yield frame;
            }
        }
    }

    /// Ends every open stream at its next wake-up.
    pub fn close_all(&self) {
        self.shutdown.send_replace(true);
    }

    /// Open connections for `user`, or in total.
    #[must_use]
    pub fn connection_count(&self, user: Option<UserId>) -> usize {
        self.broadcaster.broker().connection_count(user)
    }

    /// Users with at least one open connection.
    #[must_use]
    pub fn connected_users(&self) -> Vec<UserId> {
        self.broadcaster.broker().connected_users()
    }

    /// Pushes a notification frame to every open connection.
    pub fn send_to_all(&self, notification: &Notification) -> usize {
        self.broadcaster.broadcast_all(notification)
    }
}

struct SubscriptionGuard {
    broadcaster: NotificationBroadcaster,
    user: UserId,
    connection: ConnectionId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.user, self.connection);
        RealtimeMetrics::record_close();
        tracing::info!(user_id = %self.user, connection = %self.connection, "Realtime connection closed");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::retry::RetryPolicy;
    use bookings_core::{NotificationDraft, NotificationType};
    use bookings_testing::{InMemoryNotificationStore, test_clock};
    use futures::StreamExt;

    fn transport() -> (RealtimeTransport, NotificationBroadcaster) {
        let (broadcaster, worker) = NotificationBroadcaster::new(
            Arc::new(InMemoryNotificationStore::new()),
            Arc::new(InMemoryBroker::new()),
            Arc::new(test_clock()),
            RetryPolicy::none(),
        );
        tokio::spawn(worker.run());
        let transport = RealtimeTransport::new(broadcaster.clone(), Arc::new(test_clock()))
            .with_heartbeat(Duration::from_millis(20));
        (transport, broadcaster)
    }

    fn draft(user: UserId, title: &str) -> NotificationDraft {
        NotificationDraft {
            user_id: user,
            notification_type: NotificationType::PaymentSuccess,
            title: title.to_string(),
            message: String::new(),
            data: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_idle_connection_emits_heartbeat() {
        let (transport, _broadcaster) = transport();
        let stream = transport.open_connection(UserId::new(), DisconnectFlag::new());
        futures::pin_mut!(stream);

        let frame = stream.next().await.unwrap();
        assert!(matches!(frame, Frame::Heartbeat(_)));
        let wire = frame.encode().unwrap();
        assert!(wire.starts_with("data: {\"type\":\"ping\",\"timestamp\":\"2025-01-01T00:00:00"));
        assert!(wire.ends_with("\n\n"));
    }

    #[tokio::test]
    async fn test_notifications_arrive_in_order() {
        let (transport, broadcaster) = transport();
        let user = UserId::new();
        let stream = transport.open_connection(user, DisconnectFlag::new());
        futures::pin_mut!(stream);

        broadcaster.dispatch(draft(user, "first"));
        broadcaster.dispatch(draft(user, "second"));

        let mut titles = Vec::new();
        while titles.len() < 2 {
            if let Frame::Notification(n) = stream.next().await.unwrap() {
                titles.push(n.title);
            }
        }
        assert_eq!(titles, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_disconnect_ends_stream_and_unsubscribes() {
        let (transport, _broadcaster) = transport();
        let user = UserId::new();
        let flag = DisconnectFlag::new();
        let stream = transport.open_connection(user, flag.clone());
        futures::pin_mut!(stream);
        assert_eq!(transport.connection_count(Some(user)), 1);

        flag.disconnect();
        // At most one in-flight heartbeat before the flag is observed.
        let mut remaining = 0;
        while stream.next().await.is_some() {
            remaining += 1;
        }
        assert!(remaining <= 1);
        assert_eq!(transport.connection_count(Some(user)), 0);
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let (transport, _broadcaster) = transport();
        let user = UserId::new();
        let first = transport.open_connection(user, DisconnectFlag::new());
        let second = transport.open_connection(user, DisconnectFlag::new());
        assert_eq!(transport.connection_count(Some(user)), 2);
        assert_eq!(transport.connected_users(), vec![user]);

        drop(first);
        assert_eq!(transport.connection_count(Some(user)), 1);
        drop(second);
        assert_eq!(transport.connection_count(None), 0);
    }

    #[tokio::test]
    async fn test_close_all_ends_open_streams() {
        let (transport, _broadcaster) = transport();
        let stream = transport
            .clone()
            .with_heartbeat(Duration::from_secs(60))
            .open_connection(UserId::new(), DisconnectFlag::new());
        futures::pin_mut!(stream);

        transport.close_all();
        let next = tokio::time::timeout(Duration::from_secs(1), stream.next()).await.unwrap();
        assert!(next.is_none());
        assert_eq!(transport.connection_count(None), 0);
    }
}
