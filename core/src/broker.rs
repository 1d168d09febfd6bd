//! Publish/subscribe abstraction for live notification delivery.
//!
//! A broker maps each user to the delivery channels of their open
//! connections (one per browser tab, device, ...). The in-process
//! implementation lives in `bookings-runtime`; a multi-instance deployment
//! would put a real pub/sub transport behind the same trait.
//!
//! Delivery is best-effort: `publish` never blocks, and a channel that is
//! closed or full is dropped from the registry on the spot.

use crate::ids::UserId;
use crate::notification::Notification;
use std::fmt;
use tokio::sync::mpsc;

/// Identifies one subscription (one open connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw connection number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw connection number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Subscriber registry and fan-out.
///
/// All methods are synchronous: implementations guard their registry with a
/// lock held only for the duration of the call and never await while holding it.
pub trait NotificationBroker: Send + Sync {
    /// Registers a delivery channel for `user`.
    fn subscribe(&self, user: UserId, channel: mpsc::Sender<Notification>) -> ConnectionId;

    /// Removes a channel. Returns `false` if it was already gone.
    fn unsubscribe(&self, user: UserId, connection: ConnectionId) -> bool;

    /// Pushes `notification` to every channel of `user` without waiting.
    ///
    /// Returns the number of channels that accepted it.
    fn publish(&self, user: UserId, notification: &Notification) -> usize;

    /// Pushes `notification` to every channel of every connected user.
    fn publish_all(&self, notification: &Notification) -> usize;

    /// Open connections for one user, or for everybody when `user` is `None`.
    fn connection_count(&self, user: Option<UserId>) -> usize;

    /// Users with at least one open connection.
    fn connected_users(&self) -> Vec<UserId>;
}
