//! HTTP request handlers, organized by resource.

pub mod bookings;
pub mod health;
pub mod notifications;
pub mod payments;

pub use health::health_check;
