//! # Bookings Runtime
//!
//! The moving parts of the booking platform.
//!
//! ## Components
//!
//! - [`BookingOrchestrator`]: the create/confirm-or-compensate saga plus
//!   authorized update, delete and reads
//! - [`PaymentGateway`]: simulated authorization with injected failures, refunds
//! - [`NotificationBroadcaster`] and its [`OutboxWorker`]: stores notifications
//!   and fans them out without blocking the operation that caused them
//! - [`InMemoryBroker`]: the in-process subscriber registry
//! - [`memory`]: map-backed stores for running without a database
//! - [`RealtimeTransport`]: per-connection frame streams with heartbeats
//! - [`AuthorizationGuard`]: booking ownership checks
//!
//! [`BookingSystem::build`] wires all of them over a set of [`Stores`].
//!
//! ## Example
//!
//! ```ignore
//! let (system, worker) = BookingSystem::build(stores, Arc::new(InMemoryBroker::new()), clock, SystemConfig::default());
//! tokio::spawn(worker.run());
//!
//! let booking = system.orchestrator.create_booking("ada@example.com", request).await?;
//! ```

pub mod authorization;
pub mod broadcaster;
pub mod broker;
pub mod memory;
pub mod metrics;
pub mod orchestrator;
pub mod payment_gateway;
pub mod realtime;
pub mod retry;
pub mod system;
pub mod templates;

pub use authorization::AuthorizationGuard;
pub use broadcaster::{NotificationBroadcaster, OutboxWorker};
pub use broker::InMemoryBroker;
pub use orchestrator::{BookingOrchestrator, SagaState};
pub use payment_gateway::PaymentGateway;
pub use realtime::{ConnectionContext, DisconnectFlag, Frame, Heartbeat, RealtimeTransport};
pub use retry::RetryPolicy;
pub use system::{BookingSystem, Stores, SystemConfig};
