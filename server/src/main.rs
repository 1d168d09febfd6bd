//! Booking platform HTTP server.
//!
//! Bookings with a simulated payment saga, refunds and live notifications.
//! Runs on `PostgreSQL` when `DATABASE_URL` is set, otherwise on in-memory
//! storage seeded with a demo customer, provider and service.

mod config;
mod demo;

use bookings_core::environment::SystemClock;
use bookings_postgres::PostgresStores;
use bookings_runtime::metrics::MetricsServer;
use bookings_runtime::{BookingSystem, InMemoryBroker, Stores};
use bookings_web::AppState;
use config::{Config, DatabaseConfig};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is normal outside development
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bookings=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting booking server");

    let config = Config::from_env();
    info!(
        server = %config.server_addr(),
        metrics = %config.metrics_addr(),
        persistent = config.database.is_some(),
        failure_rate = config.runtime.payment_failure_rate,
        "Configuration loaded"
    );

    let mut metrics = MetricsServer::new(config.metrics_addr().parse()?);
    metrics.start()?;

    let stores = match &config.database {
        Some(database) => postgres_stores(database).await?,
        None => demo::stores().0,
    };

    let (system, worker) = BookingSystem::build(
        stores,
        Arc::new(InMemoryBroker::new()),
        Arc::new(SystemClock),
        config.system_config(),
    );
    let worker_handle = tokio::spawn(worker.run());
    let transport = system.transport.clone();

    let mut state = AppState::new(system);
    if let Some(handle) = metrics.handle() {
        state = state.with_metrics(handle.clone());
    }
    let app = bookings_web::router(state);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    // Open event streams would keep graceful shutdown waiting forever.
    let closing = transport.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            closing.close_all();
        })
        .await?;

    // The outbox drains once every broadcaster handle is gone.
    drop(transport);

    let timeout = config.shutdown_timeout();
    match tokio::time::timeout(timeout, worker_handle).await {
        Ok(Ok(())) => info!("Notification outbox drained"),
        Ok(Err(e)) => warn!(error = %e, "Notification outbox worker failed"),
        Err(_) => warn!(timeout_secs = timeout.as_secs(), "Timed out waiting for notification outbox"),
    }

    info!("Server stopped");
    Ok(())
}

async fn postgres_stores(database: &DatabaseConfig) -> Result<Stores, Box<dyn std::error::Error>> {
    info!(max_connections = database.max_connections, "Connecting to database...");
    let postgres = PostgresStores::connect(&database.url, database.max_connections).await?;
    postgres.migrate().await?;
    info!("Database connected and migrated");

    Ok(Stores {
        bookings: Arc::new(postgres.bookings()),
        payments: Arc::new(postgres.payments()),
        notifications: Arc::new(postgres.notifications()),
        catalog: Arc::new(postgres.catalog()),
        users: Arc::new(postgres.users()),
    })
}

/// Graceful shutdown signal handler.
///
/// Waits for Ctrl+C, or SIGTERM on unix. If a handler cannot be installed
/// that branch never completes.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
