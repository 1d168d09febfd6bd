//! Health and metrics endpoints.
//!
//! Used by load balancers and scrapers; none of them require a requester.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// Liveness: the process is up.
///
/// ```text
/// GET /health -> 200 "ok"
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness report.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    /// `ready` or `degraded`
    pub status: &'static str,
    /// Whether the notification outbox worker is draining
    pub outbox_worker: bool,
    /// Open realtime connections
    pub connections: usize,
    /// Users with at least one open connection
    pub connected_users: usize,
}

/// Readiness: the outbox worker is alive.
///
/// # Status Codes
///
/// - 200 OK: worker running
/// - 503 Service Unavailable: worker stopped, notifications would pile up
///
/// ```text
/// GET /health/ready
/// ```
#[allow(clippy::unused_async)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let transport = &state.system.transport;
    let worker = state.system.broadcaster.worker_running();
    let report = Readiness {
        status: if worker { "ready" } else { "degraded" },
        outbox_worker: worker,
        connections: transport.connection_count(None),
        connected_users: transport.connected_users().len(),
    };
    let status = if worker {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Prometheus scrape page.
///
/// ```text
/// GET /metrics
/// ```
#[allow(clippy::unused_async)]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::NOT_FOUND,
            "metrics recorder not installed".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
