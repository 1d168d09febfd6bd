//! Notification endpoints and the live event stream.
//!
//! Every operation is scoped to the caller: another user's notification
//! answers 404 exactly like a missing one.

use crate::error::AppError;
use crate::extractors::Requester;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::sse::{Event, Sse},
};
use bookings_core::{
    DomainError, Notification, NotificationCounts, NotificationDraft, NotificationId, Page, UserId,
};
use bookings_runtime::{DisconnectFlag, Frame};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// Pagination query for the list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// 1..=100, default 50
    pub limit: Option<i64>,
    /// >= 0, default 0
    pub offset: Option<i64>,
}

/// Acknowledgement body for mutations.
#[derive(Debug, Serialize)]
pub struct Message {
    /// Human-readable outcome
    pub message: String,
}

/// Acknowledgement for mark-all-read.
#[derive(Debug, Serialize)]
pub struct MarkedAll {
    /// Human-readable outcome
    pub message: String,
    /// How many notifications changed
    pub count: u64,
}

async fn caller(state: &AppState, requester: &Requester) -> Result<UserId, AppError> {
    state
        .system
        .orchestrator
        .resolve_requester(&requester.0)
        .await
        .map_err(|err| match err {
            DomainError::Unauthorized => AppError::unauthorized("Unknown user"),
            other => other.into(),
        })
}

/// `GET /api/notifications?limit=&offset=`: newest first.
///
/// # Errors
///
/// 400 for an out-of-range page, 401 for an unknown caller.
pub async fn list_notifications(
    State(state): State<AppState>,
    requester: Requester,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let Query(query) = query?;
    let page = Page::new(query.limit, query.offset)?;
    let user = caller(&state, &requester).await?;
    Ok(Json(state.system.broadcaster.list(user, page).await?))
}

/// `GET /api/notifications/unread`
///
/// # Errors
///
/// 401 for an unknown caller.
pub async fn list_unread(
    State(state): State<AppState>,
    requester: Requester,
) -> Result<Json<Vec<Notification>>, AppError> {
    let user = caller(&state, &requester).await?;
    Ok(Json(state.system.broadcaster.list_unread(user).await?))
}

/// `GET /api/notifications/count`: `{total, unread}`.
///
/// # Errors
///
/// 401 for an unknown caller.
pub async fn counts(
    State(state): State<AppState>,
    requester: Requester,
) -> Result<Json<NotificationCounts>, AppError> {
    let user = caller(&state, &requester).await?;
    Ok(Json(state.system.broadcaster.counts(user).await?))
}

/// `PUT /api/notifications/:id/read`
///
/// # Errors
///
/// 404 if the caller owns no such notification.
pub async fn mark_read(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<NotificationId>,
) -> Result<Json<Message>, AppError> {
    let user = caller(&state, &requester).await?;
    state.system.broadcaster.mark_read(id, user).await?;
    Ok(Json(Message {
        message: "Notification marked as read".to_string(),
    }))
}

/// `PUT /api/notifications/read-all`
///
/// # Errors
///
/// 401 for an unknown caller.
pub async fn mark_all_read(
    State(state): State<AppState>,
    requester: Requester,
) -> Result<Json<MarkedAll>, AppError> {
    let user = caller(&state, &requester).await?;
    let count = state.system.broadcaster.mark_all_read(user).await?;
    Ok(Json(MarkedAll {
        message: format!("Marked {count} notifications as read"),
        count,
    }))
}

/// `DELETE /api/notifications/:id`
///
/// # Errors
///
/// 404 if the caller owns no such notification.
pub async fn delete_notification(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<NotificationId>,
) -> Result<Json<Message>, AppError> {
    let user = caller(&state, &requester).await?;
    state.system.broadcaster.delete(id, user).await?;
    Ok(Json(Message {
        message: "Notification deleted".to_string(),
    }))
}

/// `POST /api/notifications`: stores and delivers a notification directly.
///
/// # Errors
///
/// 400 for a malformed body, 401 for an unknown caller.
pub async fn create_notification(
    State(state): State<AppState>,
    requester: Requester,
    body: Result<Json<NotificationDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    let Json(draft) = body?;
    caller(&state, &requester).await?;
    let notification = state.system.broadcaster.create_notification(draft).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

/// `GET /api/notifications/stream`: server-sent events.
///
/// Each event's data is a notification or a `{"type":"ping"}` heartbeat.
/// The subscription ends when the client goes away and axum drops the stream.
///
/// # Errors
///
/// 401 for an unknown caller.
pub async fn stream(
    State(state): State<AppState>,
    requester: Requester,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let user = caller(&state, &requester).await?;
    let frames = state
        .system
        .transport
        .open_connection(user, DisconnectFlag::new());
    Ok(Sse::new(frames.map(|frame: Frame| Event::default().json_data(frame))))
}
