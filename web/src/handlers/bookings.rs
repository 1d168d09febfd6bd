//! Booking endpoints.
//!
//! Mutations and reads answer 404 both for unknown bookings and for callers
//! who are not a party to the booking.

use crate::error::AppError;
use crate::extractors::{CorrelationId, Requester};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use bookings_core::{Booking, BookingId, BookingPatch, CreateBookingRequest};

/// `GET /api/bookings`: the caller's bookings, newest first.
///
/// # Errors
///
/// 404 if the caller is unknown.
pub async fn list_bookings(
    State(state): State<AppState>,
    requester: Requester,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state.system.orchestrator.list_bookings(&requester.0).await?;
    Ok(Json(bookings))
}

/// `GET /api/bookings/:id`
///
/// # Errors
///
/// 404 if the booking is missing or the caller is not a party.
pub async fn get_booking(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<BookingId>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.system.orchestrator.get_booking(id, &requester.0).await?;
    Ok(Json(booking))
}

/// `POST /api/bookings`: runs the booking saga.
///
/// Answers 201 with the confirmed booking. A declined payment answers 400
/// without saying which step failed.
///
/// # Errors
///
/// 404 for an unknown service, customer or provider, 400 for an invalid card
/// or a declined payment.
pub async fn create_booking(
    State(state): State<AppState>,
    requester: Requester,
    correlation_id: CorrelationId,
    body: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let Json(request) = body?;
    tracing::info!(
        correlation_id = %correlation_id.0,
        service_id = %request.service_id,
        "Booking requested"
    );
    let booking = state
        .system
        .orchestrator
        .create_booking(&requester.0, request)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// `PUT /api/bookings/:id`: partial update by either party.
///
/// # Errors
///
/// 404 if the booking is missing or the caller is not a party.
pub async fn update_booking(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<BookingId>,
    body: Result<Json<BookingPatch>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    let Json(patch) = body?;
    let booking = state
        .system
        .orchestrator
        .update_booking(id, patch, &requester.0)
        .await?;
    Ok(Json(booking))
}

/// `DELETE /api/bookings/:id`
///
/// # Errors
///
/// 404 if the booking is missing or the caller is not a party.
pub async fn delete_booking(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<BookingId>,
) -> Result<StatusCode, AppError> {
    state.system.orchestrator.delete_booking(id, &requester.0).await?;
    Ok(StatusCode::NO_CONTENT)
}
