//! Payment and refund endpoints.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use bookings_core::{BookingId, Payment, PaymentId, ProcessPaymentRequest, Refund, RefundRequest};

/// `POST /api/payments/process`
///
/// Validates the instrument first. Answers 201 with the completed payment.
///
/// # Errors
///
/// 400 for an invalid instrument, 402 with `paymentId` and `failureReason`
/// when the gateway declines, 404 for an unknown booking, 409 if the booking
/// already has a payment.
pub async fn process_payment(
    State(state): State<AppState>,
    body: Result<Json<ProcessPaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let Json(request) = body?;
    let gateway = &state.system.gateway;
    gateway.validate_payment_method(&request.payment_method)?;

    let payment = gateway
        .process_payment(
            request.booking_id,
            request.amount,
            request.currency.as_deref(),
            &request.payment_method,
        )
        .await?
        .accepted()?;

    Ok((StatusCode::CREATED, Json(payment)))
}

/// `GET /api/payments/:id`
///
/// # Errors
///
/// 404 if the payment does not exist.
pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.system.gateway.get_payment(id).await?))
}

/// `GET /api/payments/booking/:booking_id`
///
/// # Errors
///
/// 404 if the booking has no payment.
pub async fn get_payment_by_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.system.gateway.get_payment_by_booking(booking_id).await?))
}

/// `POST /api/payments/refund`: 201 with the refund.
///
/// # Errors
///
/// 400 if the payment is missing or not completed, or the amount is out of range.
pub async fn process_refund(
    State(state): State<AppState>,
    body: Result<Json<RefundRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Refund>), AppError> {
    let Json(request) = body?;
    let refund = state
        .system
        .gateway
        .process_refund(request.payment_id, request.reason, request.amount)
        .await?
        .ok_or_else(|| {
            AppError::bad_request(
                "Refund not possible. Payment not found or not eligible for refund.",
            )
        })?;
    Ok((StatusCode::CREATED, Json(refund)))
}

/// `GET /api/payments/:id/refunds`
///
/// # Errors
///
/// 404 if the payment does not exist.
pub async fn list_refunds(
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
) -> Result<Json<Vec<Refund>>, AppError> {
    Ok(Json(state.system.gateway.list_refunds(id).await?))
}
