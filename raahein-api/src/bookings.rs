use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use raahein_core::commands::{AcceptBooking, CheckEligibility, CreateBooking, RejectBooking};
use raahein_core::rules::Eligibility;
use raahein_core::{Booking, BookingId, BookingStats, BookingStatus, RideId};
use serde::Deserialize;

use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::StatusFilter;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectBody {
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/check-eligibility", post(check_eligibility))
        .route("/bookings/mine", get(my_bookings))
        .route("/bookings/stats", get(passenger_stats))
        .route("/bookings/requests", get(pending_requests))
        .route("/bookings/driver-stats", get(driver_stats))
        .route("/bookings/rides/{ride_id}", get(ride_bookings))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/accept", put(accept_booking))
        .route("/bookings/{id}/reject", put(reject_booking))
        .route("/bookings/{id}/cancel", put(cancel_booking))
}

async fn check_eligibility(
    State(state): State<AppState>,
    AuthUser(passenger_id): AuthUser,
    ApiJson(cmd): ApiJson<CheckEligibility>,
) -> Result<Json<Eligibility>, AppError> {
    Ok(Json(state.market.seats.check_eligibility(passenger_id, cmd).await?))
}

async fn create_booking(
    State(state): State<AppState>,
    AuthUser(passenger_id): AuthUser,
    ApiJson(cmd): ApiJson<CreateBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.market.seats.create_booking(passenger_id, cmd).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn my_bookings(
    State(state): State<AppState>,
    AuthUser(passenger_id): AuthUser,
    ApiQuery(filter): ApiQuery<StatusFilter<BookingStatus>>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(
        state.market.seats.passenger_bookings(passenger_id, filter.status).await?,
    ))
}

async fn passenger_stats(
    State(state): State<AppState>,
    AuthUser(passenger_id): AuthUser,
) -> Result<Json<BookingStats>, AppError> {
    Ok(Json(state.market.seats.passenger_stats(passenger_id).await?))
}

async fn pending_requests(
    State(state): State<AppState>,
    AuthUser(driver_id): AuthUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.market.seats.pending_for_driver(driver_id).await?))
}

async fn driver_stats(
    State(state): State<AppState>,
    AuthUser(driver_id): AuthUser,
) -> Result<Json<BookingStats>, AppError> {
    Ok(Json(state.market.seats.driver_stats(driver_id).await?))
}

async fn ride_bookings(
    State(state): State<AppState>,
    AuthUser(driver_id): AuthUser,
    ApiPath(ride_id): ApiPath<RideId>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.market.seats.ride_bookings(ride_id, driver_id).await?))
}

async fn get_booking(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<BookingId>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.market.seats.booking(id, user_id).await?))
}

async fn accept_booking(
    State(state): State<AppState>,
    AuthUser(driver_id): AuthUser,
    ApiPath(id): ApiPath<BookingId>,
) -> Result<Json<Booking>, AppError> {
    let cmd = AcceptBooking { booking_id: id };
    Ok(Json(state.market.seats.accept(driver_id, cmd).await?))
}

async fn reject_booking(
    State(state): State<AppState>,
    AuthUser(driver_id): AuthUser,
    ApiPath(id): ApiPath<BookingId>,
    body: Result<Json<RejectBody>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    // The body is optional; a present but malformed one is still an error.
    let body = match body {
        Ok(Json(body)) => body,
        Err(JsonRejection::MissingJsonContentType(_)) => RejectBody::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    let cmd = RejectBooking { booking_id: id, rejection_reason: body.rejection_reason };
    Ok(Json(state.market.seats.reject(driver_id, cmd).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    AuthUser(passenger_id): AuthUser,
    ApiPath(id): ApiPath<BookingId>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.market.seats.cancel(id, passenger_id).await?))
}
