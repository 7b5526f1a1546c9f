use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use raahein_core::commands::CreateRideRequest;
use raahein_core::search::RequestFilter;
use raahein_core::{RequestId, RideRequest, RideRequestStatus};
use raahein_engine::RideMatches;

use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::StatusFilter;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ride-requests", post(create_request))
        .route("/ride-requests/mine", get(my_requests))
        .route("/ride-requests/active", get(active_requests))
        .route("/ride-requests/{id}", get(get_request).delete(cancel_request))
        .route("/ride-requests/{id}/matching-rides", get(matching_rides))
        .route("/ride-requests/{id}/fulfill", put(fulfill_request))
}

async fn create_request(
    State(state): State<AppState>,
    AuthUser(passenger_id): AuthUser,
    ApiJson(cmd): ApiJson<CreateRideRequest>,
) -> Result<(StatusCode, Json<RideRequest>), AppError> {
    let request = state.market.requests.create(passenger_id, cmd).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn my_requests(
    State(state): State<AppState>,
    AuthUser(passenger_id): AuthUser,
    ApiQuery(filter): ApiQuery<StatusFilter<RideRequestStatus>>,
) -> Result<Json<Vec<RideRequest>>, AppError> {
    Ok(Json(
        state.market.requests.passenger_requests(passenger_id, filter.status).await?,
    ))
}

async fn active_requests(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<RequestFilter>,
) -> Result<Json<Vec<RideRequest>>, AppError> {
    Ok(Json(state.market.requests.active_requests(&filter).await?))
}

async fn get_request(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RequestId>,
) -> Result<Json<RideRequest>, AppError> {
    Ok(Json(state.market.requests.get(id).await?))
}

async fn matching_rides(
    State(state): State<AppState>,
    AuthUser(passenger_id): AuthUser,
    ApiPath(id): ApiPath<RequestId>,
) -> Result<Json<RideMatches>, AppError> {
    Ok(Json(state.market.requests.find_matches(id, passenger_id).await?))
}

async fn fulfill_request(
    State(state): State<AppState>,
    AuthUser(passenger_id): AuthUser,
    ApiPath(id): ApiPath<RequestId>,
) -> Result<Json<RideRequest>, AppError> {
    Ok(Json(state.market.requests.fulfill(id, passenger_id).await?))
}

async fn cancel_request(
    State(state): State<AppState>,
    AuthUser(passenger_id): AuthUser,
    ApiPath(id): ApiPath<RequestId>,
) -> Result<Json<RideRequest>, AppError> {
    Ok(Json(state.market.requests.cancel(id, passenger_id).await?))
}
