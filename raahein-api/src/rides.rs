use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use raahein_core::commands::{CreateRide, UpdateRide, UpdateRideStatus};
use raahein_core::search::{Page, RideSearch, UpcomingFilter};
use raahein_core::{Ride, RideId, RideStatus};

use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::StatusFilter;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rides", post(create_ride))
        .route("/rides/upcoming", get(upcoming_rides))
        .route("/rides/search", get(search_rides))
        .route("/rides/mine", get(my_rides))
        .route("/rides/{id}", get(get_ride).put(update_ride).delete(cancel_ride))
        .route("/rides/{id}/status", put(update_status))
}

async fn create_ride(
    State(state): State<AppState>,
    AuthUser(driver_id): AuthUser,
    ApiJson(cmd): ApiJson<CreateRide>,
) -> Result<(StatusCode, Json<Ride>), AppError> {
    let ride = state.market.rides.create(driver_id, cmd).await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

async fn upcoming_rides(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<UpcomingFilter>,
) -> Result<Json<Page<Ride>>, AppError> {
    Ok(Json(state.market.rides.upcoming(&filter).await?))
}

async fn search_rides(
    State(state): State<AppState>,
    ApiQuery(search): ApiQuery<RideSearch>,
) -> Result<Json<Page<Ride>>, AppError> {
    Ok(Json(state.market.rides.search(&search).await?))
}

async fn my_rides(
    State(state): State<AppState>,
    AuthUser(driver_id): AuthUser,
    ApiQuery(filter): ApiQuery<StatusFilter<RideStatus>>,
) -> Result<Json<Vec<Ride>>, AppError> {
    Ok(Json(state.market.rides.driver_rides(driver_id, filter.status).await?))
}

async fn get_ride(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RideId>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.market.rides.get(id).await?))
}

async fn update_ride(
    State(state): State<AppState>,
    AuthUser(driver_id): AuthUser,
    ApiPath(id): ApiPath<RideId>,
    ApiJson(cmd): ApiJson<UpdateRide>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.market.rides.update_details(id, driver_id, cmd).await?))
}

async fn update_status(
    State(state): State<AppState>,
    AuthUser(driver_id): AuthUser,
    ApiPath(id): ApiPath<RideId>,
    ApiJson(cmd): ApiJson<UpdateRideStatus>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(
        state.market.rides.transition_status(id, driver_id, cmd.status).await?,
    ))
}

async fn cancel_ride(
    State(state): State<AppState>,
    AuthUser(driver_id): AuthUser,
    ApiPath(id): ApiPath<RideId>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.market.rides.cancel(id, driver_id).await?))
}
