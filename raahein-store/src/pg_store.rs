use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use raahein_core::search::{
    like_pattern, MatchCriteria, Page, RequestFilter, RideSearch, UpcomingFilter,
};
use raahein_core::{
    Booking, BookingId, BookingStatus, CoreError, CoreResult, DriverProfile, MarketStore,
    MarketTx, NewBooking, NewRide, NewRideRequest, RequestId, Ride, RideId, RideRequest,
    RideRequestStatus, RideStatus, UserId,
};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use crate::error::db_err;
use crate::queries::*;
use crate::rows::{convert_all, BookingRow, DriverRow, RequestRow, RideRow};

/// PostgreSQL-backed marketplace store.
#[derive(Clone)]
pub struct PgMarketStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgMarketStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }
}

fn optional_pattern(needle: Option<&str>) -> Option<String> {
    needle.filter(|s| !s.is_empty()).map(like_pattern)
}

#[async_trait]
impl MarketStore for PgMarketStore {
    async fn begin(&self) -> CoreResult<Box<dyn MarketTx>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let set_timeout = format!("SET LOCAL lock_timeout = {}", self.lock_timeout_ms);
        sqlx::query(&set_timeout)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        Ok(Box::new(PgMarketTx { tx }))
    }

    async fn find_driver(&self, user_id: UserId) -> CoreResult<Option<DriverProfile>> {
        sqlx::query_as::<_, DriverRow>(SELECT_DRIVER)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(DriverProfile::try_from)
            .transpose()
    }

    async fn find_ride(&self, id: RideId) -> CoreResult<Option<Ride>> {
        sqlx::query_as::<_, RideRow>(SELECT_RIDE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Ride::try_from)
            .transpose()
    }

    async fn search_rides(&self, search: &RideSearch, today: NaiveDate) -> CoreResult<Page<Ride>> {
        let window = search.window();
        let from = like_pattern(&search.from);
        let to = like_pattern(&search.to);

        let rows = sqlx::query_as::<_, RideRow>(SEARCH_RIDES)
            .bind(&from)
            .bind(&to)
            .bind(search.departure_date)
            .bind(today)
            .bind(search.seats)
            .bind(i64::from(window.limit))
            .bind(window.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let (total,): (i64,) = sqlx::query_as(COUNT_SEARCH_RIDES)
            .bind(&from)
            .bind(&to)
            .bind(search.departure_date)
            .bind(today)
            .bind(search.seats)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(Page::new(convert_all(rows)?, total as u64, window))
    }

    async fn upcoming_rides(
        &self,
        filter: &UpcomingFilter,
        today: NaiveDate,
    ) -> CoreResult<Page<Ride>> {
        let window = filter.window();
        let from = optional_pattern(filter.from.as_deref());
        let to = optional_pattern(filter.to.as_deref());

        let rows = sqlx::query_as::<_, RideRow>(UPCOMING_RIDES)
            .bind(today)
            .bind(&from)
            .bind(&to)
            .bind(i64::from(window.limit))
            .bind(window.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let (total,): (i64,) = sqlx::query_as(COUNT_UPCOMING_RIDES)
            .bind(today)
            .bind(&from)
            .bind(&to)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(Page::new(convert_all(rows)?, total as u64, window))
    }

    async fn rides_by_driver(
        &self,
        driver_id: UserId,
        status: Option<RideStatus>,
    ) -> CoreResult<Vec<Ride>> {
        let rows = sqlx::query_as::<_, RideRow>(RIDES_BY_DRIVER)
            .bind(driver_id)
            .bind(status.map(RideStatus::as_str))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        convert_all(rows)
    }

    async fn matching_rides(&self, criteria: &MatchCriteria) -> CoreResult<Vec<Ride>> {
        let rows = sqlx::query_as::<_, RideRow>(MATCHING_RIDES)
            .bind(like_pattern(&criteria.from))
            .bind(like_pattern(&criteria.to))
            .bind(criteria.date)
            .bind(criteria.earliest.naive_utc())
            .bind(criteria.latest.naive_utc())
            .bind(criteria.seats)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        convert_all(rows)
    }

    async fn find_booking(&self, id: BookingId) -> CoreResult<Option<Booking>> {
        sqlx::query_as::<_, BookingRow>(SELECT_BOOKING)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Booking::try_from)
            .transpose()
    }

    async fn active_booking(
        &self,
        ride_id: RideId,
        passenger_id: UserId,
    ) -> CoreResult<Option<Booking>> {
        sqlx::query_as::<_, BookingRow>(SELECT_ACTIVE_BOOKING)
            .bind(ride_id)
            .bind(passenger_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Booking::try_from)
            .transpose()
    }

    async fn bookings_by_passenger(
        &self,
        passenger_id: UserId,
        status: Option<BookingStatus>,
    ) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(BOOKINGS_BY_PASSENGER)
            .bind(passenger_id)
            .bind(status.map(BookingStatus::as_str))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        convert_all(rows)
    }

    async fn bookings_for_ride(&self, ride_id: RideId) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(BOOKINGS_FOR_RIDE)
            .bind(ride_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        convert_all(rows)
    }

    async fn bookings_for_driver(
        &self,
        driver_id: UserId,
        status: Option<BookingStatus>,
    ) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(BOOKINGS_FOR_DRIVER)
            .bind(driver_id)
            .bind(status.map(BookingStatus::as_str))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        convert_all(rows)
    }

    async fn find_request(&self, id: RequestId) -> CoreResult<Option<RideRequest>> {
        sqlx::query_as::<_, RequestRow>(SELECT_REQUEST)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(RideRequest::try_from)
            .transpose()
    }

    async fn requests_by_passenger(
        &self,
        passenger_id: UserId,
        status: Option<RideRequestStatus>,
    ) -> CoreResult<Vec<RideRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(REQUESTS_BY_PASSENGER)
            .bind(passenger_id)
            .bind(status.map(RideRequestStatus::as_str))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        convert_all(rows)
    }

    async fn active_requests(
        &self,
        filter: &RequestFilter,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<RideRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(ACTIVE_REQUESTS)
            .bind(now)
            .bind(optional_pattern(filter.from.as_deref()))
            .bind(optional_pattern(filter.to.as_deref()))
            .bind(filter.date)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        convert_all(rows)
    }

    async fn expire_requests(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let result = sqlx::query(EXPIRE_REQUESTS)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}

/// An open PostgreSQL transaction. Rolls back on drop.
pub struct PgMarketTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl MarketTx for PgMarketTx {
    async fn lock_ride(&mut self, id: RideId) -> CoreResult<Option<Ride>> {
        sqlx::query_as::<_, RideRow>(LOCK_RIDE)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?
            .map(Ride::try_from)
            .transpose()
    }

    async fn insert_ride(&mut self, ride: NewRide) -> CoreResult<Ride> {
        sqlx::query_as::<_, RideRow>(INSERT_RIDE)
            .bind(ride.driver_id)
            .bind(ride.origin)
            .bind(ride.destination)
            .bind(ride.departure_date)
            .bind(ride.departure_time)
            .bind(ride.available_seats)
            .bind(ride.total_seats)
            .bind(ride.fare)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)?
            .try_into()
    }

    async fn update_ride(&mut self, ride: &Ride) -> CoreResult<Ride> {
        sqlx::query_as::<_, RideRow>(UPDATE_RIDE)
            .bind(ride.id)
            .bind(ride.departure_date)
            .bind(ride.departure_time)
            .bind(ride.fare)
            .bind(ride.status.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CoreError::not_found("Ride", ride.id))?
            .try_into()
    }

    async fn adjust_seats(&mut self, ride_id: RideId, delta: i32) -> CoreResult<Ride> {
        let row = sqlx::query_as::<_, RideRow>(ADJUST_SEATS)
            .bind(ride_id)
            .bind(delta)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => {
                debug!(ride_id, delta, "Seat counter adjusted");
                row.try_into()
            }
            None => Err(CoreError::Conflict(format!(
                "Seat change of {delta} would leave ride {ride_id} out of bounds"
            ))),
        }
    }

    async fn lock_booking(&mut self, id: BookingId) -> CoreResult<Option<Booking>> {
        sqlx::query_as::<_, BookingRow>(LOCK_BOOKING)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?
            .map(Booking::try_from)
            .transpose()
    }

    async fn active_booking(
        &mut self,
        ride_id: RideId,
        passenger_id: UserId,
    ) -> CoreResult<Option<Booking>> {
        sqlx::query_as::<_, BookingRow>(SELECT_ACTIVE_BOOKING)
            .bind(ride_id)
            .bind(passenger_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?
            .map(Booking::try_from)
            .transpose()
    }

    async fn active_bookings_for_ride(&mut self, ride_id: RideId) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(LOCK_ACTIVE_BOOKINGS_FOR_RIDE)
            .bind(ride_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_err)?;
        convert_all(rows)
    }

    async fn insert_booking(&mut self, booking: NewBooking) -> CoreResult<Booking> {
        sqlx::query_as::<_, BookingRow>(INSERT_BOOKING)
            .bind(booking.ride_id)
            .bind(booking.passenger_id)
            .bind(booking.seats_booked)
            .bind(booking.fare)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)?
            .try_into()
    }

    async fn set_booking_status(
        &mut self,
        id: BookingId,
        status: BookingStatus,
        reason: Option<&str>,
    ) -> CoreResult<Booking> {
        sqlx::query_as::<_, BookingRow>(UPDATE_BOOKING_STATUS)
            .bind(id)
            .bind(status.as_str())
            .bind(reason)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CoreError::not_found("Booking", id))?
            .try_into()
    }

    async fn lock_passenger_requests(&mut self, passenger_id: UserId) -> CoreResult<()> {
        sqlx::query(LOCK_PASSENGER_REQUESTS)
            .bind(passenger_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn active_request_for_route(
        &mut self,
        passenger_id: UserId,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> CoreResult<Option<RideRequest>> {
        sqlx::query_as::<_, RequestRow>(SELECT_ACTIVE_REQUEST_FOR_ROUTE)
            .bind(passenger_id)
            .bind(origin)
            .bind(destination)
            .bind(date)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?
            .map(RideRequest::try_from)
            .transpose()
    }

    async fn insert_request(&mut self, request: NewRideRequest) -> CoreResult<RideRequest> {
        sqlx::query_as::<_, RequestRow>(INSERT_REQUEST)
            .bind(request.passenger_id)
            .bind(request.origin)
            .bind(request.destination)
            .bind(request.earliest_date)
            .bind(request.earliest_time)
            .bind(request.latest_time)
            .bind(request.seats_needed)
            .bind(request.offer_per_seat)
            .bind(request.expires_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)?
            .try_into()
    }

    async fn lock_request(&mut self, id: RequestId) -> CoreResult<Option<RideRequest>> {
        sqlx::query_as::<_, RequestRow>(LOCK_REQUEST)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?
            .map(RideRequest::try_from)
            .transpose()
    }

    async fn set_request_status(
        &mut self,
        id: RequestId,
        status: RideRequestStatus,
    ) -> CoreResult<RideRequest> {
        sqlx::query_as::<_, RequestRow>(UPDATE_REQUEST_STATUS)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CoreError::not_found("RideRequest", id))?
            .try_into()
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        self.tx.commit().await.map_err(db_err)
    }
}
