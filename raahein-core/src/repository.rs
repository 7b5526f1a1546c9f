use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::search::{MatchCriteria, Page, RequestFilter, RideSearch, UpcomingFilter};
use crate::{
    Booking, BookingId, BookingStatus, CoreResult, DriverProfile, NewBooking, NewRide,
    NewRideRequest, RequestId, Ride, RideId, RideRequest, RideRequestStatus, RideStatus, UserId,
};

/// Read side of the marketplace store plus the transaction entry point.
///
/// Read methods must not be called while a transaction from the same store is
/// open on the current task.
#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn begin(&self) -> CoreResult<Box<dyn MarketTx>>;

    async fn find_driver(&self, user_id: UserId) -> CoreResult<Option<DriverProfile>>;

    async fn find_ride(&self, id: RideId) -> CoreResult<Option<Ride>>;
    async fn search_rides(&self, search: &RideSearch, today: NaiveDate) -> CoreResult<Page<Ride>>;
    async fn upcoming_rides(
        &self,
        filter: &UpcomingFilter,
        today: NaiveDate,
    ) -> CoreResult<Page<Ride>>;
    /// Ordered by departure ascending.
    async fn rides_by_driver(
        &self,
        driver_id: UserId,
        status: Option<RideStatus>,
    ) -> CoreResult<Vec<Ride>>;
    /// Ordered by departure ascending.
    async fn matching_rides(&self, criteria: &MatchCriteria) -> CoreResult<Vec<Ride>>;

    async fn find_booking(&self, id: BookingId) -> CoreResult<Option<Booking>>;
    async fn active_booking(
        &self,
        ride_id: RideId,
        passenger_id: UserId,
    ) -> CoreResult<Option<Booking>>;
    /// Newest first.
    async fn bookings_by_passenger(
        &self,
        passenger_id: UserId,
        status: Option<BookingStatus>,
    ) -> CoreResult<Vec<Booking>>;
    /// Oldest first.
    async fn bookings_for_ride(&self, ride_id: RideId) -> CoreResult<Vec<Booking>>;
    /// Bookings on any ride driven by `driver_id`, oldest first.
    async fn bookings_for_driver(
        &self,
        driver_id: UserId,
        status: Option<BookingStatus>,
    ) -> CoreResult<Vec<Booking>>;

    async fn find_request(&self, id: RequestId) -> CoreResult<Option<RideRequest>>;
    /// Newest first.
    async fn requests_by_passenger(
        &self,
        passenger_id: UserId,
        status: Option<RideRequestStatus>,
    ) -> CoreResult<Vec<RideRequest>>;
    /// ACTIVE and unexpired at `now`, newest first.
    async fn active_requests(
        &self,
        filter: &RequestFilter,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<RideRequest>>;
    /// ACTIVE -> EXPIRED for every request with `expires_at < now`.
    async fn expire_requests(&self, now: DateTime<Utc>) -> CoreResult<u64>;
}

/// One unit of work. Dropping without `commit` discards every write.
///
/// Lock order is ride row first, then booking rows.
#[async_trait]
pub trait MarketTx: Send {
    /// Lock and return the ride row.
    async fn lock_ride(&mut self, id: RideId) -> CoreResult<Option<Ride>>;
    async fn insert_ride(&mut self, ride: NewRide) -> CoreResult<Ride>;
    /// Persist schedule, fare and status. Seat counts are never written here.
    async fn update_ride(&mut self, ride: &Ride) -> CoreResult<Ride>;
    /// Apply `delta` to available seats, keeping `0 <= available <= total`.
    /// Returns `Conflict` when the guard rejects the change.
    async fn adjust_seats(&mut self, ride_id: RideId, delta: i32) -> CoreResult<Ride>;

    async fn lock_booking(&mut self, id: BookingId) -> CoreResult<Option<Booking>>;
    async fn active_booking(
        &mut self,
        ride_id: RideId,
        passenger_id: UserId,
    ) -> CoreResult<Option<Booking>>;
    async fn active_bookings_for_ride(&mut self, ride_id: RideId) -> CoreResult<Vec<Booking>>;
    async fn insert_booking(&mut self, booking: NewBooking) -> CoreResult<Booking>;
    async fn set_booking_status(
        &mut self,
        id: BookingId,
        status: BookingStatus,
        reason: Option<&str>,
    ) -> CoreResult<Booking>;

    /// Serialize request creation for one passenger until commit.
    async fn lock_passenger_requests(&mut self, passenger_id: UserId) -> CoreResult<()>;
    async fn active_request_for_route(
        &mut self,
        passenger_id: UserId,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> CoreResult<Option<RideRequest>>;
    async fn insert_request(&mut self, request: NewRideRequest) -> CoreResult<RideRequest>;
    async fn lock_request(&mut self, id: RequestId) -> CoreResult<Option<RideRequest>>;
    async fn set_request_status(
        &mut self,
        id: RequestId,
        status: RideRequestStatus,
    ) -> CoreResult<RideRequest>;

    async fn commit(self: Box<Self>) -> CoreResult<()>;
}
