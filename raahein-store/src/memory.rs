use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use raahein_core::search::{MatchCriteria, Page, RequestFilter, RideSearch, UpcomingFilter};
use raahein_core::{
    Booking, BookingId, BookingStatus, CoreError, CoreResult, DriverProfile, MarketStore,
    MarketTx, NewBooking, NewRide, NewRideRequest, RequestId, Ride, RideId, RideRequest,
    RideRequestStatus, RideStatus, UserId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    drivers: HashMap<UserId, DriverProfile>,
    rides: BTreeMap<RideId, Ride>,
    bookings: BTreeMap<BookingId, Booking>,
    requests: BTreeMap<RequestId, RideRequest>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn ride_mut(&mut self, id: RideId) -> CoreResult<&mut Ride> {
        self.rides.get_mut(&id).ok_or_else(|| CoreError::not_found("Ride", id))
    }

    fn active_booking(&self, ride_id: RideId, passenger_id: UserId) -> Option<Booking> {
        self.bookings
            .values()
            .find(|b| b.ride_id == ride_id && b.passenger_id == passenger_id && b.status.is_active())
            .cloned()
    }
}

fn by_departure(rides: &mut [Ride]) {
    rides.sort_by_key(|r| (r.departs_at(), r.id));
}

fn newest_first_bookings(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn newest_first_requests(requests: &mut [RideRequest]) {
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// In-process store with the same transactional behaviour as the Postgres
/// one: transactions run one at a time and their writes land on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a driver profile, as onboarding would.
    pub async fn register_driver(&self, profile: DriverProfile) {
        let mut state = self.state.lock().await;
        debug!(user_id = profile.user_id, "Registering driver profile");
        state.drivers.insert(profile.user_id, profile);
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn begin(&self) -> CoreResult<Box<dyn MarketTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn find_driver(&self, user_id: UserId) -> CoreResult<Option<DriverProfile>> {
        Ok(self.state.lock().await.drivers.get(&user_id).cloned())
    }

    async fn find_ride(&self, id: RideId) -> CoreResult<Option<Ride>> {
        Ok(self.state.lock().await.rides.get(&id).cloned())
    }

    async fn search_rides(&self, search: &RideSearch, today: NaiveDate) -> CoreResult<Page<Ride>> {
        let state = self.state.lock().await;
        let mut rides: Vec<Ride> = state
            .rides
            .values()
            .filter(|r| search.matches(r, today))
            .cloned()
            .collect();
        by_departure(&mut rides);
        Ok(Page::slice(rides, search.window()))
    }

    async fn upcoming_rides(
        &self,
        filter: &UpcomingFilter,
        today: NaiveDate,
    ) -> CoreResult<Page<Ride>> {
        let state = self.state.lock().await;
        let mut rides: Vec<Ride> = state
            .rides
            .values()
            .filter(|r| filter.matches(r, today))
            .cloned()
            .collect();
        by_departure(&mut rides);
        Ok(Page::slice(rides, filter.window()))
    }

    async fn rides_by_driver(
        &self,
        driver_id: UserId,
        status: Option<RideStatus>,
    ) -> CoreResult<Vec<Ride>> {
        let state = self.state.lock().await;
        let mut rides: Vec<Ride> = state
            .rides
            .values()
            .filter(|r| r.driver_id == driver_id && status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        by_departure(&mut rides);
        Ok(rides)
    }

    async fn matching_rides(&self, criteria: &MatchCriteria) -> CoreResult<Vec<Ride>> {
        let state = self.state.lock().await;
        let mut rides: Vec<Ride> = state
            .rides
            .values()
            .filter(|r| criteria.matches(r))
            .cloned()
            .collect();
        by_departure(&mut rides);
        Ok(rides)
    }

    async fn find_booking(&self, id: BookingId) -> CoreResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn active_booking(
        &self,
        ride_id: RideId,
        passenger_id: UserId,
    ) -> CoreResult<Option<Booking>> {
        Ok(self.state.lock().await.active_booking(ride_id, passenger_id))
    }

    async fn bookings_by_passenger(
        &self,
        passenger_id: UserId,
        status: Option<BookingStatus>,
    ) -> CoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.passenger_id == passenger_id && status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        newest_first_bookings(&mut bookings);
        Ok(bookings)
    }

    async fn bookings_for_ride(&self, ride_id: RideId) -> CoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .values()
            .filter(|b| b.ride_id == ride_id)
            .cloned()
            .collect())
    }

    async fn bookings_for_driver(
        &self,
        driver_id: UserId,
        status: Option<BookingStatus>,
    ) -> CoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .values()
            .filter(|b| {
                state.rides.get(&b.ride_id).is_some_and(|r| r.driver_id == driver_id)
                    && status.map_or(true, |s| b.status == s)
            })
            .cloned()
            .collect())
    }

    async fn find_request(&self, id: RequestId) -> CoreResult<Option<RideRequest>> {
        Ok(self.state.lock().await.requests.get(&id).cloned())
    }

    async fn requests_by_passenger(
        &self,
        passenger_id: UserId,
        status: Option<RideRequestStatus>,
    ) -> CoreResult<Vec<RideRequest>> {
        let state = self.state.lock().await;
        let mut requests: Vec<RideRequest> = state
            .requests
            .values()
            .filter(|r| r.passenger_id == passenger_id && status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        newest_first_requests(&mut requests);
        Ok(requests)
    }

    async fn active_requests(
        &self,
        filter: &RequestFilter,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<RideRequest>> {
        let state = self.state.lock().await;
        let mut requests: Vec<RideRequest> = state
            .requests
            .values()
            .filter(|r| {
                r.status == RideRequestStatus::Active && r.expires_at >= now && filter.matches(r)
            })
            .cloned()
            .collect();
        newest_first_requests(&mut requests);
        Ok(requests)
    }

    async fn expire_requests(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let mut state = self.state.lock().await;
        let mut expired = 0;
        for request in state.requests.values_mut().filter(|r| r.is_stale(now)) {
            request.status = RideRequestStatus::Expired;
            expired += 1;
        }
        Ok(expired)
    }
}

/// Holds the store lock for its whole life and edits a private copy.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl MarketTx for MemoryTx {
    async fn lock_ride(&mut self, id: RideId) -> CoreResult<Option<Ride>> {
        Ok(self.work.rides.get(&id).cloned())
    }

    async fn insert_ride(&mut self, ride: NewRide) -> CoreResult<Ride> {
        let now = Utc::now();
        let id = self.work.next_id();
        let ride = Ride {
            id,
            driver_id: ride.driver_id,
            origin: ride.origin,
            destination: ride.destination,
            departure_date: ride.departure_date,
            departure_time: ride.departure_time,
            available_seats: ride.available_seats,
            total_seats: ride.total_seats,
            fare: ride.fare,
            status: RideStatus::Scheduled,
            is_suspicious: false,
            created_at: now,
            updated_at: now,
        };
        if !(0..=ride.total_seats).contains(&ride.available_seats) {
            return Err(CoreError::Storage(format!(
                "seat bounds violated for new ride: {}/{}",
                ride.available_seats, ride.total_seats
            )));
        }
        self.work.rides.insert(id, ride.clone());
        Ok(ride)
    }

    async fn update_ride(&mut self, ride: &Ride) -> CoreResult<Ride> {
        let stored = self.work.ride_mut(ride.id)?;
        stored.departure_date = ride.departure_date;
        stored.departure_time = ride.departure_time;
        stored.fare = ride.fare;
        stored.status = ride.status;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn adjust_seats(&mut self, ride_id: RideId, delta: i32) -> CoreResult<Ride> {
        let ride = self.work.ride_mut(ride_id)?;
        let next = ride.available_seats + delta;
        if !(0..=ride.total_seats).contains(&next) {
            return Err(CoreError::Conflict(format!(
                "Seat change of {delta} would leave ride {ride_id} out of bounds"
            )));
        }
        ride.available_seats = next;
        ride.updated_at = Utc::now();
        Ok(ride.clone())
    }

    async fn lock_booking(&mut self, id: BookingId) -> CoreResult<Option<Booking>> {
        Ok(self.work.bookings.get(&id).cloned())
    }

    async fn active_booking(
        &mut self,
        ride_id: RideId,
        passenger_id: UserId,
    ) -> CoreResult<Option<Booking>> {
        Ok(self.work.active_booking(ride_id, passenger_id))
    }

    async fn active_bookings_for_ride(&mut self, ride_id: RideId) -> CoreResult<Vec<Booking>> {
        Ok(self
            .work
            .bookings
            .values()
            .filter(|b| b.ride_id == ride_id && b.status.is_active())
            .cloned()
            .collect())
    }

    async fn insert_booking(&mut self, booking: NewBooking) -> CoreResult<Booking> {
        let now = Utc::now();
        let id = self.work.next_id();
        let booking = Booking {
            id,
            ride_id: booking.ride_id,
            passenger_id: booking.passenger_id,
            seats_booked: booking.seats_booked,
            fare: booking.fare,
            status: BookingStatus::Pending,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.work.bookings.insert(id, booking.clone());
        Ok(booking)
    }

    async fn set_booking_status(
        &mut self,
        id: BookingId,
        status: BookingStatus,
        reason: Option<&str>,
    ) -> CoreResult<Booking> {
        let booking = self
            .work
            .bookings
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("Booking", id))?;
        booking.status = status;
        if let Some(reason) = reason {
            booking.rejection_reason = Some(reason.to_string());
        }
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn lock_passenger_requests(&mut self, _passenger_id: UserId) -> CoreResult<()> {
        // The store-wide lock already serializes every transaction.
        Ok(())
    }

    async fn active_request_for_route(
        &mut self,
        passenger_id: UserId,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> CoreResult<Option<RideRequest>> {
        Ok(self
            .work
            .requests
            .values()
            .find(|r| {
                r.passenger_id == passenger_id
                    && r.origin == origin
                    && r.destination == destination
                    && r.earliest_date == date
                    && r.status == RideRequestStatus::Active
            })
            .cloned())
    }

    async fn insert_request(&mut self, request: NewRideRequest) -> CoreResult<RideRequest> {
        let id = self.work.next_id();
        let request = RideRequest {
            id,
            passenger_id: request.passenger_id,
            origin: request.origin,
            destination: request.destination,
            earliest_date: request.earliest_date,
            earliest_time: request.earliest_time,
            latest_time: request.latest_time,
            seats_needed: request.seats_needed,
            offer_per_seat: request.offer_per_seat,
            status: RideRequestStatus::Active,
            expires_at: request.expires_at,
            created_at: Utc::now(),
        };
        self.work.requests.insert(id, request.clone());
        Ok(request)
    }

    async fn lock_request(&mut self, id: RequestId) -> CoreResult<Option<RideRequest>> {
        Ok(self.work.requests.get(&id).cloned())
    }

    async fn set_request_status(
        &mut self,
        id: RequestId,
        status: RideRequestStatus,
    ) -> CoreResult<RideRequest> {
        let request = self
            .work
            .requests
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("RideRequest", id))?;
        request.status = status;
        Ok(request.clone())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
