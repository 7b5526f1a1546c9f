use std::sync::Arc;

use chrono::Utc;
use raahein_core::commands::CreateRideRequest;
use raahein_core::search::{MatchCriteria, RequestFilter};
use raahein_core::{
    CoreError, CoreResult, MarketStore, NewRideRequest, RequestId, Ride, RideRequest,
    RideRequestStatus, UserId,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::MarketPolicy;

/// A request together with the rides that could serve it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideMatches {
    pub ride_request: RideRequest,
    pub matching_rides: Vec<Ride>,
    pub total_matches: usize,
}

/// Passenger ride requests: posting, expiry, matching and closing.
pub struct RequestBroker {
    store: Arc<dyn MarketStore>,
    policy: MarketPolicy,
}

impl RequestBroker {
    pub fn new(store: Arc<dyn MarketStore>, policy: MarketPolicy) -> Self {
        Self { store, policy }
    }

    #[tracing::instrument(skip(self, cmd))]
    pub async fn create(
        &self,
        passenger_id: UserId,
        cmd: CreateRideRequest,
    ) -> CoreResult<RideRequest> {
        let now = Utc::now();
        let window = cmd.validate(now)?;
        self.sweep_expired().await?;

        let origin = cmd.from.trim().to_string();
        let destination = cmd.to.trim().to_string();

        let mut tx = self.store.begin().await?;
        tx.lock_passenger_requests(passenger_id).await?;
        if tx
            .active_request_for_route(passenger_id, &origin, &destination, cmd.earliest_date)
            .await?
            .is_some()
        {
            warn!("Duplicate active ride request");
            return Err(CoreError::Conflict(
                "You already have an active ride request for this route and date".into(),
            ));
        }

        let request = tx
            .insert_request(NewRideRequest {
                passenger_id,
                origin,
                destination,
                earliest_date: cmd.earliest_date,
                earliest_time: window.earliest,
                latest_time: window.latest,
                seats_needed: cmd.seats_needed,
                offer_per_seat: cmd.offer_per_seat,
                expires_at: now + self.policy.request_ttl,
            })
            .await?;
        tx.commit().await?;

        info!(request_id = request.id, "Ride request posted");
        Ok(request)
    }

    /// ACTIVE -> EXPIRED for every request past its expiry. Safe to repeat.
    pub async fn sweep_expired(&self) -> CoreResult<u64> {
        let expired = self.store.expire_requests(Utc::now()).await?;
        if expired > 0 {
            info!(expired, "Expired stale ride requests");
        } else {
            debug!("No ride requests to expire");
        }
        Ok(expired)
    }

    pub async fn get(&self, request_id: RequestId) -> CoreResult<RideRequest> {
        self.sweep_expired().await?;
        self.find(request_id).await
    }

    pub async fn passenger_requests(
        &self,
        passenger_id: UserId,
        status: Option<RideRequestStatus>,
    ) -> CoreResult<Vec<RideRequest>> {
        self.sweep_expired().await?;
        self.store.requests_by_passenger(passenger_id, status).await
    }

    /// Open requests for drivers to browse.
    pub async fn active_requests(&self, filter: &RequestFilter) -> CoreResult<Vec<RideRequest>> {
        self.sweep_expired().await?;
        self.store.active_requests(filter, Utc::now()).await
    }

    /// Scheduled rides on the request's route, date and window with enough seats.
    pub async fn find_matches(
        &self,
        request_id: RequestId,
        passenger_id: UserId,
    ) -> CoreResult<RideMatches> {
        self.sweep_expired().await?;
        let request = self.find(request_id).await?;
        if !request.is_owned_by(passenger_id) {
            return Err(CoreError::NotOwner("You can only match your own ride requests".into()));
        }

        let rides = self
            .store
            .matching_rides(&MatchCriteria::from_request(&request))
            .await?;
        Ok(RideMatches {
            total_matches: rides.len(),
            ride_request: request,
            matching_rides: rides,
        })
    }

    pub async fn cancel(&self, request_id: RequestId, passenger_id: UserId) -> CoreResult<RideRequest> {
        self.close(request_id, passenger_id, RideRequestStatus::Cancelled).await
    }

    pub async fn fulfill(&self, request_id: RequestId, passenger_id: UserId) -> CoreResult<RideRequest> {
        self.close(request_id, passenger_id, RideRequestStatus::Fulfilled).await
    }

    #[tracing::instrument(skip(self))]
    async fn close(
        &self,
        request_id: RequestId,
        passenger_id: UserId,
        target: RideRequestStatus,
    ) -> CoreResult<RideRequest> {
        self.sweep_expired().await?;

        let mut tx = self.store.begin().await?;
        let request = tx
            .lock_request(request_id)
            .await?
            .ok_or_else(|| CoreError::not_found("RideRequest", request_id))?;
        if !request.is_owned_by(passenger_id) {
            return Err(CoreError::NotOwner("You can only change your own ride requests".into()));
        }
        if !request.status.can_transition_to(target) {
            return Err(CoreError::InvalidState(format!(
                "Ride request is {} and cannot become {}",
                request.status, target
            )));
        }

        let request = tx.set_request_status(request_id, target).await?;
        tx.commit().await?;

        info!(status = %request.status, "Ride request closed");
        Ok(request)
    }

    async fn find(&self, request_id: RequestId) -> CoreResult<RideRequest> {
        self.store
            .find_request(request_id)
            .await?
            .ok_or_else(|| CoreError::not_found("RideRequest", request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_ride_at, market, DRIVER, PASSENGER};
    use crate::Market;
    use chrono::{DateTime, Duration, NaiveDate, NaiveTime};
    use raahein_core::commands::CreateBooking;
    use raahein_core::RideStatus;
    use raahein_store::MemoryStore;

    fn day_after_tomorrow() -> NaiveDate {
        (Utc::now() + Duration::days(2)).date_naive()
    }

    fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
        date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap()).and_utc()
    }

    fn request_cmd(date: NaiveDate, from: (u32, u32), to: (u32, u32), seats: i32) -> CreateRideRequest {
        CreateRideRequest {
            from: "Lahore".into(),
            to: "Islamabad".into(),
            earliest_date: date,
            earliest_time: NaiveTime::from_hms_opt(from.0, from.1, 0).unwrap(),
            latest_time: NaiveTime::from_hms_opt(to.0, to.1, 0).unwrap(),
            seats_needed: seats,
            offer_per_seat: Some(900.0),
        }
    }

    #[tokio::test]
    async fn test_duplicate_active_request_conflicts() {
        let (market, _) = market().await;
        let date = day_after_tomorrow();

        market.requests.create(PASSENGER, request_cmd(date, (9, 0), (11, 0), 1)).await.unwrap();
        let err = market
            .requests
            .create(PASSENGER, request_cmd(date, (13, 0), (15, 0), 2))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        // Another day is a different request.
        market
            .requests
            .create(PASSENGER, request_cmd(date + Duration::days(1), (9, 0), (11, 0), 1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_request_expires_after_ttl() {
        let store = MemoryStore::new();
        let policy = MarketPolicy { request_ttl: Duration::seconds(-1), ..Default::default() };
        let market = Market::new(Arc::new(store), policy);

        let request = market
            .requests
            .create(PASSENGER, request_cmd(day_after_tomorrow(), (9, 0), (11, 0), 1))
            .await
            .unwrap();
        assert_eq!(request.status, RideRequestStatus::Active);

        assert_eq!(market.requests.sweep_expired().await.unwrap(), 1);
        assert_eq!(market.requests.sweep_expired().await.unwrap(), 0);

        let request = market.requests.get(request.id).await.unwrap();
        assert_eq!(request.status, RideRequestStatus::Expired);
        assert!(market.requests.active_requests(&RequestFilter::default()).await.unwrap().is_empty());

        let err = market.requests.cancel(request.id, PASSENGER).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        // An expired request no longer blocks a fresh one for the same route.
        market
            .requests
            .create(PASSENGER, request_cmd(day_after_tomorrow(), (9, 0), (11, 0), 1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_matches_respect_window_seats_and_status() {
        let (market, _) = market().await;
        let date = day_after_tomorrow();

        let late = market.rides.create(DRIVER, create_ride_at(at(date, 10, 30), 4, 900.0)).await.unwrap();
        let early = market.rides.create(DRIVER, create_ride_at(at(date, 9, 15), 3, 900.0)).await.unwrap();
        // Outside the window.
        market.rides.create(DRIVER, create_ride_at(at(date, 12, 0), 4, 900.0)).await.unwrap();
        // Not enough seats left.
        let full = market.rides.create(DRIVER, create_ride_at(at(date, 9, 30), 2, 900.0)).await.unwrap();
        market
            .seats
            .create_booking(201, CreateBooking { ride_id: full.id, seats_booked: 1 })
            .await
            .unwrap();
        // Cancelled.
        let cancelled = market.rides.create(DRIVER, create_ride_at(at(date, 10, 0), 4, 900.0)).await.unwrap();
        market.rides.cancel(cancelled.id, DRIVER).await.unwrap();
        // Next day, same clock time.
        market
            .rides
            .create(DRIVER, create_ride_at(at(date + Duration::days(1), 10, 0), 4, 900.0))
            .await
            .unwrap();

        let request = market
            .requests
            .create(PASSENGER, request_cmd(date, (9, 0), (11, 0), 2))
            .await
            .unwrap();
        let matches = market.requests.find_matches(request.id, PASSENGER).await.unwrap();

        let ids: Vec<_> = matches.matching_rides.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
        assert_eq!(matches.total_matches, 2);
        assert!(matches.matching_rides.iter().all(|r| r.status == RideStatus::Scheduled));

        let err = market.requests.find_matches(request.id, 999).await.unwrap_err();
        assert!(matches!(err, CoreError::NotOwner(_)));
    }

    #[tokio::test]
    async fn test_fulfill_and_cancel_need_owner_and_active() {
        let (market, _) = market().await;
        let request = market
            .requests
            .create(PASSENGER, request_cmd(day_after_tomorrow(), (9, 0), (11, 0), 1))
            .await
            .unwrap();

        let err = market.requests.fulfill(request.id, 999).await.unwrap_err();
        assert!(matches!(err, CoreError::NotOwner(_)));

        let done = market.requests.fulfill(request.id, PASSENGER).await.unwrap();
        assert_eq!(done.status, RideRequestStatus::Fulfilled);

        let err = market.requests.cancel(request.id, PASSENGER).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        let mine = market.requests.passenger_requests(PASSENGER, None).await.unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn test_active_requests_filter() {
        let (market, _) = market().await;
        let date = day_after_tomorrow();
        market.requests.create(PASSENGER, request_cmd(date, (9, 0), (11, 0), 1)).await.unwrap();
        let mut other = request_cmd(date, (9, 0), (11, 0), 1);
        other.to = "Multan".into();
        market.requests.create(201, other).await.unwrap();

        let filter = RequestFilter { to: Some("multan".into()), ..Default::default() };
        let found = market.requests.active_requests(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].passenger_id, 201);

        let all = market.requests.active_requests(&RequestFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
