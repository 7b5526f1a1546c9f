use std::sync::Arc;

use chrono::Utc;
use raahein_core::commands::{CreateRide, UpdateRide};
use raahein_core::rules::{ensure_ride_owner, ensure_seat_patch};
use raahein_core::search::{Page, RideSearch, UpcomingFilter};
use raahein_core::{
    BookingStatus, CoreError, CoreResult, MarketStore, NewRide, Ride, RideId, RideStatus, UserId,
};
use tracing::{info, warn};

const RIDE_CANCELLED_REASON: &str = "Ride cancelled by driver";
const RIDE_COMPLETED_REASON: &str = "Ride completed before the booking was accepted";

/// Manages ride creation, edits and the status lifecycle.
pub struct RideLifecycle {
    store: Arc<dyn MarketStore>,
}

impl RideLifecycle {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Post a ride. Only verified drivers may; capacity comes from the vehicle.
    #[tracing::instrument(skip(self, cmd))]
    pub async fn create(&self, driver_id: UserId, cmd: CreateRide) -> CoreResult<Ride> {
        cmd.validate()?;

        let driver = self
            .store
            .find_driver(driver_id)
            .await?
            .ok_or_else(|| CoreError::NotEligible("Only drivers can create rides".into()))?;

        if !driver.is_verified() {
            warn!(status = %driver.verification_status, "Unverified driver tried to post a ride");
            return Err(CoreError::NotEligible(
                "Driver must be verified to create rides".into(),
            ));
        }
        if cmd.available_seats > driver.vehicle_seats {
            return Err(CoreError::InvalidInput(format!(
                "Vehicle only has {} seat(s), cannot offer {}",
                driver.vehicle_seats, cmd.available_seats
            )));
        }

        let mut tx = self.store.begin().await?;
        let ride = tx
            .insert_ride(NewRide {
                driver_id,
                origin: cmd.from.trim().to_string(),
                destination: cmd.to.trim().to_string(),
                departure_date: cmd.departure_date,
                departure_time: cmd.departure_time,
                available_seats: cmd.available_seats,
                total_seats: driver.vehicle_seats,
                fare: cmd.fare,
            })
            .await?;
        tx.commit().await?;

        info!(ride_id = ride.id, "Ride created");
        Ok(ride)
    }

    pub async fn get(&self, ride_id: RideId) -> CoreResult<Ride> {
        self.store
            .find_ride(ride_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Ride", ride_id))
    }

    pub async fn search(&self, search: &RideSearch) -> CoreResult<Page<Ride>> {
        if search.seats < 1 {
            return Err(CoreError::InvalidInput("seats must be at least 1".into()));
        }
        self.store.search_rides(search, Utc::now().date_naive()).await
    }

    pub async fn upcoming(&self, filter: &UpcomingFilter) -> CoreResult<Page<Ride>> {
        self.store.upcoming_rides(filter, Utc::now().date_naive()).await
    }

    pub async fn driver_rides(
        &self,
        driver_id: UserId,
        status: Option<RideStatus>,
    ) -> CoreResult<Vec<Ride>> {
        self.store.rides_by_driver(driver_id, status).await
    }

    /// Edit schedule, fare or offered seats of a ride that has not started.
    #[tracing::instrument(skip(self, cmd))]
    pub async fn update_details(
        &self,
        ride_id: RideId,
        driver_id: UserId,
        cmd: UpdateRide,
    ) -> CoreResult<Ride> {
        let patch = cmd.into_patch()?;

        let mut tx = self.store.begin().await?;
        let current = tx
            .lock_ride(ride_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Ride", ride_id))?;
        ensure_ride_owner(&current, driver_id)?;
        if current.status != RideStatus::Scheduled {
            return Err(CoreError::InvalidState(format!(
                "Can only update scheduled rides, this one is {}",
                current.status
            )));
        }

        let mut edited = current.clone();
        patch.apply_details(&mut edited);
        let mut ride = tx.update_ride(&edited).await?;

        if let Some(wanted) = patch.available_seats {
            let held: i32 = tx
                .active_bookings_for_ride(ride_id)
                .await?
                .iter()
                .map(|b| b.seats_booked)
                .sum();
            ensure_seat_patch(wanted, held, ride.total_seats)?;

            let delta = wanted - ride.available_seats;
            if delta != 0 {
                ride = tx.adjust_seats(ride_id, delta).await?;
            }
        }
        tx.commit().await?;

        info!("Ride details updated");
        Ok(ride)
    }

    /// Move a ride along SCHEDULED -> STARTED -> COMPLETED, or cancel it.
    #[tracing::instrument(skip(self))]
    pub async fn transition_status(
        &self,
        ride_id: RideId,
        driver_id: UserId,
        target: RideStatus,
    ) -> CoreResult<Ride> {
        let mut tx = self.store.begin().await?;
        let mut ride = tx
            .lock_ride(ride_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Ride", ride_id))?;
        ensure_ride_owner(&ride, driver_id)?;

        if !ride.status.can_transition_to(target) {
            warn!(from = %ride.status, to = %target, "Rejected ride transition");
            return Err(CoreError::InvalidState(format!(
                "Cannot move ride from {} to {}",
                ride.status, target
            )));
        }

        let mut released = 0;
        if matches!(target, RideStatus::Cancelled | RideStatus::Completed) {
            for booking in tx.active_bookings_for_ride(ride_id).await? {
                let (status, reason) = match (target, booking.status) {
                    (RideStatus::Completed, BookingStatus::Confirmed) => {
                        (BookingStatus::Completed, None)
                    }
                    (RideStatus::Completed, _) => {
                        (BookingStatus::Cancelled, Some(RIDE_COMPLETED_REASON))
                    }
                    _ => (BookingStatus::Cancelled, Some(RIDE_CANCELLED_REASON)),
                };
                if status == BookingStatus::Cancelled {
                    released += booking.seats_booked;
                }
                tx.set_booking_status(booking.id, status, reason).await?;
            }
        }
        if released > 0 {
            tx.adjust_seats(ride_id, released).await?;
        }

        ride.status = target;
        let ride = tx.update_ride(&ride).await?;
        tx.commit().await?;

        info!(status = %ride.status, released, "Ride status changed");
        Ok(ride)
    }

    pub async fn cancel(&self, ride_id: RideId, driver_id: UserId) -> CoreResult<Ride> {
        self.transition_status(ride_id, driver_id, RideStatus::Cancelled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_ride_at, market, ride_in, DRIVER, PASSENGER};
    use chrono::{Duration, NaiveTime};
    use raahein_core::commands::{AcceptBooking, CreateBooking};
    use raahein_core::{DriverProfile, VerificationStatus};

    #[tokio::test]
    async fn test_create_sets_capacity_from_vehicle() {
        let (market, _) = market().await;
        let ride = market
            .rides
            .create(DRIVER, create_ride_at(Utc::now() + Duration::days(1), 3, 800.0))
            .await
            .unwrap();

        assert_eq!(ride.status, RideStatus::Scheduled);
        assert_eq!((ride.available_seats, ride.total_seats), (3, 4));
    }

    #[tokio::test]
    async fn test_create_requires_verified_driver() {
        let (market, store) = market().await;
        let cmd = || create_ride_at(Utc::now() + Duration::days(1), 2, 0.0);

        let err = market.rides.create(PASSENGER, cmd()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotEligible(_)));

        store
            .register_driver(DriverProfile {
                user_id: 300,
                verification_status: VerificationStatus::Pending,
                vehicle_seats: 4,
            })
            .await;
        let err = market.rides.create(300, cmd()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotEligible(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_more_seats_than_vehicle() {
        let (market, _) = market().await;
        let err = market
            .rides
            .create(DRIVER, create_ride_at(Utc::now() + Duration::days(1), 5, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_only_owner_may_edit() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;
        let cmd = UpdateRide { fare: Some(1200.0), ..Default::default() };

        let err = market.rides.update_details(ride.id, PASSENGER, cmd.clone()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotOwner(_)));

        let updated = market.rides.update_details(ride.id, DRIVER, cmd).await.unwrap();
        assert_eq!(updated.fare, 1200.0);
    }

    #[tokio::test]
    async fn test_seat_edit_respects_held_seats() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;
        market
            .seats
            .create_booking(PASSENGER, CreateBooking { ride_id: ride.id, seats_booked: 2 })
            .await
            .unwrap();

        let too_many = UpdateRide { available_seats: Some(3), ..Default::default() };
        let err = market.rides.update_details(ride.id, DRIVER, too_many).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));

        let fewer = UpdateRide {
            available_seats: Some(1),
            departure_time: NaiveTime::from_hms_opt(7, 45, 0),
            ..Default::default()
        };
        let ride = market.rides.update_details(ride.id, DRIVER, fewer).await.unwrap();
        assert_eq!(ride.available_seats, 1);
        assert_eq!(ride.departure_time, NaiveTime::from_hms_opt(7, 45, 0).unwrap());
    }

    #[tokio::test]
    async fn test_huge_seat_edit_is_invalid_input() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;
        market
            .seats
            .create_booking(PASSENGER, CreateBooking { ride_id: ride.id, seats_booked: 1 })
            .await
            .unwrap();

        let huge = UpdateRide { available_seats: Some(i32::MAX), ..Default::default() };
        let err = market.rides.update_details(ride.id, DRIVER, huge).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert_eq!(market.rides.get(ride.id).await.unwrap().available_seats, 3);
    }

    #[tokio::test]
    async fn test_started_ride_cannot_be_edited_or_cancelled() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;
        market.rides.transition_status(ride.id, DRIVER, RideStatus::Started).await.unwrap();

        let err = market
            .rides
            .update_details(ride.id, DRIVER, UpdateRide { fare: Some(1.0), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        let err = market.rides.cancel(ride.id, DRIVER).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_illegal_jumps_are_rejected() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;

        let err = market
            .rides
            .transition_status(ride.id, DRIVER, RideStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        let err = market
            .rides
            .transition_status(ride.id, PASSENGER, RideStatus::Started)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotOwner(_)));
    }

    #[tokio::test]
    async fn test_cancel_releases_bookings() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;
        let booking = market
            .seats
            .create_booking(PASSENGER, CreateBooking { ride_id: ride.id, seats_booked: 3 })
            .await
            .unwrap();

        let cancelled = market.rides.cancel(ride.id, DRIVER).await.unwrap();
        assert_eq!(cancelled.status, RideStatus::Cancelled);
        assert_eq!(cancelled.available_seats, 4);

        let booking = market.seats.booking(booking.id, PASSENGER).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.rejection_reason.as_deref(), Some(RIDE_CANCELLED_REASON));
    }

    #[tokio::test]
    async fn test_completion_settles_bookings() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;
        let confirmed = market
            .seats
            .create_booking(PASSENGER, CreateBooking { ride_id: ride.id, seats_booked: 1 })
            .await
            .unwrap();
        let pending = market
            .seats
            .create_booking(201, CreateBooking { ride_id: ride.id, seats_booked: 2 })
            .await
            .unwrap();
        market
            .seats
            .accept(DRIVER, AcceptBooking { booking_id: confirmed.id })
            .await
            .unwrap();

        market.rides.transition_status(ride.id, DRIVER, RideStatus::Started).await.unwrap();
        let done = market
            .rides
            .transition_status(ride.id, DRIVER, RideStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.available_seats, 3);

        let confirmed = market.seats.booking(confirmed.id, PASSENGER).await.unwrap();
        let pending = market.seats.booking(pending.id, 201).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Completed);
        assert_eq!(pending.status, BookingStatus::Cancelled);
    }
}
