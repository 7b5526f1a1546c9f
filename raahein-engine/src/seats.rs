use std::sync::Arc;

use chrono::Utc;
use raahein_core::commands::{AcceptBooking, CheckEligibility, CreateBooking, RejectBooking};
use raahein_core::rules::{
    booking_blocker, ensure_cancellable, ensure_rejection_reason, Eligibility,
};
use raahein_core::{
    Booking, BookingId, BookingStats, BookingStatus, CoreError, CoreResult, MarketStore,
    MarketTx, NewBooking, Ride, RideId, UserId,
};
use tracing::{info, warn};

use crate::MarketPolicy;

/// Owns every change to a ride's seat counter.
///
/// Each command runs in one store transaction with the ride row locked before
/// any booking row, and applies seat changes through the guarded delta.
pub struct SeatAllocator {
    store: Arc<dyn MarketStore>,
    policy: MarketPolicy,
}

impl SeatAllocator {
    pub fn new(store: Arc<dyn MarketStore>, policy: MarketPolicy) -> Self {
        Self { store, policy }
    }

    /// Read-only preview of `create_booking`.
    pub async fn check_eligibility(
        &self,
        passenger_id: UserId,
        cmd: CheckEligibility,
    ) -> CoreResult<Eligibility> {
        cmd.validate()?;
        let ride = self
            .store
            .find_ride(cmd.ride_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Ride", cmd.ride_id))?;
        let existing = self.store.active_booking(ride.id, passenger_id).await?;

        let verdict =
            match booking_blocker(&ride, passenger_id, cmd.seats_needed, existing.as_ref(), Utc::now()) {
                Some(block) => Eligibility::blocked(&block),
                None => Eligibility::eligible(ride, cmd.seats_needed),
            };
        Ok(verdict)
    }

    /// Reserve seats and record a PENDING booking.
    #[tracing::instrument(skip(self))]
    pub async fn create_booking(
        &self,
        passenger_id: UserId,
        cmd: CreateBooking,
    ) -> CoreResult<Booking> {
        cmd.validate()?;

        let mut tx = self.store.begin().await?;
        let ride = tx
            .lock_ride(cmd.ride_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Ride", cmd.ride_id))?;
        let existing = tx.active_booking(ride.id, passenger_id).await?;

        if let Some(block) =
            booking_blocker(&ride, passenger_id, cmd.seats_booked, existing.as_ref(), Utc::now())
        {
            warn!(reason = %block.reason(), "Booking refused");
            return Err(block.into_error());
        }

        tx.adjust_seats(ride.id, -cmd.seats_booked).await?;
        let booking = tx
            .insert_booking(NewBooking {
                ride_id: ride.id,
                passenger_id,
                seats_booked: cmd.seats_booked,
                fare: ride.fare_for(cmd.seats_booked),
            })
            .await?;
        tx.commit().await?;

        info!(booking_id = booking.id, "Booking created");
        Ok(booking)
    }

    /// PENDING -> CONFIRMED. Seats were already reserved at creation.
    #[tracing::instrument(skip(self))]
    pub async fn accept(&self, driver_id: UserId, cmd: AcceptBooking) -> CoreResult<Booking> {
        let (mut tx, _ride, booking) = self.lock_for_driver(cmd.booking_id, driver_id).await?;
        ensure_pending(&booking)?;

        let booking = tx
            .set_booking_status(booking.id, BookingStatus::Confirmed, None)
            .await?;
        tx.commit().await?;

        info!("Booking confirmed");
        Ok(booking)
    }

    /// PENDING -> CANCELLED with an optional reason; seats go back to the ride.
    #[tracing::instrument(skip(self, cmd), fields(booking_id = cmd.booking_id))]
    pub async fn reject(&self, driver_id: UserId, cmd: RejectBooking) -> CoreResult<Booking> {
        let reason = cmd.rejection_reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        ensure_rejection_reason(reason)?;

        let (mut tx, ride, booking) = self.lock_for_driver(cmd.booking_id, driver_id).await?;
        ensure_pending(&booking)?;

        let booking = tx
            .set_booking_status(booking.id, BookingStatus::Cancelled, reason)
            .await?;
        tx.adjust_seats(ride.id, booking.seats_booked).await?;
        tx.commit().await?;

        info!(released = booking.seats_booked, "Booking rejected");
        Ok(booking)
    }

    /// Passenger cancellation, allowed until the cutoff before departure.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, booking_id: BookingId, passenger_id: UserId) -> CoreResult<Booking> {
        let (mut tx, ride, booking) = self.lock_booking_with_ride(booking_id).await?;

        if booking.passenger_id != passenger_id {
            return Err(CoreError::NotOwner("You can only cancel your own bookings".into()));
        }
        if !booking.status.is_active() {
            return Err(CoreError::InvalidState(format!(
                "Booking is already {}",
                booking.status
            )));
        }
        if let Err(err) = ensure_cancellable(&ride, Utc::now(), self.policy.cancellation_cutoff) {
            warn!("Cancellation past the cutoff");
            return Err(err);
        }

        let booking = tx
            .set_booking_status(booking.id, BookingStatus::Cancelled, None)
            .await?;
        tx.adjust_seats(ride.id, booking.seats_booked).await?;
        tx.commit().await?;

        info!(released = booking.seats_booked, "Booking cancelled by passenger");
        Ok(booking)
    }

    /// Visible to the passenger and to the ride's driver.
    pub async fn booking(&self, booking_id: BookingId, user_id: UserId) -> CoreResult<Booking> {
        let booking = self.find(booking_id).await?;
        if booking.passenger_id == user_id {
            return Ok(booking);
        }
        let ride = self.ride(booking.ride_id).await?;
        if ride.is_driven_by(user_id) {
            return Ok(booking);
        }
        Err(CoreError::NotOwner("Booking belongs to another user".into()))
    }

    pub async fn passenger_bookings(
        &self,
        passenger_id: UserId,
        status: Option<BookingStatus>,
    ) -> CoreResult<Vec<Booking>> {
        self.store.bookings_by_passenger(passenger_id, status).await
    }

    pub async fn pending_for_driver(&self, driver_id: UserId) -> CoreResult<Vec<Booking>> {
        self.store
            .bookings_for_driver(driver_id, Some(BookingStatus::Pending))
            .await
    }

    pub async fn ride_bookings(&self, ride_id: RideId, driver_id: UserId) -> CoreResult<Vec<Booking>> {
        let ride = self.ride(ride_id).await?;
        if !ride.is_driven_by(driver_id) {
            return Err(CoreError::NotOwner("Only the ride's driver can list its bookings".into()));
        }
        self.store.bookings_for_ride(ride_id).await
    }

    pub async fn passenger_stats(&self, passenger_id: UserId) -> CoreResult<BookingStats> {
        let bookings = self.store.bookings_by_passenger(passenger_id, None).await?;
        Ok(BookingStats::tally(&bookings))
    }

    pub async fn driver_stats(&self, driver_id: UserId) -> CoreResult<BookingStats> {
        let bookings = self.store.bookings_for_driver(driver_id, None).await?;
        Ok(BookingStats::tally(&bookings))
    }

    async fn find(&self, booking_id: BookingId) -> CoreResult<Booking> {
        self.store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Booking", booking_id))
    }

    async fn ride(&self, ride_id: RideId) -> CoreResult<Ride> {
        self.store
            .find_ride(ride_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Ride", ride_id))
    }

    /// Open a transaction holding the booking's ride row, then the booking row.
    async fn lock_booking_with_ride(
        &self,
        booking_id: BookingId,
    ) -> CoreResult<(Box<dyn MarketTx>, Ride, Booking)> {
        // A booking never moves between rides, so the ride id can be read
        // before the transaction opens.
        let ride_id = self.find(booking_id).await?.ride_id;

        let mut tx = self.store.begin().await?;
        let ride = tx
            .lock_ride(ride_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Ride", ride_id))?;
        let booking = tx
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Booking", booking_id))?;
        Ok((tx, ride, booking))
    }

    async fn lock_for_driver(
        &self,
        booking_id: BookingId,
        driver_id: UserId,
    ) -> CoreResult<(Box<dyn MarketTx>, Ride, Booking)> {
        let (tx, ride, booking) = self.lock_booking_with_ride(booking_id).await?;
        if !ride.is_driven_by(driver_id) {
            return Err(CoreError::NotOwner(
                "Only the ride's driver can respond to this booking".into(),
            ));
        }
        Ok((tx, ride, booking))
    }
}

fn ensure_pending(booking: &Booking) -> CoreResult<()> {
    if booking.status != BookingStatus::Pending {
        return Err(CoreError::InvalidState(format!(
            "Booking is {}, only PENDING bookings can be answered",
            booking.status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_ride_at, market, ride_in, DRIVER, PASSENGER};
    use chrono::Duration;
    use raahein_core::commands::UpdateRide;
    use raahein_core::RideStatus;

    fn book(ride_id: RideId, seats: i32) -> CreateBooking {
        CreateBooking { ride_id, seats_booked: seats }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overbooking_has_one_winner() {
        let (market, _) = market().await;
        let ride_id = ride_in(&market, 24).await.id;

        let a = tokio::spawn({
            let market = market.clone();
            async move { market.seats.create_booking(201, book(ride_id, 3)).await }
        });
        let b = tokio::spawn({
            let market = market.clone();
            async move { market.seats.create_booking(202, book(ride_id, 3)).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(CoreError::Conflict(_)))));
        assert_eq!(market.rides.get(ride_id).await.unwrap().available_seats, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_seat_counter_never_goes_negative() {
        let (market, _) = market().await;
        let ride_id = ride_in(&market, 24).await.id;

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let market = market.clone();
                tokio::spawn(async move { market.seats.create_booking(300 + i, book(ride_id, 1)).await })
            })
            .collect();

        let mut booked = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => booked += 1,
                Err(err) => assert!(err.is_retryable(), "unexpected {err:?}"),
            }
        }

        let ride = market.rides.get(ride_id).await.unwrap();
        assert_eq!(booked, 4);
        assert_eq!(ride.available_seats, 0);
    }

    #[tokio::test]
    async fn test_booking_a_departed_ride_is_invalid_state() {
        let (market, _) = market().await;
        let ride = market
            .rides
            .create(DRIVER, create_ride_at(Utc::now() - Duration::minutes(5), 4, 500.0))
            .await
            .unwrap();

        let err = market.seats.create_booking(PASSENGER, book(ride.id, 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
        assert_eq!(market.rides.get(ride.id).await.unwrap().available_seats, 4);
    }

    #[tokio::test]
    async fn test_booking_a_started_or_cancelled_ride_is_invalid_state() {
        let (market, _) = market().await;
        let started = ride_in(&market, 24).await;
        market
            .rides
            .transition_status(started.id, DRIVER, RideStatus::Started)
            .await
            .unwrap();
        let cancelled = ride_in(&market, 24).await;
        market.rides.cancel(cancelled.id, DRIVER).await.unwrap();

        for ride_id in [started.id, cancelled.id] {
            let err = market.seats.create_booking(PASSENGER, book(ride_id, 1)).await.unwrap_err();
            assert!(matches!(err, CoreError::InvalidState(_)), "ride {ride_id}: {err:?}");
            assert_eq!(market.rides.get(ride_id).await.unwrap().available_seats, 4);
        }
    }

    #[tokio::test]
    async fn test_own_ride_and_duplicates_are_refused() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;

        let err = market.seats.create_booking(DRIVER, book(ride.id, 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        market.seats.create_booking(PASSENGER, book(ride.id, 1)).await.unwrap();
        let err = market.seats.create_booking(PASSENGER, book(ride.id, 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        let err = market.seats.create_booking(PASSENGER, book(9_999, 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reject_restores_seats() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;

        let booking = market.seats.create_booking(PASSENGER, book(ride.id, 2)).await.unwrap();
        assert_eq!(market.rides.get(ride.id).await.unwrap().available_seats, 2);

        let rejected = market
            .seats
            .reject(
                DRIVER,
                RejectBooking {
                    booking_id: booking.id,
                    rejection_reason: Some("Route changed".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(rejected.status, BookingStatus::Cancelled);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Route changed"));
        assert_eq!(market.rides.get(ride.id).await.unwrap().available_seats, 4);

        // A second answer to the same booking is a state error.
        let err = market
            .seats
            .accept(DRIVER, AcceptBooking { booking_id: booking.id })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_overlong_rejection_reason_leaves_booking_alone() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;
        let booking = market.seats.create_booking(PASSENGER, book(ride.id, 1)).await.unwrap();

        let err = market
            .seats
            .reject(
                DRIVER,
                RejectBooking { booking_id: booking.id, rejection_reason: Some("x".repeat(501)) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));

        let booking = market.seats.booking(booking.id, PASSENGER).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_only_driver_answers_bookings() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;
        let booking = market.seats.create_booking(PASSENGER, book(ride.id, 1)).await.unwrap();

        let err = market
            .seats
            .accept(PASSENGER, AcceptBooking { booking_id: booking.id })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotOwner(_)));

        let confirmed = market
            .seats
            .accept(DRIVER, AcceptBooking { booking_id: booking.id })
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(market.rides.get(ride.id).await.unwrap().available_seats, 3);
    }

    #[tokio::test]
    async fn test_cancel_cutoff() {
        let (market, _) = market().await;

        let soon = market
            .rides
            .create(DRIVER, create_ride_at(Utc::now() + Duration::minutes(30), 4, 500.0))
            .await
            .unwrap();
        let booking = market.seats.create_booking(PASSENGER, book(soon.id, 1)).await.unwrap();
        let err = market.seats.cancel(booking.id, PASSENGER).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        let later = ride_in(&market, 2).await;
        let booking = market.seats.create_booking(PASSENGER, book(later.id, 2)).await.unwrap();
        market
            .seats
            .accept(DRIVER, AcceptBooking { booking_id: booking.id })
            .await
            .unwrap();
        let cancelled = market.seats.cancel(booking.id, PASSENGER).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(market.rides.get(later.id).await.unwrap().available_seats, 4);
    }

    #[tokio::test]
    async fn test_cancel_requires_owner_and_active_booking() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;
        let booking = market.seats.create_booking(PASSENGER, book(ride.id, 1)).await.unwrap();

        let err = market.seats.cancel(booking.id, 999).await.unwrap_err();
        assert!(matches!(err, CoreError::NotOwner(_)));

        market.seats.cancel(booking.id, PASSENGER).await.unwrap();
        let err = market.seats.cancel(booking.id, PASSENGER).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_fare_is_snapshotted() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;
        let booking = market.seats.create_booking(PASSENGER, book(ride.id, 2)).await.unwrap();
        assert_eq!(booking.fare, 2000.0);

        market
            .rides
            .update_details(ride.id, DRIVER, UpdateRide { fare: Some(5000.0), ..Default::default() })
            .await
            .unwrap();
        let booking = market.seats.booking(booking.id, DRIVER).await.unwrap();
        assert_eq!(booking.fare, 2000.0);
    }

    #[tokio::test]
    async fn test_eligibility_preview() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;

        let verdict = market
            .seats
            .check_eligibility(PASSENGER, CheckEligibility { ride_id: ride.id, seats_needed: 2 })
            .await
            .unwrap();
        assert!(verdict.eligible);
        assert_eq!(verdict.quote.unwrap().total, 2000.0);

        let verdict = market
            .seats
            .check_eligibility(PASSENGER, CheckEligibility { ride_id: ride.id, seats_needed: 5 })
            .await
            .unwrap();
        assert!(!verdict.eligible);
        assert_eq!(verdict.reason.as_deref(), Some("Only 4 seat(s) available, you need 5"));

        // Preview never reserves anything.
        assert_eq!(market.rides.get(ride.id).await.unwrap().available_seats, 4);
    }

    #[tokio::test]
    async fn test_views_and_stats() {
        let (market, _) = market().await;
        let ride = ride_in(&market, 24).await;
        let first = market.seats.create_booking(PASSENGER, book(ride.id, 1)).await.unwrap();
        market.seats.create_booking(201, book(ride.id, 1)).await.unwrap();
        market
            .seats
            .accept(DRIVER, AcceptBooking { booking_id: first.id })
            .await
            .unwrap();

        let err = market.seats.booking(first.id, 201).await.unwrap_err();
        assert!(matches!(err, CoreError::NotOwner(_)));

        assert_eq!(market.seats.pending_for_driver(DRIVER).await.unwrap().len(), 1);
        assert_eq!(market.seats.ride_bookings(ride.id, DRIVER).await.unwrap().len(), 2);
        assert!(market.seats.ride_bookings(ride.id, PASSENGER).await.is_err());

        let stats = market.seats.driver_stats(DRIVER).await.unwrap();
        assert_eq!((stats.total, stats.pending, stats.confirmed), (2, 1, 1));

        let stats = market.seats.passenger_stats(PASSENGER).await.unwrap();
        assert_eq!((stats.total, stats.confirmed), (1, 1));
    }
}
