//! Pure precondition checks shared by the preview and the transactional paths.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{Booking, CoreError, CoreResult, Ride, RideStatus, UserId};

pub const MAX_REJECTION_REASON: usize = 500;

/// Why a passenger may not book a ride right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingBlock {
    OwnRide,
    NotScheduled(RideStatus),
    Departed,
    InsufficientSeats { available: i32, requested: i32 },
    AlreadyBooked,
}

impl BookingBlock {
    pub fn reason(&self) -> String {
        match self {
            BookingBlock::OwnRide => "You cannot book your own ride".to_string(),
            BookingBlock::NotScheduled(status) => {
                format!("Ride is {status} and no longer accepts bookings")
            }
            BookingBlock::Departed => "Cannot book rides that have already departed".to_string(),
            BookingBlock::InsufficientSeats { available, requested } => {
                format!("Only {available} seat(s) available, you need {requested}")
            }
            BookingBlock::AlreadyBooked => {
                "You already have an active booking for this ride".to_string()
            }
        }
    }

    pub fn into_error(self) -> CoreError {
        let reason = self.reason();
        match self {
            BookingBlock::OwnRide => CoreError::Forbidden(reason),
            BookingBlock::NotScheduled(_) | BookingBlock::Departed => {
                CoreError::InvalidState(reason)
            }
            BookingBlock::InsufficientSeats { .. } | BookingBlock::AlreadyBooked => {
                CoreError::Conflict(reason)
            }
        }
    }
}

/// First condition that blocks `passenger` from booking `seats` on `ride`.
pub fn booking_blocker(
    ride: &Ride,
    passenger: UserId,
    seats: i32,
    existing: Option<&Booking>,
    now: DateTime<Utc>,
) -> Option<BookingBlock> {
    if ride.is_driven_by(passenger) {
        return Some(BookingBlock::OwnRide);
    }
    if ride.status != RideStatus::Scheduled {
        return Some(BookingBlock::NotScheduled(ride.status));
    }
    if ride.has_departed(now) {
        return Some(BookingBlock::Departed);
    }
    if ride.available_seats < seats {
        return Some(BookingBlock::InsufficientSeats {
            available: ride.available_seats,
            requested: seats,
        });
    }
    if existing.is_some_and(|b| b.status.is_active()) {
        return Some(BookingBlock::AlreadyBooked);
    }
    None
}

/// Fare quote returned with an eligible verdict.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FareQuote {
    pub per_seat: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride: Option<Ride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<FareQuote>,
}

impl Eligibility {
    pub fn eligible(ride: Ride, seats: i32) -> Self {
        let quote = FareQuote { per_seat: ride.fare, total: ride.fare_for(seats) };
        Self { eligible: true, reason: None, ride: Some(ride), quote: Some(quote) }
    }

    pub fn blocked(block: &BookingBlock) -> Self {
        Self { eligible: false, reason: Some(block.reason()), ride: None, quote: None }
    }
}

/// Passengers may cancel up to `cutoff` before departure.
pub fn ensure_cancellable(ride: &Ride, now: DateTime<Utc>, cutoff: Duration) -> CoreResult<()> {
    if now > ride.departs_at() - cutoff {
        return Err(CoreError::Conflict(format!(
            "Too late to cancel: bookings close {} minutes before departure",
            cutoff.num_minutes()
        )));
    }
    Ok(())
}

pub fn ensure_rejection_reason(reason: Option<&str>) -> CoreResult<()> {
    match reason {
        Some(r) if r.chars().count() > MAX_REJECTION_REASON => Err(CoreError::InvalidInput(
            format!("Rejection reason must be at most {MAX_REJECTION_REASON} characters"),
        )),
        _ => Ok(()),
    }
}

/// A driver-set seat count must leave room for every seat already held.
pub fn ensure_seat_patch(new_available: i32, held: i32, total: i32) -> CoreResult<()> {
    if new_available < 0 {
        return Err(CoreError::InvalidInput("Available seats cannot be negative".into()));
    }
    // Subtract instead of add so a huge request cannot overflow.
    if new_available > total - held {
        return Err(CoreError::InvalidInput(format!(
            "{new_available} seat(s) plus {held} already booked exceeds the vehicle's {total}"
        )));
    }
    Ok(())
}

pub fn ensure_ride_owner(ride: &Ride, user: UserId) -> CoreResult<()> {
    if !ride.is_driven_by(user) {
        return Err(CoreError::NotOwner(format!("Ride {} belongs to another driver", ride.id)));
    }
    Ok(())
}
