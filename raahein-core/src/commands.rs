//! Validated command payloads accepted from callers.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use crate::schedule::{self, hhmm};
use crate::{BookingId, CoreError, CoreResult, RideId, RidePatch, RideStatus};

pub const MAX_PLACE_LEN: usize = 100;
pub const MAX_REQUEST_SEATS: i32 = 7;

fn ensure_place(field: &str, value: &str) -> CoreResult<()> {
    let len = value.trim().chars().count();
    if len == 0 || len > MAX_PLACE_LEN {
        return Err(CoreError::InvalidInput(format!(
            "{field} must be between 1 and {MAX_PLACE_LEN} characters"
        )));
    }
    Ok(())
}

fn ensure_positive_seats(field: &str, seats: i32) -> CoreResult<()> {
    if seats < 1 {
        return Err(CoreError::InvalidInput(format!("{field} must be at least 1")));
    }
    Ok(())
}

fn ensure_fare(field: &str, fare: f64) -> CoreResult<()> {
    if !fare.is_finite() || fare < 0.0 {
        return Err(CoreError::InvalidInput(format!("{field} must be a non-negative number")));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBooking {
    pub ride_id: RideId,
    pub seats_booked: i32,
}

impl CreateBooking {
    pub fn validate(&self) -> CoreResult<()> {
        ensure_positive_seats("seatsBooked", self.seats_booked)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckEligibility {
    pub ride_id: RideId,
    pub seats_needed: i32,
}

impl CheckEligibility {
    pub fn validate(&self) -> CoreResult<()> {
        ensure_positive_seats("seatsNeeded", self.seats_needed)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptBooking {
    pub booking_id: BookingId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectBooking {
    pub booking_id: BookingId,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRide {
    pub from: String,
    pub to: String,
    pub departure_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub departure_time: NaiveTime,
    pub available_seats: i32,
    #[serde(default)]
    pub fare: f64,
}

impl CreateRide {
    pub fn validate(&self) -> CoreResult<()> {
        ensure_place("from", &self.from)?;
        ensure_place("to", &self.to)?;
        ensure_positive_seats("availableSeats", self.available_seats)?;
        ensure_fare("fare", self.fare)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRide {
    #[serde(default)]
    pub departure_date: Option<NaiveDate>,
    #[serde(default, with = "hhmm::option")]
    pub departure_time: Option<NaiveTime>,
    #[serde(default)]
    pub available_seats: Option<i32>,
    #[serde(default)]
    pub fare: Option<f64>,
}

impl UpdateRide {
    pub fn into_patch(self) -> CoreResult<RidePatch> {
        if let Some(seats) = self.available_seats {
            ensure_positive_seats("availableSeats", seats)?;
        }
        if let Some(fare) = self.fare {
            ensure_fare("fare", fare)?;
        }
        let patch = RidePatch {
            departure_date: self.departure_date,
            departure_time: self.departure_time,
            available_seats: self.available_seats,
            fare: self.fare,
        };
        if patch.is_empty() {
            return Err(CoreError::InvalidInput("Nothing to update".into()));
        }
        Ok(patch)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRideStatus {
    pub status: RideStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRideRequest {
    pub from: String,
    pub to: String,
    pub earliest_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub earliest_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub latest_time: NaiveTime,
    pub seats_needed: i32,
    #[serde(default)]
    pub offer_per_seat: Option<f64>,
}

/// The request window as two absolute instants on `earliest_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestWindow {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

impl CreateRideRequest {
    pub fn validate(&self, now: DateTime<Utc>) -> CoreResult<RequestWindow> {
        ensure_place("from", &self.from)?;
        ensure_place("to", &self.to)?;
        if !(1..=MAX_REQUEST_SEATS).contains(&self.seats_needed) {
            return Err(CoreError::InvalidInput(format!(
                "seatsNeeded must be between 1 and {MAX_REQUEST_SEATS}"
            )));
        }
        if let Some(offer) = self.offer_per_seat {
            ensure_fare("offerPerSeat", offer)?;
        }

        let earliest = schedule::combine(self.earliest_date, self.earliest_time);
        let latest = schedule::combine(self.earliest_date, self.latest_time);
        if latest <= earliest {
            return Err(CoreError::InvalidInput("Latest time must be after earliest time".into()));
        }
        if earliest < now {
            return Err(CoreError::InvalidInput(
                "Cannot create a ride request for a past time".into(),
            ));
        }
        Ok(RequestWindow { earliest, latest })
    }
}
