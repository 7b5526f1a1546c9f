use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{schedule, CoreError, RideId, UserId};

/// Ride status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Scheduled,
    Started,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// Every legal (from, to) pair. Anything absent is rejected.
    const TRANSITIONS: &'static [(RideStatus, RideStatus)] = &[
        (RideStatus::Scheduled, RideStatus::Started),
        (RideStatus::Started, RideStatus::Completed),
        (RideStatus::Scheduled, RideStatus::Cancelled),
    ];

    pub fn can_transition_to(self, target: RideStatus) -> bool {
        Self::TRANSITIONS
            .iter()
            .any(|&(from, to)| from == self && to == target)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RideStatus::Scheduled => "SCHEDULED",
            RideStatus::Started => "STARTED",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(RideStatus::Scheduled),
            "STARTED" => Ok(RideStatus::Started),
            "COMPLETED" => Ok(RideStatus::Completed),
            "CANCELLED" => Ok(RideStatus::Cancelled),
            other => Err(CoreError::InvalidInput(format!("Unknown ride status: {other}"))),
        }
    }
}

/// A driver-posted trip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: RideId,
    pub driver_id: UserId,
    #[serde(rename = "from")]
    pub origin: String,
    #[serde(rename = "to")]
    pub destination: String,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub available_seats: i32,
    pub total_seats: i32,
    pub fare: f64,
    pub status: RideStatus,
    pub is_suspicious: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn departs_at(&self) -> DateTime<Utc> {
        schedule::combine(self.departure_date, self.departure_time)
    }

    pub fn has_departed(&self, now: DateTime<Utc>) -> bool {
        self.departs_at() < now
    }

    /// Fare owed for `seats` at the ride's current per-seat fare.
    pub fn fare_for(&self, seats: i32) -> f64 {
        self.fare * f64::from(seats)
    }

    pub fn is_driven_by(&self, user_id: UserId) -> bool {
        self.driver_id == user_id
    }
}

/// Insert shape for a ride; the store assigns id, status and timestamps.
#[derive(Debug, Clone)]
pub struct NewRide {
    pub driver_id: UserId,
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub available_seats: i32,
    pub total_seats: i32,
    pub fare: f64,
}

/// Driver-editable ride details. Seat changes are applied separately as a
/// guarded delta, never by overwriting the counter.
#[derive(Debug, Clone, Default)]
pub struct RidePatch {
    pub departure_date: Option<NaiveDate>,
    pub departure_time: Option<NaiveTime>,
    pub available_seats: Option<i32>,
    pub fare: Option<f64>,
}

impl RidePatch {
    pub fn is_empty(&self) -> bool {
        self.departure_date.is_none()
            && self.departure_time.is_none()
            && self.available_seats.is_none()
            && self.fare.is_none()
    }

    /// Apply the schedule and fare fields.
    pub fn apply_details(&self, ride: &mut Ride) {
        if let Some(date) = self.departure_date {
            ride.departure_date = date;
        }
        if let Some(time) = self.departure_time {
            ride.departure_time = time;
        }
        if let Some(fare) = self.fare {
            ride.fare = fare;
        }
    }
}
