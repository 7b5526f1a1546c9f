use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{CoreError, RequestId, UserId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideRequestStatus {
    Active,
    Fulfilled,
    Cancelled,
    Expired,
}

impl RideRequestStatus {
    /// Only ACTIVE requests move, and only into one of the terminal states.
    pub fn can_transition_to(self, target: RideRequestStatus) -> bool {
        self == RideRequestStatus::Active && target != RideRequestStatus::Active
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RideRequestStatus::Active => "ACTIVE",
            RideRequestStatus::Fulfilled => "FULFILLED",
            RideRequestStatus::Cancelled => "CANCELLED",
            RideRequestStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for RideRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideRequestStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(RideRequestStatus::Active),
            "FULFILLED" => Ok(RideRequestStatus::Fulfilled),
            "CANCELLED" => Ok(RideRequestStatus::Cancelled),
            "EXPIRED" => Ok(RideRequestStatus::Expired),
            other => Err(CoreError::InvalidInput(format!("Unknown ride request status: {other}"))),
        }
    }
}

/// A passenger's open ask for a ride on a route and time window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RideRequest {
    pub id: RequestId,
    pub passenger_id: UserId,
    #[serde(rename = "from")]
    pub origin: String,
    #[serde(rename = "to")]
    pub destination: String,
    pub earliest_date: NaiveDate,
    /// Window start, already combined with `earliest_date`.
    pub earliest_time: DateTime<Utc>,
    /// Window end on the same date.
    pub latest_time: DateTime<Utc>,
    pub seats_needed: i32,
    pub offer_per_seat: Option<f64>,
    pub status: RideRequestStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RideRequest {
    /// True when the sweep should move this request to EXPIRED.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == RideRequestStatus::Active && self.expires_at < now
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.passenger_id == user_id
    }
}

#[derive(Debug, Clone)]
pub struct NewRideRequest {
    pub passenger_id: UserId,
    pub origin: String,
    pub destination: String,
    pub earliest_date: NaiveDate,
    pub earliest_time: DateTime<Utc>,
    pub latest_time: DateTime<Utc>,
    pub seats_needed: i32,
    pub offer_per_seat: Option<f64>,
    pub expires_at: DateTime<Utc>,
}
