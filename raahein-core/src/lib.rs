pub mod booking;
pub mod commands;
pub mod driver;
pub mod repository;
pub mod request;
pub mod review;
pub mod ride;
pub mod rules;
pub mod schedule;
pub mod search;

pub use booking::{Booking, BookingStats, BookingStatus, NewBooking};
pub use driver::{DriverProfile, VerificationStatus};
pub use repository::{MarketStore, MarketTx};
pub use request::{NewRideRequest, RideRequest, RideRequestStatus};
pub use review::{CompletedBookingGate, ReviewGate};
pub use ride::{NewRide, Ride, RidePatch, RideStatus};

pub type UserId = i64;
pub type RideId = i64;
pub type BookingId = i64;
pub type RequestId = i64;

/// Failures surfaced by the marketplace core.
///
/// Only `Conflict` is safe to retry unchanged; every other variant needs a
/// different request.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Not the owner: {0}")]
    NotOwner(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not eligible: {0}")]
    NotEligible(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        CoreError::NotFound { entity, id }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(CoreError::Conflict("seats gone".into()).is_retryable());
        assert!(!CoreError::not_found("Ride", 7).is_retryable());
        assert!(!CoreError::InvalidState("started".into()).is_retryable());
        assert!(!CoreError::Storage("io".into()).is_retryable());
    }

    #[test]
    fn test_not_found_message_names_entity() {
        assert_eq!(CoreError::not_found("Booking", 42).to_string(), "Booking 42 not found");
    }
}
