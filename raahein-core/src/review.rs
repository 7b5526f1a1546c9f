use crate::{Booking, BookingStatus, CoreError, CoreResult, UserId};

/// Decides whether a review may be written against a booking.
///
/// Review storage and rating aggregation live outside this crate.
pub trait ReviewGate: Send + Sync {
    fn permits_review(
        &self,
        booking: &Booking,
        reviewer_id: UserId,
        already_reviewed: bool,
    ) -> CoreResult<()>;
}

/// One review, by the passenger, once the booking is completed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletedBookingGate;

impl ReviewGate for CompletedBookingGate {
    fn permits_review(
        &self,
        booking: &Booking,
        reviewer_id: UserId,
        already_reviewed: bool,
    ) -> CoreResult<()> {
        if booking.passenger_id != reviewer_id {
            return Err(CoreError::NotOwner("Only the passenger can review this booking".into()));
        }
        if booking.status != BookingStatus::Completed {
            return Err(CoreError::InvalidState(format!(
                "Booking is {} and cannot be reviewed yet",
                booking.status
            )));
        }
        if already_reviewed {
            return Err(CoreError::Conflict("Booking has already been reviewed".into()));
        }
        Ok(())
    }
}
