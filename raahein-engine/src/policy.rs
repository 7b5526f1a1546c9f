use chrono::Duration;

/// Tunable business rules.
#[derive(Debug, Clone, Copy)]
pub struct MarketPolicy {
    /// Passengers may not cancel later than this before departure.
    pub cancellation_cutoff: Duration,
    /// How long a ride request stays ACTIVE.
    pub request_ttl: Duration,
}

impl MarketPolicy {
    pub fn new(cancellation_cutoff_minutes: i64, request_ttl_hours: i64) -> Self {
        Self {
            cancellation_cutoff: Duration::minutes(cancellation_cutoff_minutes),
            request_ttl: Duration::hours(request_ttl_hours),
        }
    }
}

impl Default for MarketPolicy {
    fn default() -> Self {
        Self::new(60, 24)
    }
}
