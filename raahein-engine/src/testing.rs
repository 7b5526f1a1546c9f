use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use raahein_core::commands::CreateRide;
use raahein_core::{DriverProfile, Ride, UserId, VerificationStatus};
use raahein_store::MemoryStore;

use crate::{Market, MarketPolicy};

pub const DRIVER: UserId = 100;
pub const PASSENGER: UserId = 200;

pub async fn market() -> (Arc<Market>, MemoryStore) {
    let store = MemoryStore::new();
    store
        .register_driver(DriverProfile {
            user_id: DRIVER,
            verification_status: VerificationStatus::Verified,
            vehicle_seats: 4,
        })
        .await;
    let market = Market::new(Arc::new(store.clone()), MarketPolicy::default());
    (Arc::new(market), store)
}

pub fn create_ride_at(departs: DateTime<Utc>, seats: i32, fare: f64) -> CreateRide {
    CreateRide {
        from: "Lahore".into(),
        to: "Islamabad".into(),
        departure_date: departs.date_naive(),
        departure_time: departs.time(),
        available_seats: seats,
        fare,
    }
}

/// A 4-seat ride by [`DRIVER`] leaving `hours` from now.
pub async fn ride_in(market: &Market, hours: i64) -> Ride {
    market
        .rides
        .create(DRIVER, create_ride_at(Utc::now() + Duration::hours(hours), 4, 1000.0))
        .await
        .unwrap()
}
