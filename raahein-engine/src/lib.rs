pub mod policy;
pub mod requests;
pub mod rides;
pub mod seats;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use raahein_core::MarketStore;

pub use policy::MarketPolicy;
pub use requests::{RequestBroker, RideMatches};
pub use rides::RideLifecycle;
pub use seats::SeatAllocator;

/// The three marketplace components over one shared store.
pub struct Market {
    pub rides: RideLifecycle,
    pub seats: SeatAllocator,
    pub requests: RequestBroker,
}

impl Market {
    pub fn new(store: Arc<dyn MarketStore>, policy: MarketPolicy) -> Self {
        Self {
            rides: RideLifecycle::new(store.clone()),
            seats: SeatAllocator::new(store.clone(), policy),
            requests: RequestBroker::new(store, policy),
        }
    }
}
