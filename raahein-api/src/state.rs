use std::sync::Arc;

use raahein_engine::Market;
use raahein_store::RateLimiter;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub market: Arc<Market>,
    pub auth: AuthConfig,
    /// `None` when no Redis is configured; requests are then never throttled.
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn new(market: Arc<Market>, jwt_secret: impl Into<String>) -> Self {
        Self {
            market,
            auth: AuthConfig { secret: jwt_secret.into() },
            rate_limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }
}
