use redis::RedisResult;
use tracing::info;

/// Fixed-window request counter keyed per client.
#[derive(Clone)]
pub struct RateLimiter {
    client: redis::Client,
    limit: i64,
    window_seconds: i64,
}

impl RateLimiter {
    pub fn new(connection_string: &str, limit: i64, window_seconds: i64) -> RedisResult<Self> {
        let client = redis::Client::open(connection_string)?;
        info!("Rate limiter configured: {} requests / {}s", limit, window_seconds);
        Ok(Self { client, limit, window_seconds })
    }

    /// True while `client_key` is within its window budget.
    pub async fn check(&self, client_key: &str) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("rate_limit:{}", client_key);

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .expire(&key, self.window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= self.limit)
    }
}
