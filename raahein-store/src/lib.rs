pub mod app_config;
pub mod database;
pub mod error;
pub mod memory;
pub mod pg_store;
pub mod queries;
pub mod redis_repo;
mod rows;

pub use database::DbClient;
pub use error::db_err;
pub use memory::MemoryStore;
pub use pg_store::PgMarketStore;
pub use redis_repo::RateLimiter;
