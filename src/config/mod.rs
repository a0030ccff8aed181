//! Configuration models for pools, concurrency, and retries.

pub mod pool;

pub use pool::{PoolConfig, PoolsConfig, RetryConfig};
