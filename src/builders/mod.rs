//! Builders to construct pool engines from configuration.

pub mod pool_builder;

pub use pool_builder::{build_engines, PoolEngineBuilder};
