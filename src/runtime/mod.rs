//! Command surface used by schedulers and operator tooling.

pub mod api;

pub use api::{dispatch, execute, exit_code, CommandResponse, PoolCommand};
