//! # Prometheus Env Pool
//!
//! Maintains pre-provisioned, time-limited environments that consumers lease
//! on demand instead of waiting minutes for one to be created.
//!
//! Each pool is identified by a tag and bounded by a maximum allocation. A
//! scheduler calls the create cycle, consumers call fetch, and a reclaim pass
//! reconciles stored records against the platform's live-resource directory.
//!
//! ## Lifecycle
//!
//! ```text
//! InProgress --> Available --> Assigned
//!     |              |             |
//!     +--------------+-------------+--> Recovered --> Deleted
//!     +--------------+-------------+------------------^
//! ```
//!
//! - **Create**: plan against quota and capacity, provision under a
//!   concurrency bound, run the setup job under a separate bound, and commit
//!   survivors as `Available`. Failed resources are deleted best effort and
//!   reported in the run summary.
//! - **Fetch**: lease one resource with a compare-and-swap, so two concurrent
//!   fetches never receive the same record, or lease a batch with a plain
//!   update (weaker: overlapping batch fetches may both claim a record).
//! - **Reclaim**: flag records whose resource is gone, inactive, or expired
//!   as `Recovered`, then hand them to the deleter.
//! - **Delete / List**: operator cleanup and read-only pool status.
//!
//! ## Backends
//!
//! The engine drives three collaborators through traits in
//! [`core::backend`]: a [`core::ProvisioningClient`], an
//! [`core::AllocationRecordStore`], and a [`core::SessionExchanger`].
//! In-memory implementations live in [`infra`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_env_pool::config::PoolConfig;
//! use prometheus_env_pool::core::{NoopSetup, PoolBackends, PoolEngine, TracingRunReporter};
//! use prometheus_env_pool::infra::{
//!     InMemoryProvisioningClient, InMemoryRecordStore, InMemorySessionExchanger,
//! };
//!
//! let backends = PoolBackends {
//!     client: Arc::new(InMemoryProvisioningClient::new(50)),
//!     store: Arc::new(InMemoryRecordStore::new()),
//!     setup: Arc::new(NoopSetup),
//!     sessions: Arc::new(InMemorySessionExchanger::new()),
//!     reporter: Arc::new(TracingRunReporter),
//! };
//! let engine = PoolEngine::new(
//!     PoolConfig::new("nightly", "scratch-def").with_max_allocation(5),
//!     "ci-runner",
//!     &backends,
//! );
//!
//! let summary = engine.create().await?;
//! let lease = engine.fetch().await?;
//! ```
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Pool lifecycle components and backend abstractions.
pub mod core;
/// Configuration models for pools, retries, and concurrency.
pub mod config;
/// Builders to construct pool engines from configuration.
pub mod builders;
/// In-memory backends for the provisioning platform, record store, and sessions.
pub mod infra;
/// Command surface used by schedulers and operator tooling.
pub mod runtime;
/// Shared utilities.
pub mod util;
