//! Post-provisioning setup job abstraction.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::PoolConfig;
use crate::core::record::ProvisionedResource;

/// What a setup job reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupReport {
    /// Whether the resource is ready for the pool.
    pub succeeded: bool,
    /// Time the job took.
    pub elapsed: Duration,
    /// Failure (or informational) message.
    pub message: Option<String>,
}

impl SetupReport {
    /// Successful run.
    #[must_use]
    pub const fn success(elapsed: Duration) -> Self {
        Self {
            succeeded: true,
            elapsed,
            message: None,
        }
    }

    /// Failed run with a reason.
    #[must_use]
    pub fn failure(elapsed: Duration, message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            elapsed,
            message: Some(message.into()),
        }
    }
}

/// Caller-supplied job run against every freshly created resource before it
/// joins the pool.
///
/// The job is opaque to the engine: it may install packages, seed data, or do
/// nothing. Its cost is unrelated to creation cost, so the provisioner runs it
/// under its own concurrency bound.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_env_pool::core::{SetupJob, SetupReport, ProvisionedResource};
/// use prometheus_env_pool::config::PoolConfig;
///
/// struct SeedData;
///
/// #[async_trait]
/// impl SetupJob for SeedData {
///     async fn run(&self, resource: &ProvisionedResource, _pool: &PoolConfig) -> SetupReport {
///         let started = std::time::Instant::now();
///         match seed(&resource.login_endpoint).await {
///             Ok(()) => SetupReport::success(started.elapsed()),
///             Err(e) => SetupReport::failure(started.elapsed(), e.to_string()),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait SetupJob: Send + Sync {
    /// Prepare `resource` for use. Must not panic; failures are reported.
    async fn run(&self, resource: &ProvisionedResource, pool: &PoolConfig) -> SetupReport;
}

/// Setup job for pools that need no preparation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSetup;

#[async_trait]
impl SetupJob for NoopSetup {
    async fn run(&self, _resource: &ProvisionedResource, _pool: &PoolConfig) -> SetupReport {
        SetupReport::success(Duration::ZERO)
    }
}
