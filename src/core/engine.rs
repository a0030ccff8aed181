//! Per-pool facade over the create, fetch, delete, list, and reclaim cycles.

use std::sync::Arc;

use crate::config::PoolConfig;
use crate::core::backend::{AllocationRecordStore, ProvisioningClient, SessionExchanger};
use crate::core::deleter::{DeleteFilter, DeleteReport, PoolDeleter};
use crate::core::error::{PlannerError, PoolError};
use crate::core::executor::SetupJob;
use crate::core::lease::{BatchLease, Lease, PoolLeaseFetcher};
use crate::core::lister::{PoolLister, PoolListing};
use crate::core::planner::{plan_allocation, AllocationPlan};
use crate::core::provisioner::ResourceProvisioner;
use crate::core::reclaimer::{OrphanReclaimer, ReclaimReport};
use crate::core::record::CreateRunSummary;
use crate::core::report::{build_run_event, SharedReporter};
use crate::core::retry::RetryPolicy;

/// External collaborators shared by every pool of a process.
#[derive(Clone)]
pub struct PoolBackends {
    /// Provisioning platform.
    pub client: Arc<dyn ProvisioningClient>,
    /// Allocation record store.
    pub store: Arc<dyn AllocationRecordStore>,
    /// Post-provisioning job.
    pub setup: Arc<dyn SetupJob>,
    /// Credential to session exchange.
    pub sessions: Arc<dyn SessionExchanger>,
    /// Run reporter.
    pub reporter: SharedReporter,
}

/// Lifecycle engine bound to one pool.
///
/// The cycles share nothing but the backends, so they may run concurrently
/// against the same store.
pub struct PoolEngine {
    pool: PoolConfig,
    client: Arc<dyn ProvisioningClient>,
    reporter: SharedReporter,
    provisioner: ResourceProvisioner,
    fetcher: PoolLeaseFetcher,
    deleter: Arc<PoolDeleter>,
    reclaimer: OrphanReclaimer,
    lister: PoolLister,
}

impl PoolEngine {
    /// Wire an engine for `pool`. `identity` owns the records this engine creates.
    pub fn new(pool: PoolConfig, identity: &str, backends: &PoolBackends) -> Self {
        let retry = RetryPolicy::from_config(&pool.retry);
        let deleter = Arc::new(PoolDeleter::new(
            Arc::clone(&backends.client),
            Arc::clone(&backends.store),
            Arc::clone(&backends.reporter),
            identity,
        ));
        Self {
            provisioner: ResourceProvisioner::new(
                Arc::clone(&backends.client),
                Arc::clone(&backends.store),
                Arc::clone(&backends.setup),
                Arc::clone(&backends.reporter),
                identity,
            ),
            fetcher: PoolLeaseFetcher::new(
                Arc::clone(&backends.store),
                Arc::clone(&backends.sessions),
                Arc::clone(&backends.reporter),
                retry,
            ),
            reclaimer: OrphanReclaimer::new(
                Arc::clone(&backends.client),
                Arc::clone(&backends.store),
                Arc::clone(&deleter),
                Arc::clone(&backends.reporter),
            ),
            lister: PoolLister::new(Arc::clone(&backends.store)),
            deleter,
            client: Arc::clone(&backends.client),
            reporter: Arc::clone(&backends.reporter),
            pool,
        }
    }

    /// Pool configuration.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.pool
    }

    /// Pool tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.pool.tag
    }

    /// Query quota and active count, then plan. Query failures abort with
    /// [`PlannerError::QuotaUnavailable`].
    pub async fn plan(&self) -> Result<AllocationPlan, PlannerError> {
        let quota = self
            .client
            .query_quota()
            .await
            .map_err(|e| PlannerError::QuotaUnavailable(e.to_string()))?;
        let active = self
            .client
            .query_active_count_by_tag(&self.pool.tag)
            .await
            .map_err(|e| PlannerError::QuotaUnavailable(e.to_string()))?;
        let plan = plan_allocation(self.pool.max_allocation, active, quota.remaining);
        tracing::info!(
            tag = %self.pool.tag,
            max_allocation = self.pool.max_allocation,
            active,
            remaining_quota = quota.remaining,
            used_quota = quota.used,
            to_allocate = plan.to_allocate(),
            "allocation planned"
        );
        Ok(plan)
    }

    /// Run one create cycle.
    ///
    /// Planner errors (quota query failure, at capacity, no quota) abort the
    /// cycle before any resource is requested; a zero summary is still
    /// reported. Otherwise the provisioner's summary is returned, including
    /// per-resource failures.
    pub async fn create(&self) -> Result<CreateRunSummary, PoolError> {
        let planned = self
            .plan()
            .await
            .and_then(|plan| plan.into_result(&self.pool.tag));
        let to_allocate = match planned {
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(tag = %self.pool.tag, error = %err, "create cycle skipped");
                self.reporter.record(build_run_event(
                    &self.pool.tag,
                    "batch",
                    "create_skipped",
                    Some(format!("requested=0 allocated=0 failed=0 reason={err}")),
                ));
                return Err(err.into());
            }
        };
        Ok(self.provisioner.provision(&self.pool, to_allocate).await)
    }

    /// Lease one resource with compare-and-swap safety.
    pub async fn fetch(&self) -> Result<Lease, PoolError> {
        self.fetcher.fetch(&self.pool.tag).await
    }

    /// Lease up to `limit` resources (all when `None`) without per-record locking.
    pub async fn fetch_batch(&self, limit: Option<usize>) -> Result<BatchLease, PoolError> {
        self.fetcher.fetch_batch(&self.pool.tag, limit).await
    }

    /// Delete records selected by `filter`.
    pub async fn delete(&self, filter: DeleteFilter) -> Result<DeleteReport, PoolError> {
        self.deleter.delete(&self.pool.tag, filter).await
    }

    /// List the pool.
    pub async fn list(&self, all: bool) -> Result<PoolListing, PoolError> {
        self.lister.list(&self.pool.tag, all).await
    }

    /// Run one reconciliation pass.
    pub async fn reclaim(&self) -> Result<ReclaimReport, PoolError> {
        self.reclaimer.reclaim(&self.pool.tag).await
    }
}
