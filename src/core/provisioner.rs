//! Concurrency-bounded batch provisioning with per-resource setup.
//!
//! A create run moves every requested resource through four stages:
//!
//! 1. **create** under the provisioning limiter (`batch_size` in flight),
//! 2. **stale check** against the platform's status query,
//! 3. **record** as `InProgress` in the store (retried, batch then per record),
//! 4. **setup + commit** under the separate setup limiter, ending in `Available`.
//!
//! A resource that fails any stage is deleted best effort, its record (if any)
//! is marked `Deleted`, and the failure is kept in the run summary. Nothing in
//! this module aborts the batch.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use uuid::Uuid;

use crate::config::PoolConfig;
use crate::core::backend::{AllocationRecordStore, LiveState, ProvisioningClient, ResourceSpec};
use crate::core::error::SetupExecutionError;
use crate::core::executor::SetupJob;
use crate::core::outcome::ConcurrencyLimiter;
use crate::core::record::{
    AllocationRecord, AllocationStatus, CreateRunSummary, FailureStage, ProvisionedResource,
    RecordFilter, ResourceFailure,
};
use crate::core::report::{build_run_event, SharedReporter};
use crate::core::retry::RetryPolicy;
use crate::util::clock::{expiry_after_days, now_ms};

/// Creates resources, runs the setup job, and commits survivors to the pool.
pub struct ResourceProvisioner {
    client: Arc<dyn ProvisioningClient>,
    store: Arc<dyn AllocationRecordStore>,
    setup: Arc<dyn SetupJob>,
    reporter: SharedReporter,
    identity: String,
}

impl ResourceProvisioner {
    /// Create a provisioner from its collaborators. `identity` is stamped as
    /// the owner of every record it writes.
    pub fn new(
        client: Arc<dyn ProvisioningClient>,
        store: Arc<dyn AllocationRecordStore>,
        setup: Arc<dyn SetupJob>,
        reporter: SharedReporter,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            setup,
            reporter,
            identity: identity.into(),
        }
    }

    /// Provision `to_allocate` resources for `pool`.
    ///
    /// Always returns a summary; per-resource failures are collected in it.
    pub async fn provision(&self, pool: &PoolConfig, to_allocate: u32) -> CreateRunSummary {
        let mut summary = CreateRunSummary {
            requested: to_allocate,
            ..CreateRunSummary::empty()
        };
        if to_allocate == 0 {
            return summary;
        }

        let provision_limiter = ConcurrencyLimiter::new(pool.batch_size as usize);
        let setup_limiter = ConcurrencyLimiter::new(pool.setup_concurrency);
        let retry = RetryPolicy::from_config(&pool.retry);

        tracing::info!(
            tag = %pool.tag,
            to_allocate,
            provision_concurrency = provision_limiter.permits(),
            setup_concurrency = setup_limiter.permits(),
            "provisioning batch"
        );

        let (created, failed) = provision_limiter
            .settle_all((0..to_allocate).map(|_| self.create_one(pool)))
            .await
            .partition();
        summary.failures.extend(failed);

        let live = self.drop_stale(pool, created, &mut summary.failures).await;
        let pending = self
            .record_in_progress(pool, live, &retry, &mut summary.failures)
            .await;

        let (committed, failed) = setup_limiter
            .settle_all(pending.into_iter().map(|(resource, record)| {
                self.setup_and_commit(pool, resource, record, &retry)
            }))
            .await
            .partition();
        summary.failures.extend(failed);

        summary.allocated = u32::try_from(committed.len()).unwrap_or(u32::MAX);
        summary.failed = summary.requested.saturating_sub(summary.allocated);

        self.reporter.record(build_run_event(
            &pool.tag,
            "batch",
            "create_completed",
            Some(format!(
                "requested={} allocated={} failed={}",
                summary.requested, summary.allocated, summary.failed
            )),
        ));
        tracing::info!(
            tag = %pool.tag,
            requested = summary.requested,
            allocated = summary.allocated,
            failed = summary.failed,
            "provisioning batch finished"
        );
        summary
    }

    async fn create_one(&self, pool: &PoolConfig) -> Result<ProvisionedResource, ResourceFailure> {
        let alias = format!("{}-{}", pool.tag, &Uuid::new_v4().simple().to_string()[..8]);
        let spec = ResourceSpec {
            alias: alias.clone(),
            pool_tag: pool.tag.clone(),
            resource_spec_ref: pool.resource_spec_ref.clone(),
            snapshot_source_tag: pool.snapshot_source_tag.clone(),
            expiry_days: pool.expiry_days,
        };

        let started = Instant::now();
        match self.client.create(&spec).await {
            Ok(created) => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::debug!(tag = %pool.tag, resource = %alias, elapsed_ms, "resource created");
                self.reporter.record(build_run_event(
                    &pool.tag,
                    &alias,
                    "provisioned",
                    Some(created.external_resource_id.clone()),
                ));
                Ok(ProvisionedResource {
                    alias,
                    external_resource_id: created.external_resource_id,
                    login_endpoint: created.login_endpoint,
                    signup_identity: created.signup_identity,
                    credential_secret: created.credential_handle,
                    elapsed_ms,
                    setup_succeeded: false,
                    failure_message: None,
                })
            }
            Err(err) => {
                tracing::warn!(
                    tag = %pool.tag,
                    resource = %alias,
                    error = %err,
                    "resource creation failed"
                );
                self.reporter.record(build_run_event(
                    &pool.tag,
                    &alias,
                    "provision_failed",
                    Some(err.to_string()),
                ));
                Err(ResourceFailure {
                    alias,
                    stage: FailureStage::Provision,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Drop resources the platform already reports as unusable. If the status
    /// query itself fails every resource is kept.
    async fn drop_stale(
        &self,
        pool: &PoolConfig,
        created: Vec<ProvisionedResource>,
        failures: &mut Vec<ResourceFailure>,
    ) -> Vec<ProvisionedResource> {
        if created.is_empty() {
            return created;
        }
        let ids: Vec<String> = created
            .iter()
            .map(|r| r.external_resource_id.clone())
            .collect();
        let states = match self.client.query_status(&ids).await {
            Ok(states) => states,
            Err(err) => {
                tracing::warn!(
                    tag = %pool.tag,
                    error = %err,
                    "status query failed, keeping all created resources"
                );
                return created;
            }
        };

        let mut live = Vec::with_capacity(created.len());
        let mut stale_ids = Vec::new();
        for (i, resource) in created.into_iter().enumerate() {
            if states.get(i).copied() == Some(LiveState::Active) {
                live.push(resource);
            } else {
                tracing::warn!(
                    tag = %pool.tag,
                    resource = %resource.alias,
                    "created resource reported inactive"
                );
                stale_ids.push(resource.external_resource_id.clone());
                failures.push(ResourceFailure {
                    alias: resource.alias,
                    stage: FailureStage::Stale,
                    reason: "platform reports resource inactive after create".into(),
                });
            }
        }
        if !stale_ids.is_empty() {
            self.delete_resources(pool, &stale_ids).await;
        }
        live
    }

    /// Write an `InProgress` record for each resource. A failed batch write
    /// falls back to one write per record so a single bad record does not
    /// take the others down with it.
    async fn record_in_progress(
        &self,
        pool: &PoolConfig,
        resources: Vec<ProvisionedResource>,
        retry: &RetryPolicy,
        failures: &mut Vec<ResourceFailure>,
    ) -> Vec<(ProvisionedResource, AllocationRecord)> {
        if resources.is_empty() {
            return Vec::new();
        }
        let expires_at_ms = expiry_after_days(now_ms(), pool.expiry_days);
        let records: Vec<AllocationRecord> = resources
            .iter()
            .map(|r| AllocationRecord::in_progress(r, &pool.tag, &self.identity, expires_at_ms))
            .collect();

        let store = &self.store;
        let batch = {
            let records = &records;
            retry
                .run("create_in_progress", move || store.create(records))
                .await
        };

        let written: Vec<Result<String, String>> = match batch {
            Ok(ids) if ids.len() == records.len() => ids.into_iter().map(Ok).collect(),
            Ok(ids) => {
                tracing::warn!(
                    tag = %pool.tag,
                    expected = records.len(),
                    got = ids.len(),
                    "batch write returned wrong id count, writing records individually"
                );
                self.write_each(&records, retry).await
            }
            Err(err) => {
                tracing::warn!(
                    tag = %pool.tag,
                    error = %err,
                    "batch write failed, writing records individually"
                );
                self.write_each(&records, retry).await
            }
        };

        let mut pending = Vec::with_capacity(resources.len());
        let mut orphaned = Vec::new();
        for ((resource, mut record), result) in resources.into_iter().zip(records).zip(written) {
            match result {
                Ok(id) => {
                    record.id = id;
                    pending.push((resource, record));
                }
                Err(reason) => {
                    tracing::error!(
                        tag = %pool.tag,
                        resource = %resource.alias,
                        error = %reason,
                        "record write exhausted retries"
                    );
                    self.reporter.record(build_run_event(
                        &pool.tag,
                        &resource.alias,
                        "store_write_failed",
                        Some(reason.clone()),
                    ));
                    orphaned.push(resource.external_resource_id.clone());
                    failures.push(ResourceFailure {
                        alias: resource.alias,
                        stage: FailureStage::StoreWrite,
                        reason,
                    });
                }
            }
        }
        if !orphaned.is_empty() {
            self.delete_resources(pool, &orphaned).await;
        }
        pending
    }

    async fn write_each(
        &self,
        records: &[AllocationRecord],
        retry: &RetryPolicy,
    ) -> Vec<Result<String, String>> {
        let store = &self.store;
        join_all(records.iter().map(|record| async move {
            let single = std::slice::from_ref(record);
            match retry.run("create_in_progress_single", move || store.create(single)).await {
                Ok(ids) => ids
                    .into_iter()
                    .next()
                    .ok_or_else(|| "store returned no id".to_string()),
                Err(err) => Err(err.to_string()),
            }
        }))
        .await
    }

    async fn setup_and_commit(
        &self,
        pool: &PoolConfig,
        mut resource: ProvisionedResource,
        record: AllocationRecord,
        retry: &RetryPolicy,
    ) -> Result<AllocationRecord, ResourceFailure> {
        let report = self.setup.run(&resource, pool).await;
        resource.setup_succeeded = report.succeeded;
        resource.failure_message.clone_from(&report.message);

        if !resource.setup_succeeded {
            let err = SetupExecutionError {
                alias: resource.alias.clone(),
                reason: resource
                    .failure_message
                    .unwrap_or_else(|| "setup job reported failure".into()),
            };
            tracing::warn!(
                tag = %pool.tag,
                resource = %resource.alias,
                elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "setup failed, discarding resource"
            );
            return Err(self
                .discard(pool, &record, FailureStage::Setup, err.to_string(), retry)
                .await);
        }

        // Single attempt: a transient error may hide a write that landed, and a
        // retry would then see `Ok(false)`. Ambiguous outcomes are re-read.
        let failed = match self
            .store
            .compare_and_swap(
                &record.id,
                AllocationStatus::InProgress,
                AllocationStatus::Available,
            )
            .await
        {
            Ok(true) => None,
            Ok(false) => Some("record left InProgress concurrently".to_string()),
            Err(err) => Some(err.to_string()),
        };
        if let Some(reason) = failed {
            if self.stored_status(&pool.tag, &record.id, retry).await
                != Some(AllocationStatus::Available)
            {
                return Err(self
                    .discard(pool, &record, FailureStage::Commit, reason, retry)
                    .await);
            }
            tracing::debug!(
                tag = %pool.tag,
                resource = %resource.alias,
                error = %reason,
                "promotion landed despite error"
            );
        }

        tracing::info!(tag = %pool.tag, resource = %resource.alias, "resource available");
        self.reporter.record(build_run_event(
            &pool.tag,
            &resource.alias,
            "available",
            None,
        ));
        let mut committed = record;
        committed.status = AllocationStatus::Available;
        Ok(committed)
    }

    /// Current status of record `id`, or `None` when it cannot be read.
    async fn stored_status(
        &self,
        tag: &str,
        id: &str,
        retry: &RetryPolicy,
    ) -> Option<AllocationStatus> {
        let store = &self.store;
        let filter = RecordFilter::for_tag(tag).with_id(id);
        let filter = &filter;
        match retry.run("read_back", move || store.query(filter)).await {
            Ok(found) => found.first().map(|r| r.status),
            Err(err) => {
                tracing::warn!(tag, id, error = %err, "could not re-read record");
                None
            }
        }
    }

    /// Delete the resource behind `record` and mark the record `Deleted`.
    async fn discard(
        &self,
        pool: &PoolConfig,
        record: &AllocationRecord,
        stage: FailureStage,
        reason: String,
        retry: &RetryPolicy,
    ) -> ResourceFailure {
        self.delete_resources(pool, std::slice::from_ref(&record.external_resource_id))
            .await;

        let store = &self.store;
        let id = record.id.as_str();
        let marked = retry
            .run("mark_deleted", move || {
                store.compare_and_swap(id, AllocationStatus::InProgress, AllocationStatus::Deleted)
            })
            .await;
        match marked {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    tag = %pool.tag,
                    resource = %record.alias,
                    "record no longer InProgress, left for reclaim"
                );
            }
            Err(err) => {
                tracing::error!(
                    tag = %pool.tag,
                    resource = %record.alias,
                    error = %err,
                    "could not mark discarded record deleted"
                );
            }
        }

        self.reporter.record(build_run_event(
            &pool.tag,
            &record.alias,
            "discarded",
            Some(reason.clone()),
        ));
        ResourceFailure {
            alias: record.alias.clone(),
            stage,
            reason,
        }
    }

    async fn delete_resources(&self, pool: &PoolConfig, ids: &[String]) {
        if let Err(err) = self.client.delete(ids).await {
            tracing::error!(
                tag = %pool.tag,
                count = ids.len(),
                error = %err,
                "best-effort delete failed"
            );
        }
    }
}
