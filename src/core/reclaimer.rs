//! Reconciliation of allocation records against the live-resource directory.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::backend::{AllocationRecordStore, LiveResource, LiveState, ProvisioningClient};
use crate::core::deleter::{DeleteReport, PoolDeleter};
use crate::core::error::{PoolError, ReclaimError};
use crate::core::record::{AllocationRecord, AllocationStatus, RecordFilter};
use crate::core::report::{build_run_event, SharedReporter};
use crate::util::clock::now_ms;

/// What one reclaim pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimReport {
    /// Managed records inspected.
    pub scanned: usize,
    /// Records already `Recovered` or `Deleted`, left alone.
    pub skipped: usize,
    /// Aliases moved to `Recovered` and handed to the deleter.
    pub recovered: Vec<String>,
    /// Live resources deleted because their record is gone or already deleted.
    pub live_orphans_deleted: Vec<String>,
    /// Active live resources with no record; possibly mid-creation, left alone.
    pub untracked: Vec<String>,
    /// Per-record failures, retried on the next pass.
    pub errors: Vec<ReclaimError>,
    /// Deleter result for the recovered records.
    pub delete: DeleteReport,
}

/// Flags and removes records and resources that disagree with each other.
pub struct OrphanReclaimer {
    client: Arc<dyn ProvisioningClient>,
    store: Arc<dyn AllocationRecordStore>,
    deleter: Arc<PoolDeleter>,
    reporter: SharedReporter,
}

impl OrphanReclaimer {
    /// Create a reclaimer that hands recovered records to `deleter`.
    pub fn new(
        client: Arc<dyn ProvisioningClient>,
        store: Arc<dyn AllocationRecordStore>,
        deleter: Arc<PoolDeleter>,
        reporter: SharedReporter,
    ) -> Self {
        Self {
            client,
            store,
            deleter,
            reporter,
        }
    }

    /// Run one reconciliation pass for `tag`.
    ///
    /// A record is orphaned when its resource is missing from the live
    /// directory, reported inactive, or past its expiry. Orphans are claimed
    /// with a compare-and-swap to `Recovered`, so concurrent passes never both
    /// delete the same record, and records already `Recovered`/`Deleted` are
    /// skipped. Running twice on unchanged state issues no new delete calls.
    pub async fn reclaim(&self, tag: &str) -> Result<ReclaimReport, PoolError> {
        let records = self
            .store
            .query(&RecordFilter::for_tag(tag).managed())
            .await?;
        let live = self.client.list_live(tag).await?;
        let live_state: HashMap<&str, LiveState> = live
            .iter()
            .map(|r| (r.external_resource_id.as_str(), r.state))
            .collect();
        let now = now_ms();

        let mut report = ReclaimReport {
            scanned: records.len(),
            ..ReclaimReport::default()
        };
        let mut recovered: Vec<AllocationRecord> = Vec::new();

        for record in &records {
            if record.status.is_settled() {
                report.skipped += 1;
                continue;
            }
            let Some(reason) = orphan_reason(record, &live_state, now) else {
                continue;
            };

            match self
                .store
                .compare_and_swap(&record.id, record.status, AllocationStatus::Recovered)
                .await
            {
                Ok(true) => {
                    tracing::info!(tag, resource = %record.alias, reason, "record recovered");
                    self.reporter.record(build_run_event(
                        tag,
                        &record.alias,
                        "recovered",
                        Some(reason.to_string()),
                    ));
                    let mut flagged = record.clone();
                    flagged.status = AllocationStatus::Recovered;
                    report.recovered.push(flagged.alias.clone());
                    recovered.push(flagged);
                }
                Ok(false) => {
                    tracing::debug!(
                        tag,
                        resource = %record.alias,
                        "record changed during reclaim, skipping"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        tag,
                        resource = %record.alias,
                        error = %err,
                        "could not flag orphaned record"
                    );
                    report.errors.push(ReclaimError {
                        resource: record.external_resource_id.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        report.delete = self.deleter.delete_records(tag, recovered).await;

        self.delete_live_orphans(tag, &records, &live, &mut report).await;

        tracing::info!(
            tag,
            scanned = report.scanned,
            recovered = report.recovered.len(),
            live_orphans = report.live_orphans_deleted.len(),
            errors = report.errors.len(),
            "reclaim finished"
        );
        Ok(report)
    }

    /// Delete live resources whose record is deleted (ghosts left by a failed
    /// platform delete) or that have no record and are inactive.
    async fn delete_live_orphans(
        &self,
        tag: &str,
        records: &[AllocationRecord],
        live: &[LiveResource],
        report: &mut ReclaimReport,
    ) {
        let tracked: HashMap<&str, AllocationStatus> = records
            .iter()
            .map(|r| (r.external_resource_id.as_str(), r.status))
            .collect();

        let mut ghosts = Vec::new();
        for resource in live {
            let id = resource.external_resource_id.as_str();
            match tracked.get(id) {
                Some(AllocationStatus::Deleted) => ghosts.push(id.to_string()),
                Some(_) => {}
                None if resource.state == LiveState::Inactive => ghosts.push(id.to_string()),
                None => report.untracked.push(id.to_string()),
            }
        }
        if ghosts.is_empty() {
            return;
        }

        match self.client.delete(&ghosts).await {
            Ok(()) => {
                for id in &ghosts {
                    self.reporter
                        .record(build_run_event(tag, id, "live_orphan_deleted", None));
                }
                report.live_orphans_deleted = ghosts;
            }
            Err(err) => {
                tracing::warn!(
                    tag,
                    count = ghosts.len(),
                    error = %err,
                    "could not delete live orphans"
                );
                report
                    .errors
                    .extend(ghosts.into_iter().map(|resource| ReclaimError {
                        resource,
                        reason: err.to_string(),
                    }));
            }
        }
    }
}

fn orphan_reason(
    record: &AllocationRecord,
    live: &HashMap<&str, LiveState>,
    now_ms: u128,
) -> Option<&'static str> {
    match live.get(record.external_resource_id.as_str()) {
        None => Some("missing from live directory"),
        Some(LiveState::Inactive) => Some("inactive on platform"),
        Some(LiveState::Active) if record.is_expired(now_ms) => Some("expired"),
        Some(LiveState::Active) => None,
    }
}
