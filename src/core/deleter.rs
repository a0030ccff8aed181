//! Bulk deletion of pooled resources.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::core::backend::{AllocationRecordStore, ProvisioningClient};
use crate::core::error::PoolError;
use crate::core::record::{AllocationRecord, AllocationStatus, RecordFilter};
use crate::core::report::{build_run_event, SharedReporter};

/// Which records a delete touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteScope {
    /// Unused resources only (`Available`).
    #[default]
    Unassigned,
    /// `InProgress` and `Assigned`; leaves `Available` untouched.
    InProgressOnly,
    /// Every record not already `Deleted`.
    All,
}

impl DeleteScope {
    /// Statuses covered by this scope.
    #[must_use]
    pub const fn statuses(self) -> &'static [AllocationStatus] {
        match self {
            Self::Unassigned => &[AllocationStatus::Available],
            Self::InProgressOnly => &[AllocationStatus::InProgress, AllocationStatus::Assigned],
            Self::All => &[
                AllocationStatus::InProgress,
                AllocationStatus::Available,
                AllocationStatus::Assigned,
                AllocationStatus::Recovered,
            ],
        }
    }
}

/// Record selection for a delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFilter {
    /// Status scope.
    pub scope: DeleteScope,
    /// Only records created by this engine's identity.
    pub mine_only: bool,
}

impl DeleteFilter {
    /// Build from command-line style flags. `all` wins over `in_progress_only`.
    #[must_use]
    pub const fn from_flags(mine: bool, all: bool, in_progress_only: bool) -> Self {
        let scope = if all {
            DeleteScope::All
        } else if in_progress_only {
            DeleteScope::InProgressOnly
        } else {
            DeleteScope::Unassigned
        };
        Self {
            scope,
            mine_only: mine,
        }
    }
}

/// What a delete did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    /// Records selected.
    pub matched: usize,
    /// Whether the platform delete call failed (resources may be left behind
    /// for the reclaimer).
    pub resource_delete_failed: bool,
    /// Records now marked `Deleted`.
    pub marked_deleted: usize,
    /// Aliases whose record could not be marked. Their resources are kept.
    pub mark_failed: Vec<String>,
    /// Aliases whose status changed between selection and claim.
    pub claim_lost: Vec<String>,
}

/// Marks records `Deleted` and deletes the resources behind them.
pub struct PoolDeleter {
    client: Arc<dyn ProvisioningClient>,
    store: Arc<dyn AllocationRecordStore>,
    reporter: SharedReporter,
    identity: String,
}

impl PoolDeleter {
    /// Create a deleter. `identity` is used by the `mine_only` filter.
    pub fn new(
        client: Arc<dyn ProvisioningClient>,
        store: Arc<dyn AllocationRecordStore>,
        reporter: SharedReporter,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            reporter,
            identity: identity.into(),
        }
    }

    /// Delete every record of `tag` selected by `filter`.
    pub async fn delete(&self, tag: &str, filter: DeleteFilter) -> Result<DeleteReport, PoolError> {
        let mut query = RecordFilter::for_tag(tag).with_statuses(filter.scope.statuses());
        if filter.mine_only {
            query = query.with_owner(self.identity.clone());
        }
        let records = self.store.query(&query).await?;
        tracing::info!(
            tag,
            matched = records.len(),
            scope = ?filter.scope,
            mine_only = filter.mine_only,
            "deleting pool records"
        );
        Ok(self.delete_records(tag, records).await)
    }

    /// Claim each record by moving it to `Deleted` from the status it was read
    /// in, then delete the resources behind the claimed records only.
    ///
    /// A record whose status changed since it was read (leased, promoted,
    /// recovered) is left alone and reported in `claim_lost`. Claimed records
    /// stay `Deleted` even when the platform delete fails; the reclaimer removes
    /// the leftover resources.
    pub async fn delete_records(&self, tag: &str, records: Vec<AllocationRecord>) -> DeleteReport {
        let mut report = DeleteReport {
            matched: records.len(),
            ..DeleteReport::default()
        };
        if records.is_empty() {
            return report;
        }

        let store = &self.store;
        let claims = join_all(records.iter().map(|record| async move {
            let claimed = store
                .compare_and_swap(&record.id, record.status, AllocationStatus::Deleted)
                .await;
            (record, claimed)
        }))
        .await;

        let mut ids = Vec::with_capacity(records.len());
        for (record, claimed) in claims {
            match claimed {
                Ok(true) => {
                    report.marked_deleted += 1;
                    ids.push(record.external_resource_id.clone());
                    self.reporter
                        .record(build_run_event(tag, &record.alias, "deleted", None));
                }
                Ok(false) => {
                    tracing::debug!(
                        tag,
                        resource = %record.alias,
                        "record changed before delete, skipping"
                    );
                    report.claim_lost.push(record.alias.clone());
                }
                Err(err) => {
                    tracing::error!(
                        tag,
                        resource = %record.alias,
                        error = %err,
                        "could not mark record deleted"
                    );
                    report.mark_failed.push(record.alias.clone());
                }
            }
        }

        if !ids.is_empty() {
            if let Err(err) = self.client.delete(&ids).await {
                tracing::error!(
                    tag,
                    count = ids.len(),
                    error = %err,
                    "platform delete failed, records stay marked deleted"
                );
                report.resource_delete_failed = true;
            }
        }

        tracing::info!(
            tag,
            matched = report.matched,
            marked_deleted = report.marked_deleted,
            claim_lost = report.claim_lost.len(),
            mark_failed = report.mark_failed.len(),
            "delete finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_to_scope() {
        assert_eq!(DeleteFilter::from_flags(false, false, false).scope, DeleteScope::Unassigned);
        assert_eq!(DeleteFilter::from_flags(false, false, true).scope, DeleteScope::InProgressOnly);
        assert_eq!(DeleteFilter::from_flags(true, true, true).scope, DeleteScope::All);
        assert!(DeleteFilter::from_flags(true, false, false).mine_only);
    }

    #[test]
    fn test_in_progress_only_leaves_available_alone() {
        let statuses = DeleteScope::InProgressOnly.statuses();
        assert!(!statuses.contains(&AllocationStatus::Available));
        assert!(statuses.contains(&AllocationStatus::Assigned));
        assert!(statuses.contains(&AllocationStatus::InProgress));
    }
}
