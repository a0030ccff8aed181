//! Read-only pool status projection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::backend::AllocationRecordStore;
use crate::core::error::PoolError;
use crate::core::record::{AllocationRecord, AllocationStatus, RecordFilter};

/// One listed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRow {
    /// Resource alias.
    pub alias: String,
    /// Platform identifier.
    pub external_resource_id: String,
    /// Raw status.
    pub status: AllocationStatus,
    /// Human-facing label.
    pub label: String,
    /// Expiry, milliseconds since epoch.
    pub expires_at_ms: u128,
    /// Provisioning time, milliseconds.
    pub elapsed_ms: u64,
    /// Creator identity.
    pub owner: String,
}

impl From<&AllocationRecord> for ListingRow {
    fn from(record: &AllocationRecord) -> Self {
        Self {
            alias: record.alias.clone(),
            external_resource_id: record.external_resource_id.clone(),
            status: record.status,
            label: record.status.label().to_string(),
            expires_at_ms: record.expires_at_ms,
            elapsed_ms: record.elapsed_ms,
            owner: record.owner.clone(),
        }
    }
}

/// Per-label totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingCounts {
    /// Ready to lease.
    pub available: usize,
    /// Leased.
    pub in_use: usize,
    /// Still being provisioned.
    pub provisioning: usize,
    /// Flagged by the reclaimer.
    pub pending_deletion: usize,
}

/// Listing for one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolListing {
    /// Pool tag.
    pub tag: String,
    /// Listed resources in store order.
    pub rows: Vec<ListingRow>,
    /// Totals.
    pub counts: ListingCounts,
}

/// Lists pool contents without mutating anything.
pub struct PoolLister {
    store: Arc<dyn AllocationRecordStore>,
}

impl PoolLister {
    /// Create a lister.
    pub fn new(store: Arc<dyn AllocationRecordStore>) -> Self {
        Self { store }
    }

    /// List `tag`. Without `all`, only live pool states are shown; with it,
    /// records pending deletion are included too.
    pub async fn list(&self, tag: &str, all: bool) -> Result<PoolListing, PoolError> {
        let mut statuses = vec![
            AllocationStatus::Available,
            AllocationStatus::Assigned,
            AllocationStatus::InProgress,
        ];
        if all {
            statuses.push(AllocationStatus::Recovered);
        }
        let records = self
            .store
            .query(&RecordFilter::for_tag(tag).with_statuses(&statuses))
            .await?;

        let mut counts = ListingCounts::default();
        for record in &records {
            match record.status {
                AllocationStatus::Available => counts.available += 1,
                AllocationStatus::Assigned => counts.in_use += 1,
                AllocationStatus::InProgress => counts.provisioning += 1,
                AllocationStatus::Recovered => counts.pending_deletion += 1,
                AllocationStatus::Deleted => {}
            }
        }

        Ok(PoolListing {
            tag: tag.to_string(),
            rows: records.iter().map(ListingRow::from).collect(),
            counts,
        })
    }
}
