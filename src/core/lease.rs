//! Leasing resources out of the pool.
//!
//! Two modes with different guarantees:
//!
//! - [`PoolLeaseFetcher::fetch`] leases exactly one record. Each candidate is
//!   claimed with `compare_and_swap(Available -> Assigned)`, so two concurrent
//!   fetchers can never both win the same record.
//! - [`PoolLeaseFetcher::fetch_batch`] claims up to `limit` records with a plain
//!   `update`. It does not lock per record: two batch fetchers racing on one tag
//!   may both see and claim overlapping candidates. Use it where throughput
//!   matters more than exclusivity.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::core::backend::{AllocationRecordStore, SessionExchanger, SessionHandle};
use crate::core::credentials::validate_credentials;
use crate::core::error::{LeaseError, PoolError};
use crate::core::record::{AllocationRecord, AllocationStatus, RecordFilter};
use crate::core::report::{build_run_event, SharedReporter};
use crate::core::retry::RetryPolicy;
use crate::util::clock::now_ms;

/// A leased record and its live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Record, now `Assigned`.
    pub record: AllocationRecord,
    /// Session obtained from the stored credentials.
    pub session: SessionHandle,
}

/// A claimed record dropped from a batch lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRejection {
    /// Resource alias.
    pub alias: String,
    /// Why it was dropped.
    pub reason: String,
}

/// Result of a batch lease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLease {
    /// Usable leases.
    pub leases: Vec<Lease>,
    /// Claimed records that could not be handed out.
    pub rejected: Vec<LeaseRejection>,
}

/// Leases `Available` records for consumers.
pub struct PoolLeaseFetcher {
    store: Arc<dyn AllocationRecordStore>,
    sessions: Arc<dyn SessionExchanger>,
    reporter: SharedReporter,
    retry: RetryPolicy,
}

impl PoolLeaseFetcher {
    /// Create a fetcher.
    pub fn new(
        store: Arc<dyn AllocationRecordStore>,
        sessions: Arc<dyn SessionExchanger>,
        reporter: SharedReporter,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            sessions,
            reporter,
            retry,
        }
    }

    /// Lease exactly one resource from `tag`.
    ///
    /// Fails with [`LeaseError::PoolExhausted`] when no candidate could be
    /// claimed, or [`LeaseError::LeaseAuthFailed`] when the session exchange
    /// fails for the last viable candidate.
    pub async fn fetch(&self, tag: &str) -> Result<Lease, PoolError> {
        let candidates = self.viable_candidates(tag).await?;
        let total = candidates.len();

        for (i, candidate) in candidates.into_iter().enumerate() {
            match self
                .store
                .compare_and_swap(
                    &candidate.id,
                    AllocationStatus::Available,
                    AllocationStatus::Assigned,
                )
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(tag, resource = %candidate.alias, "lost lease race");
                    continue;
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        tag,
                        resource = %candidate.alias,
                        error = %err,
                        "lease attempt failed, trying next candidate"
                    );
                    continue;
                }
                Err(err) => return Err(err.into()),
            }

            let mut leased = candidate;
            leased.status = AllocationStatus::Assigned;
            match self.sessions.exchange(&leased).await {
                Ok(session) => {
                    tracing::info!(tag, resource = %leased.alias, "resource leased");
                    self.reporter
                        .record(build_run_event(tag, &leased.alias, "leased", None));
                    return Ok(Lease {
                        record: leased,
                        session,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        tag,
                        resource = %leased.alias,
                        error = %err,
                        "session exchange failed for leased resource"
                    );
                    self.reporter.record(build_run_event(
                        tag,
                        &leased.alias,
                        "lease_auth_failed",
                        Some(err.to_string()),
                    ));
                    if i + 1 == total {
                        return Err(LeaseError::LeaseAuthFailed {
                            tag: tag.to_string(),
                            reason: err.to_string(),
                        }
                        .into());
                    }
                }
            }
        }

        tracing::warn!(tag, "pool exhausted");
        Err(LeaseError::PoolExhausted {
            tag: tag.to_string(),
        }
        .into())
    }

    /// Claim up to `limit` resources (all viable ones when `None`) without
    /// per-record locking.
    pub async fn fetch_batch(
        &self,
        tag: &str,
        limit: Option<usize>,
    ) -> Result<BatchLease, PoolError> {
        let mut candidates = self.viable_candidates(tag).await?;
        if let Some(limit) = limit {
            candidates.truncate(limit);
        }
        if candidates.is_empty() {
            tracing::warn!(tag, "pool exhausted");
            return Err(LeaseError::PoolExhausted {
                tag: tag.to_string(),
            }
            .into());
        }

        let claimed: Vec<AllocationRecord> = candidates
            .iter()
            .filter_map(|r| r.with_status(AllocationStatus::Assigned))
            .collect();
        let store = &self.store;
        let flags = {
            let claimed = &claimed;
            self.retry
                .run("claim_batch", move || store.update(claimed))
                .await?
        };

        let mut batch = BatchLease::default();
        let mut won = Vec::with_capacity(claimed.len());
        for (i, record) in claimed.into_iter().enumerate() {
            if flags.get(i).copied().unwrap_or(false) {
                won.push(record);
            } else {
                batch.rejected.push(LeaseRejection {
                    alias: record.alias,
                    reason: "claim was not written".into(),
                });
            }
        }

        let sessions = &self.sessions;
        let exchanged = join_all(won.into_iter().map(|record| async move {
            let session = sessions.exchange(&record).await;
            (record, session)
        }))
        .await;

        for (record, session) in exchanged {
            match session {
                Ok(session) => {
                    self.reporter
                        .record(build_run_event(tag, &record.alias, "leased", None));
                    batch.leases.push(Lease { record, session });
                }
                Err(err) => {
                    tracing::warn!(
                        tag,
                        resource = %record.alias,
                        error = %err,
                        "session exchange failed, dropping from batch"
                    );
                    self.reporter.record(build_run_event(
                        tag,
                        &record.alias,
                        "lease_auth_failed",
                        Some(err.to_string()),
                    ));
                    batch.rejected.push(LeaseRejection {
                        alias: record.alias,
                        reason: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            tag,
            leased = batch.leases.len(),
            rejected = batch.rejected.len(),
            "batch lease finished"
        );
        Ok(batch)
    }

    /// `Available` records for `tag` in store order, minus expired ones and
    /// ones with malformed credentials.
    async fn viable_candidates(&self, tag: &str) -> Result<Vec<AllocationRecord>, PoolError> {
        let filter = RecordFilter::for_tag(tag).with_statuses(&[AllocationStatus::Available]);
        let now = now_ms();
        let candidates = self.store.query(&filter).await?;
        Ok(candidates
            .into_iter()
            .filter(|record| {
                if record.is_expired(now) {
                    tracing::debug!(tag, resource = %record.alias, "skipping expired candidate");
                    return false;
                }
                if let Err(err) = validate_credentials(record) {
                    tracing::warn!(
                        tag,
                        resource = %record.alias,
                        error = %err,
                        "skipping candidate with invalid credentials"
                    );
                    return false;
                }
                true
            })
            .collect())
    }
}
