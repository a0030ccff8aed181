//! Error types for pool lifecycle operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::record::AllocationStatus;

/// Cycle-level planning failures. Fatal to the create cycle that raised them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    /// The pool already holds `max` or more active resources.
    #[error("pool `{tag}` at capacity: {active} active of {max}")]
    AtCapacity {
        /// Pool tag.
        tag: String,
        /// Active resources reported by the platform.
        active: u32,
        /// Configured ceiling.
        max: u32,
    },
    /// The pool is below capacity but the platform has no quota left.
    #[error("no quota left for pool `{tag}` ({active} active of {max})")]
    NoQuota {
        /// Pool tag.
        tag: String,
        /// Active resources reported by the platform.
        active: u32,
        /// Configured ceiling.
        max: u32,
    },
    /// Quota or active-count query failed before any provisioning started.
    #[error("quota query failed: {0}")]
    QuotaUnavailable(String),
}

/// Failure reported by the provisioning platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    /// The platform rejected a single request.
    #[error("create rejected: {0}")]
    Rejected(String),
    /// The platform could not be reached at all.
    #[error("provisioning backend unavailable: {0}")]
    Unavailable(String),
}

/// The post-setup job failed for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("setup failed for `{alias}`: {reason}")]
pub struct SetupExecutionError {
    /// Alias of the resource the job ran against.
    pub alias: String,
    /// Message returned by the job.
    pub reason: String,
}

/// Record store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Write failed but may succeed if retried.
    #[error("transient store failure: {0}")]
    Transient(String),
    /// Uniqueness constraint violated.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),
    /// Requested status change is not part of the lifecycle.
    #[error("invalid transition for `{id}`: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Record identifier.
        id: String,
        /// Stored status.
        from: AllocationStatus,
        /// Requested status.
        to: AllocationStatus,
    },
    /// Store cannot be reached; aborts the whole cycle.
    #[error("store unreachable: {0}")]
    Unreachable(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Leasing failures surfaced to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    /// No candidate could be leased.
    #[error("no resource available for tag {tag}")]
    PoolExhausted {
        /// Pool tag.
        tag: String,
    },
    /// A lease was won but the session exchange for the last viable candidate failed.
    #[error("lease for tag {tag} failed authentication: {reason}")]
    LeaseAuthFailed {
        /// Pool tag.
        tag: String,
        /// Exchange failure message.
        reason: String,
    },
}

/// Credential validation and session exchange failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Secret is empty.
    #[error("credential secret is empty")]
    Empty,
    /// Secret or endpoint is malformed.
    #[error("malformed credential: {0}")]
    Malformed(String),
    /// The platform refused to exchange the secret for a session.
    #[error("session exchange failed: {0}")]
    Exchange(String),
}

/// A single record could not be reconciled; retried on the next pass.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("reclaim of `{resource}` failed: {reason}")]
pub struct ReclaimError {
    /// External resource identifier.
    pub resource: String,
    /// Failure message.
    pub reason: String,
}

/// Errors that abort a whole pool operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Planning failed or produced nothing to do.
    #[error(transparent)]
    Planner(#[from] PlannerError),
    /// Store unreachable or rejected a cycle-level query.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Lease could not be satisfied.
    #[error(transparent)]
    Lease(#[from] LeaseError),
    /// Provisioning platform unavailable for a cycle-level query.
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    /// Configuration rejected.
    #[error("config invalid: {0}")]
    Config(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
