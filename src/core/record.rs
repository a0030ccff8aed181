//! Allocation records, their lifecycle, and provisioning run results.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an allocation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    /// Resource created, post-setup not yet finished.
    InProgress,
    /// Ready to be leased.
    Available,
    /// Leased by a consumer; permanently out of the pool.
    Assigned,
    /// Terminal state.
    Deleted,
    /// Flagged by the reclaimer, awaiting deletion.
    Recovered,
}

impl AllocationStatus {
    /// Whether `self -> next` is a lifecycle transition this crate performs.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::InProgress => matches!(next, Self::Available | Self::Deleted | Self::Recovered),
            Self::Available => matches!(next, Self::Assigned | Self::Deleted | Self::Recovered),
            Self::Assigned => matches!(next, Self::Deleted | Self::Recovered),
            Self::Recovered => matches!(next, Self::Deleted),
            Self::Deleted => false,
        }
    }

    /// Human-facing label used by listings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Assigned => "In use",
            Self::InProgress => "Provisioning in progress",
            Self::Recovered => "Pending deletion",
            Self::Deleted => "Deleted",
        }
    }

    /// Whether the reclaimer should leave the record alone.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Deleted | Self::Recovered)
    }
}

/// Durable, externally stored state of one pooled resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    /// Store-assigned identifier. Empty until the record is created.
    pub id: String,
    /// Local alias used in logs.
    pub alias: String,
    /// Platform identifier; unique across the store.
    pub external_resource_id: String,
    /// Endpoint consumers log in to.
    pub login_endpoint: String,
    /// Identity the resource was signed up with.
    pub signup_identity: String,
    /// Secret exchanged for a session on lease.
    pub credential_secret: String,
    /// Pool the record belongs to.
    pub pool_tag: String,
    /// Current lifecycle state.
    pub status: AllocationStatus,
    /// Expiry timestamp, milliseconds since epoch.
    pub expires_at_ms: u128,
    /// Time spent provisioning, milliseconds.
    pub elapsed_ms: u64,
    /// Identity of the engine that created the record.
    pub owner: String,
    /// Marks records created by this system; only these are reconciled.
    pub managed: bool,
}

impl AllocationRecord {
    /// Build a fresh `InProgress` record for a provisioned resource.
    #[must_use]
    pub fn in_progress(
        resource: &ProvisionedResource,
        pool_tag: &str,
        owner: &str,
        expires_at_ms: u128,
    ) -> Self {
        Self {
            id: String::new(),
            alias: resource.alias.clone(),
            external_resource_id: resource.external_resource_id.clone(),
            login_endpoint: resource.login_endpoint.clone(),
            signup_identity: resource.signup_identity.clone(),
            credential_secret: resource.credential_secret.clone(),
            pool_tag: pool_tag.to_string(),
            status: AllocationStatus::InProgress,
            expires_at_ms,
            elapsed_ms: resource.elapsed_ms,
            owner: owner.to_string(),
            managed: true,
        }
    }

    /// Copy of the record moved to `next`, or `None` if the move is not allowed.
    #[must_use]
    pub fn with_status(&self, next: AllocationStatus) -> Option<Self> {
        if !self.status.can_transition_to(next) {
            return None;
        }
        let mut moved = self.clone();
        moved.status = next;
        Some(moved)
    }

    /// Whether the record is past its expiry at `now_ms`.
    #[must_use]
    pub const fn is_expired(&self, now_ms: u128) -> bool {
        self.expires_at_ms <= now_ms
    }
}

/// Query filter for record stores. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Restrict to one pool tag.
    pub tag: Option<String>,
    /// Restrict to these statuses.
    pub statuses: Option<Vec<AllocationStatus>>,
    /// Restrict to one owner.
    pub owner: Option<String>,
    /// Restrict to records carrying the managed marker.
    pub managed_only: bool,
    /// Restrict to one record id.
    pub id: Option<String>,
}

impl RecordFilter {
    /// Filter on a single tag.
    #[must_use]
    pub fn for_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    /// Restrict to the given statuses.
    #[must_use]
    pub fn with_statuses(mut self, statuses: &[AllocationStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    /// Restrict to one owner.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Restrict to a single record.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Restrict to managed records.
    #[must_use]
    pub const fn managed(mut self) -> Self {
        self.managed_only = true;
        self
    }

    /// Whether `record` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, record: &AllocationRecord) -> bool {
        self.tag.as_ref().is_none_or(|t| *t == record.pool_tag)
            && self
                .statuses
                .as_ref()
                .is_none_or(|s| s.contains(&record.status))
            && self.owner.as_ref().is_none_or(|o| *o == record.owner)
            && (!self.managed_only || record.managed)
            && self.id.as_ref().is_none_or(|id| *id == record.id)
    }
}

/// A resource that was created by the platform but is not yet committed to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedResource {
    /// Local alias.
    pub alias: String,
    /// Platform identifier.
    pub external_resource_id: String,
    /// Login endpoint.
    pub login_endpoint: String,
    /// Signup identity.
    pub signup_identity: String,
    /// Credential secret.
    pub credential_secret: String,
    /// Creation time, milliseconds.
    pub elapsed_ms: u64,
    /// Whether the post-setup job succeeded.
    pub setup_succeeded: bool,
    /// Failure message from the post-setup job.
    pub failure_message: Option<String>,
}

/// Stage at which a resource dropped out of a create run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Platform create call failed.
    Provision,
    /// Platform reported the fresh resource as not active.
    Stale,
    /// `InProgress` record could not be written.
    StoreWrite,
    /// Post-setup job failed.
    Setup,
    /// Promotion to `Available` could not be written.
    Commit,
}

/// One resource that did not make it into the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFailure {
    /// Alias of the failed resource.
    pub alias: String,
    /// Where it failed.
    pub stage: FailureStage,
    /// Error message.
    pub reason: String,
}

/// Result of one create cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRunSummary {
    /// Resources the planner asked for.
    pub requested: u32,
    /// Resources committed as `Available`.
    pub allocated: u32,
    /// Resources that dropped out.
    pub failed: u32,
    /// Per-resource failure details.
    pub failures: Vec<ResourceFailure>,
}

impl CreateRunSummary {
    /// Summary for a cycle that provisioned nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            requested: 0,
            allocated: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }
}
