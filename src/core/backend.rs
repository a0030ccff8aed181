//! Abstractions for the external systems the pool engine drives.
//!
//! The engine never talks to a concrete platform or database. It sees a
//! [`ProvisioningClient`] for the remote resources, an [`AllocationRecordStore`]
//! for durable lifecycle state, and a [`SessionExchanger`] that turns stored
//! credentials into a usable handle once a lease is won. In-memory versions of
//! all three live under `crate::infra`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::{CredentialError, ProvisionError, StoreError};
use crate::core::record::{AllocationRecord, AllocationStatus, RecordFilter};

/// Parameters for one create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Alias assigned locally before the call.
    pub alias: String,
    /// Pool tag the resource is created for.
    pub pool_tag: String,
    /// Opaque reference to the resource definition.
    pub resource_spec_ref: String,
    /// Create from this snapshot instead of the definition, when set.
    pub snapshot_source_tag: Option<String>,
    /// Requested lifetime in days.
    pub expiry_days: u32,
}

/// What the platform returns for a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedResource {
    /// Platform identifier.
    pub external_resource_id: String,
    /// Login endpoint.
    pub login_endpoint: String,
    /// Identity the resource was signed up with.
    pub signup_identity: String,
    /// Credential handle, stored as the record's secret.
    pub credential_handle: String,
}

/// Remaining and consumed quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaInfo {
    /// Resources that may still be created.
    pub remaining: u32,
    /// Resources currently counted against the quota.
    pub used: u32,
}

/// Platform view of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveState {
    /// Usable.
    Active,
    /// Expired, deleted, or otherwise unusable.
    Inactive,
}

/// Entry of the platform's live-resource directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveResource {
    /// Platform identifier.
    pub external_resource_id: String,
    /// Tag the resource was created under.
    pub pool_tag: String,
    /// Platform state.
    pub state: LiveState,
}

/// Usable handle produced by a session exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    /// Endpoint the session is bound to.
    pub instance_url: String,
    /// Short-lived access token.
    pub access_token: String,
}

/// Remote resource platform.
#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    /// Create one resource. Slow; may fail per call.
    async fn create(&self, spec: &ResourceSpec) -> Result<CreatedResource, ProvisionError>;

    /// Delete resources. Best effort: partial failure is not an error, only a
    /// wholesale outage is.
    async fn delete(&self, external_ids: &[String]) -> Result<(), ProvisionError>;

    /// Remaining and used quota.
    async fn query_quota(&self) -> Result<QuotaInfo, ProvisionError>;

    /// Active resources carrying `tag`.
    async fn query_active_count_by_tag(&self, tag: &str) -> Result<u32, ProvisionError>;

    /// Platform state for each id, in input order. Unknown ids are `Inactive`.
    async fn query_status(&self, external_ids: &[String]) -> Result<Vec<LiveState>, ProvisionError>;

    /// Live-resource directory for `tag`.
    async fn list_live(&self, tag: &str) -> Result<Vec<LiveResource>, ProvisionError>;
}

/// Durable allocation record storage without cross-record transactions.
#[async_trait]
pub trait AllocationRecordStore: Send + Sync {
    /// Insert records, returning their ids in input order. All-or-nothing per call.
    async fn create(&self, records: &[AllocationRecord]) -> Result<Vec<String>, StoreError>;

    /// Overwrite records by id. One flag per input record; `false` means that
    /// record was not written.
    async fn update(&self, records: &[AllocationRecord]) -> Result<Vec<bool>, StoreError>;

    /// Move `id` from `expected` to `next` only if the stored status is still `expected`.
    async fn compare_and_swap(
        &self,
        id: &str,
        expected: AllocationStatus,
        next: AllocationStatus,
    ) -> Result<bool, StoreError>;

    /// Records matching `filter`, in store order.
    async fn query(&self, filter: &RecordFilter) -> Result<Vec<AllocationRecord>, StoreError>;
}

/// Exchanges a stored credential for a live session.
#[async_trait]
pub trait SessionExchanger: Send + Sync {
    /// Exchange the record's secret for a session handle.
    async fn exchange(&self, record: &AllocationRecord) -> Result<SessionHandle, CredentialError>;
}
