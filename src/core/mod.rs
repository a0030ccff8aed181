//! Pool lifecycle: planning, provisioning, leasing, reclaiming, and deletion.

pub mod backend;
pub mod credentials;
pub mod deleter;
pub mod engine;
pub mod error;
pub mod executor;
pub mod lease;
pub mod lister;
pub mod outcome;
pub mod planner;
pub mod provisioner;
pub mod reclaimer;
pub mod record;
pub mod report;
pub mod retry;

pub use backend::{
    AllocationRecordStore, CreatedResource, LiveResource, LiveState, ProvisioningClient, QuotaInfo,
    ResourceSpec, SessionExchanger, SessionHandle,
};
pub use deleter::{DeleteFilter, DeleteReport, DeleteScope, PoolDeleter};
pub use engine::{PoolBackends, PoolEngine};
pub use error::{
    AppResult, CredentialError, LeaseError, PlannerError, PoolError, ProvisionError, ReclaimError,
    SetupExecutionError, StoreError,
};
pub use executor::{NoopSetup, SetupJob, SetupReport};
pub use lease::{BatchLease, Lease, LeaseRejection, PoolLeaseFetcher};
pub use lister::{ListingCounts, ListingRow, PoolLister, PoolListing};
pub use outcome::{ConcurrencyLimiter, Outcome};
pub use planner::{plan_allocation, AllocationPlan};
pub use provisioner::ResourceProvisioner;
pub use reclaimer::{OrphanReclaimer, ReclaimReport};
pub use record::{
    AllocationRecord, AllocationStatus, CreateRunSummary, FailureStage, ProvisionedResource,
    RecordFilter, ResourceFailure,
};
pub use report::{
    build_run_event, InMemoryRunReporter, RunEvent, RunReporter, SharedReporter, TracingRunReporter,
};
pub use retry::RetryPolicy;
