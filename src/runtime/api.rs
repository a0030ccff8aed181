//! API-facing command and response models.
//!
//! Schedulers and operator tooling drive pools through [`PoolCommand`]s. Each
//! command maps onto one engine operation, and [`exit_code`] turns the result
//! into a process exit status.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{
    BatchLease, CreateRunSummary, DeleteFilter, DeleteReport, Lease, LeaseError, PoolEngine,
    PoolError, PoolListing, ReclaimReport,
};

/// Exit status for a successful command.
pub const EXIT_OK: i32 = 0;
/// Exit status for failures with no more specific code.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status when the planner refused to provision.
pub const EXIT_PLANNER: i32 = 2;
/// Exit status when no lease could be granted.
pub const EXIT_LEASE: i32 = 3;
/// Exit status when the store or provisioning backend failed.
pub const EXIT_BACKEND: i32 = 4;

/// One pool operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PoolCommand {
    /// Run a create cycle.
    Create,
    /// Lease resources. Neither flag leases exactly one with compare-and-swap
    /// safety; `all` or `limit` lease a batch.
    Fetch {
        /// Lease every viable resource.
        #[serde(default)]
        all: bool,
        /// Lease at most this many.
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Delete pool records.
    Delete {
        /// Only records created by this identity.
        #[serde(default)]
        mine: bool,
        /// Every non-deleted status.
        #[serde(default)]
        all: bool,
        /// In-progress and assigned records only.
        #[serde(default)]
        in_progress_only: bool,
    },
    /// List the pool.
    List {
        /// Include records pending deletion.
        #[serde(default)]
        all: bool,
    },
    /// Run one reconciliation pass.
    Reclaim,
}

/// Result of a [`PoolCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandResponse {
    /// Create cycle summary.
    Created(CreateRunSummary),
    /// Single lease.
    Leased(Lease),
    /// Batch lease.
    LeasedBatch(BatchLease),
    /// Delete report.
    Deleted(DeleteReport),
    /// Pool listing.
    Listed(PoolListing),
    /// Reclaim report.
    Reclaimed(ReclaimReport),
}

/// Run `command` against `engine`.
pub async fn execute(
    engine: &PoolEngine,
    command: PoolCommand,
) -> Result<CommandResponse, PoolError> {
    tracing::debug!(tag = engine.tag(), ?command, "executing pool command");
    match command {
        PoolCommand::Create => engine.create().await.map(CommandResponse::Created),
        PoolCommand::Fetch { all: false, limit: None } => {
            engine.fetch().await.map(CommandResponse::Leased)
        }
        PoolCommand::Fetch { all, limit } => engine
            .fetch_batch(if all { None } else { limit })
            .await
            .map(CommandResponse::LeasedBatch),
        PoolCommand::Delete {
            mine,
            all,
            in_progress_only,
        } => engine
            .delete(DeleteFilter::from_flags(mine, all, in_progress_only))
            .await
            .map(CommandResponse::Deleted),
        PoolCommand::List { all } => engine.list(all).await.map(CommandResponse::Listed),
        PoolCommand::Reclaim => engine.reclaim().await.map(CommandResponse::Reclaimed),
    }
}

/// Look up the engine for `tag` and run `command` against it.
pub async fn dispatch(
    engines: &HashMap<String, PoolEngine>,
    tag: &str,
    command: PoolCommand,
) -> Result<CommandResponse, PoolError> {
    let engine = engines
        .get(tag)
        .ok_or_else(|| PoolError::Config(format!("unknown pool tag `{tag}`")))?;
    execute(engine, command).await
}

/// Process exit status for a command result.
#[must_use]
pub const fn exit_code(result: &Result<CommandResponse, PoolError>) -> i32 {
    match result {
        Ok(_) => EXIT_OK,
        Err(PoolError::Planner(_)) => EXIT_PLANNER,
        Err(PoolError::Lease(
            LeaseError::PoolExhausted { .. } | LeaseError::LeaseAuthFailed { .. },
        )) => EXIT_LEASE,
        Err(PoolError::Store(_) | PoolError::Provision(_)) => EXIT_BACKEND,
        Err(PoolError::Config(_)) => EXIT_FAILURE,
    }
}
