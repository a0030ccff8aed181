//! Tests for the command surface

use prometheus_env_pool::builders::build_engines;
use prometheus_env_pool::config::{PoolConfig, PoolsConfig, RetryConfig};
use prometheus_env_pool::core::{
    LeaseError, NoopSetup, PlannerError, PoolBackends, PoolError, StoreError, TracingRunReporter,
};
use prometheus_env_pool::infra::{
    InMemoryProvisioningClient, InMemoryRecordStore, InMemorySessionExchanger,
};
use prometheus_env_pool::runtime::{dispatch, exit_code, CommandResponse, PoolCommand};
use std::sync::Arc;

fn engines() -> std::collections::HashMap<String, prometheus_env_pool::core::PoolEngine> {
    let backends = PoolBackends {
        client: Arc::new(InMemoryProvisioningClient::new(10)),
        store: Arc::new(InMemoryRecordStore::new()),
        setup: Arc::new(NoopSetup),
        sessions: Arc::new(InMemorySessionExchanger::new()),
        reporter: Arc::new(TracingRunReporter),
    };
    let cfg = PoolsConfig {
        identity: "ci-runner".to_string(),
        pools: vec![PoolConfig::new("nightly", "scratch-def")
            .with_max_allocation(3)
            .with_retry(RetryConfig {
                max_attempts: 2,
                backoff_ms: 1,
            })],
    };
    build_engines(&cfg, &backends).expect("engines build")
}

#[tokio::test]
async fn test_create_then_fetch_then_list() {
    let engines = engines();

    let created = dispatch(&engines, "nightly", PoolCommand::Create).await;
    assert_eq!(exit_code(&created), 0);
    match created {
        Ok(CommandResponse::Created(summary)) => assert_eq!(summary.allocated, 3),
        other => panic!("unexpected response: {other:?}"),
    }

    let leased = dispatch(
        &engines,
        "nightly",
        PoolCommand::Fetch {
            all: false,
            limit: None,
        },
    )
    .await;
    assert!(matches!(leased, Ok(CommandResponse::Leased(_))));

    let batch = dispatch(
        &engines,
        "nightly",
        PoolCommand::Fetch {
            all: false,
            limit: Some(1),
        },
    )
    .await;
    match batch {
        Ok(CommandResponse::LeasedBatch(batch)) => assert_eq!(batch.leases.len(), 1),
        other => panic!("unexpected response: {other:?}"),
    }

    let listed = dispatch(&engines, "nightly", PoolCommand::List { all: false }).await;
    match listed {
        Ok(CommandResponse::Listed(listing)) => {
            assert_eq!(listing.counts.available, 1);
            assert_eq!(listing.counts.in_use, 2);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn test_second_create_at_capacity_exits_with_planner_code() {
    let engines = engines();
    dispatch(&engines, "nightly", PoolCommand::Create)
        .await
        .expect("first create");

    let again = dispatch(&engines, "nightly", PoolCommand::Create).await;

    assert_eq!(exit_code(&again), 2);
}

#[tokio::test]
async fn test_unknown_tag_is_a_config_error() {
    let engines = engines();

    let result = dispatch(&engines, "weekly", PoolCommand::Reclaim).await;

    assert!(matches!(result, Err(PoolError::Config(_))));
    assert_eq!(exit_code(&result), 1);
}

#[test]
fn test_exit_codes_by_error_kind() {
    let planner = Err(PoolError::Planner(PlannerError::QuotaUnavailable("503".into())));
    let lease = Err(PoolError::Lease(LeaseError::PoolExhausted {
        tag: "nightly".into(),
    }));
    let store = Err(PoolError::Store(StoreError::Unreachable("down".into())));

    assert_eq!(exit_code(&planner), 2);
    assert_eq!(exit_code(&lease), 3);
    assert_eq!(exit_code(&store), 4);
}

#[test]
fn test_commands_parse_from_json() {
    let command: PoolCommand =
        serde_json::from_str(r#"{"command": "delete", "in_progress_only": true}"#)
            .expect("valid command");
    assert_eq!(
        command,
        PoolCommand::Delete {
            mine: false,
            all: false,
            in_progress_only: true,
        }
    );

    let fetch: PoolCommand =
        serde_json::from_str(r#"{"command": "fetch"}"#).expect("valid command");
    assert_eq!(
        fetch,
        PoolCommand::Fetch {
            all: false,
            limit: None,
        }
    );
}
