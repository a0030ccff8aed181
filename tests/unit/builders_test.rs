//! Tests for builder modules

use prometheus_env_pool::builders::{build_engines, PoolEngineBuilder};
use prometheus_env_pool::config::{PoolConfig, PoolsConfig};
use prometheus_env_pool::core::{NoopSetup, PoolBackends, PoolError, TracingRunReporter};
use prometheus_env_pool::infra::{
    InMemoryProvisioningClient, InMemoryRecordStore, InMemorySessionExchanger,
};
use std::sync::Arc;

fn backends() -> PoolBackends {
    PoolBackends {
        client: Arc::new(InMemoryProvisioningClient::new(10)),
        store: Arc::new(InMemoryRecordStore::new()),
        setup: Arc::new(NoopSetup),
        sessions: Arc::new(InMemorySessionExchanger::new()),
        reporter: Arc::new(TracingRunReporter),
    }
}

#[test]
fn test_engine_builder_accessors() {
    let builder = PoolEngineBuilder::new(
        PoolConfig::new("nightly", "scratch-def").with_max_allocation(7),
        "ci-runner",
    );
    assert_eq!(builder.tag(), "nightly");
    assert_eq!(builder.config().max_allocation, 7);
}

#[test]
fn test_engine_builder_requires_backends() {
    let result = PoolEngineBuilder::new(PoolConfig::new("nightly", "scratch-def"), "ci-runner")
        .with_store(Arc::new(InMemoryRecordStore::new()))
        .build();

    match result {
        Err(PoolError::Config(message)) => assert!(message.contains("provisioning client")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("builder accepted a missing client"),
    }
}

#[test]
fn test_engine_builder_validates_config() {
    let result = PoolEngineBuilder::new(
        PoolConfig::new("nightly", "scratch-def").with_batch_size(0),
        "ci-runner",
    )
    .with_backends(&backends())
    .build();

    assert!(matches!(result, Err(PoolError::Config(_))));
}

#[test]
fn test_build_engines_keys_by_tag() {
    let cfg = PoolsConfig {
        identity: "ci-runner".to_string(),
        pools: vec![
            PoolConfig::new("nightly", "scratch-def"),
            PoolConfig::new("weekly", "scratch-def").with_max_allocation(2),
        ],
    };

    let engines = build_engines(&cfg, &backends()).expect("engines build");

    assert_eq!(engines.len(), 2);
    assert_eq!(engines["weekly"].config().max_allocation, 2);
    assert_eq!(engines["nightly"].tag(), "nightly");
}

#[test]
fn test_build_engines_rejects_invalid_config() {
    let cfg = PoolsConfig {
        identity: "ci-runner".to_string(),
        pools: Vec::new(),
    };
    assert!(matches!(build_engines(&cfg, &backends()), Err(PoolError::Config(_))));
}
