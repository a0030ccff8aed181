//! Tests for run reporters

use prometheus_env_pool::core::{build_run_event, InMemoryRunReporter, RunReporter, SharedReporter};
use std::sync::Arc;

#[test]
fn test_in_memory_reporter_records_events() {
    let reporter = InMemoryRunReporter::new(10);

    reporter.record(build_run_event(
        "nightly",
        "nightly-1a2b3c4d",
        "provisioned",
        Some("ext-0001".to_string()),
    ));

    let events = reporter.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].pool, "nightly");
    assert_eq!(events[0].resource, "nightly-1a2b3c4d");
    assert_eq!(events[0].action, "provisioned");
    assert_eq!(events[0].payload.as_deref(), Some("ext-0001"));
    assert!(events[0].event_id.starts_with("nightly-nightly-1a2b3c4d-provisioned-"));
}

#[test]
fn test_reporter_clones_share_a_buffer() {
    let reporter = InMemoryRunReporter::new(10);
    let shared: SharedReporter = Arc::new(reporter.clone());

    shared.record(build_run_event("nightly", "batch", "create_completed", None));

    assert_eq!(reporter.events_with_action("create_completed").len(), 1);
}

#[test]
fn test_zero_capacity_reporter_keeps_nothing() {
    let reporter = InMemoryRunReporter::new(0);
    reporter.record(build_run_event("nightly", "batch", "create_completed", None));
    assert!(reporter.events().is_empty());
}
