//! Run reporting sinks.
//!
//! Every cycle receives a reporter explicitly and records what happened to
//! each resource. Sinks are cheap to clone and shared across concurrent calls.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::util::clock::now_ms;

/// One reported step of a pool cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEvent {
    /// Event identifier.
    pub event_id: String,
    /// Pool tag.
    pub pool: String,
    /// Resource alias or external id; `"batch"` for cycle-level events.
    pub resource: String,
    /// Action taken (provisioned, available, setup_failed, leased, deleted, recovered, ...).
    pub action: String,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub payload: Option<String>,
}

/// Reporter abstraction injected into every cycle.
pub trait RunReporter: Send + Sync {
    /// Record a run event.
    fn record(&self, event: RunEvent);
}

/// Shared handle to a reporter.
pub type SharedReporter = Arc<dyn RunReporter>;

/// In-memory reporter with a bounded buffer, for tests and dev.
#[derive(Clone)]
pub struct InMemoryRunReporter {
    events: Arc<Mutex<VecDeque<RunEvent>>>,
    max_events: usize,
}

impl InMemoryRunReporter {
    /// Create a reporter keeping at most `max_events`.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Stored events with the given action.
    #[must_use]
    pub fn events_with_action(&self, action: &str) -> Vec<RunEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

impl RunReporter for InMemoryRunReporter {
    fn record(&self, event: RunEvent) {
        let mut events = self.events.lock();
        if self.max_events == 0 {
            return;
        }
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Reporter that forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRunReporter;

impl RunReporter for TracingRunReporter {
    fn record(&self, event: RunEvent) {
        tracing::info!(
            pool = %event.pool,
            resource = %event.resource,
            action = %event.action,
            payload = event.payload.as_deref().unwrap_or(""),
            "pool run event"
        );
    }
}

/// Helper to build a run event from context.
pub fn build_run_event(
    pool: impl Into<String>,
    resource: impl Into<String>,
    action: impl Into<String>,
    payload: Option<String>,
) -> RunEvent {
    let pool = pool.into();
    let resource = resource.into();
    let action = action.into();
    let created_at_ms = now_ms();
    RunEvent {
        event_id: format!("{pool}-{resource}-{action}-{}", uuid::Uuid::new_v4().simple()),
        pool,
        resource,
        action,
        created_at_ms,
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_reporter_overflow() {
        let reporter = InMemoryRunReporter::new(2);
        reporter.record(build_run_event("nightly", "a", "provisioned", None));
        reporter.record(build_run_event("nightly", "b", "provisioned", None));
        reporter.record(build_run_event("nightly", "c", "available", None));

        let events = reporter.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].resource, "b");
        assert_eq!(events[1].resource, "c");
        assert_eq!(reporter.events_with_action("available").len(), 1);
    }

    #[test]
    fn test_clones_share_buffer() {
        let reporter = InMemoryRunReporter::new(8);
        let shared: SharedReporter = Arc::new(reporter.clone());
        shared.record(build_run_event("nightly", "a", "leased", Some("ctx".into())));
        let events = reporter.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.as_deref(), Some("ctx"));
        assert!(events[0].created_at_ms > 0);
        assert!(events[0].event_id.starts_with("nightly-a-leased-"));
    }
}
