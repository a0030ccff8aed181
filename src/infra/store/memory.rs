//! In-memory allocation record store.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::core::backend::AllocationRecordStore;
use crate::core::error::StoreError;
use crate::core::record::{AllocationRecord, AllocationStatus, RecordFilter};

#[derive(Default)]
struct StoreState {
    records: Vec<AllocationRecord>,
    fail_next_writes: u32,
    failing_resources: HashSet<String>,
    unreachable: bool,
    write_calls: u32,
}

impl StoreState {
    /// Shared gate for every write call: counts it, then applies injected failures.
    fn admit_write(&mut self) -> Result<(), StoreError> {
        self.write_calls += 1;
        if self.unreachable {
            return Err(StoreError::Unreachable("store offline".into()));
        }
        if self.fail_next_writes > 0 {
            self.fail_next_writes -= 1;
            return Err(StoreError::Transient("injected write failure".into()));
        }
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }
}

/// Record store held in process memory, in insertion order.
///
/// Enforces the lifecycle transition table on `update` and
/// `compare_and_swap`, and uniqueness of `external_resource_id` on `create`.
/// Failures can be injected to exercise retry and fallback paths.
#[derive(Default)]
pub struct InMemoryRecordStore {
    state: Mutex<StoreState>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` write calls fail with a transient error.
    pub fn fail_next_writes(&self, n: u32) {
        self.state.lock().fail_next_writes = n;
    }

    /// Make every `create` call containing the resource `external_id` fail
    /// with a transient error.
    pub fn fail_writes_for_resource(&self, external_id: impl Into<String>) {
        self.state.lock().failing_resources.insert(external_id.into());
    }

    /// Toggle a full outage. Reads and writes fail with `Unreachable`.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Insert a record directly, bypassing validation and failure injection.
    /// Assigns an id when the record has none and returns it.
    pub fn seed(&self, mut record: AllocationRecord) -> String {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let id = record.id.clone();
        self.state.lock().records.push(record);
        id
    }

    /// Snapshot of every stored record.
    #[must_use]
    pub fn records(&self) -> Vec<AllocationRecord> {
        self.state.lock().records.clone()
    }

    /// Stored record with `alias`, if any.
    #[must_use]
    pub fn find_by_alias(&self, alias: &str) -> Option<AllocationRecord> {
        self.state
            .lock()
            .records
            .iter()
            .find(|r| r.alias == alias)
            .cloned()
    }

    /// Stored records currently in `status`.
    #[must_use]
    pub fn count_with_status(&self, status: AllocationStatus) -> usize {
        self.state
            .lock()
            .records
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    /// Write calls seen so far, including failed ones.
    #[must_use]
    pub fn write_calls(&self) -> u32 {
        self.state.lock().write_calls
    }
}

#[async_trait]
impl AllocationRecordStore for InMemoryRecordStore {
    async fn create(&self, records: &[AllocationRecord]) -> Result<Vec<String>, StoreError> {
        let mut state = self.state.lock();
        state.admit_write()?;

        if let Some(bad) = records
            .iter()
            .find(|r| state.failing_resources.contains(&r.external_resource_id))
        {
            return Err(StoreError::Transient(format!(
                "write rejected for `{}`",
                bad.external_resource_id
            )));
        }

        let mut seen: HashSet<&str> = state
            .records
            .iter()
            .map(|r| r.external_resource_id.as_str())
            .collect();
        for record in records {
            if !seen.insert(record.external_resource_id.as_str()) {
                return Err(StoreError::Conflict(format!(
                    "external resource `{}` already recorded",
                    record.external_resource_id
                )));
            }
        }

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let mut stored = record.clone();
            stored.id = Uuid::new_v4().to_string();
            ids.push(stored.id.clone());
            state.records.push(stored);
        }
        Ok(ids)
    }

    async fn update(&self, records: &[AllocationRecord]) -> Result<Vec<bool>, StoreError> {
        let mut state = self.state.lock();
        state.admit_write()?;

        Ok(records
            .iter()
            .map(|record| {
                let Some(pos) = state.position(&record.id) else {
                    return false;
                };
                let current = state.records[pos].status;
                if current != record.status && !current.can_transition_to(record.status) {
                    tracing::debug!(
                        id = %record.id,
                        from = ?current,
                        to = ?record.status,
                        "update rejected"
                    );
                    return false;
                }
                state.records[pos] = record.clone();
                true
            })
            .collect())
    }

    async fn compare_and_swap(
        &self,
        id: &str,
        expected: AllocationStatus,
        next: AllocationStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        state.admit_write()?;

        let pos = state
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if state.records[pos].status != expected {
            return Ok(false);
        }
        if !expected.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: expected,
                to: next,
            });
        }
        state.records[pos].status = next;
        Ok(true)
    }

    async fn query(&self, filter: &RecordFilter) -> Result<Vec<AllocationRecord>, StoreError> {
        let state = self.state.lock();
        if state.unreachable {
            return Err(StoreError::Unreachable("store offline".into()));
        }
        Ok(state
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(alias: &str, external: &str, status: AllocationStatus) -> AllocationRecord {
        AllocationRecord {
            id: String::new(),
            alias: alias.into(),
            external_resource_id: external.into(),
            login_endpoint: "https://env.example.test".into(),
            signup_identity: format!("{alias}@pool.example.test"),
            credential_secret: "token-abc".into(),
            pool_tag: "nightly".into(),
            status,
            expires_at_ms: u128::MAX,
            elapsed_ms: 0,
            owner: "ci".into(),
            managed: true,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_external_id_atomically() {
        let store = InMemoryRecordStore::new();
        store.seed(record("a", "ext-1", AllocationStatus::Available));

        let err = store
            .create(&[
                record("b", "ext-2", AllocationStatus::InProgress),
                record("c", "ext-1", AllocationStatus::InProgress),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_cas_only_from_expected_status() {
        let store = InMemoryRecordStore::new();
        let id = store.seed(record("a", "ext-1", AllocationStatus::Available));

        assert!(store
            .compare_and_swap(&id, AllocationStatus::Available, AllocationStatus::Assigned)
            .await
            .unwrap());
        assert!(!store
            .compare_and_swap(&id, AllocationStatus::Available, AllocationStatus::Assigned)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_cas_rejects_transition_outside_lifecycle() {
        let store = InMemoryRecordStore::new();
        let id = store.seed(record("a", "ext-1", AllocationStatus::Deleted));

        let err = store
            .compare_and_swap(&id, AllocationStatus::Deleted, AllocationStatus::Available)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_update_flags_invalid_and_missing_records() {
        let store = InMemoryRecordStore::new();
        let id = store.seed(record("a", "ext-1", AllocationStatus::Deleted));

        let mut revived = record("a", "ext-1", AllocationStatus::Available);
        revived.id = id;
        let mut missing = record("b", "ext-2", AllocationStatus::Deleted);
        missing.id = "nope".into();

        let flags = store.update(&[revived, missing]).await.unwrap();
        assert_eq!(flags, vec![false, false]);
    }

    #[tokio::test]
    async fn test_injected_failures_are_transient_then_clear() {
        let store = InMemoryRecordStore::new();
        store.fail_next_writes(1);

        let first = store
            .create(&[record("a", "ext-1", AllocationStatus::InProgress)])
            .await;
        assert!(first.unwrap_err().is_transient());

        let second = store
            .create(&[record("a", "ext-1", AllocationStatus::InProgress)])
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(store.write_calls(), 2);
    }
}
