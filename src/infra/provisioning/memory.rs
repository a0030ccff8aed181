//! In-memory provisioning platform.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::backend::{
    CreatedResource, LiveResource, LiveState, ProvisioningClient, QuotaInfo, ResourceSpec,
};
use crate::core::error::ProvisionError;

#[derive(Default)]
struct PlatformState {
    quota_limit: u32,
    resources: Vec<LiveResource>,
    create_calls: u32,
    failing_creates: HashSet<u32>,
    stale_creates: HashSet<u32>,
    delete_calls: Vec<Vec<String>>,
    unavailable: bool,
    fail_deletes: bool,
    in_flight: usize,
    peak_in_flight: usize,
}

impl PlatformState {
    fn active(&self) -> impl Iterator<Item = &LiveResource> {
        self.resources
            .iter()
            .filter(|r| r.state == LiveState::Active)
    }

    fn check_available(&self) -> Result<(), ProvisionError> {
        if self.unavailable {
            return Err(ProvisionError::Unavailable("platform offline".into()));
        }
        Ok(())
    }
}

/// Provisioning platform simulated in memory.
///
/// Quota is a fixed limit on active resources across all tags. Individual
/// create calls can be scripted to fail or to come back already inactive,
/// and every delete call is logged so tests can assert on idempotence.
#[derive(Default)]
pub struct InMemoryProvisioningClient {
    state: Mutex<PlatformState>,
    create_delay: Duration,
}

impl InMemoryProvisioningClient {
    /// Platform allowing at most `quota_limit` active resources.
    #[must_use]
    pub fn new(quota_limit: u32) -> Self {
        Self {
            state: Mutex::new(PlatformState {
                quota_limit,
                ..PlatformState::default()
            }),
            create_delay: Duration::ZERO,
        }
    }

    /// Make every create call take `delay`.
    #[must_use]
    pub const fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// Reject the create call with this 1-based ordinal.
    pub fn fail_create_call(&self, ordinal: u32) {
        self.state.lock().failing_creates.insert(ordinal);
    }

    /// Let the create call with this 1-based ordinal succeed but leave the
    /// resource inactive.
    pub fn stale_create_call(&self, ordinal: u32) {
        self.state.lock().stale_creates.insert(ordinal);
    }

    /// Toggle a full outage. Every call fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Make delete calls fail while leaving resources in place.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.state.lock().fail_deletes = fail;
    }

    /// Add a resource to the live directory directly.
    pub fn add_live(&self, resource: LiveResource) {
        self.state.lock().resources.push(resource);
    }

    /// Change the platform state of a resource. Returns `false` if unknown.
    pub fn set_state(&self, external_id: &str, live_state: LiveState) -> bool {
        let mut state = self.state.lock();
        if let Some(resource) = state
            .resources
            .iter_mut()
            .find(|r| r.external_resource_id == external_id)
        {
            resource.state = live_state;
            return true;
        }
        false
    }

    /// Drop a resource from the live directory as if the platform expired it.
    pub fn remove_live(&self, external_id: &str) {
        self.state
            .lock()
            .resources
            .retain(|r| r.external_resource_id != external_id);
    }

    /// Whether `external_id` is in the live directory.
    #[must_use]
    pub fn is_live(&self, external_id: &str) -> bool {
        self.state
            .lock()
            .resources
            .iter()
            .any(|r| r.external_resource_id == external_id)
    }

    /// Create calls seen so far.
    #[must_use]
    pub fn create_calls(&self) -> u32 {
        self.state.lock().create_calls
    }

    /// Every delete call, including failed ones, with its id list.
    #[must_use]
    pub fn delete_calls(&self) -> Vec<Vec<String>> {
        self.state.lock().delete_calls.clone()
    }

    /// Highest number of create calls observed in flight at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.state.lock().peak_in_flight
    }
}

#[async_trait]
impl ProvisioningClient for InMemoryProvisioningClient {
    async fn create(&self, spec: &ResourceSpec) -> Result<CreatedResource, ProvisionError> {
        {
            let mut state = self.state.lock();
            state.in_flight += 1;
            state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
        }
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }

        let mut state = self.state.lock();
        state.in_flight -= 1;
        state.create_calls += 1;
        let ordinal = state.create_calls;
        state.check_available()?;

        if state.failing_creates.contains(&ordinal) {
            return Err(ProvisionError::Rejected(format!(
                "create #{ordinal} for `{}` rejected",
                spec.alias
            )));
        }
        let used = u32::try_from(state.active().count()).unwrap_or(u32::MAX);
        if used >= state.quota_limit {
            return Err(ProvisionError::Rejected("quota exhausted".into()));
        }

        let external_resource_id = format!("ext-{ordinal:04}");
        let live_state = if state.stale_creates.contains(&ordinal) {
            LiveState::Inactive
        } else {
            LiveState::Active
        };
        state.resources.push(LiveResource {
            external_resource_id: external_resource_id.clone(),
            pool_tag: spec.pool_tag.clone(),
            state: live_state,
        });

        Ok(CreatedResource {
            login_endpoint: format!("https://{external_resource_id}.env.example.test"),
            signup_identity: format!("{}@pool.example.test", spec.alias),
            credential_handle: format!("token-{external_resource_id}"),
            external_resource_id,
        })
    }

    async fn delete(&self, external_ids: &[String]) -> Result<(), ProvisionError> {
        let mut state = self.state.lock();
        state.delete_calls.push(external_ids.to_vec());
        state.check_available()?;
        if state.fail_deletes {
            return Err(ProvisionError::Unavailable("delete endpoint failing".into()));
        }
        state
            .resources
            .retain(|r| !external_ids.contains(&r.external_resource_id));
        Ok(())
    }

    async fn query_quota(&self) -> Result<QuotaInfo, ProvisionError> {
        let state = self.state.lock();
        state.check_available()?;
        let used = u32::try_from(state.active().count()).unwrap_or(u32::MAX);
        Ok(QuotaInfo {
            remaining: state.quota_limit.saturating_sub(used),
            used,
        })
    }

    async fn query_active_count_by_tag(&self, tag: &str) -> Result<u32, ProvisionError> {
        let state = self.state.lock();
        state.check_available()?;
        Ok(u32::try_from(state.active().filter(|r| r.pool_tag == tag).count()).unwrap_or(u32::MAX))
    }

    async fn query_status(
        &self,
        external_ids: &[String],
    ) -> Result<Vec<LiveState>, ProvisionError> {
        let state = self.state.lock();
        state.check_available()?;
        Ok(external_ids
            .iter()
            .map(|id| {
                state
                    .resources
                    .iter()
                    .find(|r| &r.external_resource_id == id)
                    .map_or(LiveState::Inactive, |r| r.state)
            })
            .collect())
    }

    async fn list_live(&self, tag: &str) -> Result<Vec<LiveResource>, ProvisionError> {
        let state = self.state.lock();
        state.check_available()?;
        Ok(state
            .resources
            .iter()
            .filter(|r| r.pool_tag == tag)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(alias: &str) -> ResourceSpec {
        ResourceSpec {
            alias: alias.into(),
            pool_tag: "nightly".into(),
            resource_spec_ref: "scratch-def".into(),
            snapshot_source_tag: None,
            expiry_days: 1,
        }
    }

    #[tokio::test]
    async fn test_quota_tracks_active_resources() {
        let client = InMemoryProvisioningClient::new(2);
        client.create(&spec("a")).await.unwrap();

        let quota = client.query_quota().await.unwrap();
        assert_eq!(quota, QuotaInfo { remaining: 1, used: 1 });

        client.create(&spec("b")).await.unwrap();
        let err = client.create(&spec("c")).await.unwrap_err();
        assert_eq!(err, ProvisionError::Rejected("quota exhausted".into()));
    }

    #[tokio::test]
    async fn test_scripted_create_failures_by_ordinal() {
        let client = InMemoryProvisioningClient::new(10);
        client.fail_create_call(2);
        client.stale_create_call(3);

        let first = client.create(&spec("a")).await.unwrap();
        assert!(client.create(&spec("b")).await.is_err());
        let third = client.create(&spec("c")).await.unwrap();

        let states = client
            .query_status(&[
                first.external_resource_id,
                third.external_resource_id,
                "unknown".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(states, vec![LiveState::Active, LiveState::Inactive, LiveState::Inactive]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_logged() {
        let client = InMemoryProvisioningClient::new(10);
        let created = client.create(&spec("a")).await.unwrap();
        let ids = vec![created.external_resource_id.clone()];

        client.delete(&ids).await.unwrap();
        client.delete(&ids).await.unwrap();

        assert!(!client.is_live(&created.external_resource_id));
        assert_eq!(client.delete_calls().len(), 2);
    }
}
