//! In-memory credential to session exchange.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::core::backend::{SessionExchanger, SessionHandle};
use crate::core::error::CredentialError;
use crate::core::record::AllocationRecord;

/// Session exchanger that accepts every credential except those marked failing.
#[derive(Default)]
pub struct InMemorySessionExchanger {
    failing: Mutex<HashSet<String>>,
    exchanges: Mutex<u32>,
}

impl InMemorySessionExchanger {
    /// Exchanger that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject exchanges for the resource with `external_id`.
    pub fn fail_for(&self, external_id: impl Into<String>) {
        self.failing.lock().insert(external_id.into());
    }

    /// Exchange attempts seen so far.
    #[must_use]
    pub fn exchanges(&self) -> u32 {
        *self.exchanges.lock()
    }
}

#[async_trait]
impl SessionExchanger for InMemorySessionExchanger {
    async fn exchange(&self, record: &AllocationRecord) -> Result<SessionHandle, CredentialError> {
        *self.exchanges.lock() += 1;
        if self.failing.lock().contains(&record.external_resource_id) {
            return Err(CredentialError::Exchange(format!(
                "grant rejected for `{}`",
                record.alias
            )));
        }
        Ok(SessionHandle {
            instance_url: record.login_endpoint.clone(),
            access_token: format!("session-{}", Uuid::new_v4().simple()),
        })
    }
}
