use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{Admission, ApplicationStore, RecordLedger, StoreError};
use crate::state_machine::{ApplicationRecord, Transition};

/// Volatile store for tests and demo runs.
#[derive(Default)]
pub struct MemoryStore {
    ledger: Mutex<RecordLedger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn begin(
        &self,
        record: ApplicationRecord,
        supersede_failed: bool,
    ) -> Result<Admission, StoreError> {
        Ok(self.ledger.lock().await.admit(record, supersede_failed))
    }

    async fn transition(
        &self,
        record_id: &str,
        transition: Transition,
    ) -> Result<ApplicationRecord, StoreError> {
        self.ledger.lock().await.apply(record_id, transition, Utc::now())
    }

    async fn get(&self, record_id: &str) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok(self.ledger.lock().await.get(record_id).cloned())
    }

    async fn latest(&self, job_id: &str) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok(self.ledger.lock().await.latest(job_id).cloned())
    }

    async fn list(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        Ok(self.ledger.lock().await.records().to_vec())
    }
}
