use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Admission, ApplicationStore, RecordLedger, StoreError};
use crate::rate_limit::{CounterStore, Decision, RateLimitCounter, RatePolicy};
use crate::state_machine::{ApplicationRecord, Transition};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    records: RecordLedger,
    #[serde(default)]
    counters: HashMap<String, RateLimitCounter>,
}

/// Durable store keeping records and counters in a single JSON document.
///
/// Every mutation is applied to a copy, written to a temporary file and
/// renamed over the document; the in-memory state only advances once the
/// write succeeded.
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<Snapshot>,
}

impl JsonFileStore {
    /// Opens the document at `path`, starting empty if it does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(err) => return Err(err.into()),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!(path = %path.display(), records = snapshot.records.len(), "opened state file");
        Ok(Self {
            path,
            state: Mutex::new(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ApplicationStore for JsonFileStore {
    async fn begin(
        &self,
        record: ApplicationRecord,
        supersede_failed: bool,
    ) -> Result<Admission, StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let admission = next.records.admit(record, supersede_failed);
        if matches!(admission, Admission::Created(_)) {
            self.persist(&next).await?;
            *state = next;
        }
        Ok(admission)
    }

    async fn transition(
        &self,
        record_id: &str,
        transition: Transition,
    ) -> Result<ApplicationRecord, StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let updated = next.records.apply(record_id, transition, Utc::now())?;
        self.persist(&next).await?;
        *state = next;
        Ok(updated)
    }

    async fn get(&self, record_id: &str) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok(self.state.lock().await.records.get(record_id).cloned())
    }

    async fn latest(&self, job_id: &str) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok(self.state.lock().await.records.latest(job_id).cloned())
    }

    async fn list(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        Ok(self.state.lock().await.records.records().to_vec())
    }
}

#[async_trait]
impl CounterStore for JsonFileStore {
    async fn consume(
        &self,
        resource: &str,
        policy: &RatePolicy,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        let mut state = self.state.lock().await;
        let mut slot = state.counters.get(resource).cloned();
        let decision = RateLimitCounter::consume(&mut slot, policy, now);
        if let (Decision::Allowed, Some(counter)) = (decision, slot) {
            let mut next = state.clone();
            next.counters.insert(resource.to_string(), counter);
            self.persist(&next).await?;
            *state = next;
        }
        Ok(decision)
    }

    async fn counter(&self, resource: &str) -> Result<Option<RateLimitCounter>, StoreError> {
        Ok(self.state.lock().await.counters.get(resource).cloned())
    }
}
