//! Persistência dos registros de candidatura e dos contadores de cota.
//!
//! [`ApplicationStore`] é o único escritor de registros. Os registros são
//! só de acréscimo: uma mudança de status altera o registro no lugar e uma
//! nova tentativa para a mesma vaga acrescenta um registro novo.

mod file;
mod ledger;
mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state_machine::{
    ApplicationRecord, ApplicationStatus, FailureCause, Transition, TransitionError,
};

pub use file::JsonFileStore;
pub use ledger::RecordLedger;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a posting was not admitted for a new attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A `pending` record already exists for the job.
    InFlight,
    AlreadyApplied,
    /// The latest attempt failed and the run did not ask to resubmit.
    PreviouslyFailed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InFlight => write!(f, "an attempt is already in flight"),
            SkipReason::AlreadyApplied => write!(f, "already applied"),
            SkipReason::PreviouslyFailed => write!(f, "previous attempt failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Created(ApplicationRecord),
    Skipped(SkipReason),
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Atomically admits `record` as a new `pending` attempt, unless the job's
    /// latest record forbids it. `supersede_failed` allows replacing a failed attempt.
    async fn begin(
        &self,
        record: ApplicationRecord,
        supersede_failed: bool,
    ) -> Result<Admission, StoreError>;

    /// Moves a `pending` record to a terminal state and returns the updated record.
    async fn transition(
        &self,
        record_id: &str,
        transition: Transition,
    ) -> Result<ApplicationRecord, StoreError>;

    async fn get(&self, record_id: &str) -> Result<Option<ApplicationRecord>, StoreError>;

    async fn latest(&self, job_id: &str) -> Result<Option<ApplicationRecord>, StoreError>;

    /// Every record in creation order.
    async fn list(&self) -> Result<Vec<ApplicationRecord>, StoreError>;
}

/// Fails every `pending` record as [`FailureCause::Abandoned`], or only those
/// of `job_ids` when it is not empty. Returns the abandoned records.
///
/// A record that reaches a terminal state concurrently is left as it is.
pub async fn abandon_pending(
    store: &dyn ApplicationStore,
    job_ids: &[String],
) -> Result<Vec<ApplicationRecord>, StoreError> {
    let mut abandoned = Vec::new();
    for record in store.list().await? {
        if record.status != ApplicationStatus::Pending
            || (!job_ids.is_empty() && !job_ids.contains(&record.job_id))
        {
            continue;
        }
        match store
            .transition(&record.id, Transition::Failed(FailureCause::Abandoned))
            .await
        {
            Ok(updated) => abandoned.push(updated),
            Err(StoreError::Transition(_)) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(abandoned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::JobPosting;

    fn record(job_id: &str) -> ApplicationRecord {
        ApplicationRecord::pending(&JobPosting {
            id: job_id.into(),
            title: "Engineer".into(),
            company: "Pied Piper".into(),
            location: String::new(),
            salary: None,
            url: String::new(),
            description: String::new(),
        })
    }

    #[tokio::test]
    async fn abandon_touches_only_pending_records() {
        let store = MemoryStore::new();
        for job in ["a", "b", "c"] {
            store.begin(record(job), false).await.unwrap();
        }
        let applied = store.latest("c").await.unwrap().unwrap();
        store
            .transition(
                &applied.id,
                Transition::Applied {
                    resume_version: "cv".into(),
                    response_payload: None,
                },
            )
            .await
            .unwrap();

        let only_a = abandon_pending(&store, &["a".to_string()]).await.unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].job_id, "a");
        assert_eq!(only_a[0].failure, Some(FailureCause::Abandoned));

        let rest = abandon_pending(&store, &[]).await.unwrap();
        let ids: Vec<_> = rest.iter().map(|r| r.job_id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
        let c = store.latest("c").await.unwrap().unwrap();
        assert_eq!(c.status, ApplicationStatus::Applied);
    }
}
