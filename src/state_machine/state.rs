use chrono::{DateTime, Utc};
use thiserror::Error;

use super::record::{ApplicationRecord, ApplicationStatus, FailureCause};

/// A terminal transition out of `pending`.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Applied {
        resume_version: String,
        response_payload: Option<serde_json::Value>,
    },
    Failed(FailureCause),
}

impl Transition {
    pub fn target(&self) -> ApplicationStatus {
        match self {
            Transition::Applied { .. } => ApplicationStatus::Applied,
            Transition::Failed(_) => ApplicationStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {record_id} for job {job_id} is already {status}")]
pub struct TransitionError {
    pub record_id: String,
    pub job_id: String,
    pub status: ApplicationStatus,
}

/// Applies transitions to application records.
///
/// The machine is `pending → applied` or `pending → failed`. Both targets are
/// terminal: a record that has left `pending` is never mutated again.
pub struct StateMachine;

impl StateMachine {
    pub fn apply(
        record: &mut ApplicationRecord,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if record.is_terminal() {
            return Err(TransitionError {
                record_id: record.id.clone(),
                job_id: record.job_id.clone(),
                status: record.status,
            });
        }

        record.status = transition.target();
        record.updated_at = at;
        match transition {
            Transition::Applied {
                resume_version,
                response_payload,
            } => {
                record.resume_version = Some(resume_version);
                record.response_payload = response_payload;
            }
            Transition::Failed(cause) => {
                record.error_message = Some(cause.to_string());
                record.failure = Some(cause);
            }
        }
        Ok(())
    }
}
