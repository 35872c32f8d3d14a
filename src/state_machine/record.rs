use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collaborators::JobPosting;

/// Lifecycle status of one application attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Applied,
    Failed,
}

impl ApplicationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationStatus::Pending => write!(f, "pending"),
            ApplicationStatus::Applied => write!(f, "applied"),
            ApplicationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The externally quota-bound pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Tailor,
    Submit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Tailor => write!(f, "tailor"),
            Step::Submit => write!(f, "submit"),
        }
    }
}

/// Why an attempt ended in `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    /// The local quota for `resource` was exhausted.
    RateLimited { resource: String, retry_after_secs: u64 },
    /// The collaborator behind `step` returned an error.
    Collaborator { step: Step, message: String },
    Timeout { step: Step, after_ms: u64 },
    /// The submitter answered but refused the application.
    Rejected { message: String },
    /// The quota store could not be consulted.
    LimiterUnavailable { resource: String, message: String },
    /// The pipeline task panicked.
    Crashed { message: String },
    /// An interrupted attempt was given up explicitly while still `pending`.
    Abandoned,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::RateLimited {
                resource,
                retry_after_secs,
            } => write!(
                f,
                "rate limit exceeded for {resource}, retry after {retry_after_secs}s"
            ),
            FailureCause::Collaborator { step, message } => write!(f, "{step} failed: {message}"),
            FailureCause::Timeout { step, after_ms } => {
                write!(f, "{step} timed out after {after_ms}ms")
            }
            FailureCause::Rejected { message } => write!(f, "submission rejected: {message}"),
            FailureCause::LimiterUnavailable { resource, message } => {
                write!(f, "rate limiter unavailable for {resource}: {message}")
            }
            FailureCause::Crashed { message } => write!(f, "pipeline crashed: {message}"),
            FailureCause::Abandoned => write!(f, "abandoned after an interrupted run"),
        }
    }
}

/// Persistent record of one attempt to apply to one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: String,
    pub job_id: String,
    /// 1 for the first attempt, incremented when a failed attempt is explicitly superseded.
    pub attempt: u32,
    pub status: ApplicationStatus,
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary: Option<String>,
    pub url: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resume_version: Option<String>,
    pub response_payload: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub failure: Option<FailureCause>,
}

impl ApplicationRecord {
    /// A fresh `pending` record copying the posting's fields for audit.
    pub fn pending(posting: &JobPosting) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            job_id: posting.id.clone(),
            attempt: 1,
            status: ApplicationStatus::Pending,
            title: posting.title.clone(),
            company: posting.company.clone(),
            location: posting.location.clone(),
            salary: posting.salary.clone(),
            url: posting.url.clone(),
            description: posting.description.clone(),
            created_at: now,
            updated_at: now,
            resume_version: None,
            response_payload: None,
            error_message: None,
            failure: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting() -> JobPosting {
        JobPosting {
            id: "li-42".into(),
            title: "Platform Engineer".into(),
            company: "Globex".into(),
            location: "Lisbon".into(),
            salary: Some("€80k".into()),
            url: "https://jobs.test/li-42".into(),
            description: "Kubernetes and Rust".into(),
        }
    }

    #[test]
    fn pending_record_copies_posting() {
        let record = ApplicationRecord::pending(&posting());
        assert_eq!(record.job_id, "li-42");
        assert_eq!(record.attempt, 1);
        assert_eq!(record.status, ApplicationStatus::Pending);
        assert_eq!(record.company, "Globex");
        assert_eq!(record.salary.as_deref(), Some("€80k"));
        assert!(record.resume_version.is_none());
        assert!(record.error_message.is_none());
        assert!(!record.is_terminal());
    }

    #[test]
    fn records_get_distinct_ids() {
        let a = ApplicationRecord::pending(&posting());
        let b = ApplicationRecord::pending(&posting());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ApplicationStatus::Applied).unwrap(),
            r#""applied""#
        );
        assert_eq!(ApplicationStatus::Failed.to_string(), "failed");
        assert!(ApplicationStatus::Failed.is_terminal());
        assert!(!ApplicationStatus::Pending.is_terminal());
    }

    #[test]
    fn failure_cause_display() {
        let cause = FailureCause::RateLimited {
            resource: "submit".into(),
            retry_after_secs: 3599,
        };
        assert_eq!(
            cause.to_string(),
            "rate limit exceeded for submit, retry after 3599s"
        );
        let cause = FailureCause::Collaborator {
            step: Step::Tailor,
            message: "model overloaded".into(),
        };
        assert_eq!(cause.to_string(), "tailor failed: model overloaded");
        let cause = FailureCause::Timeout {
            step: Step::Submit,
            after_ms: 250,
        };
        assert_eq!(cause.to_string(), "submit timed out after 250ms");
    }

    #[test]
    fn failure_cause_is_tagged_in_json() {
        let cause = FailureCause::Rejected {
            message: "closed".into(),
        };
        let json = serde_json::to_value(&cause).unwrap();
        assert_eq!(json["kind"], "rejected");
        assert_eq!(json["message"], "closed");

        let json = serde_json::to_value(FailureCause::Abandoned).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "abandoned" }));
        assert_eq!(
            FailureCause::Abandoned.to_string(),
            "abandoned after an interrupted run"
        );
    }
}
