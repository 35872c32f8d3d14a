use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Search criteria forwarded verbatim to the job source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub keywords: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub remote_only: bool,
    #[serde(default)]
    pub experience_level: Option<String>,
}

/// Input of one orchestration run. Immutable for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationParameters {
    pub criteria: SearchCriteria,
    /// Minimum acceptable annual salary.
    #[serde(default)]
    pub min_salary: Option<u64>,
    /// Only keep postings whose description mentions visa sponsorship.
    #[serde(default)]
    pub requires_sponsorship: bool,
    #[serde(default = "default_max_applications")]
    pub max_applications: u32,
    /// Overrides the orchestrator's configured batch size when set.
    #[serde(default)]
    pub batch_size: Option<usize>,
    pub base_document_id: String,
    /// Allow a new attempt for jobs whose latest record is `failed`.
    #[serde(default)]
    pub resubmit_failed: bool,
}

fn default_max_applications() -> u32 {
    20
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("search keywords must not be empty")]
    EmptyKeywords,

    #[error("base document id is required")]
    MissingBaseDocument,

    #[error("max applications must be at least 1")]
    ZeroMaxApplications,

    #[error("batch size must be at least 1")]
    ZeroBatchSize,
}

impl ApplicationParameters {
    pub fn new(criteria: SearchCriteria, base_document_id: impl Into<String>) -> Self {
        Self {
            criteria,
            min_salary: None,
            requires_sponsorship: false,
            max_applications: default_max_applications(),
            batch_size: None,
            base_document_id: base_document_id.into(),
            resubmit_failed: false,
        }
    }

    /// Rejects malformed parameters before any external call is made.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.criteria.keywords.trim().is_empty() {
            return Err(ValidationError::EmptyKeywords);
        }
        if self.base_document_id.trim().is_empty() {
            return Err(ValidationError::MissingBaseDocument);
        }
        if self.max_applications == 0 {
            return Err(ValidationError::ZeroMaxApplications);
        }
        if self.batch_size == Some(0) {
            return Err(ValidationError::ZeroBatchSize);
        }
        Ok(())
    }

    pub fn effective_batch_size(&self, default: usize) -> usize {
        self.batch_size.unwrap_or(default)
    }
}
