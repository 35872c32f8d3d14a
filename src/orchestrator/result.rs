use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state_machine::{ApplicationRecord, ApplicationStatus};
use crate::store::SkipReason;

/// Record counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub total: usize,
    pub applied: usize,
    pub failed: usize,
    pub pending: usize,
}

impl Tally {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ApplicationRecord>) -> Self {
        records.into_iter().fold(Tally::default(), |mut tally, record| {
            tally.total += 1;
            match record.status {
                ApplicationStatus::Applied => tally.applied += 1,
                ApplicationStatus::Failed => tally.failed += 1,
                ApplicationStatus::Pending => tally.pending += 1,
            }
            tally
        })
    }
}

/// A selected posting that did not get a new attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPosting {
    pub job_id: String,
    pub reason: SkipReason,
}

/// Outcome of one run. `records` follows the filtered source order,
/// not completion order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Number of selected postings in each executed batch.
    pub batch_sizes: Vec<usize>,
    pub tally: Tally,
    pub records: Vec<ApplicationRecord>,
    pub skipped: Vec<SkippedPosting>,
    pub cancelled: bool,
}

impl BatchResult {
    pub fn batches(&self) -> usize {
        self.batch_sizes.len()
    }

    /// `(job_id, error_message)` for every failed record.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records
            .iter()
            .filter(|r| r.status == ApplicationStatus::Failed)
            .map(|r| (r.job_id.as_str(), r.error_message.as_deref().unwrap_or("")))
    }
}

/// Snapshot of every stored record, as served by `bulkapply status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub tally: Tally,
    pub applications: Vec<ApplicationRecord>,
}

impl StatusReport {
    pub fn from_records(applications: Vec<ApplicationRecord>) -> Self {
        Self {
            tally: Tally::from_records(&applications),
            applications,
        }
    }
}
