use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Admission, SkipReason, StoreError};
use crate::state_machine::{
    ApplicationRecord, ApplicationStatus, FailureCause, StateMachine, Transition,
};

/// In-memory body of a store: every record in creation order.
///
/// Both store implementations mutate a ledger under their own lock, so the
/// admission and transition rules live here once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordLedger {
    records: Vec<ApplicationRecord>,
}

impl RecordLedger {
    pub fn admit(&mut self, mut record: ApplicationRecord, supersede_failed: bool) -> Admission {
        let previous = self.latest(&record.job_id).map(|latest| {
            let abandoned = matches!(latest.failure, Some(FailureCause::Abandoned));
            (latest.status, latest.attempt, abandoned)
        });

        match previous {
            Some((ApplicationStatus::Pending, ..)) => Admission::Skipped(SkipReason::InFlight),
            Some((ApplicationStatus::Applied, ..)) => Admission::Skipped(SkipReason::AlreadyApplied),
            // Abandoned attempts are readmitted without `supersede_failed`.
            Some((ApplicationStatus::Failed, _, false)) if !supersede_failed => {
                Admission::Skipped(SkipReason::PreviouslyFailed)
            }
            Some((ApplicationStatus::Failed, attempt, _)) => {
                record.attempt = attempt + 1;
                self.records.push(record.clone());
                Admission::Created(record)
            }
            None => {
                self.records.push(record.clone());
                Admission::Created(record)
            }
        }
    }

    pub fn apply(
        &mut self,
        record_id: &str,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, StoreError> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| StoreError::NotFound(record_id.to_string()))?;
        StateMachine::apply(record, transition, at)?;
        Ok(record.clone())
    }

    pub fn get(&self, record_id: &str) -> Option<&ApplicationRecord> {
        self.records.iter().find(|r| r.id == record_id)
    }

    pub fn latest(&self, job_id: &str) -> Option<&ApplicationRecord> {
        self.records.iter().rev().find(|r| r.job_id == job_id)
    }

    pub fn records(&self) -> &[ApplicationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::JobPosting;

    fn record(job_id: &str) -> ApplicationRecord {
        ApplicationRecord::pending(&JobPosting {
            id: job_id.into(),
            title: "Engineer".into(),
            company: "Hooli".into(),
            location: String::new(),
            salary: None,
            url: format!("https://jobs.test/{job_id}"),
            description: String::new(),
        })
    }

    fn fail(ledger: &mut RecordLedger, record_id: &str) {
        ledger
            .apply(
                record_id,
                Transition::Failed(FailureCause::Rejected {
                    message: "closed".into(),
                }),
                Utc::now(),
            )
            .unwrap();
    }

    fn created(admission: Admission) -> ApplicationRecord {
        match admission {
            Admission::Created(record) => record,
            other => panic!("expected Created, got {other:?}"),
        }
    }

    #[test]
    fn second_pending_attempt_is_refused() {
        let mut ledger = RecordLedger::default();
        created(ledger.admit(record("a"), false));
        assert_eq!(
            ledger.admit(record("a"), true),
            Admission::Skipped(SkipReason::InFlight)
        );
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn applied_jobs_are_never_resubmitted() {
        let mut ledger = RecordLedger::default();
        let first = created(ledger.admit(record("a"), false));
        ledger
            .apply(
                &first.id,
                Transition::Applied {
                    resume_version: "cv".into(),
                    response_payload: None,
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(
            ledger.admit(record("a"), true),
            Admission::Skipped(SkipReason::AlreadyApplied)
        );
    }

    #[test]
    fn failed_jobs_need_explicit_resubmission() {
        let mut ledger = RecordLedger::default();
        let first = created(ledger.admit(record("a"), false));
        fail(&mut ledger, &first.id);

        assert_eq!(
            ledger.admit(record("a"), false),
            Admission::Skipped(SkipReason::PreviouslyFailed)
        );

        let second = created(ledger.admit(record("a"), true));
        assert_eq!(second.attempt, 2);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.latest("a").unwrap().id, second.id);
        // The failed attempt is kept untouched.
        assert_eq!(ledger.get(&first.id).unwrap().status, ApplicationStatus::Failed);
    }

    #[test]
    fn abandoned_attempt_is_readmitted_without_opt_in() {
        let mut ledger = RecordLedger::default();
        let first = created(ledger.admit(record("a"), false));
        ledger
            .apply(&first.id, Transition::Failed(FailureCause::Abandoned), Utc::now())
            .unwrap();

        let second = created(ledger.admit(record("a"), false));
        assert_eq!(second.attempt, 2);
        assert_eq!(
            ledger.get(&first.id).unwrap().failure,
            Some(FailureCause::Abandoned)
        );
    }

    #[test]
    fn transition_of_unknown_record_is_not_found() {
        let mut ledger = RecordLedger::default();
        let err = ledger
            .apply(
                "missing",
                Transition::Failed(FailureCause::Crashed {
                    message: "x".into(),
                }),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn terminal_records_cannot_be_reapplied() {
        let mut ledger = RecordLedger::default();
        let first = created(ledger.admit(record("a"), false));
        fail(&mut ledger, &first.id);
        let err = ledger
            .apply(
                &first.id,
                Transition::Applied {
                    resume_version: "cv".into(),
                    response_payload: None,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Transition(_)));
    }

    #[test]
    fn ledger_serializes_as_plain_array() {
        let mut ledger = RecordLedger::default();
        created(ledger.admit(record("a"), false));
        let json = serde_json::to_value(&ledger).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["job_id"], "a");
        assert_eq!(json[0]["status"], "pending");
    }
}
