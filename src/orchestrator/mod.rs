//! Motor de orquestração em lotes.
//!
//! Uma execução busca uma vez, filtra e limita as vagas e percorre a lista em
//! lotes de tamanho fixo. Os pipelines de um lote rodam em paralelo; o lote
//! seguinte só começa depois que todos os pipelines do atual terminaram.

mod pipeline;
mod result;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::collaborators::{
    ApplicationSubmitter, CollaboratorError, DocumentTailor, JobPosting, JobSource,
};
use crate::error::RunError;
use crate::filter::PostingFilter;
use crate::params::ApplicationParameters;
use crate::rate_limit::{Decision, RateLimitError, RateLimiter, resource};
use crate::state_machine::{ApplicationRecord, FailureCause, Transition};
use crate::store::{Admission, ApplicationStore, StoreError};

use pipeline::Pipeline;
pub use result::{BatchResult, SkippedPosting, StatusReport, Tally};

/// The external systems a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn JobSource>,
    pub tailor: Arc<dyn DocumentTailor>,
    pub submitter: Arc<dyn ApplicationSubmitter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Batch size used when the run request does not override it.
    pub default_batch_size: usize,
    /// Upper bound for each external call.
    pub call_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            default_batch_size: 5,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// One slot per selected posting of a batch, in source order.
enum Slot {
    Record(ApplicationRecord),
    Skipped(SkippedPosting),
}

struct BatchOutcome {
    slots: Vec<Slot>,
    fatal: Option<StoreError>,
    interrupted: bool,
}

pub struct BatchOrchestrator {
    collaborators: Collaborators,
    limiter: Arc<RateLimiter>,
    store: Arc<dyn ApplicationStore>,
    settings: OrchestratorSettings,
}

impl BatchOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        limiter: Arc<RateLimiter>,
        store: Arc<dyn ApplicationStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            collaborators,
            limiter,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn ApplicationStore> {
        &self.store
    }

    /// Counts and records as currently persisted, including those of a run in progress.
    pub async fn status(&self) -> Result<StatusReport, StoreError> {
        Ok(StatusReport::from_records(self.store.list().await?))
    }

    pub async fn run(&self, params: &ApplicationParameters) -> Result<BatchResult, RunError> {
        self.run_until_cancelled(params, CancellationToken::new())
            .await
    }

    /// Runs to completion or until `cancel` fires. On cancellation no new batch
    /// or pipeline starts; in-flight pipelines finish their current step.
    pub async fn run_until_cancelled(
        &self,
        params: &ApplicationParameters,
        cancel: CancellationToken,
    ) -> Result<BatchResult, RunError> {
        params.validate()?;
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);
        self.execute(params, cancel, run_id).instrument(span).await
    }

    async fn execute(
        &self,
        params: &ApplicationParameters,
        cancel: CancellationToken,
        run_id: String,
    ) -> Result<BatchResult, RunError> {
        let started_at = Utc::now();

        let postings = self.search(params).await?;
        let found = postings.len();
        let selected = select(
            postings,
            &PostingFilter::from_parameters(params),
            params.max_applications as usize,
        );
        info!(found, selected = selected.len(), "postings selected");

        let batch_size = params
            .effective_batch_size(self.settings.default_batch_size)
            .max(1);
        let pipeline = Arc::new(Pipeline {
            tailor: self.collaborators.tailor.clone(),
            submitter: self.collaborators.submitter.clone(),
            limiter: self.limiter.clone(),
            store: self.store.clone(),
            call_timeout: self.settings.call_timeout,
            cancel: cancel.clone(),
        });
        let permits = Arc::new(Semaphore::new(batch_size));

        let mut records = Vec::with_capacity(selected.len());
        let mut skipped = Vec::new();
        let mut batch_sizes = Vec::new();
        let mut cancelled = false;

        for (index, batch) in selected.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            batch_sizes.push(batch.len());
            info!(batch = index + 1, size = batch.len(), "starting batch");

            let outcome = self
                .run_batch(batch, params, &pipeline, &permits, &cancel)
                .await;
            for slot in outcome.slots {
                match slot {
                    Slot::Record(record) => records.push(record),
                    Slot::Skipped(posting) => skipped.push(posting),
                }
            }

            if let Some(source) = outcome.fatal {
                let settled: Vec<_> = records.into_iter().filter(|r| r.is_terminal()).collect();
                warn!(error = %source, settled = settled.len(), "aborting run");
                return Err(RunError::Persistence { source, settled });
            }
            if outcome.interrupted {
                cancelled = true;
                break;
            }
            info!(batch = index + 1, "batch settled");
        }

        let result = BatchResult {
            run_id,
            started_at,
            finished_at: Utc::now(),
            batch_sizes,
            tally: Tally::from_records(&records),
            records,
            skipped,
            cancelled,
        };
        info!(
            total = result.tally.total,
            applied = result.tally.applied,
            failed = result.tally.failed,
            pending = result.tally.pending,
            cancelled,
            "run finished"
        );
        Ok(result)
    }

    async fn search(&self, params: &ApplicationParameters) -> Result<Vec<JobPosting>, RunError> {
        match self.limiter.check_and_consume(resource::SEARCH).await {
            Ok(Decision::Allowed) => {}
            Ok(Decision::Denied { retry_after }) => {
                return Err(RunError::RateLimited {
                    resource: resource::SEARCH.to_string(),
                    retry_after,
                });
            }
            Err(RateLimitError::UnknownResource(key)) => return Err(RunError::MissingPolicy(key)),
            Err(RateLimitError::Unavailable(source)) => {
                return Err(RunError::Persistence {
                    source,
                    settled: Vec::new(),
                });
            }
        }

        let timeout = self.settings.call_timeout;
        match tokio::time::timeout(timeout, self.collaborators.source.search(&params.criteria)).await
        {
            Ok(Ok(postings)) => Ok(postings),
            Ok(Err(err)) => Err(RunError::Search(err)),
            Err(_) => Err(RunError::Search(CollaboratorError::Timeout {
                after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })),
        }
    }

    async fn run_batch(
        &self,
        batch: &[JobPosting],
        params: &ApplicationParameters,
        pipeline: &Arc<Pipeline>,
        permits: &Arc<Semaphore>,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            slots: Vec::with_capacity(batch.len()),
            fatal: None,
            interrupted: false,
        };
        let mut in_flight = Vec::with_capacity(batch.len());

        for posting in batch {
            if cancel.is_cancelled() {
                outcome.interrupted = true;
                break;
            }

            // The pending record exists before any external call is made.
            let admitted = match self
                .store
                .begin(ApplicationRecord::pending(posting), params.resubmit_failed)
                .await
            {
                Ok(Admission::Created(record)) => record,
                Ok(Admission::Skipped(reason)) => {
                    info!(job_id = %posting.id, %reason, "skipping posting");
                    outcome.slots.push(Slot::Skipped(SkippedPosting {
                        job_id: posting.id.clone(),
                        reason,
                    }));
                    continue;
                }
                Err(err) => {
                    outcome.fatal = Some(err);
                    break;
                }
            };

            let pipeline = pipeline.clone();
            let permits = permits.clone();
            let base_document_id = params.base_document_id.clone();
            let record = admitted.clone();
            let span = info_span!("pipeline", job_id = %admitted.job_id);
            let handle = tokio::spawn(
                async move {
                    let _permit = permits.acquire_owned().await.ok();
                    pipeline.drive(record, &base_document_id).await
                }
                .instrument(span),
            );

            outcome.slots.push(Slot::Record(admitted.clone()));
            in_flight.push((outcome.slots.len() - 1, admitted, handle));
        }

        // Barrier: every launched pipeline settles before the batch returns.
        for (position, admitted, handle) in in_flight {
            let settled = match handle.await {
                Ok(Ok(record)) => record,
                Ok(Err(err)) => {
                    outcome.fatal.get_or_insert(err);
                    self.refresh(admitted).await
                }
                Err(join_err) => {
                    let cause = FailureCause::Crashed {
                        message: panic_message(join_err),
                    };
                    warn!(job_id = %admitted.job_id, %cause, "pipeline crashed");
                    let transitioned = self
                        .store
                        .transition(&admitted.id, Transition::Failed(cause))
                        .await;
                    match transitioned {
                        Ok(record) => record,
                        Err(err) => {
                            outcome.fatal.get_or_insert(err);
                            admitted
                        }
                    }
                }
            };
            // A record still pending here was stopped by cancellation.
            if !settled.is_terminal() {
                outcome.interrupted = true;
            }
            outcome.slots[position] = Slot::Record(settled);
        }

        outcome
    }

    // Latest stored copy of a record, or the given one if the store cannot answer.
    async fn refresh(&self, record: ApplicationRecord) -> ApplicationRecord {
        match self.store.get(&record.id).await {
            Ok(Some(stored)) => stored,
            _ => record,
        }
    }
}

/// Deduplicates by identifier, filters and caps, preserving source order.
fn select(postings: Vec<JobPosting>, filter: &PostingFilter, max: usize) -> Vec<JobPosting> {
    let mut seen = HashSet::new();
    postings
        .into_iter()
        .filter(|posting| seen.insert(posting.id.clone()))
        .filter(|posting| filter.matches(posting))
        .take(max)
        .collect()
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(id: &str, salary: &str) -> JobPosting {
        JobPosting {
            id: id.into(),
            title: "Engineer".into(),
            company: "Acme".into(),
            location: String::new(),
            salary: Some(salary.into()),
            url: format!("https://jobs.test/{id}"),
            description: String::new(),
        }
    }

    #[test]
    fn select_filters_caps_and_keeps_order() {
        let filter = PostingFilter {
            min_salary: Some(100_000),
            requires_sponsorship: false,
        };
        let postings = vec![
            posting("a", "$120k"),
            posting("b", "$80k"),
            posting("c", "$130k"),
            posting("d", "$140k"),
        ];
        let ids: Vec<_> = select(postings, &filter, 2)
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn select_keeps_first_of_duplicate_ids() {
        let mut duplicate = posting("a", "$50k");
        duplicate.title = "Second copy".into();
        let selected = select(
            vec![posting("a", "$120k"), duplicate, posting("b", "$120k")],
            &PostingFilter::default(),
            10,
        );
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].title, "Engineer");
    }

    #[test]
    fn default_settings() {
        let settings = OrchestratorSettings::default();
        assert_eq!(settings.default_batch_size, 5);
        assert_eq!(settings.call_timeout, Duration::from_secs(30));
    }
}
