use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collaborators::{ApplicationSubmitter, CollaboratorError, DocumentTailor};
use crate::rate_limit::{Decision, RateLimitError, RateLimiter, resource};
use crate::state_machine::{ApplicationRecord, ApplicationStatus, FailureCause, Step, Transition};
use crate::store::{ApplicationStore, StoreError};

/// Where an admitted record ended up after the external steps.
enum Progress {
    Settled(Transition),
    /// Cancellation was observed between steps; the record stays `pending`.
    Interrupted,
    /// The counter store is unreachable. The record is failed and the run must abort.
    Fatal {
        cause: FailureCause,
        source: StoreError,
    },
}

/// Drives one admitted `pending` record through tailor and submit.
pub(crate) struct Pipeline {
    pub tailor: Arc<dyn DocumentTailor>,
    pub submitter: Arc<dyn ApplicationSubmitter>,
    pub limiter: Arc<RateLimiter>,
    pub store: Arc<dyn ApplicationStore>,
    pub call_timeout: Duration,
    pub cancel: CancellationToken,
}

impl Pipeline {
    /// Returns the record in its final state for this run. Only store failures
    /// are returned as errors; every other failure is recorded on the record.
    pub async fn drive(
        &self,
        record: ApplicationRecord,
        base_document_id: &str,
    ) -> Result<ApplicationRecord, StoreError> {
        match self.advance(&record, base_document_id).await {
            Progress::Settled(transition) => self.settle(&record, transition).await,
            Progress::Interrupted => {
                info!(job_id = %record.job_id, "cancelled before submit, leaving record pending");
                Ok(record)
            }
            Progress::Fatal { cause, source } => {
                if let Err(err) = self.settle(&record, Transition::Failed(cause)).await {
                    warn!(job_id = %record.job_id, error = %err, "could not record limiter failure");
                }
                Err(source)
            }
        }
    }

    async fn advance(&self, record: &ApplicationRecord, base_document_id: &str) -> Progress {
        if let Some(closed) = self.gate(resource::TAILOR).await {
            return closed;
        }
        let document = match self
            .call(
                Step::Tailor,
                self.tailor.tailor(&record.description, base_document_id),
            )
            .await
        {
            Ok(document) => document,
            Err(cause) => return Progress::Settled(Transition::Failed(cause)),
        };

        if self.cancel.is_cancelled() {
            return Progress::Interrupted;
        }

        if let Some(closed) = self.gate(resource::SUBMIT).await {
            return closed;
        }
        let receipt = match self
            .call(Step::Submit, self.submitter.submit(&record.url, &document))
            .await
        {
            Ok(receipt) => receipt,
            Err(cause) => return Progress::Settled(Transition::Failed(cause)),
        };

        if receipt.success {
            Progress::Settled(Transition::Applied {
                resume_version: document.version,
                response_payload: receipt.payload,
            })
        } else {
            let message = receipt
                .message
                .unwrap_or_else(|| "submitter reported failure".to_string());
            Progress::Settled(Transition::Failed(FailureCause::Rejected { message }))
        }
    }

    // `None` when the call may proceed.
    async fn gate(&self, resource: &str) -> Option<Progress> {
        let cause = match self.limiter.check_and_consume(resource).await {
            Ok(Decision::Allowed) => return None,
            Ok(Decision::Denied { retry_after }) => FailureCause::RateLimited {
                resource: resource.to_string(),
                retry_after_secs: retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0),
            },
            Err(err @ RateLimitError::UnknownResource(_)) => FailureCause::LimiterUnavailable {
                resource: resource.to_string(),
                message: err.to_string(),
            },
            Err(RateLimitError::Unavailable(source)) => {
                return Some(Progress::Fatal {
                    cause: FailureCause::LimiterUnavailable {
                        resource: resource.to_string(),
                        message: source.to_string(),
                    },
                    source,
                });
            }
        };
        Some(Progress::Settled(Transition::Failed(cause)))
    }

    async fn call<T, F>(&self, step: Step, call: F) -> Result<T, FailureCause>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(FailureCause::Collaborator {
                step,
                message: err.to_string(),
            }),
            Err(_) => Err(FailureCause::Timeout {
                step,
                after_ms: u64::try_from(self.call_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn settle(
        &self,
        record: &ApplicationRecord,
        transition: Transition,
    ) -> Result<ApplicationRecord, StoreError> {
        let updated = match self.store.transition(&record.id, transition).await {
            Ok(updated) => updated,
            // Abandoned (or otherwise settled) while this pipeline was running.
            Err(StoreError::Transition(err)) => {
                warn!(job_id = %record.job_id, status = %err.status, "record already settled, keeping stored outcome");
                return self
                    .store
                    .get(&record.id)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(record.id.clone()));
            }
            Err(err) => return Err(err),
        };
        match updated.status {
            ApplicationStatus::Applied => info!(
                job_id = %updated.job_id,
                resume_version = updated.resume_version.as_deref().unwrap_or(""),
                "application submitted"
            ),
            _ => warn!(
                job_id = %updated.job_id,
                error = updated.error_message.as_deref().unwrap_or(""),
                "application failed"
            ),
        }
        Ok(updated)
    }
}
