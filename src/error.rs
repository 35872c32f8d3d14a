//! Tipos de erro de uma execução, derivados com `thiserror`.

use std::time::Duration;

use thiserror::Error;

use crate::collaborators::CollaboratorError;
use crate::params::ValidationError;
use crate::state_machine::ApplicationRecord;
use crate::store::StoreError;

/// Run-level failures. Per-application failures never surface here; they
/// are recorded on the application's record instead.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid parameters: {0}")]
    Validation(#[from] ValidationError),

    #[error("rate limit exceeded for {resource}, retry after {}s", .retry_after.as_secs())]
    RateLimited {
        resource: String,
        retry_after: Duration,
    },

    #[error("no rate limit policy configured for {0}")]
    MissingPolicy(String),

    #[error("job search failed: {0}")]
    Search(#[source] CollaboratorError),

    /// The store or the counter store became unreachable. `settled` holds the
    /// records that reached a terminal state before the run aborted.
    #[error("persistence failure after {} settled applications: {source}", .settled.len())]
    Persistence {
        #[source]
        source: StoreError,
        settled: Vec<ApplicationRecord>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display() {
        let err = RunError::RateLimited {
            resource: "search".into(),
            retry_after: Duration::from_secs(1800),
        };
        assert_eq!(
            err.to_string(),
            "rate limit exceeded for search, retry after 1800s"
        );
    }

    #[test]
    fn validation_converts_with_question_mark() {
        fn check() -> Result<(), RunError> {
            Err(ValidationError::MissingBaseDocument)?;
            Ok(())
        }
        assert!(matches!(
            check(),
            Err(RunError::Validation(ValidationError::MissingBaseDocument))
        ));
    }

    #[test]
    fn persistence_display_counts_settled() {
        let err = RunError::Persistence {
            source: StoreError::Unavailable("disk full".into()),
            settled: Vec::new(),
        };
        assert_eq!(
            err.to_string(),
            "persistence failure after 0 settled applications: store unavailable: disk full"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RunError>();
    }
}
