//! Logging estruturado com `tracing`, escrito em stderr.

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}'")]
    EnvFilter {
        value: String,
        #[source]
        source: ParseError,
    },

    #[error("telemetry error: {0}")]
    Subscriber(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Builds the filter: `RUST_LOG` wins over `level`.
pub fn filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|source| TelemetryError::EnvFilter {
            value: level.to_string(),
            source,
        }),
    }
}

/// Installs the global subscriber. Logs go to stderr so stdout stays usable
/// for `status --json`.
pub fn init(level: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level)?)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_error_display() {
        let err = TelemetryError::Subscriber(Box::new(std::io::Error::other("already set")));
        assert_eq!(err.to_string(), "telemetry error: already set");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn bad_filter_keeps_the_parse_error_as_source() {
        let err = EnvFilter::try_new("bulkapply=notalevel")
            .map_err(|source| TelemetryError::EnvFilter {
                value: "bulkapply=notalevel".into(),
                source,
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid log level/filter 'bulkapply=notalevel'");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn plain_level_builds_a_filter() {
        assert!(filter("debug").is_ok());
    }
}
