//! CLI error types.

use std::error::Error;

use mdpub_config::ConfigError;
use mdpub_confluence::PublishError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid file pattern {pattern}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("no files match {0}")]
    NoMatch(String),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("failed to write output")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Validation(String),
}

/// The error message followed by one "caused by" line per source.
pub(crate) fn chain(err: &dyn Error) -> Vec<String> {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    lines
}
