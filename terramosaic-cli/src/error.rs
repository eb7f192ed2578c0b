//! CLI error types.

use terramosaic::pipeline::PipelineError;
use thiserror::Error;

/// Errors surfaced to the terminal with a nonzero exit code.
#[derive(Debug, Error)]
pub enum CliError {
    /// A pipeline failed before any per-region work started.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Invalid command-line or derived configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The batch finished but some units failed.
    #[error("{0} units failed")]
    UnitsFailed(usize),
}
