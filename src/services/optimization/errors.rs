use crate::models::{ConfigurationError, SelectionError};

/// Errors that end a run early.
///
/// Evaluation failures are not among them: a failing trial is scored zero and
/// the run carries on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),
    #[error("Selection error: {0}")]
    SelectionError(#[from] SelectionError),
}
