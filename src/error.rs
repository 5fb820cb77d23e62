//! Error taxonomy for the orchestration core.

/// Errors raised while scheduling or executing a workflow.
///
/// Every variant is fatal to the enclosing run. A step that reports
/// `success: false` in its result is not an error and never shows up here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed path, unknown template filter, bad parameter.
    #[error("{0}")]
    Validation(String),

    /// Missing `needs` reference or a dependency cycle.
    #[error("{0}")]
    Structural(String),

    /// Unknown action name or unusable runtime setup.
    #[error("{0}")]
    Configuration(String),

    /// A step's `if` expression could not be evaluated.
    #[error("Condition of step '{step}' could not be evaluated: {message}")]
    Condition { step: String, message: String },

    /// An action raised instead of returning a result.
    #[error("Step '{step}' failed: {source:#}")]
    Action {
        step: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn structural(message: impl Into<String>) -> Self {
        Self::Structural(message.into())
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
