//! Application error type.
//!
//! Every failure carries a process exit code so the binary can map errors to
//! `ExitCode` without inspecting messages:
//!
//! - `2`: invalid input (bad tables, unknown tags, bad arguments) and I/O
//! - `3`: a requested dataset is missing
//! - `4`: a fit did not converge

use thiserror::Error;

/// Result alias used throughout the crate.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Malformed data or arguments. Programming errors such as an unknown
    /// model tag land here too; they are never coerced to a default.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A dataset that was asked for does not exist.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// The bounded optimizer could not produce a fit.
    #[error("Fit failed for {model}: {reason}")]
    FitFailed { model: String, reason: String },

    /// Filesystem or serialization failure.
    #[error("I/O error: {0}")]
    Io(String),
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn fit_failed(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FitFailed {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// True for optimizer failures, which callers may choose to handle with a
    /// model-specific fallback.
    pub fn is_fit_failure(&self) -> bool {
        matches!(self, Self::FitFailed { .. })
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidInput(_) | Self::Io(_) => 2,
            Self::MissingData(_) => 3,
            Self::FitFailed { .. } => 4,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(e.to_string())
    }
}
