use thiserror::Error;

/// Every failure the automation core can report. None of them is fatal:
/// callers turn each into a status message and fall back to a safe state.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown action kind: {0}")]
    UnknownActionKind(String),
    #[error("{reason}")]
    Validation { reason: String },
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("{0}")]
    Injection(String),
    #[error("{0}")]
    Configuration(String),
    #[error("{0}")]
    Persistence(String),
}

impl CoreError {
    pub fn validation(reason: impl Into<String>) -> Self {
        CoreError::Validation { reason: reason.into() }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Persistence(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
