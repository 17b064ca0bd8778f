use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("too many attempts")]
    RateLimited { status: u16 },
    #[error("upstream unavailable (HTTP {status})")]
    Transient { status: u16 },
    #[error("HTTP {status}")]
    UpstreamFatal { status: u16, detail: String },
    #[error("JSON parse error: {0}")]
    Parse(String),
    #[error("network error: {0}")]
    Transport(String),
}

impl AppError {
    /// Integer code carried in the `{message, code}` error object.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::NotFound(_) => 404,
            Self::RateLimited { status }
            | Self::Transient { status }
            | Self::UpstreamFatal { status, .. } => *status,
            Self::Parse(_) => 500,
            Self::Transport(_) => 502,
        }
    }

    #[must_use]
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            message: self.to_string(),
            code: self.code(),
        }
    }
}

/// The `{"message": .., "code": ..}` object embedded in every error document.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub message: String,
    pub code: u16,
}

#[derive(Serialize, Debug, Clone)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl From<&AppError> for ErrorEnvelope {
    fn from(err: &AppError) -> Self {
        Self { error: err.body() }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Failure of a cache backend. Never surfaced to callers; the cache treats it as a miss.
#[derive(Debug, Clone)]
pub struct StorageError {
    message: String,
}

impl StorageError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StorageError {}
