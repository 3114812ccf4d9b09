//! Stream error types and categorization.
//!
//! The category decides what the worker does with a failed delivery:
//! - **Transient**: retry in process with exponential backoff
//! - **Permanent**: skip retries, dead-letter immediately

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transient,
    Permanent,
}

impl ErrorCategory {
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorCategory::Transient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
        }
    }
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Processing error: {message}")]
    Processing {
        message: String,
        category: ErrorCategory,
    },

    #[error("Subscriber already registered for stream '{stream}' and group '{group}'")]
    AlreadyRegistered { stream: String, group: String },

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StreamError {
    pub fn transient(message: impl Into<String>) -> Self {
        StreamError::Processing {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        StreamError::Processing {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::Redis(_) => ErrorCategory::Transient,
            StreamError::Backend(_) => ErrorCategory::Transient,
            StreamError::Serialization(_) => ErrorCategory::Permanent,
            StreamError::Processing { category, .. } => *category,
            StreamError::AlreadyRegistered { .. } => ErrorCategory::Permanent,
        }
    }

    pub(crate) fn is_busy_group(&self) -> bool {
        matches!(self, StreamError::Redis(e) if e.to_string().contains("BUSYGROUP"))
    }

    pub(crate) fn is_no_group(&self) -> bool {
        match self {
            StreamError::Redis(e) => e.to_string().contains("NOGROUP"),
            StreamError::Backend(msg) => msg.contains("NOGROUP"),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Serialization(err.to_string())
    }
}
