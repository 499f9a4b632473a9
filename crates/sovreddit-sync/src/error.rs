use sovreddit_identity::IdentityError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport failure; the caller may retry the same envelope
    #[error("Network error: {0}")]
    Network(String),

    /// The processor refused the command; retrying the same command is pointless
    #[error("Rejected by processor (HTTP {status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Signing error: {0}")]
    Signing(#[from] IdentityError),

    #[error("Request error: {0}")]
    Request(reqwest::Error),

    /// The expected effect did not become visible within the retry budget
    #[error("Not confirmed after {attempts} attempts")]
    NotConfirmed { attempts: u32 },

    /// Polling was stopped by its consumer
    #[error("Confirmation abandoned")]
    Abandoned,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Whether the same envelope may be submitted again
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        map_reqwest_error(err)
    }
}

impl From<backoff::Error<SyncError>> for SyncError {
    fn from(err: backoff::Error<SyncError>) -> Self {
        match err {
            backoff::Error::Permanent(e) => e,
            backoff::Error::Transient { err, .. } => err,
        }
    }
}

/// Classify reqwest failures so that transport problems stay retryable
pub fn map_reqwest_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Network(format!("Request timed out: {}", err))
    } else if err.is_connect() {
        SyncError::Network(format!("Connection error: {}", err))
    } else if let Some(status) = err.status() {
        match status.as_u16() {
            408 | 429 | 500..=599 => SyncError::Network(format!("HTTP {}: {}", status, err)),
            code => SyncError::Rejected {
                status: code,
                reason: err.to_string(),
            },
        }
    } else if err.is_decode() {
        SyncError::Api(format!("Malformed response: {}", err))
    } else {
        SyncError::Request(err)
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
