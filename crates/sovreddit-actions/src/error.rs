use thiserror::Error;

use sovreddit_identity::IdentityError;
use sovreddit_store::StoreError;
use sovreddit_sync::SyncError;
use sovreddit_types::{InFlightKey, TypesError};

/// Outcome taxonomy surfaced at the pipeline boundary
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Local shape check failed; fix the input
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// No key material is connected
    #[error("No signing key is connected")]
    SigningUnavailable,

    /// The envelope may not have reached the processor; resubmitting is safe
    #[error("Transport error: {0}")]
    Transport(String),

    /// Terminal for this command instance
    #[error("Rejected by processor: {0}")]
    RejectedByProcessor(String),

    /// Accepted, but the effect was not observed within the retry budget
    #[error("Submitted but not verified after {attempts} attempts")]
    NotConfirmed { attempts: u32 },

    #[error("A write for {0} is already in flight")]
    KeyInFlight(InFlightKey),

    #[error("Confirmation abandoned")]
    Abandoned,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Only transport failures may be retried with the same command
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Transport(_))
    }

    /// Whether the write may still land on the processor side
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            PipelineError::NotConfirmed { .. } | PipelineError::Abandoned
        )
    }
}

impl From<TypesError> for PipelineError {
    fn from(err: TypesError) -> Self {
        match err {
            TypesError::InvalidCommand(msg) => PipelineError::InvalidCommand(msg),
            TypesError::InvalidVote(value) => {
                PipelineError::InvalidCommand(format!("Vote value out of range: {}", value))
            }
            TypesError::InvalidIdentity(msg) => PipelineError::Internal(msg),
        }
    }
}

impl From<IdentityError> for PipelineError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::SigningUnavailable => PipelineError::SigningUnavailable,
            other => PipelineError::Internal(other.to_string()),
        }
    }
}

impl From<SyncError> for PipelineError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Network(msg) => PipelineError::Transport(msg),
            SyncError::Request(e) => PipelineError::Transport(e.to_string()),
            SyncError::Rejected { status, reason } => {
                PipelineError::RejectedByProcessor(format!("HTTP {}: {}", status, reason))
            }
            SyncError::Signing(e) => e.into(),
            SyncError::NotConfirmed { attempts } => PipelineError::NotConfirmed { attempts },
            SyncError::Abandoned => PipelineError::Abandoned,
            other => PipelineError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::KeyInFlight(key) => PipelineError::KeyInFlight(key),
            other => PipelineError::Internal(other.to_string()),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
