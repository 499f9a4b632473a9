use std::io;
use thiserror::Error;

/// Error type for identity and signing operations
#[derive(Error, Debug)]
pub enum IdentityError {
    /// No key material is loaded; the user has to connect a key first
    #[error("Signing unavailable: no key material loaded")]
    SigningUnavailable,

    /// Key management error
    #[error("Key management error: {0}")]
    KeyError(String),

    /// Verification error for signatures
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Serialization or deserialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl From<ed25519_dalek::SignatureError> for IdentityError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        IdentityError::KeyError(format!("Signature error: {}", err))
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        IdentityError::SerializationError(format!("JSON error: {}", err))
    }
}

/// Result type for identity operations
pub type IdentityResult<T> = std::result::Result<T, IdentityError>;
