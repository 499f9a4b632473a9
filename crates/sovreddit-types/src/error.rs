use thiserror::Error;

/// Error type for building and decoding domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// A command was missing a field or a field failed its shape check
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// A vote value outside of -1, 0, +1
    #[error("Invalid vote value: {0}")]
    InvalidVote(i64),

    /// An identity string that is not valid base58
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
}

/// Result type for domain value operations
pub type TypesResult<T> = std::result::Result<T, TypesError>;
