use sovreddit_types::InFlightKey;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Another write for the same (user, entity) pair has not settled yet
    #[error("A write for {0} is already in flight")]
    KeyInFlight(InFlightKey),
}

pub type StoreResult<T> = Result<T, StoreError>;
