//! Write and read transport for the sovreddit client: signed envelope
//! submission, read-model queries and confirmation polling.

pub mod client;
pub mod envelope;
pub mod error;
pub mod poller;
pub mod policy;
pub mod read;

pub use client::{CommandSubmitter, SubmissionClient, SubmissionReceipt};
pub use envelope::{SignedEnvelope, TxDetails, UnsignedTransaction};
pub use error::{SyncError, SyncResult};
pub use poller::{await_effect, await_effect_until};
pub use policy::{ConfirmationPolicy, LinearBackoff};
pub use read::{ReadClient, ReadModel, ReadModelExt, Relation};
