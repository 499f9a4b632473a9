//! # sovreddit actions
//!
//! The write side of the client. A [`WritePipeline`] turns user intents into
//! signed commands, submits them, and confirms their effects against the
//! eventually-consistent read model before reconciling the
//! [`DomainStore`](sovreddit_store::DomainStore).

mod effects;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod vote;

pub use effects::VoteConfirmation;
pub use error::{PipelineError, PipelineResult};
pub use notify::{Notification, NotificationStatus};
pub use pipeline::{PendingWriteHandle, WritePipeline};
pub use vote::VotePress;
