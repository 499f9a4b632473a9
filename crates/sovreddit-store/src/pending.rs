use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sovreddit_types::{Command, CommandKind, InFlightKey};

use crate::state::Compensation;

/// A submitted write whose effect has not been confirmed yet.
///
/// Holds the command as it was submitted and the snapshot needed to undo its
/// optimistic change if the effect never shows up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub id: Uuid,
    pub kind: CommandKind,
    pub key: InFlightKey,
    pub command: Command,
    pub tx_hash: String,
    pub submitted_at: DateTime<Utc>,
    pub compensation: Option<Compensation>,
}

impl PendingWrite {
    pub fn new(command: Command, key: InFlightKey, tx_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: command.kind(),
            key,
            command,
            tx_hash: tx_hash.into(),
            submitted_at: Utc::now(),
            compensation: None,
        }
    }

    pub fn with_compensation(mut self, compensation: Option<Compensation>) -> Self {
        self.compensation = compensation;
        self
    }
}
