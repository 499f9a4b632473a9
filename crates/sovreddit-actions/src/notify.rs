use serde::{Deserialize, Serialize};

use sovreddit_types::CommandKind;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Success,
    Warning,
    Error,
}

/// User-facing summary of a write outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub status: NotificationStatus,
}

impl Notification {
    pub fn from_outcome<T>(kind: CommandKind, outcome: &Result<T, PipelineError>) -> Self {
        let subject = subject(kind);

        match outcome {
            Ok(_) => Self {
                title: format!("{} confirmed", subject),
                description: format!("Your {} is now visible.", subject.to_lowercase()),
                status: NotificationStatus::Success,
            },
            Err(PipelineError::NotConfirmed { .. }) | Err(PipelineError::Abandoned) => Self {
                title: format!("{} submitted", subject),
                description: "Submitted, but we could not verify completion. Check back shortly."
                    .to_string(),
                status: NotificationStatus::Warning,
            },
            Err(PipelineError::SigningUnavailable) => Self {
                title: "Key required".to_string(),
                description: "Connect your key to continue.".to_string(),
                status: NotificationStatus::Error,
            },
            Err(PipelineError::KeyInFlight(_)) => Self {
                title: "Please wait".to_string(),
                description: format!(
                    "A previous {} is still being processed.",
                    subject.to_lowercase()
                ),
                status: NotificationStatus::Warning,
            },
            Err(PipelineError::Transport(reason)) => Self {
                title: "Network error".to_string(),
                description: format!("Could not reach the network ({}). Try again.", reason),
                status: NotificationStatus::Error,
            },
            Err(err) => Self {
                title: format!("{} failed", subject),
                description: err.to_string(),
                status: NotificationStatus::Error,
            },
        }
    }
}

fn subject(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::CreateUser => "Account",
        CommandKind::CreateSubreddit => "Subreddit",
        CommandKind::CreatePost => "Post",
        CommandKind::AddComment => "Comment",
        CommandKind::CastVote => "Vote",
        CommandKind::ToggleMembership => "Membership",
    }
}
