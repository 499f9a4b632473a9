//! The closed set of write commands the processor accepts.
//!
//! A [`Command`] is an immutable description of a state change that has not
//! been applied yet. It carries no server-assigned fields: ids and timestamps
//! come from the processing side, and the author is whoever signed the
//! envelope.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::error::{TypesError, TypesResult};
use crate::identity::Identity;
use crate::vote::VoteValue;

pub const USERNAME_MIN_CHARS: usize = 5;
pub const USERNAME_MAX_CHARS: usize = 32;
pub const SUBREDDIT_NAME_MIN_CHARS: usize = 3;
pub const SUBREDDIT_NAME_MAX_CHARS: usize = 21;
pub const TITLE_MAX_CHARS: usize = 300;
pub const BODY_MAX_CHARS: usize = 40_000;

/// What the user asked for, before any shape checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    CreateUser {
        username: String,
    },
    CreateSubreddit {
        name: String,
        description: String,
    },
    CreatePost {
        subreddit_id: String,
        title: String,
        content: String,
        flair: String,
    },
    AddComment {
        post_id: String,
        content: String,
    },
    CastVote {
        post_id: String,
        value: VoteValue,
    },
    ToggleMembership {
        subreddit_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSubreddit {
    pub subname: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePost {
    pub title: String,
    pub content: String,
    pub flair: String,
    pub subaddress: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddComment {
    pub post_sov_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVote {
    pub post_sov_id: String,
    pub value: VoteValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleMembership {
    pub sub_sov_id: String,
}

/// A structurally valid write command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    CreateUser(CreateUser),
    #[serde(rename = "create_sub_reddit")]
    CreateSubreddit(CreateSubreddit),
    CreatePost(CreatePost),
    AddComment(AddComment),
    CastVote(CastVote),
    #[serde(rename = "join_or_unjoin_sub")]
    ToggleMembership(ToggleMembership),
}

/// Field-less mirror of [`Command`] used for per-kind policy lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    CreateUser,
    CreateSubreddit,
    CreatePost,
    AddComment,
    CastVote,
    ToggleMembership,
}

impl Display for CommandKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::CreateUser => "create_user",
            CommandKind::CreateSubreddit => "create_subreddit",
            CommandKind::CreatePost => "create_post",
            CommandKind::AddComment => "add_comment",
            CommandKind::CastVote => "cast_vote",
            CommandKind::ToggleMembership => "toggle_membership",
        };
        write!(f, "{}", name)
    }
}

/// The (user, entity) pair a command touches.
///
/// At most one command per key may be outstanding at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InFlightKey {
    pub author: Identity,
    pub kind: CommandKind,
    pub target: String,
}

impl Display for InFlightKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.author, self.target)
    }
}

/// Top-level call wrapper, serialized as `{"reddit_module": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeCall {
    RedditModule(Command),
}

impl Command {
    /// Build a command from an intent, enforcing the shape rules
    pub fn build(intent: Intent) -> TypesResult<Self> {
        match intent {
            Intent::CreateUser { username } => {
                check_username(&username)?;
                Ok(Command::CreateUser(CreateUser { username }))
            }
            Intent::CreateSubreddit { name, description } => {
                check_subreddit_name(&name)?;
                check_text("description", &description, BODY_MAX_CHARS)?;
                Ok(Command::CreateSubreddit(CreateSubreddit {
                    subname: name,
                    description,
                }))
            }
            Intent::CreatePost {
                subreddit_id,
                title,
                content,
                flair,
            } => {
                check_id("subreddit id", &subreddit_id)?;
                check_text("title", &title, TITLE_MAX_CHARS)?;
                check_text("content", &content, BODY_MAX_CHARS)?;
                if flair.chars().count() > TITLE_MAX_CHARS {
                    return Err(TypesError::InvalidCommand(format!(
                        "flair must be at most {} characters",
                        TITLE_MAX_CHARS
                    )));
                }
                Ok(Command::CreatePost(CreatePost {
                    title,
                    content,
                    flair,
                    subaddress: subreddit_id,
                }))
            }
            Intent::AddComment { post_id, content } => {
                check_id("post id", &post_id)?;
                check_text("comment", &content, BODY_MAX_CHARS)?;
                Ok(Command::AddComment(AddComment {
                    post_sov_id: post_id,
                    content,
                }))
            }
            Intent::CastVote { post_id, value } => {
                check_id("post id", &post_id)?;
                Ok(Command::CastVote(CastVote {
                    post_sov_id: post_id,
                    value,
                }))
            }
            Intent::ToggleMembership { subreddit_id } => {
                check_id("subreddit id", &subreddit_id)?;
                Ok(Command::ToggleMembership(ToggleMembership {
                    sub_sov_id: subreddit_id,
                }))
            }
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::CreateUser(_) => CommandKind::CreateUser,
            Command::CreateSubreddit(_) => CommandKind::CreateSubreddit,
            Command::CreatePost(_) => CommandKind::CreatePost,
            Command::AddComment(_) => CommandKind::AddComment,
            Command::CastVote(_) => CommandKind::CastVote,
            Command::ToggleMembership(_) => CommandKind::ToggleMembership,
        }
    }

    /// Key under which this command is serialized against others from the same author
    pub fn in_flight_key(&self, author: &Identity) -> InFlightKey {
        let target = match self {
            Command::CreateUser(_) => author.to_string(),
            Command::CreateSubreddit(c) => c.subname.to_lowercase(),
            Command::CreatePost(c) => c.subaddress.clone(),
            Command::AddComment(c) => c.post_sov_id.clone(),
            Command::CastVote(c) => c.post_sov_id.clone(),
            Command::ToggleMembership(c) => c.sub_sov_id.clone(),
        };

        InFlightKey {
            author: author.clone(),
            kind: self.kind(),
            target,
        }
    }

    pub fn into_runtime_call(self) -> RuntimeCall {
        RuntimeCall::RedditModule(self)
    }
}

fn check_id(field: &str, value: &str) -> TypesResult<()> {
    if value.trim().is_empty() {
        return Err(TypesError::InvalidCommand(format!("{} is required", field)));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(TypesError::InvalidCommand(format!(
            "{} must not contain whitespace",
            field
        )));
    }
    Ok(())
}

fn check_text(field: &str, value: &str, max_chars: usize) -> TypesResult<()> {
    if value.trim().is_empty() {
        return Err(TypesError::InvalidCommand(format!("{} is required", field)));
    }
    if value.chars().count() > max_chars {
        return Err(TypesError::InvalidCommand(format!(
            "{} must be at most {} characters",
            field, max_chars
        )));
    }
    Ok(())
}

fn check_username(username: &str) -> TypesResult<()> {
    let length = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&length) {
        return Err(TypesError::InvalidCommand(format!(
            "username must be between {} and {} characters",
            USERNAME_MIN_CHARS, USERNAME_MAX_CHARS
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(TypesError::InvalidCommand(
            "username must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}

fn check_subreddit_name(name: &str) -> TypesResult<()> {
    let length = name.chars().count();
    if !(SUBREDDIT_NAME_MIN_CHARS..=SUBREDDIT_NAME_MAX_CHARS).contains(&length) {
        return Err(TypesError::InvalidCommand(format!(
            "subreddit name must be between {} and {} characters",
            SUBREDDIT_NAME_MIN_CHARS, SUBREDDIT_NAME_MAX_CHARS
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TypesError::InvalidCommand(
            "subreddit name may only contain letters, digits and underscores".to_string(),
        ));
    }
    Ok(())
}
