//! Confirmed records as served by the read endpoint.
//!
//! Entities are only ever created by the processor as a side effect of a
//! confirmed command; the client receives them, it never mints them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::identity::Identity;
use crate::vote::VoteValue;

/// Read-model schema names accepted by the fetch endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntitySchema {
    User,
    Subreddit,
    Post,
    Comment,
    Vote,
}

impl EntitySchema {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitySchema::User => "user",
            EntitySchema::Subreddit => "subreddit",
            EntitySchema::Post => "post",
            EntitySchema::Comment => "comment",
            EntitySchema::Vote => "vote",
        }
    }
}

impl Display for EntitySchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub sov_id: Identity,
    pub username: String,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subreddit {
    pub sub_sov_id: String,
    #[serde(alias = "subname")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "user_sov_id")]
    pub creator: Identity,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub post_sov_id: String,
    pub sub_sov_id: String,
    pub user_sov_id: Identity,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub flair: String,
    /// Upvotes minus downvotes, owned by the processor
    #[serde(default)]
    pub score: i64,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_sov_id: String,
    pub post_sov_id: String,
    pub user_sov_id: Identity,
    pub content: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Stored (user, post) vote relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub user_sov_id: Identity,
    pub post_sov_id: String,
    pub value: VoteValue,
}

impl Vote {
    /// Primary key of the relation on the read endpoint
    pub fn primary_key(user: &Identity, post_id: &str) -> String {
        format!("{}_{}", user, post_id)
    }
}

/// Entry of a user's joined-subreddit list.
///
/// The list endpoint may serve bare subreddit rows, so only the subreddit id
/// is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub sub_sov_id: String,
    #[serde(default)]
    pub user_sov_id: Option<Identity>,
}

/// Anything with a processor-assigned modification time
pub trait Versioned {
    fn updated_at(&self) -> Option<DateTime<Utc>>;
}

macro_rules! impl_versioned {
    ($($ty:ty),*) => {
        $(impl Versioned for $ty {
            fn updated_at(&self) -> Option<DateTime<Utc>> {
                self.updated_at.or(self.created_at)
            }
        })*
    };
}

impl_versioned!(User, Subreddit, Post, Comment);
