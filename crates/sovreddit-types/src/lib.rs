//! # sovreddit types
//!
//! Value types shared by every layer of the client: the closed [`Command`]
//! set and the [`Intent`]s it is built from, the key-derived [`Identity`],
//! the confirmed entities served by the read endpoint, and the [`VoteValue`]
//! relation.

pub mod command;
pub mod entity;
pub mod error;
pub mod identity;
pub mod vote;

pub use command::{Command, CommandKind, InFlightKey, Intent, RuntimeCall};
pub use entity::{Comment, EntitySchema, Membership, Post, Subreddit, User, Versioned, Vote};
pub use error::{TypesError, TypesResult};
pub use identity::Identity;
pub use vote::VoteValue;
