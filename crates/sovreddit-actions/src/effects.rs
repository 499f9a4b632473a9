//! What "landed" means for each command, and how a landed effect is folded
//! back into the domain store.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use sovreddit_store::DomainStore;
use sovreddit_sync::{ReadModel, ReadModelExt, Relation, SyncResult};
use sovreddit_types::{
    Comment, EntitySchema, Identity, Membership, Post, Subreddit, User, Vote, VoteValue,
};

/// Lookup for the visible result of one accepted command
#[async_trait]
pub(crate) trait ExpectedEffect: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    /// `None` while the effect is not visible yet
    async fn lookup(&self) -> SyncResult<Option<Self::Output>>;

    /// Replace optimistic state with the confirmed result
    async fn reconcile(&self, store: &DomainStore, found: &Self::Output);
}

/// Confirmed result of a vote: the stored value and the re-fetched post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteConfirmation {
    pub value: VoteValue,
    pub post: Option<Post>,
}

pub(crate) struct UserCreated {
    pub reads: Arc<dyn ReadModel>,
    pub author: Identity,
}

#[async_trait]
impl ExpectedEffect for UserCreated {
    type Output = User;

    async fn lookup(&self) -> SyncResult<Option<User>> {
        self.reads
            .fetch_entity(EntitySchema::User, self.author.as_str())
            .await
    }

    async fn reconcile(&self, store: &DomainStore, found: &User) {
        store.set_current_user(found.clone()).await;
    }
}

pub(crate) struct SubredditCreated {
    pub reads: Arc<dyn ReadModel>,
    pub author: Identity,
    pub name: String,
}

#[async_trait]
impl ExpectedEffect for SubredditCreated {
    type Output = Subreddit;

    async fn lookup(&self) -> SyncResult<Option<Subreddit>> {
        let rows = self
            .reads
            .list_values(&Relation::SubredditsByName {
                name: self.name.clone(),
            })
            .await?;

        Ok(decode_rows::<Subreddit>(rows).into_iter().find(|sub| {
            sub.name.eq_ignore_ascii_case(&self.name) && sub.creator == self.author
        }))
    }

    async fn reconcile(&self, store: &DomainStore, found: &Subreddit) {
        store.reconcile_subreddit(found.clone()).await;
    }
}

pub(crate) struct PostCreated {
    pub reads: Arc<dyn ReadModel>,
    pub author: Identity,
    pub sub_id: String,
    pub title: String,
    pub content: String,
    /// Post ids listed before submission
    pub known: HashSet<String>,
}

#[async_trait]
impl ExpectedEffect for PostCreated {
    type Output = Post;

    async fn lookup(&self) -> SyncResult<Option<Post>> {
        let rows = self
            .reads
            .list_values(&Relation::PostsForSubreddit {
                sub_sov_id: self.sub_id.clone(),
            })
            .await?;

        Ok(decode_rows::<Post>(rows).into_iter().find(|post| {
            post.user_sov_id == self.author
                && post.title == self.title
                && post.content == self.content
                && !self.known.contains(&post.post_sov_id)
        }))
    }

    async fn reconcile(&self, store: &DomainStore, found: &Post) {
        store.reconcile_post(found.clone()).await;
    }
}

pub(crate) struct CommentAdded {
    pub reads: Arc<dyn ReadModel>,
    pub author: Identity,
    pub post_id: String,
    pub content: String,
    pub known: HashSet<String>,
    pub placeholder_id: String,
}

#[async_trait]
impl ExpectedEffect for CommentAdded {
    type Output = Comment;

    async fn lookup(&self) -> SyncResult<Option<Comment>> {
        let rows = self
            .reads
            .list_values(&Relation::CommentsForPost {
                post_sov_id: self.post_id.clone(),
            })
            .await?;

        Ok(decode_rows::<Comment>(rows).into_iter().find(|comment| {
            comment.user_sov_id == self.author
                && comment.content == self.content
                && !self.known.contains(&comment.comment_sov_id)
        }))
    }

    async fn reconcile(&self, store: &DomainStore, found: &Comment) {
        store
            .reconcile_comment(found.clone(), Some(&self.placeholder_id))
            .await;
    }
}

pub(crate) struct VoteCast {
    pub reads: Arc<dyn ReadModel>,
    pub author: Identity,
    pub post_id: String,
    pub value: VoteValue,
}

#[async_trait]
impl ExpectedEffect for VoteCast {
    type Output = VoteConfirmation;

    async fn lookup(&self) -> SyncResult<Option<VoteConfirmation>> {
        let key = Vote::primary_key(&self.author, &self.post_id);
        let stored: Option<Vote> = self.reads.fetch_entity(EntitySchema::Vote, &key).await?;
        let stored_value = stored.map(|vote| vote.value).unwrap_or_default();

        if stored_value != self.value {
            debug!("Vote {} still reads {}", key, stored_value);
            return Ok(None);
        }

        let post = self
            .reads
            .fetch_entity(EntitySchema::Post, &self.post_id)
            .await?;
        Ok(Some(VoteConfirmation {
            value: stored_value,
            post,
        }))
    }

    async fn reconcile(&self, store: &DomainStore, found: &VoteConfirmation) {
        store
            .reconcile_vote(Vote {
                user_sov_id: self.author.clone(),
                post_sov_id: self.post_id.clone(),
                value: found.value,
            })
            .await;
        if let Some(post) = &found.post {
            store.reconcile_post(post.clone()).await;
        }
    }
}

pub(crate) struct MembershipToggled {
    pub reads: Arc<dyn ReadModel>,
    pub author: Identity,
    pub sub_id: String,
    pub joined: bool,
}

#[async_trait]
impl ExpectedEffect for MembershipToggled {
    type Output = bool;

    async fn lookup(&self) -> SyncResult<Option<bool>> {
        let rows = self
            .reads
            .list_values(&Relation::UserSubreddits {
                user_sov_id: self.author.clone(),
            })
            .await?;

        let member = decode_rows::<Membership>(rows)
            .iter()
            .any(|membership| membership.sub_sov_id == self.sub_id);
        Ok((member == self.joined).then_some(member))
    }

    async fn reconcile(&self, store: &DomainStore, found: &bool) {
        store
            .reconcile_membership(&self.author, &self.sub_id, *found)
            .await;
    }
}

/// Ids currently listed for `relation`, read before submitting a create
pub(crate) async fn known_ids(
    reads: &dyn ReadModel,
    relation: &Relation,
    id_field: &str,
) -> HashSet<String> {
    match reads.list_values(relation).await {
        Ok(rows) => rows
            .iter()
            .filter_map(|row| string_field(row, id_field).map(str::to_string))
            .collect(),
        Err(e) => {
            debug!("Could not list existing ids before submission: {}", e);
            HashSet::new()
        }
    }
}

fn string_field<'a>(row: &'a Value, field: &str) -> Option<&'a str> {
    row.get(field).and_then(Value::as_str)
}

/// Decode rows, skipping any the client cannot read
pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| serde_json::from_value(row).ok())
        .collect()
}
