//! Client-side cache of confirmed entities plus optimistic overlays.
//!
//! A [`DomainStore`] is created for a session and torn down with it. Every
//! optimistic mutation hands back a [`Compensation`] holding the values it
//! overwrote, so a failed write can be undone exactly.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sovreddit_types::{Comment, Identity, Post, Subreddit, User, Versioned, Vote, VoteValue};

use crate::pending::PendingWrite;

/// Prefix of ids minted locally for not-yet-confirmed comments
pub const PROVISIONAL_PREFIX: &str = "pending:";

/// Pre-mutation snapshot returned by every optimistic operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compensation {
    Vote {
        user: Identity,
        post_id: String,
        previous: Option<VoteValue>,
        /// Shift applied to the cached score
        score_delta: i64,
        /// Revision of the cached post the shift was applied to
        post_revision: Option<u64>,
    },
    Comment {
        placeholder_id: String,
    },
    Membership {
        user: Identity,
        sub_id: String,
        previous: Option<bool>,
    },
}

#[derive(Debug, Default)]
struct StoreState {
    current_user: Option<User>,
    users: HashMap<Identity, User>,
    subreddits: HashMap<String, Subreddit>,
    posts: HashMap<String, Post>,
    /// Bumped whenever a confirmed post record replaces the cached one
    post_revisions: HashMap<String, u64>,
    revision: u64,
    comments: HashMap<String, Comment>,
    votes: HashMap<(Identity, String), VoteValue>,
    memberships: HashMap<(Identity, String), bool>,
    pending: HashMap<Uuid, PendingWrite>,
}

/// Session-scoped domain store. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct DomainStore {
    state: Arc<RwLock<StoreState>>,
}

impl DomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything cached for the session
    pub async fn teardown(&self) {
        let mut state = self.state.write().await;
        let pending = state.pending.len();
        *state = StoreState::default();
        debug!("Domain store torn down ({} pending writes discarded)", pending);
    }

    // ---- optimistic mutations ----

    /// Set the caller's vote on a post and shift the cached score by the difference
    pub async fn apply_optimistic_vote(
        &self,
        user: &Identity,
        post_id: &str,
        value: VoteValue,
    ) -> Compensation {
        let mut state = self.state.write().await;
        let key = (user.clone(), post_id.to_string());

        let previous = state.votes.get(&key).copied();
        let score_delta = value.score_delta_from(previous.unwrap_or_default());
        let post_revision = state
            .posts
            .contains_key(post_id)
            .then(|| state.post_revisions.get(post_id).copied().unwrap_or_default());
        if let Some(post) = state.posts.get_mut(post_id) {
            post.score += score_delta;
        }
        state.votes.insert(key, value);

        Compensation::Vote {
            user: user.clone(),
            post_id: post_id.to_string(),
            previous,
            score_delta,
            post_revision,
        }
    }

    /// Insert a provisional comment that a confirmed one will later replace
    pub async fn apply_optimistic_comment(
        &self,
        author: &Identity,
        post_id: &str,
        content: &str,
    ) -> (Comment, Compensation) {
        let placeholder = Comment {
            comment_sov_id: format!("{}{}", PROVISIONAL_PREFIX, Uuid::new_v4()),
            post_sov_id: post_id.to_string(),
            user_sov_id: author.clone(),
            content: content.to_string(),
            score: 0,
            created_at: None,
            updated_at: None,
        };

        let mut state = self.state.write().await;
        state
            .comments
            .insert(placeholder.comment_sov_id.clone(), placeholder.clone());

        let compensation = Compensation::Comment {
            placeholder_id: placeholder.comment_sov_id.clone(),
        };
        (placeholder, compensation)
    }

    /// Flip the caller's membership of a subreddit; returns the new membership
    pub async fn apply_optimistic_membership(
        &self,
        user: &Identity,
        sub_id: &str,
    ) -> (bool, Compensation) {
        let mut state = self.state.write().await;
        let key = (user.clone(), sub_id.to_string());

        let previous = state.memberships.get(&key).copied();
        let joined = !previous.unwrap_or(false);
        state.memberships.insert(key, joined);

        let compensation = Compensation::Membership {
            user: user.clone(),
            sub_id: sub_id.to_string(),
            previous,
        };
        (joined, compensation)
    }

    /// Undo an optimistic mutation.
    ///
    /// A vote's score shift is only taken back while the cached post is still
    /// the one it was applied to; a confirmed record fetched in the meantime
    /// already carries the processor's aggregate.
    pub async fn revert(&self, compensation: Compensation) {
        let mut state = self.state.write().await;

        match compensation {
            Compensation::Vote {
                user,
                post_id,
                previous,
                score_delta,
                post_revision,
            } => {
                let key = (user, post_id.clone());
                match previous {
                    Some(value) => {
                        state.votes.insert(key, value);
                    }
                    None => {
                        state.votes.remove(&key);
                    }
                }

                let current_revision = state.post_revisions.get(&post_id).copied().unwrap_or_default();
                match (post_revision, state.posts.get_mut(&post_id)) {
                    (Some(revision), Some(post)) if revision == current_revision => {
                        post.score -= score_delta;
                    }
                    (Some(_), Some(_)) => {
                        debug!("Post {} was refreshed; keeping its confirmed score", post_id);
                    }
                    _ => {}
                }
                warn!("Reverted optimistic vote on post {}", post_id);
            }
            Compensation::Comment { placeholder_id } => {
                state.comments.remove(&placeholder_id);
                warn!("Removed provisional comment {}", placeholder_id);
            }
            Compensation::Membership {
                user,
                sub_id,
                previous,
            } => {
                let key = (user, sub_id.clone());
                match previous {
                    Some(joined) => {
                        state.memberships.insert(key, joined);
                    }
                    None => {
                        state.memberships.remove(&key);
                    }
                }
                warn!("Reverted optimistic membership change for {}", sub_id);
            }
        }
    }

    // ---- reconciliation ----

    /// Make `user` the session's current user
    pub async fn set_current_user(&self, user: User) {
        let mut state = self.state.write().await;
        info!("Current user is {} ({})", user.username, user.sov_id);
        state.users.insert(user.sov_id.clone(), user.clone());
        state.current_user = Some(user);
    }

    pub async fn reconcile_user(&self, user: User) -> bool {
        let mut state = self.state.write().await;
        let is_current = state
            .current_user
            .as_ref()
            .map_or(false, |current| current.sov_id == user.sov_id);

        let applied = upsert(&mut state.users, user.sov_id.clone(), user.clone(), "user");
        if applied && is_current {
            state.current_user = Some(user);
        }
        applied
    }

    pub async fn reconcile_subreddit(&self, subreddit: Subreddit) -> bool {
        let mut state = self.state.write().await;
        upsert(
            &mut state.subreddits,
            subreddit.sub_sov_id.clone(),
            subreddit,
            "subreddit",
        )
    }

    /// Replace the cached post, including its score, with the confirmed record
    pub async fn reconcile_post(&self, post: Post) -> bool {
        let mut state = self.state.write().await;
        let post_id = post.post_sov_id.clone();
        let applied = upsert(&mut state.posts, post_id.clone(), post, "post");
        if applied {
            state.revision += 1;
            let revision = state.revision;
            state.post_revisions.insert(post_id, revision);
        }
        applied
    }

    /// Cache a confirmed comment, dropping the provisional entry it replaces
    pub async fn reconcile_comment(&self, comment: Comment, placeholder: Option<&str>) -> bool {
        let mut state = self.state.write().await;
        if let Some(placeholder) = placeholder {
            state.comments.remove(placeholder);
        }
        upsert(
            &mut state.comments,
            comment.comment_sov_id.clone(),
            comment,
            "comment",
        )
    }

    pub async fn reconcile_vote(&self, vote: Vote) {
        let mut state = self.state.write().await;
        state
            .votes
            .insert((vote.user_sov_id, vote.post_sov_id), vote.value);
    }

    pub async fn reconcile_membership(&self, user: &Identity, sub_id: &str, joined: bool) {
        let mut state = self.state.write().await;
        state
            .memberships
            .insert((user.clone(), sub_id.to_string()), joined);
    }

    // ---- pending writes ----

    pub async fn register_pending(&self, write: PendingWrite) -> Uuid {
        let id = write.id;
        debug!("Pending {} write {} ({})", write.kind, id, write.tx_hash);
        self.state.write().await.pending.insert(id, write);
        id
    }

    pub async fn resolve_pending(&self, id: &Uuid) -> Option<PendingWrite> {
        self.state.write().await.pending.remove(id)
    }

    /// Outstanding writes, oldest first
    pub async fn pending_writes(&self) -> Vec<PendingWrite> {
        let state = self.state.read().await;
        let mut writes: Vec<PendingWrite> = state.pending.values().cloned().collect();
        writes.sort_by_key(|write| write.submitted_at);
        writes
    }

    // ---- reads ----

    pub async fn current_user(&self) -> Option<User> {
        self.state.read().await.current_user.clone()
    }

    pub async fn user(&self, id: &Identity) -> Option<User> {
        self.state.read().await.users.get(id).cloned()
    }

    pub async fn subreddit(&self, id: &str) -> Option<Subreddit> {
        self.state.read().await.subreddits.get(id).cloned()
    }

    pub async fn post(&self, id: &str) -> Option<Post> {
        self.state.read().await.posts.get(id).cloned()
    }

    pub async fn comment(&self, id: &str) -> Option<Comment> {
        self.state.read().await.comments.get(id).cloned()
    }

    pub async fn comments_for_post(&self, post_id: &str) -> Vec<Comment> {
        let state = self.state.read().await;
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|comment| comment.post_sov_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.comment_sov_id.cmp(&b.comment_sov_id))
        });
        comments
    }

    /// The caller's vote on a post; no record means neutral
    pub async fn vote(&self, user: &Identity, post_id: &str) -> VoteValue {
        self.cached_vote(user, post_id).await.unwrap_or_default()
    }

    /// `None` until the vote has been loaded or written this session
    pub async fn cached_vote(&self, user: &Identity, post_id: &str) -> Option<VoteValue> {
        let state = self.state.read().await;
        state
            .votes
            .get(&(user.clone(), post_id.to_string()))
            .copied()
    }

    pub async fn is_member(&self, user: &Identity, sub_id: &str) -> bool {
        self.membership(user, sub_id).await.unwrap_or(false)
    }

    /// `None` until the membership has been loaded or written this session
    pub async fn membership(&self, user: &Identity, sub_id: &str) -> Option<bool> {
        let state = self.state.read().await;
        state
            .memberships
            .get(&(user.clone(), sub_id.to_string()))
            .copied()
    }
}

/// Insert unless the cached copy is strictly newer than `incoming`
fn upsert<K, T>(map: &mut HashMap<K, T>, key: K, incoming: T, schema: &str) -> bool
where
    K: Eq + Hash + Display,
    T: Versioned,
{
    if let Some(cached) = map.get(&key) {
        if cached.updated_at() > incoming.updated_at() {
            debug!("Skipping stale {} {}", schema, key);
            return false;
        }
    }
    map.insert(key, incoming);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sovreddit_types::{Command, CommandKind, Intent};
    use tokio_test::block_on;

    fn alice() -> Identity {
        Identity::from_public_key(&[7u8; 32])
    }

    fn post(id: &str, score: i64) -> Post {
        Post {
            post_sov_id: id.to_string(),
            sub_sov_id: "s1".to_string(),
            user_sov_id: alice(),
            title: "Title".to_string(),
            content: "Body".to_string(),
            flair: String::new(),
            score,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_optimistic_vote_adjusts_score_by_difference() {
        let store = DomainStore::new();
        store.reconcile_post(post("p1", 10)).await;

        store.apply_optimistic_vote(&alice(), "p1", VoteValue::Up).await;
        assert_eq!(store.post("p1").await.unwrap().score, 11);

        store.apply_optimistic_vote(&alice(), "p1", VoteValue::Down).await;
        assert_eq!(store.post("p1").await.unwrap().score, 9);
        assert_eq!(store.vote(&alice(), "p1").await, VoteValue::Down);
    }

    #[tokio::test]
    async fn test_revert_restores_vote_snapshot() {
        let store = DomainStore::new();
        store.reconcile_post(post("p1", 4)).await;

        let compensation = store.apply_optimistic_vote(&alice(), "p1", VoteValue::Up).await;
        store.revert(compensation).await;

        assert_eq!(store.post("p1").await.unwrap().score, 4);
        assert_eq!(store.vote(&alice(), "p1").await, VoteValue::Neutral);
        assert!(store.cached_vote(&alice(), "p1").await.is_none());
    }

    #[tokio::test]
    async fn test_revert_keeps_score_of_refreshed_post() {
        let store = DomainStore::new();
        store.reconcile_post(post("p1", 10)).await;

        let compensation = store.apply_optimistic_vote(&alice(), "p1", VoteValue::Up).await;
        assert_eq!(store.post("p1").await.unwrap().score, 11);

        // Another view refreshes the post before the vote fails
        store.reconcile_post(post("p1", 20)).await;
        store.revert(compensation).await;

        assert_eq!(store.post("p1").await.unwrap().score, 20);
        assert_eq!(store.vote(&alice(), "p1").await, VoteValue::Neutral);
    }

    #[tokio::test]
    async fn test_revert_takes_back_only_its_own_shift() {
        let store = DomainStore::new();
        store.reconcile_post(post("p1", 10)).await;
        store
            .reconcile_vote(Vote {
                user_sov_id: alice(),
                post_sov_id: "p1".to_string(),
                value: VoteValue::Down,
            })
            .await;

        let compensation = store.apply_optimistic_vote(&alice(), "p1", VoteValue::Up).await;
        assert_eq!(store.post("p1").await.unwrap().score, 12);

        store.revert(compensation).await;
        assert_eq!(store.post("p1").await.unwrap().score, 10);
        assert_eq!(store.vote(&alice(), "p1").await, VoteValue::Down);
    }

    #[tokio::test]
    async fn test_provisional_comment_replaced_on_reconcile() {
        let store = DomainStore::new();
        let (placeholder, _) = store
            .apply_optimistic_comment(&alice(), "p1", "first!")
            .await;
        assert!(placeholder.comment_sov_id.starts_with(PROVISIONAL_PREFIX));

        let confirmed = Comment {
            comment_sov_id: "c1".to_string(),
            ..placeholder.clone()
        };
        store
            .reconcile_comment(confirmed, Some(&placeholder.comment_sov_id))
            .await;

        let comments = store.comments_for_post("p1").await;
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].comment_sov_id, "c1");
    }

    #[tokio::test]
    async fn test_revert_removes_provisional_comment() {
        let store = DomainStore::new();
        let (placeholder, compensation) = store
            .apply_optimistic_comment(&alice(), "p1", "hello")
            .await;

        store.revert(compensation).await;
        assert!(store.comment(&placeholder.comment_sov_id).await.is_none());
    }

    #[test]
    fn test_membership_toggle_and_revert() {
        block_on(async {
            let store = DomainStore::new();
            let (joined, compensation) = store.apply_optimistic_membership(&alice(), "s1").await;
            assert!(joined);
            assert!(store.is_member(&alice(), "s1").await);

            store.revert(compensation).await;
            assert!(!store.is_member(&alice(), "s1").await);
            assert!(store.membership(&alice(), "s1").await.is_none());
        });
    }

    #[tokio::test]
    async fn test_leaving_a_loaded_membership() {
        let store = DomainStore::new();
        store.reconcile_membership(&alice(), "s1", true).await;

        let (joined, compensation) = store.apply_optimistic_membership(&alice(), "s1").await;
        assert!(!joined);
        assert_eq!(store.membership(&alice(), "s1").await, Some(false));

        store.revert(compensation).await;
        assert_eq!(store.membership(&alice(), "s1").await, Some(true));
    }

    #[tokio::test]
    async fn test_stale_reconciliation_is_ignored() {
        let store = DomainStore::new();
        let now = Utc::now();

        let newer = Post {
            updated_at: Some(now),
            ..post("p1", 5)
        };
        let older = Post {
            updated_at: Some(now - Duration::seconds(30)),
            ..post("p1", 2)
        };

        assert!(store.reconcile_post(newer).await);
        assert!(!store.reconcile_post(older).await);
        assert_eq!(store.post("p1").await.unwrap().score, 5);
    }

    #[tokio::test]
    async fn test_current_user_follows_reconciliation() {
        let store = DomainStore::new();
        let user = User {
            sov_id: alice(),
            username: "alice".to_string(),
            created_at: None,
            updated_at: None,
        };
        store.set_current_user(user.clone()).await;

        let renamed = User {
            username: "alice2".to_string(),
            updated_at: Some(Utc::now()),
            ..user
        };
        store.reconcile_user(renamed).await;

        assert_eq!(store.current_user().await.unwrap().username, "alice2");
    }

    #[tokio::test]
    async fn test_pending_writes_and_teardown() {
        let store = DomainStore::new();
        let command = Command::build(Intent::CastVote {
            post_id: "p1".to_string(),
            value: VoteValue::Up,
        })
        .unwrap();
        let key = command.in_flight_key(&alice());
        let compensation = store.apply_optimistic_vote(&alice(), "p1", VoteValue::Up).await;

        let write = PendingWrite::new(command.clone(), key, "0xabc")
            .with_compensation(Some(compensation.clone()));
        let id = store.register_pending(write).await;
        assert_eq!(store.pending_writes().await.len(), 1);

        let resolved = store.resolve_pending(&id).await.unwrap();
        assert_eq!(resolved.kind, CommandKind::CastVote);
        assert_eq!(resolved.command, command);
        assert_eq!(resolved.compensation, Some(compensation));
        assert!(store.pending_writes().await.is_empty());

        store.reconcile_post(post("p1", 1)).await;
        store.teardown().await;
        assert!(store.post("p1").await.is_none());
    }
}
