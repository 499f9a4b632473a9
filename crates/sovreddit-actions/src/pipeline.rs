//! Write pipeline: build, sign, submit, then confirm and reconcile.
//!
//! Every write returns as soon as the processor has accepted it. Confirmation
//! runs on its own task and reports through a [`PendingWriteHandle`]; the
//! handle may be awaited, abandoned, or simply dropped.

use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use sovreddit_identity::CommandSigner;
use sovreddit_store::{Compensation, DomainStore, InFlightGuard, InFlightRegistry, PendingWrite};
use sovreddit_sync::{
    await_effect_until, CommandSubmitter, ConfirmationPolicy, ReadModel, ReadModelExt, Relation,
    SubmissionReceipt, SyncError,
};
use sovreddit_types::{
    Command, CommandKind, Comment, EntitySchema, Identity, Intent, Membership, Post, Subreddit,
    User, Vote, VoteValue,
};

use crate::effects::{
    decode_rows, known_ids, CommentAdded, ExpectedEffect, MembershipToggled, PostCreated,
    SubredditCreated, UserCreated, VoteCast, VoteConfirmation,
};
use crate::error::{PipelineError, PipelineResult};
use crate::vote::VotePress;

/// Caller's side of a write that was accepted but not yet confirmed
#[derive(Debug)]
pub struct PendingWriteHandle<T> {
    pending_id: Uuid,
    receipt: SubmissionReceipt,
    outcome: oneshot::Receiver<PipelineResult<T>>,
    cancel: watch::Sender<bool>,
}

impl<T> PendingWriteHandle<T> {
    pub fn pending_id(&self) -> Uuid {
        self.pending_id
    }

    pub fn receipt(&self) -> &SubmissionReceipt {
        &self.receipt
    }

    pub fn kind(&self) -> CommandKind {
        self.receipt.kind
    }

    /// Wait for the confirmation task to finish
    pub async fn confirmed(self) -> PipelineResult<T> {
        self.outcome.await.unwrap_or_else(|_| {
            Err(PipelineError::Internal(
                "Confirmation task ended without an outcome".to_string(),
            ))
        })
    }

    /// Stop polling. The submission stands and optimistic state is kept.
    pub fn abandon(&self) {
        // No receiver means the task already finished
        let _ = self.cancel.send(true);
    }
}

/// Orchestrates writes against the processor and the domain store
#[derive(Clone)]
pub struct WritePipeline {
    submitter: Arc<dyn CommandSubmitter>,
    reads: Arc<dyn ReadModel>,
    signer: Arc<dyn CommandSigner>,
    store: DomainStore,
    in_flight: InFlightRegistry,
}

impl WritePipeline {
    pub fn new(
        submitter: Arc<dyn CommandSubmitter>,
        reads: Arc<dyn ReadModel>,
        signer: Arc<dyn CommandSigner>,
        store: DomainStore,
        in_flight: InFlightRegistry,
    ) -> Self {
        Self {
            submitter,
            reads,
            signer,
            store,
            in_flight,
        }
    }

    pub fn store(&self) -> &DomainStore {
        &self.store
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// Register the signer's identity under `username`
    pub async fn register_user(&self, username: &str) -> PipelineResult<PendingWriteHandle<User>> {
        let command = Command::build(Intent::CreateUser {
            username: username.to_string(),
        })?;
        let author = self.author()?;
        let guard = self.in_flight.try_acquire(command.in_flight_key(&author))?;

        let effect = UserCreated {
            reads: self.reads.clone(),
            author,
        };
        self.dispatch(command, guard, None, effect).await
    }

    pub async fn create_subreddit(
        &self,
        name: &str,
        description: &str,
    ) -> PipelineResult<PendingWriteHandle<Subreddit>> {
        let command = Command::build(Intent::CreateSubreddit {
            name: name.to_string(),
            description: description.to_string(),
        })?;
        let author = self.author()?;
        let guard = self.in_flight.try_acquire(command.in_flight_key(&author))?;

        let effect = SubredditCreated {
            reads: self.reads.clone(),
            author,
            name: name.to_string(),
        };
        self.dispatch(command, guard, None, effect).await
    }

    pub async fn create_post(
        &self,
        subreddit_id: &str,
        title: &str,
        content: &str,
        flair: &str,
    ) -> PipelineResult<PendingWriteHandle<Post>> {
        let command = Command::build(Intent::CreatePost {
            subreddit_id: subreddit_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            flair: flair.to_string(),
        })?;
        let author = self.author()?;
        let guard = self.in_flight.try_acquire(command.in_flight_key(&author))?;

        let relation = Relation::PostsForSubreddit {
            sub_sov_id: subreddit_id.to_string(),
        };
        let effect = PostCreated {
            reads: self.reads.clone(),
            author,
            sub_id: subreddit_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            known: known_ids(self.reads.as_ref(), &relation, "post_sov_id").await,
        };
        self.dispatch(command, guard, None, effect).await
    }

    /// Add a comment; a provisional copy shows in the store until confirmed
    pub async fn add_comment(
        &self,
        post_id: &str,
        content: &str,
    ) -> PipelineResult<PendingWriteHandle<Comment>> {
        let command = Command::build(Intent::AddComment {
            post_id: post_id.to_string(),
            content: content.to_string(),
        })?;
        let author = self.author()?;
        let guard = self.in_flight.try_acquire(command.in_flight_key(&author))?;

        let relation = Relation::CommentsForPost {
            post_sov_id: post_id.to_string(),
        };
        let known = known_ids(self.reads.as_ref(), &relation, "comment_sov_id").await;
        let (placeholder, compensation) = self
            .store
            .apply_optimistic_comment(&author, post_id, content)
            .await;

        let effect = CommentAdded {
            reads: self.reads.clone(),
            author,
            post_id: post_id.to_string(),
            content: content.to_string(),
            known,
            placeholder_id: placeholder.comment_sov_id,
        };
        self.dispatch(command, guard, Some(compensation), effect).await
    }

    /// Press a vote control on a post.
    ///
    /// Emits one CastVote with the absolute next value. A second press while
    /// the first is unsettled fails with [`PipelineError::KeyInFlight`]. A
    /// vote the session has not seen yet is read before the press is applied.
    pub async fn press_vote(
        &self,
        post_id: &str,
        press: VotePress,
    ) -> PipelineResult<PendingWriteHandle<VoteConfirmation>> {
        let author = self.author()?;
        let current = match self.store.cached_vote(&author, post_id).await {
            Some(value) => value,
            None => self.load_vote(&author, post_id).await?,
        };
        let value = press.apply(current);

        let command = Command::build(Intent::CastVote {
            post_id: post_id.to_string(),
            value,
        })?;
        let guard = self.in_flight.try_acquire(command.in_flight_key(&author))?;
        debug!("Vote on {} moves {} -> {}", post_id, current, value);

        let compensation = self
            .store
            .apply_optimistic_vote(&author, post_id, value)
            .await;
        let effect = VoteCast {
            reads: self.reads.clone(),
            author,
            post_id: post_id.to_string(),
            value,
        };
        self.dispatch(command, guard, Some(compensation), effect).await
    }

    /// Join a subreddit, or leave it if already a member
    pub async fn toggle_membership(
        &self,
        subreddit_id: &str,
    ) -> PipelineResult<PendingWriteHandle<bool>> {
        let command = Command::build(Intent::ToggleMembership {
            subreddit_id: subreddit_id.to_string(),
        })?;
        let author = self.author()?;
        if self.store.membership(&author, subreddit_id).await.is_none() {
            let joined = self.load_memberships().await?;
            if !joined.iter().any(|id| id == subreddit_id) {
                self.store
                    .reconcile_membership(&author, subreddit_id, false)
                    .await;
            }
        }
        let guard = self.in_flight.try_acquire(command.in_flight_key(&author))?;

        let (joined, compensation) = self
            .store
            .apply_optimistic_membership(&author, subreddit_id)
            .await;
        let effect = MembershipToggled {
            reads: self.reads.clone(),
            author,
            sub_id: subreddit_id.to_string(),
            joined,
        };
        self.dispatch(command, guard, Some(compensation), effect).await
    }

    /// Fetch a post and, when a key is connected, the caller's vote on it
    pub async fn load_post(&self, post_id: &str) -> PipelineResult<Option<Post>> {
        let post: Option<Post> = self.reads.fetch_entity(EntitySchema::Post, post_id).await?;
        let Some(post) = post else {
            return Ok(None);
        };
        self.store.reconcile_post(post.clone()).await;

        if let Ok(author) = self.signer.public_identity() {
            self.load_vote(&author, post_id).await?;
        }

        Ok(self.store.post(post_id).await)
    }

    /// Fetch the ids of the subreddits the signer has joined and cache them
    pub async fn load_memberships(&self) -> PipelineResult<Vec<String>> {
        let author = self.author()?;
        let rows = self
            .reads
            .list_values(&Relation::UserSubreddits {
                user_sov_id: author.clone(),
            })
            .await?;

        let joined: Vec<String> = decode_rows::<Membership>(rows)
            .into_iter()
            .map(|membership| membership.sub_sov_id)
            .collect();
        for sub_id in &joined {
            self.store.reconcile_membership(&author, sub_id, true).await;
        }
        debug!("{} is a member of {} subreddits", author, joined.len());
        Ok(joined)
    }

    /// Fetch any user's record by identity
    pub async fn load_user(&self, identity: &Identity) -> PipelineResult<Option<User>> {
        let user: Option<User> = self
            .reads
            .fetch_entity(EntitySchema::User, identity.as_str())
            .await?;
        if let Some(user) = &user {
            self.store.reconcile_user(user.clone()).await;
        }
        Ok(user)
    }

    /// Look up the signer's user record and make it the current user
    pub async fn restore_session(&self) -> PipelineResult<Option<User>> {
        let author = self.author()?;
        let user: Option<User> = self
            .reads
            .fetch_entity(EntitySchema::User, author.as_str())
            .await?;

        match user {
            Some(user) => {
                self.store.set_current_user(user.clone()).await;
                Ok(Some(user))
            }
            None => {
                debug!("No user registered for {}", author);
                Ok(None)
            }
        }
    }

    /// Identity of the connected key
    pub fn author(&self) -> PipelineResult<Identity> {
        Ok(self.signer.public_identity()?)
    }

    /// Read the stored vote; an absent record is cached as neutral
    async fn load_vote(&self, author: &Identity, post_id: &str) -> PipelineResult<VoteValue> {
        let key = Vote::primary_key(author, post_id);
        let vote: Option<Vote> = self.reads.fetch_entity(EntitySchema::Vote, &key).await?;
        let value = vote.map(|v| v.value).unwrap_or_default();

        self.store
            .reconcile_vote(Vote {
                user_sov_id: author.clone(),
                post_sov_id: post_id.to_string(),
                value,
            })
            .await;
        Ok(value)
    }

    /// Submit, register the pending write and start confirmation
    async fn dispatch<E: ExpectedEffect>(
        &self,
        command: Command,
        guard: InFlightGuard,
        compensation: Option<Compensation>,
        effect: E,
    ) -> PipelineResult<PendingWriteHandle<E::Output>> {
        let kind = command.kind();

        let receipt = match self.submitter.submit(&command, self.signer.as_ref()).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("Submitting {} failed: {}", kind, e);
                if let Some(compensation) = compensation {
                    self.store.revert(compensation).await;
                }
                return Err(e.into());
            }
        };
        info!("Submitted {} ({})", kind, receipt.tx_hash);

        let write = PendingWrite::new(command, guard.key().clone(), receipt.tx_hash.clone())
            .with_compensation(compensation);
        let pending_id = self.store.register_pending(write).await;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let store = self.store.clone();
        let policy = ConfirmationPolicy::for_command(kind);

        tokio::spawn(async move {
            let outcome = confirm(store, effect, policy, cancel_rx, pending_id).await;
            drop(guard);
            if outcome_tx.send(outcome).is_err() {
                debug!("Nobody is waiting on {} write {}", kind, pending_id);
            }
        });

        Ok(PendingWriteHandle {
            pending_id,
            receipt,
            outcome: outcome_rx,
            cancel: cancel_tx,
        })
    }
}

async fn confirm<E: ExpectedEffect>(
    store: DomainStore,
    effect: E,
    policy: ConfirmationPolicy,
    cancel: watch::Receiver<bool>,
    pending_id: Uuid,
) -> PipelineResult<E::Output> {
    let outcome = await_effect_until(&policy, || effect.lookup(), cancel).await;
    let pending = store.resolve_pending(&pending_id).await;

    match outcome {
        Ok(found) => {
            effect.reconcile(&store, &found).await;
            info!("Write {} confirmed", pending_id);
            Ok(found)
        }
        Err(SyncError::Abandoned) => {
            debug!("Stopped confirming write {}", pending_id);
            Err(PipelineError::Abandoned)
        }
        Err(e) => {
            warn!("Write {} not confirmed: {}", pending_id, e);
            if let Some(compensation) = pending.and_then(|write| write.compensation) {
                store.revert(compensation).await;
            }
            Err(e.into())
        }
    }
}
