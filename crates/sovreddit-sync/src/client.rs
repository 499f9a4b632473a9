use async_trait::async_trait;
use backoff::future::retry_notify;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use sovreddit_identity::CommandSigner;
use sovreddit_types::{Command, CommandKind};

use crate::envelope::{SignedEnvelope, TxDetails, UnsignedTransaction};
use crate::error::{SyncError, SyncResult};

const SUBMIT_ENDPOINT: &str = "/sequencer/txs";

/// Acknowledgment that the sequencer accepted an envelope for processing.
///
/// Acceptance says nothing about when, or whether, the effect becomes
/// visible on the read path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub tx_hash: String,
    pub kind: CommandKind,
    pub accepted_at: DateTime<Utc>,
}

/// Body returned by the sequencer on acceptance
#[derive(Debug, Default, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Submits signed commands for asynchronous processing
#[async_trait]
pub trait CommandSubmitter: Send + Sync {
    async fn submit(
        &self,
        command: &Command,
        signer: &dyn CommandSigner,
    ) -> SyncResult<SubmissionReceipt>;
}

/// HTTP client for the sequencer's write endpoint
#[derive(Clone)]
pub struct SubmissionClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
    details: TxDetails,
    backoff: ExponentialBackoff,
}

impl SubmissionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..ExponentialBackoff::default()
        };

        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
            details: TxDetails::default(),
            backoff,
        }
    }

    pub fn with_auth_token(mut self, token: String) -> Self {
        self.auth_token = Some(token);
        self
    }

    pub fn with_tx_details(mut self, details: TxDetails) -> Self {
        self.details = details;
        self
    }

    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> SyncResult<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Wrap and sign a command with this client's transaction details
    pub fn seal(&self, command: &Command, signer: &dyn CommandSigner) -> SyncResult<SignedEnvelope> {
        let tx = UnsignedTransaction::new(command.clone(), self.details.clone());
        SignedEnvelope::seal(&tx, signer)
    }

    /// Post an already sealed envelope
    pub async fn submit_envelope(
        &self,
        envelope: &SignedEnvelope,
        kind: CommandKind,
    ) -> SyncResult<SubmissionReceipt> {
        let url = format!("{}{}", self.base_url, SUBMIT_ENDPOINT);

        let mut request = self.client.post(&url).json(envelope);
        if let Some(token) = &self.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(classify_failure(status, body));
        }

        let parsed = if body.trim().is_empty() {
            SubmitResponse::default()
        } else {
            serde_json::from_str::<SubmitResponse>(&body).unwrap_or_else(|e| {
                debug!("Unrecognized sequencer response ({}): {}", e, body);
                SubmitResponse::default()
            })
        };

        let tx_hash = match parsed.id {
            Some(id) => id,
            None => envelope.tx_hash()?,
        };
        info!(
            "Sequencer accepted {} as {} ({})",
            kind,
            tx_hash,
            parsed.status.as_deref().unwrap_or("submitted")
        );

        Ok(SubmissionReceipt {
            tx_hash,
            kind,
            accepted_at: Utc::now(),
        })
    }

    /// Submit with automatic retries on transport failures.
    ///
    /// The command is sealed once; every retry posts the identical envelope.
    pub async fn submit_with_retry(
        &self,
        command: &Command,
        signer: &dyn CommandSigner,
    ) -> SyncResult<SubmissionReceipt> {
        let envelope = self.seal(command, signer)?;
        let kind = command.kind();
        let envelope = &envelope;

        let operation = || async move {
            self.submit_envelope(envelope, kind).await.map_err(|e| {
                if e.is_transient() {
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        };

        let receipt = retry_notify(self.backoff.clone(), operation, |err, dur| {
            warn!("Retrying {} submission after {:?} due to error: {}", kind, dur, err);
        })
        .await?;
        Ok(receipt)
    }
}

#[async_trait]
impl CommandSubmitter for SubmissionClient {
    async fn submit(
        &self,
        command: &Command,
        signer: &dyn CommandSigner,
    ) -> SyncResult<SubmissionReceipt> {
        let envelope = self.seal(command, signer)?;
        self.submit_envelope(&envelope, command.kind()).await
    }
}

fn classify_failure(status: StatusCode, body: String) -> SyncError {
    match status.as_u16() {
        408 | 429 | 500..=599 => SyncError::Network(format!("HTTP {}: {}", status, body)),
        code => SyncError::Rejected {
            status: code,
            reason: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use sovreddit_identity::{verify_signature, KeyPair, SessionSigner};
    use sovreddit_types::{Intent, VoteValue};

    fn create_user() -> Command {
        Command::build(Intent::CreateUser {
            username: "alice".to_string(),
        })
        .unwrap()
    }

    fn fast_backoff() -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            max_elapsed_time: Some(Duration::from_secs(2)),
            ..ExponentialBackoff::default()
        }
    }

    #[tokio::test]
    async fn test_submit_accepted_returns_receipt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sequencer/txs")
            .match_header("content-type", "application/json")
            .with_status(202)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"0xabc","status":"submitted"}"#)
            .create_async()
            .await;

        let signer = SessionSigner::from_keypair(KeyPair::generate());
        let client = SubmissionClient::new(server.url());
        let receipt = client.submit(&create_user(), &signer).await.unwrap();

        mock.assert_async().await;
        assert_eq!(receipt.tx_hash, "0xabc");
        assert_eq!(receipt.kind, CommandKind::CreateUser);
    }

    #[tokio::test]
    async fn test_transmitted_body_verifies_against_signer() {
        let mut server = mockito::Server::new_async().await;
        let signer = SessionSigner::from_keypair(KeyPair::generate());
        let client = SubmissionClient::new(server.url());
        let command = Command::build(Intent::CastVote {
            post_id: "p1".to_string(),
            value: VoteValue::Neutral,
        })
        .unwrap();

        let envelope = client.seal(&command, &signer).unwrap();
        let wire_body = serde_json::to_string(&envelope).unwrap();
        let mock = server
            .mock("POST", "/sequencer/txs")
            .match_body(Matcher::Exact(wire_body.clone()))
            .with_status(202)
            .with_body(r#"{"id":"tx-7"}"#)
            .expect(1)
            .create_async()
            .await;

        let receipt = client
            .submit_envelope(&envelope, CommandKind::CastVote)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(receipt.tx_hash, "tx-7");

        // Decode what went over the wire and check it against the signer
        let received: SignedEnvelope = serde_json::from_str(&wire_body).unwrap();
        let bytes = received.payload_bytes().unwrap();
        assert!(verify_signature(
            &signer.public_key().unwrap(),
            &bytes,
            &received.signature().unwrap()
        )
        .is_ok());
        assert_eq!(
            received.transaction().unwrap().runtime_call,
            command.into_runtime_call()
        );
    }

    #[tokio::test]
    async fn test_rejection_is_not_transient() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sequencer/txs")
            .with_status(422)
            .with_body("username already taken")
            .create_async()
            .await;

        let signer = SessionSigner::from_keypair(KeyPair::generate());
        let client = SubmissionClient::new(server.url());
        let err = client.submit(&create_user(), &signer).await.unwrap_err();

        assert!(!err.is_transient());
        match err {
            SyncError::Rejected { status, reason } => {
                assert_eq!(status, 422);
                assert_eq!(reason, "username already taken");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sequencer/txs")
            .with_status(503)
            .create_async()
            .await;

        let signer = SessionSigner::from_keypair(KeyPair::generate());
        let client = SubmissionClient::new(server.url());
        let err = client.submit(&create_user(), &signer).await.unwrap_err();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_empty_body_falls_back_to_local_hash() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sequencer/txs")
            .with_status(200)
            .create_async()
            .await;

        let signer = SessionSigner::from_keypair(KeyPair::generate());
        let client = SubmissionClient::new(server.url());
        let receipt = client.submit(&create_user(), &signer).await.unwrap();

        assert_eq!(receipt.tx_hash.len(), 64);
    }

    #[tokio::test]
    async fn test_retry_resubmits_identical_envelope() {
        let mut server = mockito::Server::new_async().await;
        let signer = SessionSigner::from_keypair(KeyPair::generate());
        let client = SubmissionClient::new(server.url()).with_backoff(fast_backoff());

        let failing = server
            .mock("POST", "/sequencer/txs")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let accepted = server
            .mock("POST", "/sequencer/txs")
            .match_body(Matcher::Regex("\"payload\"".to_string()))
            .with_status(200)
            .with_body(r#"{"id":"tx-1"}"#)
            .create_async()
            .await;

        let receipt = client.submit_with_retry(&create_user(), &signer).await.unwrap();

        failing.assert_async().await;
        accepted.assert_async().await;
        assert_eq!(receipt.tx_hash, "tx-1");
    }

    #[tokio::test]
    async fn test_retry_stops_on_rejection() {
        let mut server = mockito::Server::new_async().await;
        let rejected = server
            .mock("POST", "/sequencer/txs")
            .with_status(400)
            .expect(1)
            .create_async()
            .await;

        let signer = SessionSigner::from_keypair(KeyPair::generate());
        let client = SubmissionClient::new(server.url()).with_backoff(fast_backoff());
        let err = client
            .submit_with_retry(&create_user(), &signer)
            .await
            .unwrap_err();

        rejected.assert_async().await;
        assert!(matches!(err, SyncError::Rejected { status: 400, .. }));
    }
}
