//! Canonical transaction encoding.
//!
//! A transaction is serialized exactly once, in [`SignedEnvelope::seal`]. The
//! signature covers those bytes and the envelope transmits the same bytes, so
//! the signed form and the submitted form cannot drift apart.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use sovreddit_identity::{verify_signature, CommandSigner, Signature};
use sovreddit_types::{Command, RuntimeCall};

use crate::error::{SyncError, SyncResult};

pub const DEFAULT_CHAIN_ID: u64 = 4321;
pub const DEFAULT_MAX_FEE: &str = "100000000";

/// Fee and chain parameters attached to every transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxDetails {
    pub max_priority_fee_bips: u64,
    /// Decimal string; fee amounts exceed what JSON numbers carry safely
    pub max_fee: String,
    pub gas_limit: Option<Vec<u64>>,
    pub chain_id: u64,
}

impl Default for TxDetails {
    fn default() -> Self {
        Self {
            max_priority_fee_bips: 0,
            max_fee: DEFAULT_MAX_FEE.to_string(),
            gas_limit: None,
            chain_id: DEFAULT_CHAIN_ID,
        }
    }
}

/// A command wrapped with its transaction details, not yet signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub runtime_call: RuntimeCall,
    /// Millisecond timestamp used as a replay-protection nonce
    pub generation: u64,
    pub details: TxDetails,
}

impl UnsignedTransaction {
    pub fn new(command: Command, details: TxDetails) -> Self {
        let generation = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        Self {
            runtime_call: command.into_runtime_call(),
            generation,
            details,
        }
    }

    /// The canonical byte form that gets signed and transmitted
    fn encode(&self) -> SyncResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Signed transaction as posted to the sequencer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub_key: String,
    signature: String,
    payload: String,
}

impl SignedEnvelope {
    /// Encode the transaction once, sign the bytes, and wrap both
    pub fn seal(tx: &UnsignedTransaction, signer: &dyn CommandSigner) -> SyncResult<Self> {
        let bytes = tx.encode()?;
        let signature = signer.sign(&bytes)?;
        let public_key = signer.public_key()?;

        Ok(Self {
            pub_key: hex::encode(public_key),
            signature: hex::encode(signature.to_bytes()),
            payload: BASE64.encode(&bytes),
        })
    }

    /// The exact bytes that were signed
    pub fn payload_bytes(&self) -> SyncResult<Vec<u8>> {
        BASE64
            .decode(&self.payload)
            .map_err(|e| SyncError::Internal(format!("Envelope payload is not base64: {}", e)))
    }

    pub fn public_key(&self) -> SyncResult<[u8; 32]> {
        let bytes = hex::decode(&self.pub_key)
            .map_err(|e| SyncError::Internal(format!("Envelope key is not hex: {}", e)))?;
        <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| SyncError::Internal("Envelope key must be 32 bytes".to_string()))
    }

    pub fn signature(&self) -> SyncResult<Signature> {
        let bytes = hex::decode(&self.signature)
            .map_err(|e| SyncError::Internal(format!("Envelope signature is not hex: {}", e)))?;
        Signature::from_slice(&bytes)
            .map_err(|e| SyncError::Internal(format!("Malformed signature: {}", e)))
    }

    /// Check the signature against the transmitted payload
    pub fn verify(&self) -> SyncResult<()> {
        let bytes = self.payload_bytes()?;
        verify_signature(&self.public_key()?, &bytes, &self.signature()?)?;
        Ok(())
    }

    /// Decode the transaction carried by the payload
    pub fn transaction(&self) -> SyncResult<UnsignedTransaction> {
        Ok(serde_json::from_slice(&self.payload_bytes()?)?)
    }

    /// Hex sha256 of the payload, used as a local transaction hash
    pub fn tx_hash(&self) -> SyncResult<String> {
        let mut hasher = Sha256::new();
        hasher.update(self.payload_bytes()?);
        Ok(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sovreddit_identity::{IdentityError, KeyPair, SessionSigner};
    use sovreddit_types::{Intent, VoteValue};

    fn vote_command() -> Command {
        Command::build(Intent::CastVote {
            post_id: "post-7".to_string(),
            value: VoteValue::Up,
        })
        .unwrap()
    }

    #[test]
    fn test_signed_bytes_equal_transmitted_bytes() {
        let signer = SessionSigner::from_keypair(KeyPair::generate());
        let tx = UnsignedTransaction::new(vote_command(), TxDetails::default());
        let envelope = SignedEnvelope::seal(&tx, &signer).unwrap();

        let transmitted = envelope.payload_bytes().unwrap();
        let signature = envelope.signature().unwrap();
        assert!(verify_signature(&signer.public_key().unwrap(), &transmitted, &signature).is_ok());
        assert_eq!(envelope.transaction().unwrap(), tx);
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let signer = SessionSigner::from_keypair(KeyPair::generate());
        let tx = UnsignedTransaction::new(vote_command(), TxDetails::default());
        let mut envelope = SignedEnvelope::seal(&tx, &signer).unwrap();

        let mut other = tx.clone();
        other.generation += 1;
        envelope.payload = BASE64.encode(other.encode().unwrap());

        assert!(envelope.verify().is_err());
    }

    #[test]
    fn test_seal_without_key_is_unavailable() {
        let tx = UnsignedTransaction::new(vote_command(), TxDetails::default());
        let result = SignedEnvelope::seal(&tx, &SessionSigner::empty());

        assert!(matches!(
            result,
            Err(SyncError::Signing(IdentityError::SigningUnavailable))
        ));
    }

    #[test]
    fn test_default_details_match_chain() {
        let details = TxDetails::default();
        assert_eq!(details.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(details.max_fee, "100000000");
        assert!(details.gas_limit.is_none());
    }
}
