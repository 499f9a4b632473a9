//! # sovreddit identity
//!
//! Owns the client's key material. A [`SessionSigner`] holds an Ed25519
//! [`KeyPair`] for the lifetime of a session and exposes only the derived
//! [`Identity`] and signatures over caller-supplied bytes, never the raw key.

pub mod error;
pub mod keypair;

pub use ed25519_dalek::Signature;
pub use error::{IdentityError, IdentityResult};
pub use keypair::{verify_signature, KeyPair, KeyPairSerialized};

use sovreddit_types::Identity;
use tracing::{debug, info};

/// Signs the exact bytes that will be transmitted.
///
/// Every method fails with [`IdentityError::SigningUnavailable`] when no key
/// is loaded; callers should surface a "connect your key" flow rather than
/// retry.
pub trait CommandSigner: Send + Sync {
    /// Identity derived from the loaded public key
    fn public_identity(&self) -> IdentityResult<Identity>;

    /// Raw public key bytes, carried in the envelope for verification
    fn public_key(&self) -> IdentityResult<[u8; 32]>;

    /// Sign serialized command bytes
    fn sign(&self, message: &[u8]) -> IdentityResult<Signature>;
}

/// Signer holding at most one key pair for the current session
#[derive(Debug, Default, Clone)]
pub struct SessionSigner {
    key: Option<KeyPair>,
}

impl SessionSigner {
    /// Signer with no key material, as before the user connects a key
    pub fn empty() -> Self {
        Self { key: None }
    }

    pub fn from_keypair(key: KeyPair) -> Self {
        Self { key: Some(key) }
    }

    /// Load key material for the session, replacing any previous key
    pub fn connect(&mut self, key: KeyPair) {
        info!("Connected signing key for {}", key.identity());
        self.key = Some(key);
    }

    /// Drop key material at session end
    pub fn disconnect(&mut self) {
        if let Some(key) = self.key.take() {
            debug!("Disconnected signing key for {}", key.identity());
        }
    }

    pub fn is_connected(&self) -> bool {
        self.key.is_some()
    }

    fn key(&self) -> IdentityResult<&KeyPair> {
        self.key.as_ref().ok_or(IdentityError::SigningUnavailable)
    }
}

impl CommandSigner for SessionSigner {
    fn public_identity(&self) -> IdentityResult<Identity> {
        Ok(self.key()?.identity())
    }

    fn public_key(&self) -> IdentityResult<[u8; 32]> {
        Ok(self.key()?.public_key_bytes())
    }

    fn sign(&self, message: &[u8]) -> IdentityResult<Signature> {
        Ok(self.key()?.sign(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_signer_is_unavailable() {
        let signer = SessionSigner::empty();

        assert!(!signer.is_connected());
        assert!(matches!(signer.public_identity(), Err(IdentityError::SigningUnavailable)));
        assert!(matches!(signer.sign(b"x"), Err(IdentityError::SigningUnavailable)));
    }

    #[test]
    fn test_identity_is_pure_function_of_key() {
        let key = KeyPair::generate();
        let expected = Identity::from_public_key(&key.public_key_bytes());
        let signer = SessionSigner::from_keypair(key);

        assert_eq!(signer.public_identity().unwrap(), expected);
        assert_eq!(signer.public_identity().unwrap(), signer.public_identity().unwrap());
    }

    #[test]
    fn test_disconnect_drops_key() {
        let mut signer = SessionSigner::empty();
        signer.connect(KeyPair::generate());
        assert!(signer.sign(b"hello").is_ok());

        signer.disconnect();
        assert!(matches!(signer.public_key(), Err(IdentityError::SigningUnavailable)));
    }
}
