use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Debug, Formatter};
use std::fs;
use std::path::Path;
use tracing::debug;

use sovreddit_types::Identity;

use crate::error::{IdentityError, IdentityResult};

/// Ed25519 key pair held in memory for a session
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

/// Serialized representation of a KeyPair, as stored in a key file
#[derive(Serialize, Deserialize)]
pub struct KeyPairSerialized {
    pub secret: String,
    pub public: String,
}

impl Serialize for KeyPair {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_serializable().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KeyPair {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let helper = KeyPairSerialized::deserialize(deserializer)?;
        KeyPair::from_serializable(&helper).map_err(|e| de::Error::custom(e.to_string()))
    }
}

impl KeyPair {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);

        Self {
            signing_key,
            verifying_key,
        }
    }

    pub fn from_secret(secret_key_bytes: &[u8]) -> IdentityResult<Self> {
        let signing_key = SigningKey::try_from(secret_key_bytes)
            .map_err(|e| IdentityError::KeyError(format!("Invalid secret key: {}", e)))?;
        let verifying_key = VerifyingKey::from(&signing_key);

        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Identity derived from the public half of this pair
    pub fn identity(&self) -> Identity {
        Identity::from_public_key(&self.public_key_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.verifying_key.verify(message, signature).is_ok()
    }

    pub fn to_serializable(&self) -> KeyPairSerialized {
        KeyPairSerialized {
            secret: BASE64.encode(self.signing_key.to_bytes()),
            public: BASE64.encode(self.verifying_key.to_bytes()),
        }
    }

    pub fn from_serializable(serialized: &KeyPairSerialized) -> IdentityResult<Self> {
        let secret_bytes = BASE64.decode(&serialized.secret).map_err(|e| {
            IdentityError::SerializationError(format!("Failed to decode secret key: {}", e))
        })?;
        let pair = Self::from_secret(&secret_bytes)?;

        // A key file whose public half does not match its secret is corrupt
        let public_bytes = BASE64.decode(&serialized.public).map_err(|e| {
            IdentityError::SerializationError(format!("Failed to decode public key: {}", e))
        })?;
        if public_bytes.as_slice() != pair.public_key_bytes().as_slice() {
            return Err(IdentityError::KeyError(
                "Public key does not match secret key".to_string(),
            ));
        }

        Ok(pair)
    }

    /// Load a key pair from a JSON key file
    pub fn load(path: impl AsRef<Path>) -> IdentityResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let pair: KeyPair = serde_json::from_str(&content)?;
        debug!("Loaded key for {} from {:?}", pair.identity(), path.as_ref());
        Ok(pair)
    }

    /// Save this key pair to a JSON key file
    pub fn save(&self, path: impl AsRef<Path>) -> IdentityResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)?;
        debug!("Saved key for {} to {:?}", self.identity(), path.as_ref());
        Ok(())
    }
}

impl Debug for KeyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("identity", &self.identity())
            .field("secret", &"[redacted]")
            .finish()
    }
}

/// Check a signature against a raw public key
pub fn verify_signature(
    public_key: &[u8; 32],
    message: &[u8],
    signature: &Signature,
) -> IdentityResult<()> {
    let key = VerifyingKey::from_bytes(public_key)
        .map_err(|e| IdentityError::KeyError(format!("Invalid public key: {}", e)))?;

    key.verify(message, signature).map_err(|e| {
        IdentityError::VerificationFailed(format!("Signature verification failed: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let pair = KeyPair::generate();
        let signature = pair.sign(b"payload");

        assert!(pair.verify(b"payload", &signature));
        assert!(!pair.verify(b"tampered", &signature));
        assert!(verify_signature(&pair.public_key_bytes(), b"payload", &signature).is_ok());
    }

    #[test]
    fn test_identity_is_stable_across_serialization() {
        let pair = KeyPair::generate();
        let json = serde_json::to_string(&pair).unwrap();
        let restored: KeyPair = serde_json::from_str(&json).unwrap();

        assert_eq!(pair.identity(), restored.identity());
    }

    #[test]
    fn test_mismatched_public_key_is_rejected() {
        let pair = KeyPair::generate();
        let other = KeyPair::generate();
        let serialized = KeyPairSerialized {
            secret: pair.to_serializable().secret,
            public: other.to_serializable().public,
        };

        assert!(matches!(
            KeyPair::from_serializable(&serialized),
            Err(IdentityError::KeyError(_))
        ));
    }

    #[test]
    fn test_save_and_load_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("session.json");

        let pair = KeyPair::generate();
        pair.save(&path).unwrap();
        let loaded = KeyPair::load(&path).unwrap();

        assert_eq!(pair.public_key_bytes(), loaded.public_key_bytes());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let pair = KeyPair::generate();
        let rendered = format!("{:?}", pair);
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains(&pair.to_serializable().secret));
    }
}
