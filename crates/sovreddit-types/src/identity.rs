use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::error::{TypesError, TypesResult};

/// Key-derived identity of a user.
///
/// The identity is the base58 encoding of the user's 32-byte Ed25519 public
/// key. It is the primary key of the user record and the attribution field on
/// posts, comments and votes. Users never choose it; only the display
/// username is theirs to pick.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Derive the identity for a public key
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        Self(bs58::encode(public_key).into_string())
    }

    /// Parse an identity received from the read endpoint or the command line
    pub fn parse(value: &str) -> TypesResult<Self> {
        let bytes = bs58::decode(value)
            .into_vec()
            .map_err(|e| TypesError::InvalidIdentity(format!("{}: {}", value, e)))?;

        if bytes.len() != 32 {
            return Err(TypesError::InvalidIdentity(format!(
                "{}: expected 32 key bytes, got {}",
                value,
                bytes.len()
            )));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_deterministic() {
        let key = [7u8; 32];
        assert_eq!(Identity::from_public_key(&key), Identity::from_public_key(&key));
        assert_ne!(Identity::from_public_key(&key), Identity::from_public_key(&[8u8; 32]));
    }

    #[test]
    fn test_parse_round_trips_derived_identity() {
        let identity = Identity::from_public_key(&[42u8; 32]);
        assert_eq!(Identity::parse(identity.as_str()).unwrap(), identity);
    }

    #[test]
    fn test_parse_rejects_short_keys() {
        let short = bs58::encode([1u8; 16]).into_string();
        assert!(matches!(Identity::parse(&short), Err(TypesError::InvalidIdentity(_))));
        assert!(Identity::parse("0OIl").is_err());
    }
}
