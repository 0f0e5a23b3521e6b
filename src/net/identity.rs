//! Endpoint identity.
//!
//! # Responsibilities
//! - Decode the configured ed25519 secret key
//! - Derive and verify the peer id
//! - Sign and verify announcements
//! - Generate fresh key material for `init`

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::IdentityConfig;

/// Errors produced while decoding identity material.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("private key is not valid base64: {0}")]
    KeyEncoding(#[from] base64::DecodeError),

    #[error("private key must be 32 bytes, got {0}")]
    KeyLength(usize),

    #[error("invalid peer id '{0}'")]
    InvalidPeerId(String),

    #[error("peer id {configured} does not match key (derived {derived})")]
    PeerIdMismatch { configured: String, derived: String },
}

/// Peer identifier: the hex-encoded ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId([u8; 32]);

impl PeerId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn verifying_key(&self) -> Option<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).ok()
    }

    /// Verify `signature` over `message` against this peer's public key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        self.verifying_key()
            .map(|key| key.verify(message, &signature).is_ok())
            .unwrap_or(false)
    }
}

impl From<&VerifyingKey> for PeerId {
    fn from(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl FromStr for PeerId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| IdentityError::InvalidPeerId(s.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidPeerId(s.to_string()))?;
        if VerifyingKey::from_bytes(&bytes).is_err() {
            return Err(IdentityError::InvalidPeerId(s.to_string()));
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for PeerId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}

/// Decoded identity: signing key plus the peer id derived from it.
#[derive(Clone)]
pub struct Identity {
    key: SigningKey,
    peer_id: PeerId,
}

impl Identity {
    /// Decode identity material from config.
    ///
    /// A non-empty configured peer id must match the one derived from the key.
    pub fn decode(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let bytes = STANDARD.decode(config.priv_key.trim())?;
        let secret: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| IdentityError::KeyLength(bytes.len()))?;
        let identity = Self::from_secret(secret);

        let configured = config.peer_id.trim();
        if !configured.is_empty() && configured != identity.peer_id.to_string() {
            return Err(IdentityError::PeerIdMismatch {
                configured: configured.to_string(),
                derived: identity.peer_id.to_string(),
            });
        }
        Ok(identity)
    }

    fn from_secret(secret: [u8; 32]) -> Self {
        let key = SigningKey::from_bytes(&secret);
        let peer_id = PeerId::from(&key.verifying_key());
        Self { key, peer_id }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Sign `message`, returning the raw 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.key.sign(message).to_bytes().to_vec()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("peer_id", &self.peer_id)
            .finish_non_exhaustive()
    }
}

/// Generate fresh identity material for a new config.
pub fn generate() -> IdentityConfig {
    let identity = Identity::from_secret(rand::random::<[u8; 32]>());
    IdentityConfig {
        peer_id: identity.peer_id.to_string(),
        priv_key: STANDARD.encode(identity.key.to_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_identity_decodes() {
        let config = generate();
        let identity = Identity::decode(&config).unwrap();
        assert_eq!(identity.peer_id().to_string(), config.peer_id);
    }

    #[test]
    fn test_empty_peer_id_is_derived() {
        let mut config = generate();
        let expected = config.peer_id.clone();
        config.peer_id.clear();
        let identity = Identity::decode(&config).unwrap();
        assert_eq!(identity.peer_id().to_string(), expected);
    }

    #[test]
    fn test_rejects_bad_key_material() {
        let config = IdentityConfig {
            peer_id: String::new(),
            priv_key: "not base64!".to_string(),
        };
        assert!(matches!(
            Identity::decode(&config),
            Err(IdentityError::KeyEncoding(_))
        ));

        let config = IdentityConfig {
            peer_id: String::new(),
            priv_key: STANDARD.encode([1u8; 16]),
        };
        assert!(matches!(
            Identity::decode(&config),
            Err(IdentityError::KeyLength(16))
        ));
    }

    #[test]
    fn test_rejects_mismatched_peer_id() {
        let mut config = generate();
        config.peer_id = generate().peer_id;
        assert!(matches!(
            Identity::decode(&config),
            Err(IdentityError::PeerIdMismatch { .. })
        ));
    }

    #[test]
    fn test_sign_and_verify() {
        let identity = Identity::decode(&generate()).unwrap();
        let signature = identity.sign(b"head");
        assert!(identity.peer_id().verify(b"head", &signature));
        assert!(!identity.peer_id().verify(b"other", &signature));
    }

    #[test]
    fn test_peer_id_round_trips_through_string() {
        let identity = Identity::decode(&generate()).unwrap();
        let parsed: PeerId = identity.peer_id().to_string().parse().unwrap();
        assert_eq!(parsed, identity.peer_id());
        assert!("zz".parse::<PeerId>().is_err());
    }
}
