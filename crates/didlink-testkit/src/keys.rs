//! Key test helpers
//!
//! Deterministic Ed25519 keys for invitations, routing and peer DIDs.

use didlink_peer_did::{KeyType, PublicKey};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;

/// Key test fixture for consistent test key generation
#[derive(Debug, Clone)]
pub struct KeyTestFixture {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyTestFixture {
    /// Create a fixture whose secret key is `seed` repeated
    pub fn from_seed(seed: u8) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(&[seed; 32]))
    }

    /// Create a fixture from fresh OS randomness
    pub fn random() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Get the signing key
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Get the verifying key
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Public key in the codec representation
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_ed25519(&self.verifying_key)
    }

    /// `did:key` form of the public key
    pub fn did_key(&self) -> String {
        self.public_key().did_key()
    }

    /// Legacy base58 verkey
    pub fn verkey(&self) -> String {
        self.public_key().to_base58()
    }
}

/// Deterministic Ed25519 public key
pub fn test_public_key(seed: u8) -> PublicKey {
    KeyTestFixture::from_seed(seed).public_key()
}

/// Deterministic X25519 key-agreement key
pub fn test_agreement_key(seed: u8) -> PublicKey {
    PublicKey::from_bytes(KeyType::X25519, &[seed; 32]).unwrap()
}

/// Deterministic `did:key`
pub fn test_did_key(seed: u8) -> String {
    test_public_key(seed).did_key()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_are_deterministic() {
        assert_eq!(test_public_key(7), test_public_key(7));
        assert_ne!(test_public_key(7), test_public_key(8));
        assert!(test_did_key(7).starts_with("did:key:z6Mk"));
        assert!(test_agreement_key(7).did_key().starts_with("did:key:z6LS"));
    }

    #[test]
    fn test_random_keys_differ() {
        assert_ne!(
            KeyTestFixture::random().public_key(),
            KeyTestFixture::random().public_key()
        );
    }
}
