//! did:key public keys.
//!
//! Format: `did:key:z<base58btc(multicodec_prefix + public_key)>`
//!
//! - Multibase prefix: `z` (base58btc)
//! - Multicodec prefixes: `0xed01` (Ed25519), `0xec01` (X25519)
//!
//! The multibase string (without the `did:key:` prefix) is the key
//! *fingerprint*. It is the representation peer DIDs embed for key elements
//! and the one out-of-band invitations use inside `did:key` recipient keys.
//! Legacy connection invitations carry the raw key as a plain base58 "verkey".

use crate::{PeerDidError, Result};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Multibase prefix for base58btc.
pub const BASE58BTC_PREFIX: char = 'z';

/// Method prefix for did:key identifiers.
pub const DID_KEY_PREFIX: &str = "did:key:";

/// Length in bytes of every supported public key.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Public key algorithms that can appear in a did:key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyType {
    /// Ed25519 signing key
    Ed25519,
    /// X25519 key-agreement key
    X25519,
}

impl KeyType {
    /// Varint-encoded multicodec prefix for this key type.
    pub fn multicodec_prefix(&self) -> [u8; 2] {
        match self {
            KeyType::Ed25519 => [0xed, 0x01],
            KeyType::X25519 => [0xec, 0x01],
        }
    }

    /// Look up a key type from a multicodec prefix.
    pub fn from_multicodec_prefix(prefix: [u8; 2]) -> Option<Self> {
        match prefix {
            [0xed, 0x01] => Some(KeyType::Ed25519),
            [0xec, 0x01] => Some(KeyType::X25519),
            _ => None,
        }
    }

    /// Verification method type used when this key appears in a DID document.
    pub fn verification_method_type(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "Ed25519VerificationKey2020",
            KeyType::X25519 => "X25519KeyAgreementKey2020",
        }
    }
}

/// A public key with its algorithm.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey {
    key_type: KeyType,
    bytes: [u8; PUBLIC_KEY_LENGTH],
}

impl PublicKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            PeerDidError::invalid_key(format!(
                "public key must be {} bytes, got {}",
                PUBLIC_KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self { key_type, bytes })
    }

    /// Wrap an Ed25519 verifying key.
    pub fn from_ed25519(key: &VerifyingKey) -> Self {
        Self {
            key_type: KeyType::Ed25519,
            bytes: key.to_bytes(),
        }
    }

    /// Parse a base58 "verkey" (legacy representation, no multicodec).
    pub fn from_base58(key_type: KeyType, verkey: &str) -> Result<Self> {
        let bytes = bs58::decode(verkey)
            .into_vec()
            .map_err(|e| PeerDidError::invalid_key(format!("invalid base58: {e}")))?;
        Self::from_bytes(key_type, &bytes)
    }

    /// Parse a multibase fingerprint (`z6Mk...`).
    pub fn from_fingerprint(fingerprint: &str) -> Result<Self> {
        let encoded = fingerprint.strip_prefix(BASE58BTC_PREFIX).ok_or_else(|| {
            PeerDidError::invalid_key("must use base58btc multibase encoding (z prefix)")
        })?;

        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| PeerDidError::invalid_key(format!("invalid base58: {e}")))?;

        if bytes.len() != PUBLIC_KEY_LENGTH + 2 {
            return Err(PeerDidError::invalid_key(format!(
                "expected {} bytes (multicodec + key), got {}",
                PUBLIC_KEY_LENGTH + 2,
                bytes.len()
            )));
        }

        let prefix = [bytes[0], bytes[1]];
        let key_type = KeyType::from_multicodec_prefix(prefix).ok_or_else(|| {
            PeerDidError::invalid_key(format!(
                "unsupported multicodec prefix 0x{:02x}{:02x}",
                prefix[0], prefix[1]
            ))
        })?;

        Self::from_bytes(key_type, &bytes[2..])
    }

    /// Parse a `did:key` identifier. A trailing `#fragment` is ignored.
    pub fn from_did_key(did: &str) -> Result<Self> {
        let without_fragment = did.split('#').next().unwrap_or(did);
        let fingerprint = without_fragment
            .strip_prefix(DID_KEY_PREFIX)
            .ok_or_else(|| PeerDidError::invalid_key("must start with 'did:key:'"))?;
        Self::from_fingerprint(fingerprint)
    }

    /// Key algorithm.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.bytes
    }

    /// Multibase fingerprint (`z` + base58btc(multicodec + key)).
    pub fn fingerprint(&self) -> String {
        let mut bytes = Vec::with_capacity(PUBLIC_KEY_LENGTH + 2);
        bytes.extend_from_slice(&self.key_type.multicodec_prefix());
        bytes.extend_from_slice(&self.bytes);
        format!("{}{}", BASE58BTC_PREFIX, bs58::encode(&bytes).into_string())
    }

    /// `did:key:<fingerprint>`
    pub fn did_key(&self) -> String {
        format!("{}{}", DID_KEY_PREFIX, self.fingerprint())
    }

    /// `did:key:<fingerprint>#<fingerprint>`, the verification method id of the key.
    pub fn did_key_reference(&self) -> String {
        let fingerprint = self.fingerprint();
        format!("{DID_KEY_PREFIX}{fingerprint}#{fingerprint}")
    }

    /// Base58 "verkey" without multicodec prefix.
    pub fn to_base58(&self) -> String {
        bs58::encode(&self.bytes).into_string()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.fingerprint()).finish()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

impl FromStr for PublicKey {
    type Err = PeerDidError;

    fn from_str(s: &str) -> Result<Self> {
        if s.starts_with(DID_KEY_PREFIX) {
            Self::from_did_key(s)
        } else {
            Self::from_fingerprint(s)
        }
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.fingerprint())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    fn ed25519_key(seed: u8) -> PublicKey {
        PublicKey::from_ed25519(&SigningKey::from_bytes(&[seed; 32]).verifying_key())
    }

    #[test]
    fn test_ed25519_fingerprint_prefix() {
        let key = ed25519_key(7);
        assert!(key.fingerprint().starts_with("z6Mk"));
        assert!(key.did_key().starts_with("did:key:z6Mk"));
    }

    #[test]
    fn test_x25519_fingerprint_prefix() {
        let key = PublicKey::from_bytes(KeyType::X25519, &[3u8; 32]).unwrap();
        assert!(key.fingerprint().starts_with("z6LS"));
    }

    #[test]
    fn test_did_key_roundtrip_ignores_fragment() {
        let key = ed25519_key(1);
        assert_eq!(PublicKey::from_did_key(&key.did_key()).unwrap(), key);
        assert_eq!(
            PublicKey::from_did_key(&key.did_key_reference()).unwrap(),
            key
        );
    }

    #[test]
    fn test_base58_verkey_roundtrip() {
        let key = ed25519_key(9);
        let verkey = key.to_base58();
        assert_eq!(
            PublicKey::from_base58(KeyType::Ed25519, &verkey).unwrap(),
            key
        );
    }

    #[test]
    fn test_rejects_bad_multibase() {
        assert!(PublicKey::from_fingerprint("m6Mkabc").is_err());
        assert!(PublicKey::from_fingerprint("z0OIl").is_err());
        // Valid base58, wrong multicodec
        let bogus = format!("z{}", bs58::encode([0x12u8; 34]).into_string());
        assert!(PublicKey::from_fingerprint(&bogus).is_err());
    }

    #[test]
    fn test_serde_as_fingerprint() {
        let key = ed25519_key(4);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", key.fingerprint()));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
