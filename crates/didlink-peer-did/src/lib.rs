//! Didlink Peer DID Codec
//!
//! This crate provides the identifier layer used to address parties before any
//! ledger or registry exists: `did:key` multibase keys and the `did:peer`
//! numeric algorithm 2 codec.
//!
//! # Architecture
//!
//! - `did_key` - Ed25519/X25519 public keys and their multibase fingerprints
//! - `numalgo2` - pure `encode`/`decode` between element lists and identifiers
//! - `document` - DID document resolution with relationship-specific fragments
//!
//! # Design Principles
//!
//! - Every function is pure; there is no I/O and no shared state
//! - Encoding is deterministic: `encode(decode(id)) == id` for canonical ids
//! - Decoding failures are reported as malformed identifiers, never panics

#![forbid(unsafe_code)]

pub mod did_key;
pub mod document;
pub mod error;
pub mod numalgo2;

pub use did_key::{KeyType, PublicKey};
pub use document::{DidCommService, PeerDidDocument, VerificationMethod};
pub use error::PeerDidError;
pub use numalgo2::{
    decode, encode, service_to_peer_did, Element, KeyPurpose, LegacyService, PeerDid,
    ServiceElement,
};

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, PeerDidError>;
