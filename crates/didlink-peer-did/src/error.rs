//! Error types for did:key and peer DID handling.

use thiserror::Error;

/// Errors produced while encoding or decoding keys and peer DIDs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerDidError {
    /// A key could not be decoded from its multibase, base58 or raw form
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of the decoding failure
        message: String,
    },

    /// The identifier is not a well-formed peer DID
    #[error("Malformed peer DID '{did}': {reason}")]
    MalformedIdentifier {
        /// The identifier being decoded
        did: String,
        /// Why decoding failed
        reason: String,
    },

    /// The identifier uses a numeric algorithm this codec does not implement
    #[error("Unsupported peer DID numalgo '{numalgo}'")]
    UnsupportedNumalgo {
        /// The numalgo character found after `did:peer:`
        numalgo: char,
    },

    /// A service type collides with the wire abbreviation of another type
    #[error("Service type '{service_type}' is reserved as an abbreviation")]
    ReservedServiceType {
        /// The offending service type
        service_type: String,
    },

    /// Service JSON could not be produced
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message from the serializer
        message: String,
    },
}

impl PeerDidError {
    /// Create an invalid key error
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Create a malformed identifier error
    pub fn malformed(did: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            did: did.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error reports a malformed identifier
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedIdentifier { .. })
    }
}

impl From<serde_json::Error> for PeerDidError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}
