//! Error types for out-of-band operations

use crate::effects::EffectError;
use crate::record::{OutOfBandRole, OutOfBandState};
use didlink_peer_did::PeerDidError;
use thiserror::Error;

/// Errors surfaced by the out-of-band engine and its supporting types
#[derive(Debug, Clone, Error)]
pub enum OutOfBandError {
    /// Caller configuration cannot produce a usable invitation
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is wrong with the configuration
        message: String,
    },

    /// Requested handshake protocols are not supported by this agent
    #[error("Handshake protocols {requested:?} are not supported, supported: {supported:?}")]
    UnsupportedProtocol {
        /// Protocols the caller or invitation asked for
        requested: Vec<String>,
        /// Protocols this agent supports
        supported: Vec<String>,
    },

    /// Invitation or invitation URL is missing required data or is ambiguous
    #[error("Invalid invitation: {message}")]
    InvalidInvitation {
        /// Why the invitation was rejected
        message: String,
    },

    /// None of the attached messages has a type this agent handles
    #[error("No attached message has a supported type, offered: {offered:?}")]
    UnsupportedMessage {
        /// Message types carried by the invitation
        offered: Vec<String>,
    },

    /// Serviceless dispatch found no services on the invitation
    #[error("Invitation has no services to deliver attached messages to")]
    NoServices,

    /// Serviceless dispatch found a DID reference where an inline service is required
    #[error("Unsupported service type: {message}")]
    UnsupportedServiceType {
        /// Description of the offending service
        message: String,
    },

    /// Record lookup failed
    #[error("Not found: {message}")]
    NotFound {
        /// What was looked up
        message: String,
    },

    /// Record is not in a state that permits the operation
    #[error("Record {record_id} is in state {actual}, expected {expected}")]
    InvalidState {
        /// Record identifier
        record_id: String,
        /// State the operation requires
        expected: OutOfBandState,
        /// State the record is in
        actual: OutOfBandState,
    },

    /// Record has the wrong role for the operation
    #[error("Record {record_id} has role {actual}, expected {expected}")]
    InvalidRole {
        /// Record identifier
        record_id: String,
        /// Role the operation requires
        expected: OutOfBandRole,
        /// Role the record has
        actual: OutOfBandRole,
    },

    /// The invitation was already received or created by this agent
    #[error("Invitation {invitation_id} was already {reason}")]
    AlreadyReceived {
        /// Invitation identifier
        invitation_id: String,
        /// `received` or `created by this agent`
        reason: String,
    },

    /// Inbound protocol message is missing required data
    #[error("Invalid message: {message}")]
    InvalidMessage {
        /// What is wrong with the message
        message: String,
    },

    /// Peer DID or did:key codec failure
    #[error("Peer DID error: {0}")]
    PeerDid(#[from] PeerDidError),

    /// JSON, TOML or base64 (de)serialization failure
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message from the serializer
        message: String,
    },

    /// Record store failure
    #[error("Storage error: {message}")]
    Storage {
        /// Error message from the store
        message: String,
    },

    /// A collaborator (routing, connections, outbound) failed
    #[error("Collaborator error: {0}")]
    Effect(#[from] EffectError),
}

impl OutOfBandError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid invitation error
    pub fn invalid_invitation(message: impl Into<String>) -> Self {
        Self::InvalidInvitation {
            message: message.into(),
        }
    }

    /// Create an unsupported service type error
    pub fn unsupported_service_type(message: impl Into<String>) -> Self {
        Self::UnsupportedServiceType {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an invalid message error
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Whether this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for OutOfBandError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for OutOfBandError {
    fn from(err: base64::DecodeError) -> Self {
        Self::serialization(format!("invalid base64: {err}"))
    }
}

/// Result type for out-of-band operations
pub type Result<T> = std::result::Result<T, OutOfBandError>;
