//! Collaborator interfaces consumed by the out-of-band engine
//!
//! # Effect Classification
//!
//! - **Routing**: obtains endpoints and keys for new invitations
//! - **Connections**: performs the actual handshake and tracks connection state
//! - **Outbound**: delivers messages over an established connection
//!
//! Implementations live outside this crate. `didlink-testkit` provides
//! in-memory versions for tests.

use crate::messages::AgentMessage;
use crate::protocol::HandshakeProtocol;
use crate::record::OutOfBandRecord;
use async_trait::async_trait;
use didlink_peer_did::PublicKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Collaborator failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EffectError {
    /// Routing could not be obtained
    #[error("Routing failed: {message}")]
    Routing {
        /// Reason for the failure
        message: String,
    },
    /// The connection collaborator rejected or failed an operation
    #[error("Connection operation failed: {message}")]
    Connection {
        /// Reason for the failure
        message: String,
    },
    /// An outbound message could not be delivered
    #[error("Delivery failed: {message}")]
    Delivery {
        /// Reason for the failure
        message: String,
    },
}

impl EffectError {
    /// Create a routing error
    pub fn routing(message: impl Into<String>) -> Self {
        Self::Routing {
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a delivery error
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }
}

/// Outcome of waiting for a connection that did not become ready
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// The wait was cancelled before the connection became ready
    #[error("Wait for connection {connection_id} was cancelled")]
    Cancelled {
        /// Connection being waited on
        connection_id: String,
    },
    /// The connection failed or could not be observed
    #[error("Wait for connection {connection_id} failed: {message}")]
    Failed {
        /// Connection being waited on
        connection_id: String,
        /// Reason for the failure
        message: String,
    },
}

// ============================================================================
// Routing
// ============================================================================

/// Constraints on the routing returned for a new invitation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingConstraints {
    /// Mediator to route through, `None` for the default
    pub mediator_id: Option<String>,
    /// Whether the default mediator may be used when none is named
    pub use_default_mediator: bool,
}

/// Endpoints and keys a party can be reached at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routing {
    /// Routing DID, when the routing is backed by one
    pub did: Option<String>,
    /// Key messages are encrypted for
    pub recipient_key: PublicKey,
    /// Mediator keys, outermost last
    pub routing_keys: Vec<PublicKey>,
    /// Endpoint URIs
    pub endpoints: Vec<String>,
    /// Mediator providing this routing
    pub mediator_id: Option<String>,
}

/// Routing provider
#[async_trait]
pub trait RoutingEffects: Send + Sync {
    /// Obtain routing for a new invitation
    async fn get_routing(&self, constraints: RoutingConstraints) -> Result<Routing, EffectError>;
}

#[async_trait]
impl<T: RoutingEffects + ?Sized> RoutingEffects for Arc<T> {
    async fn get_routing(&self, constraints: RoutingConstraints) -> Result<Routing, EffectError> {
        (**self).get_routing(constraints).await
    }
}

// ============================================================================
// Connections
// ============================================================================

/// DID exchange connection states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    /// Nothing exchanged yet
    Start,
    /// Invitation sent
    InvitationSent,
    /// Invitation received
    InvitationReceived,
    /// Request sent
    RequestSent,
    /// Request received
    RequestReceived,
    /// Response sent
    ResponseSent,
    /// Response received
    ResponseReceived,
    /// Handshake finished
    Completed,
    /// Handshake given up
    Abandoned,
}

impl ConnectionState {
    /// Whether messages can be sent on a connection in this state
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Completed | ConnectionState::ResponseSent)
    }
}

/// A connection as tracked by the connection collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Connection identifier
    pub id: String,
    /// Handshake state
    pub state: ConnectionState,
    /// Thread of the handshake exchange
    pub thread_id: Option<String>,
    /// Identifier derived from the invitation service the connection was made with
    pub invitation_did: Option<String>,
    /// Out-of-band record the connection was created from
    pub out_of_band_id: Option<String>,
    /// Handshake protocol used
    pub protocol: Option<HandshakeProtocol>,
    /// Label of the other party
    pub their_label: Option<String>,
    /// Local alias
    pub alias: Option<String>,
}

impl ConnectionRecord {
    /// Whether messages can be sent on this connection
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }
}

/// Options for starting a handshake from a received invitation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptOutOfBandParams {
    /// Label presented to the inviter
    pub label: Option<String>,
    /// Local alias for the connection
    pub alias: Option<String>,
    /// Image presented to the inviter
    pub image_url: Option<String>,
    /// Whether the handshake proceeds without manual steps
    pub auto_accept_connection: bool,
    /// Negotiated handshake protocol
    pub protocol: HandshakeProtocol,
    /// Routing to use for the new connection
    pub routing: Option<Routing>,
}

/// Connection-establishment collaborator
#[async_trait]
pub trait ConnectionEffects: Send + Sync {
    /// Start the handshake for a received invitation
    async fn accept_out_of_band_invitation(
        &self,
        record: &OutOfBandRecord,
        params: AcceptOutOfBandParams,
    ) -> Result<ConnectionRecord, EffectError>;

    /// Connections created from an invitation service with this identifier
    async fn find_by_invitation_did(&self, did: &str) -> Result<Vec<ConnectionRecord>, EffectError>;

    /// Resolve once the connection is ready to carry messages
    async fn return_when_is_connected(&self, connection_id: &str)
        -> Result<ConnectionRecord, WaitError>;
}

#[async_trait]
impl<T: ConnectionEffects + ?Sized> ConnectionEffects for Arc<T> {
    async fn accept_out_of_band_invitation(
        &self,
        record: &OutOfBandRecord,
        params: AcceptOutOfBandParams,
    ) -> Result<ConnectionRecord, EffectError> {
        (**self).accept_out_of_band_invitation(record, params).await
    }

    async fn find_by_invitation_did(&self, did: &str) -> Result<Vec<ConnectionRecord>, EffectError> {
        (**self).find_by_invitation_did(did).await
    }

    async fn return_when_is_connected(
        &self,
        connection_id: &str,
    ) -> Result<ConnectionRecord, WaitError> {
        (**self).return_when_is_connected(connection_id).await
    }
}

// ============================================================================
// Outbound delivery
// ============================================================================

/// A message addressed to an existing connection
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Connection to deliver on
    pub connection_id: String,
    /// Plaintext message
    pub message: AgentMessage,
}

/// Outbound delivery collaborator
#[async_trait]
pub trait OutboundEffects: Send + Sync {
    /// Pack and deliver a message
    async fn send_message(&self, outbound: OutboundMessage) -> Result<(), EffectError>;
}

#[async_trait]
impl<T: OutboundEffects + ?Sized> OutboundEffects for Arc<T> {
    async fn send_message(&self, outbound: OutboundMessage) -> Result<(), EffectError> {
        (**self).send_message(outbound).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_states() {
        assert!(ConnectionState::Completed.is_ready());
        assert!(ConnectionState::ResponseSent.is_ready());
        assert!(!ConnectionState::RequestSent.is_ready());
        assert!(!ConnectionState::Abandoned.is_ready());
    }

    #[test]
    fn test_wait_errors_are_distinct() {
        let cancelled = WaitError::Cancelled {
            connection_id: "c1".to_string(),
        };
        let failed = WaitError::Failed {
            connection_id: "c1".to_string(),
            message: "abandoned".to_string(),
        };
        assert_ne!(cancelled, failed);
        assert!(cancelled.to_string().contains("cancelled"));
    }
}
