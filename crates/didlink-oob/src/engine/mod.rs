//! Out-of-band protocol engine
//!
//! # Architecture
//!
//! The engine is built from an explicit [`OutOfBandCollaborators`] value and
//! owns no global state. It drives record state and delegates everything else:
//! - `create` - invitation creation and protocol selection by agent preference
//! - `receive` - URL parsing and invitation receipt
//! - `accept` - connection reuse lookup and handshake negotiation
//! - `dispatch` - release of attached messages, immediate or deferred
//!
//! Deferred dispatches are the only work that outlives a call; their task
//! handles are tracked so [`OutOfBandEngine::shutdown`] can abort them.

mod accept;
mod create;
mod dispatch;
mod receive;

pub use dispatch::PendingDispatches;

use crate::config::OutOfBandConfig;
use crate::effects::{ConnectionEffects, ConnectionRecord, OutboundEffects, Routing, RoutingEffects};
use crate::error::Result;
use crate::events::{EventBus, OutOfBandEvent, ReceivedMessage};
use crate::messages::AgentMessage;
use crate::protocol::HandshakeProtocol;
use crate::record::OutOfBandRecord;
use crate::registry::DispatchRegistry;
use crate::reuse::{HandshakeReuseAcceptedHandler, HandshakeReuseHandler};
use crate::store::OutOfBandRepository;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Everything the engine depends on
#[derive(Clone)]
pub struct OutOfBandCollaborators {
    /// Routing provider for new invitations
    pub routing: Arc<dyn RoutingEffects>,
    /// Connection-establishment collaborator
    pub connections: Arc<dyn ConnectionEffects>,
    /// Outbound delivery
    pub outbound: Arc<dyn OutboundEffects>,
    /// Message type registry
    pub registry: Arc<dyn DispatchRegistry>,
    /// Record persistence
    pub store: Arc<dyn OutOfBandRepository>,
    /// Messaging pipeline receiving released attached messages
    pub messages: mpsc::UnboundedSender<ReceivedMessage>,
}

/// Options for creating an invitation
#[derive(Debug, Clone)]
pub struct CreateInvitationConfig {
    /// Label, defaults to the agent label
    pub label: Option<String>,
    /// Image, defaults to the agent image
    pub image_url: Option<String>,
    /// Goal code
    pub goal_code: Option<String>,
    /// Free-text goal
    pub goal: Option<String>,
    /// Whether a handshake is offered
    pub handshake: bool,
    /// Explicit handshake protocols, in preference order
    pub handshake_protocols: Option<Vec<HandshakeProtocol>>,
    /// Messages to attach
    pub messages: Vec<AgentMessage>,
    /// Whether the invitation can be used more than once
    pub multi_use_invitation: bool,
    /// Whether resulting connections are accepted automatically
    pub auto_accept_connection: Option<bool>,
    /// Routing override, otherwise obtained from the routing collaborator
    pub routing: Option<Routing>,
    /// Accept profiles, defaults to the agent configuration
    pub accept: Option<Vec<String>>,
}

impl Default for CreateInvitationConfig {
    fn default() -> Self {
        Self {
            label: None,
            image_url: None,
            goal_code: None,
            goal: None,
            handshake: true,
            handshake_protocols: None,
            messages: Vec::new(),
            multi_use_invitation: false,
            auto_accept_connection: None,
            routing: None,
            accept: None,
        }
    }
}

/// Options for receiving an invitation
#[derive(Debug, Clone, Default)]
pub struct ReceiveInvitationConfig {
    /// Label presented to the inviter
    pub label: Option<String>,
    /// Local alias for the connection
    pub alias: Option<String>,
    /// Image presented to the inviter
    pub image_url: Option<String>,
    /// Whether to accept immediately, defaults to `true`
    pub auto_accept_invitation: Option<bool>,
    /// Whether the handshake proceeds automatically, defaults to the agent configuration
    pub auto_accept_connection: Option<bool>,
    /// Whether an existing connection to the inviter may be reused
    pub reuse_connection: bool,
    /// Routing for a new connection
    pub routing: Option<Routing>,
}

/// Options for accepting a received invitation
#[derive(Debug, Clone, Default)]
pub struct AcceptInvitationConfig {
    /// Label presented to the inviter
    pub label: Option<String>,
    /// Local alias for the connection
    pub alias: Option<String>,
    /// Image presented to the inviter
    pub image_url: Option<String>,
    /// Whether the handshake proceeds automatically, defaults to the record setting
    pub auto_accept_connection: Option<bool>,
    /// Whether an existing connection to the inviter may be reused
    pub reuse_connection: bool,
    /// Routing for a new connection
    pub routing: Option<Routing>,
}

impl From<ReceiveInvitationConfig> for AcceptInvitationConfig {
    fn from(config: ReceiveInvitationConfig) -> Self {
        Self {
            label: config.label,
            alias: config.alias,
            image_url: config.image_url,
            auto_accept_connection: config.auto_accept_connection,
            reuse_connection: config.reuse_connection,
            routing: config.routing,
        }
    }
}

/// Result of receiving or accepting an invitation
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedInvitation {
    /// The receiver record
    pub record: OutOfBandRecord,
    /// Connection created or reused, if any
    pub connection: Option<ConnectionRecord>,
}

/// Out-of-band invitation and connection protocol engine
#[derive(Clone)]
pub struct OutOfBandEngine {
    config: OutOfBandConfig,
    routing: Arc<dyn RoutingEffects>,
    connections: Arc<dyn ConnectionEffects>,
    outbound: Arc<dyn OutboundEffects>,
    registry: Arc<dyn DispatchRegistry>,
    store: Arc<dyn OutOfBandRepository>,
    events: EventBus,
    pending: PendingDispatches,
}

impl OutOfBandEngine {
    /// Build an engine and register the handshake-reuse responders
    pub fn new(collaborators: OutOfBandCollaborators, config: OutOfBandConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_capacity, collaborators.messages);

        collaborators
            .registry
            .register_handler(Arc::new(HandshakeReuseHandler::new(
                collaborators.store.clone(),
                events.clone(),
            )));
        collaborators
            .registry
            .register_handler(Arc::new(HandshakeReuseAcceptedHandler::new(
                collaborators.store.clone(),
                events.clone(),
            )));

        tracing::info!(label = %config.label, "Out-of-band engine initialized");

        Ok(Self {
            config,
            routing: collaborators.routing,
            connections: collaborators.connections,
            outbound: collaborators.outbound,
            registry: collaborators.registry,
            store: collaborators.store,
            events,
            pending: PendingDispatches::default(),
        })
    }

    /// Agent configuration
    pub fn config(&self) -> &OutOfBandConfig {
        &self.config
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<OutOfBandEvent> {
        self.events.subscribe()
    }

    /// Deferred dispatches still waiting for their connection
    pub fn pending_dispatches(&self) -> usize {
        self.pending.len()
    }

    /// Abort every deferred dispatch
    pub fn shutdown(&self) {
        let aborted = self.pending.abort_all();
        tracing::info!(aborted, "Out-of-band engine shut down");
    }

    /// Handshake protocols the registry supports, in this agent's preference order
    pub fn supported_handshake_protocols(&self) -> Vec<HandshakeProtocol> {
        let preferred: Vec<String> = HandshakeProtocol::PREFERENCE_ORDER
            .iter()
            .map(|protocol| protocol.uri().to_string())
            .collect();
        self.registry
            .filter_supported_protocols_by_message_families(&preferred)
            .iter()
            .filter_map(|uri| HandshakeProtocol::from_uri(uri))
            .collect()
    }

    // ========================================================================
    // Record lookups
    // ========================================================================

    /// Record by id
    pub async fn get_by_id(&self, record_id: &str) -> Result<OutOfBandRecord> {
        self.store.get_by_id(record_id).await
    }

    /// Record whose invitation services carry `recipient_key` (`did:key`)
    pub async fn find_by_recipient_key(&self, recipient_key: &str) -> Result<Option<OutOfBandRecord>> {
        self.store.find_by_recipient_key(recipient_key).await
    }

    /// Record whose invitation attaches a message with `message_id`
    pub async fn find_by_message_id(&self, message_id: &str) -> Result<Option<OutOfBandRecord>> {
        self.store.find_by_message_id(message_id).await
    }

    /// Every record
    pub async fn get_all(&self) -> Result<Vec<OutOfBandRecord>> {
        self.store.get_all().await
    }

    /// Remove a record
    pub async fn delete_by_id(&self, record_id: &str) -> Result<()> {
        self.store.delete_by_id(record_id).await
    }

    /// Invitation link for a record under the configured domain
    pub fn invitation_url(&self, record: &OutOfBandRecord) -> Result<String> {
        record
            .out_of_band_invitation
            .to_url(&self.config.invitation_domain)
    }
}

impl std::fmt::Debug for OutOfBandEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutOfBandEngine")
            .field("config", &self.config)
            .field("pending_dispatches", &self.pending.len())
            .finish_non_exhaustive()
    }
}
