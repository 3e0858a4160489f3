//! Test agent fixture
//!
//! Wires an [`OutOfBandEngine`] to in-memory collaborators so two or more
//! agents can exchange invitations inside one test.

use crate::effects::{InMemoryConnections, RecordingOutbound, StaticRouting};
use crate::handlers::StubHandler;
use didlink_oob::{
    ConnectionRecord, DispatchRegistry, HandlerRegistry, HandshakeProtocol, InboundMessageContext,
    MemoryOutOfBandStore, OutOfBandCollaborators, OutOfBandConfig, OutOfBandEngine,
    OutboundMessage, ReceivedMessage, Result, Routing,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Builder for [`TestAgent`]
#[derive(Debug, Clone)]
pub struct TestAgentBuilder {
    label: String,
    seed: u8,
    handshake_protocols: Vec<HandshakeProtocol>,
    message_types: Vec<String>,
    completing: bool,
    config: Option<OutOfBandConfig>,
    routing: Option<Routing>,
}

impl TestAgentBuilder {
    /// Routing key seed
    pub fn seed(mut self, seed: u8) -> Self {
        self.seed = seed;
        self
    }

    /// Handshake protocols the agent registers handlers for
    pub fn handshake_protocols(mut self, protocols: Vec<HandshakeProtocol>) -> Self {
        self.handshake_protocols = protocols;
        self
    }

    /// Extra message types the agent handles
    pub fn message_types<I, S>(mut self, message_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.message_types = message_types.into_iter().map(Into::into).collect();
        self
    }

    /// Whether new handshakes complete immediately
    pub fn completing(mut self, completing: bool) -> Self {
        self.completing = completing;
        self
    }

    /// Agent configuration, the label is taken from the builder otherwise
    pub fn config(mut self, config: OutOfBandConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Routing handed out by the routing provider, derived from the seed otherwise
    pub fn routing(mut self, routing: Routing) -> Self {
        self.routing = Some(routing);
        self
    }

    /// Build the agent
    pub fn build(self) -> TestAgent {
        let registry = Arc::new(HandlerRegistry::new());
        for protocol in &self.handshake_protocols {
            let handler = match protocol {
                HandshakeProtocol::DidExchange => StubHandler::didexchange(),
                HandshakeProtocol::Connections => StubHandler::connections(),
            };
            registry.register_handler(Arc::new(handler));
        }
        let stub = Arc::new(StubHandler::new(self.message_types));
        registry.register_handler(stub.clone());

        let store = Arc::new(MemoryOutOfBandStore::new());
        let connections = Arc::new(if self.completing {
            InMemoryConnections::completing()
        } else {
            InMemoryConnections::new()
        });
        let outbound = Arc::new(RecordingOutbound::new());
        let routing = Arc::new(match self.routing {
            Some(routing) => StaticRouting::from_routing(routing),
            None => StaticRouting::new(self.seed),
        });
        let (sender, messages) = mpsc::unbounded_channel();

        let config = self.config.unwrap_or_else(|| OutOfBandConfig {
            label: self.label.clone(),
            ..OutOfBandConfig::default()
        });

        let engine = OutOfBandEngine::new(
            OutOfBandCollaborators {
                routing: routing.clone(),
                connections: connections.clone(),
                outbound: outbound.clone(),
                registry: registry.clone(),
                store: store.clone(),
                messages: sender,
            },
            config,
        )
        .expect("valid test agent configuration");

        TestAgent {
            label: self.label,
            engine,
            registry,
            store,
            connections,
            outbound,
            routing,
            handler: stub,
            messages,
        }
    }
}

/// An engine with in-memory collaborators
pub struct TestAgent {
    /// Agent label
    pub label: String,
    /// The engine under test
    pub engine: OutOfBandEngine,
    /// Handler registry, includes the handshake-reuse responders
    pub registry: Arc<HandlerRegistry>,
    /// Record store
    pub store: Arc<MemoryOutOfBandStore>,
    /// Connection collaborator
    pub connections: Arc<InMemoryConnections>,
    /// Outbound recorder
    pub outbound: Arc<RecordingOutbound>,
    /// Routing provider
    pub routing: Arc<StaticRouting>,
    /// Handler for the extra message types
    pub handler: Arc<StubHandler>,
    messages: mpsc::UnboundedReceiver<ReceivedMessage>,
}

impl std::fmt::Debug for TestAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestAgent")
            .field("label", &self.label)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl TestAgent {
    /// Agent supporting both handshake protocols and basic messages
    pub fn new(label: &str, seed: u8) -> Self {
        Self::builder(label).seed(seed).build()
    }

    /// Start building an agent
    pub fn builder(label: &str) -> TestAgentBuilder {
        TestAgentBuilder {
            label: label.to_string(),
            seed: 1,
            handshake_protocols: HandshakeProtocol::PREFERENCE_ORDER.to_vec(),
            message_types: vec![crate::handlers::BASIC_MESSAGE_TYPE.to_string()],
            completing: false,
            config: None,
            routing: None,
        }
    }

    /// Next released attached message
    pub async fn next_message(&mut self) -> ReceivedMessage {
        tokio::time::timeout(Duration::from_secs(5), self.messages.recv())
            .await
            .expect("timed out waiting for a released message")
            .expect("message channel closed")
    }

    /// Released message, if one is already queued
    pub fn try_next_message(&mut self) -> Option<ReceivedMessage> {
        self.messages.try_recv().ok()
    }

    /// Deliver a message sent by another agent over `connection`
    pub async fn deliver(
        &self,
        outbound: OutboundMessage,
        connection: ConnectionRecord,
    ) -> Result<Option<OutboundMessage>> {
        self.registry
            .dispatch(InboundMessageContext::new(outbound.message, Some(connection)))
            .await
    }
}
