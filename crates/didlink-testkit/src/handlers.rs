//! Stub message handlers
//!
//! Registering a stub for a protocol's message types is how a test agent
//! declares support for that protocol.

use async_trait::async_trait;
use didlink_oob::{
    AgentMessage, InboundMessageContext, MessageHandler, OutboundMessage, Result,
};
use parking_lot::Mutex;

/// DID Exchange 1.1 request
pub const DIDEXCHANGE_REQUEST_TYPE: &str = "https://didcomm.org/didexchange/1.1/request";
/// Connections 1.0 request
pub const CONNECTIONS_REQUEST_TYPE: &str = "https://didcomm.org/connections/1.0/request";
/// Basic message 1.0
pub const BASIC_MESSAGE_TYPE: &str = "https://didcomm.org/basicmessage/1.0/message";

/// Handler that accepts a fixed set of message types and records them
#[derive(Debug)]
pub struct StubHandler {
    message_types: Vec<String>,
    handled: Mutex<Vec<AgentMessage>>,
}

impl StubHandler {
    /// Handle exactly `message_types`
    pub fn new<I, S>(message_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            message_types: message_types.into_iter().map(Into::into).collect(),
            handled: Mutex::new(Vec::new()),
        }
    }

    /// DID Exchange 1.1 support
    pub fn didexchange() -> Self {
        Self::new([DIDEXCHANGE_REQUEST_TYPE])
    }

    /// Connections 1.0 support
    pub fn connections() -> Self {
        Self::new([CONNECTIONS_REQUEST_TYPE])
    }

    /// Basic message support
    pub fn basic_message() -> Self {
        Self::new([BASIC_MESSAGE_TYPE])
    }

    /// Messages handled so far
    pub fn handled(&self) -> Vec<AgentMessage> {
        self.handled.lock().clone()
    }
}

#[async_trait]
impl MessageHandler for StubHandler {
    fn supported_message_types(&self) -> Vec<String> {
        self.message_types.clone()
    }

    async fn handle(&self, context: InboundMessageContext) -> Result<Option<OutboundMessage>> {
        self.handled.lock().push(context.message);
        Ok(None)
    }
}

/// Basic message carrying `content`
pub fn basic_message(content: &str) -> AgentMessage {
    AgentMessage::new(BASIC_MESSAGE_TYPE).with_field("content", content)
}
