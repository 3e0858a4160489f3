//! Inbound message dispatch
//!
//! Handlers declare the message types they accept; the registry routes an
//! inbound message to the first handler whose declared type is compatible
//! (same protocol family and major version, same message name).

use crate::effects::{ConnectionRecord, OutboundMessage};
use crate::error::{OutOfBandError, Result};
use crate::messages::AgentMessage;
use crate::protocol::{supports_message_type, ParsedMessageType, ParsedProtocolUri};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// An inbound message with the connection it arrived on
#[derive(Debug, Clone)]
pub struct InboundMessageContext {
    /// The decrypted plaintext message
    pub message: AgentMessage,
    /// Connection the message arrived on, if any
    pub connection: Option<ConnectionRecord>,
}

impl InboundMessageContext {
    /// Context for a message received on `connection`
    pub fn new(message: AgentMessage, connection: Option<ConnectionRecord>) -> Self {
        Self {
            message,
            connection,
        }
    }

    /// The connection, or an invalid-message error naming the message type
    pub fn require_connection(&self) -> Result<&ConnectionRecord> {
        self.connection.as_ref().ok_or_else(|| {
            OutOfBandError::invalid_message(format!(
                "{} requires a connection",
                self.message.message_type
            ))
        })
    }
}

/// Handler for one or more message types
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Message type URIs this handler accepts
    fn supported_message_types(&self) -> Vec<String>;

    /// Process a message, optionally producing a reply
    async fn handle(&self, context: InboundMessageContext) -> Result<Option<OutboundMessage>>;
}

/// Registry the engine consults for supported types and registers responders with
pub trait DispatchRegistry: Send + Sync {
    /// Every message type some registered handler accepts
    fn supported_message_types(&self) -> Vec<String>;

    /// The subset of `protocols` some registered handler implements, in input order
    fn filter_supported_protocols_by_message_families(&self, protocols: &[String]) -> Vec<String>;

    /// Register a handler
    fn register_handler(&self, handler: Arc<dyn MessageHandler>);
}

/// In-process handler registry
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<Vec<Arc<dyn MessageHandler>>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("message_types", &self.supported_message_types())
            .finish()
    }
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler for an inbound message type
    pub fn handler_for(&self, message_type: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers
            .read()
            .iter()
            .find(|handler| supports_message_type(&handler.supported_message_types(), message_type))
            .cloned()
    }

    /// Route an inbound message to its handler
    pub async fn dispatch(&self, context: InboundMessageContext) -> Result<Option<OutboundMessage>> {
        let message_type = context.message.message_type.clone();
        let handler = self.handler_for(&message_type).ok_or_else(|| {
            OutOfBandError::UnsupportedMessage {
                offered: vec![message_type.clone()],
            }
        })?;
        tracing::debug!(message_type = %message_type, message_id = %context.message.id, "Dispatching inbound message");
        handler.handle(context).await
    }
}

impl DispatchRegistry for HandlerRegistry {
    fn supported_message_types(&self) -> Vec<String> {
        self.handlers
            .read()
            .iter()
            .flat_map(|handler| handler.supported_message_types())
            .collect()
    }

    fn filter_supported_protocols_by_message_families(&self, protocols: &[String]) -> Vec<String> {
        let supported: Vec<ParsedProtocolUri> = self
            .supported_message_types()
            .iter()
            .filter_map(|t| ParsedMessageType::parse(t))
            .map(|t| t.protocol)
            .collect();

        protocols
            .iter()
            .filter(|uri| {
                ParsedProtocolUri::parse(uri)
                    .is_some_and(|p| supported.iter().any(|s| s.is_compatible_with(&p)))
            })
            .cloned()
            .collect()
    }

    fn register_handler(&self, handler: Arc<dyn MessageHandler>) {
        tracing::debug!(message_types = ?handler.supported_message_types(), "Registering message handler");
        self.handlers.write().push(handler);
    }
}

impl<T: DispatchRegistry + ?Sized> DispatchRegistry for Arc<T> {
    fn supported_message_types(&self) -> Vec<String> {
        (**self).supported_message_types()
    }

    fn filter_supported_protocols_by_message_families(&self, protocols: &[String]) -> Vec<String> {
        (**self).filter_supported_protocols_by_message_families(protocols)
    }

    fn register_handler(&self, handler: Arc<dyn MessageHandler>) {
        (**self).register_handler(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl MessageHandler for Echo {
        fn supported_message_types(&self) -> Vec<String> {
            vec!["https://didcomm.org/didexchange/1.1/request".to_string()]
        }

        async fn handle(&self, context: InboundMessageContext) -> Result<Option<OutboundMessage>> {
            let connection = context.require_connection()?;
            Ok(Some(OutboundMessage {
                connection_id: connection.id.clone(),
                message: context.message,
            }))
        }
    }

    #[test]
    fn test_filter_preserves_input_order() {
        let registry = HandlerRegistry::new();
        registry.register_handler(Arc::new(Echo));

        let filtered = registry.filter_supported_protocols_by_message_families(&[
            "https://didcomm.org/connections/1.0".to_string(),
            "https://didcomm.org/didexchange/1.0".to_string(),
            "https://didcomm.org/didexchange/2.0".to_string(),
        ]);
        assert_eq!(filtered, vec!["https://didcomm.org/didexchange/1.0".to_string()]);
    }

    #[tokio::test]
    async fn test_dispatch_routes_and_rejects() {
        let registry = HandlerRegistry::new();
        registry.register_handler(Arc::new(Echo));

        let request = AgentMessage::new("https://didcomm.org/didexchange/1.0/request");
        // Echo requires a connection
        let err = registry
            .dispatch(InboundMessageContext::new(request, None))
            .await
            .unwrap_err();
        assert!(matches!(err, OutOfBandError::InvalidMessage { .. }));

        let unknown = AgentMessage::new("https://didcomm.org/trust-ping/1.0/ping");
        let err = registry
            .dispatch(InboundMessageContext::new(unknown, None))
            .await
            .unwrap_err();
        assert!(matches!(err, OutOfBandError::UnsupportedMessage { .. }));
    }
}
