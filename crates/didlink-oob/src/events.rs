//! Engine output channels
//!
//! Two channels leave the engine:
//! - lifecycle events (`OutOfBandEvent`) on a broadcast channel any number of
//!   observers can subscribe to
//! - attached messages released for processing (`ReceivedMessage`) on the
//!   messaging pipeline, a single-consumer channel owned by the agent

use crate::messages::AgentMessage;
use crate::record::{OutOfBandRecord, OutOfBandState};
use tokio::sync::{broadcast, mpsc};

/// Lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum OutOfBandEvent {
    /// A record was created or changed state
    StateChanged {
        /// Record after the change
        record: OutOfBandRecord,
        /// State before the change, `None` on creation
        previous_state: Option<OutOfBandState>,
    },
    /// An existing connection was reused for an invitation
    HandshakeReused {
        /// Record of the reused invitation
        record: OutOfBandRecord,
        /// Thread of the handshake-reuse exchange
        reuse_thread_id: String,
        /// Connection being reused
        connection_id: String,
    },
}

/// An attached message released to the messaging pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    /// The plaintext message
    pub message: AgentMessage,
    /// Connection the message is associated with, if any
    pub connection_id: Option<String>,
}

/// Sending halves of the engine's output channels
#[derive(Debug, Clone)]
pub struct EventBus {
    events: broadcast::Sender<OutOfBandEvent>,
    messages: mpsc::UnboundedSender<ReceivedMessage>,
}

impl EventBus {
    /// Create a bus publishing messages to `messages`
    pub fn new(capacity: usize, messages: mpsc::UnboundedSender<ReceivedMessage>) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self { events, messages }
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<OutOfBandEvent> {
        self.events.subscribe()
    }

    /// Publish a lifecycle event
    pub fn emit(&self, event: OutOfBandEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    /// Publish a state change
    pub fn state_changed(&self, record: &OutOfBandRecord, previous_state: Option<OutOfBandState>) {
        self.emit(OutOfBandEvent::StateChanged {
            record: record.clone(),
            previous_state,
        });
    }

    /// Release a message to the messaging pipeline
    pub fn deliver(&self, message: AgentMessage, connection_id: Option<String>) {
        let message_id = message.id.clone();
        if self
            .messages
            .send(ReceivedMessage {
                message,
                connection_id,
            })
            .is_err()
        {
            tracing::warn!(message_id = %message_id, "Messaging pipeline closed, dropping message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invitation::OutOfBandInvitation;
    use crate::record::OutOfBandRole;

    #[tokio::test]
    async fn test_state_changed_reaches_subscribers() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let bus = EventBus::new(4, tx);
        let mut events = bus.subscribe();

        let record = OutOfBandRecord::new(
            OutOfBandRole::Sender,
            OutOfBandState::AwaitResponse,
            OutOfBandInvitation::new(None),
        );
        bus.state_changed(&record, None);

        match events.recv().await.unwrap() {
            OutOfBandEvent::StateChanged {
                record: received,
                previous_state,
            } => {
                assert_eq!(received.id, record.id);
                assert_eq!(previous_state, None);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deliver_after_close_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = EventBus::new(4, tx);
        drop(rx);
        bus.deliver(AgentMessage::new("https://didcomm.org/basicmessage/1.0/message"), None);
    }
}
