//! Handshake-reuse responders
//!
//! A receiver that already holds a connection to the inviter answers a new
//! invitation with `handshake-reuse` on that connection instead of starting a
//! handshake. The inviter acknowledges with `handshake-reuse-accepted`. Both
//! messages name the invitation as parent thread.

use crate::effects::OutboundMessage;
use crate::error::{OutOfBandError, Result};
use crate::events::{EventBus, OutOfBandEvent};
use crate::messages::{handshake_reuse_accepted, HANDSHAKE_REUSE_ACCEPTED_TYPE, HANDSHAKE_REUSE_TYPE};
use crate::record::{OutOfBandRecord, OutOfBandRole, OutOfBandState};
use crate::registry::{InboundMessageContext, MessageHandler};
use crate::store::OutOfBandRepository;
use async_trait::async_trait;
use std::sync::Arc;

fn invitation_id(context: &InboundMessageContext) -> Result<String> {
    context
        .message
        .parent_thread_id()
        .map(str::to_string)
        .ok_or_else(|| {
            OutOfBandError::invalid_message(format!(
                "{} is missing ~thread.pthid",
                context.message.message_type
            ))
        })
}

async fn find_record(
    store: &dyn OutOfBandRepository,
    invitation_id: &str,
    role: OutOfBandRole,
) -> Result<OutOfBandRecord> {
    store
        .find_by_invitation_id(invitation_id, role)
        .await?
        .ok_or_else(|| {
            OutOfBandError::not_found(format!(
                "{role} out-of-band record for invitation {invitation_id}"
            ))
        })
}

/// Inviter side: acknowledges reuse of an existing connection
pub struct HandshakeReuseHandler {
    store: Arc<dyn OutOfBandRepository>,
    events: EventBus,
}

impl HandshakeReuseHandler {
    /// Create the responder
    pub fn new(store: Arc<dyn OutOfBandRepository>, events: EventBus) -> Self {
        Self { store, events }
    }
}

#[async_trait]
impl MessageHandler for HandshakeReuseHandler {
    fn supported_message_types(&self) -> Vec<String> {
        vec![HANDSHAKE_REUSE_TYPE.to_string()]
    }

    async fn handle(&self, context: InboundMessageContext) -> Result<Option<OutboundMessage>> {
        let connection = context.require_connection()?;
        let invitation_id = invitation_id(&context)?;

        let mut record =
            find_record(&*self.store, &invitation_id, OutOfBandRole::Sender).await?;
        record.assert_state(OutOfBandState::AwaitResponse)?;

        let reuse_thread_id = context.message.thread_id().to_string();
        self.events.emit(OutOfBandEvent::HandshakeReused {
            record: record.clone(),
            reuse_thread_id: reuse_thread_id.clone(),
            connection_id: connection.id.clone(),
        });

        // Multi-use invitations stay open for further receivers
        if !record.reusable {
            let previous = record.transition(OutOfBandState::Done)?;
            self.store.update(&record).await?;
            self.events.state_changed(&record, Some(previous));
        }

        tracing::info!(
            record_id = %record.id,
            connection_id = %connection.id,
            reuse_thread_id = %reuse_thread_id,
            "Accepted handshake reuse"
        );

        Ok(Some(OutboundMessage {
            connection_id: connection.id.clone(),
            message: handshake_reuse_accepted(&reuse_thread_id, &invitation_id),
        }))
    }
}

/// Invitee side: completes a pending reuse once the inviter acknowledges it
pub struct HandshakeReuseAcceptedHandler {
    store: Arc<dyn OutOfBandRepository>,
    events: EventBus,
}

impl HandshakeReuseAcceptedHandler {
    /// Create the responder
    pub fn new(store: Arc<dyn OutOfBandRepository>, events: EventBus) -> Self {
        Self { store, events }
    }
}

#[async_trait]
impl MessageHandler for HandshakeReuseAcceptedHandler {
    fn supported_message_types(&self) -> Vec<String> {
        vec![HANDSHAKE_REUSE_ACCEPTED_TYPE.to_string()]
    }

    async fn handle(&self, context: InboundMessageContext) -> Result<Option<OutboundMessage>> {
        let connection = context.require_connection()?;
        let invitation_id = invitation_id(&context)?;

        let mut record =
            find_record(&*self.store, &invitation_id, OutOfBandRole::Receiver).await?;
        record.assert_state(OutOfBandState::PrepareResponse)?;

        if record.reuse_connection_id.as_deref() != Some(connection.id.as_str()) {
            return Err(OutOfBandError::invalid_message(format!(
                "handshake-reuse-accepted arrived on connection {} but reuse was sent on {:?}",
                connection.id, record.reuse_connection_id
            )));
        }

        self.events.emit(OutOfBandEvent::HandshakeReused {
            record: record.clone(),
            reuse_thread_id: context.message.thread_id().to_string(),
            connection_id: connection.id.clone(),
        });

        let previous = record.transition(OutOfBandState::Done)?;
        self.store.update(&record).await?;
        self.events.state_changed(&record, Some(previous));

        tracing::info!(
            record_id = %record.id,
            connection_id = %connection.id,
            "Handshake reuse acknowledged"
        );
        Ok(None)
    }
}
