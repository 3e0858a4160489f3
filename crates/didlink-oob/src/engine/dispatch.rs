//! Release of attached request messages

use super::OutOfBandEngine;
use crate::effects::{ConnectionRecord, WaitError};
use crate::error::{OutOfBandError, Result};
use crate::invitation::{OutOfBandInvitation, OutOfBandService};
use crate::legacy::service_decorator;
use crate::messages::AgentMessage;
use crate::protocol::supports_message_type;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Task handles of deferred dispatches
#[derive(Debug, Clone, Default)]
pub struct PendingDispatches {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl PendingDispatches {
    fn track(&self, handle: JoinHandle<()>) {
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Dispatches not yet finished
    pub fn len(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Whether no dispatch is pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abort every pending dispatch, returning how many were still running
    pub fn abort_all(&self) -> usize {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        let mut aborted = 0;
        for handle in handles {
            if !handle.is_finished() {
                aborted += 1;
            }
            handle.abort();
        }
        aborted
    }
}

impl OutOfBandEngine {
    /// First attached message whose type a registered handler accepts
    pub(super) fn select_supported_message(&self, messages: &[AgentMessage]) -> Result<AgentMessage> {
        let supported = self.registry.supported_message_types();
        messages
            .iter()
            .find(|message| supports_message_type(&supported, &message.message_type))
            .cloned()
            .ok_or_else(|| OutOfBandError::UnsupportedMessage {
                offered: messages.iter().map(|m| m.message_type.clone()).collect(),
            })
    }

    /// Release an attached message on `connection`, now or once it is ready
    pub(super) fn dispatch_with_connection(
        &self,
        messages: &[AgentMessage],
        connection: &ConnectionRecord,
    ) -> Result<()> {
        let message = self.select_supported_message(messages)?;

        if connection.is_ready() {
            tracing::debug!(
                connection_id = %connection.id,
                message_id = %message.id,
                "Connection ready, releasing attached message"
            );
            self.events.deliver(message, Some(connection.id.clone()));
            return Ok(());
        }

        let connections = self.connections.clone();
        let events = self.events.clone();
        let connection_id = connection.id.clone();

        tracing::debug!(
            connection_id = %connection_id,
            message_id = %message.id,
            "Deferring attached message until the connection is ready"
        );

        let handle = tokio::spawn(async move {
            match connections.return_when_is_connected(&connection_id).await {
                Ok(connection) => events.deliver(message, Some(connection.id)),
                Err(WaitError::Cancelled { connection_id }) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        message_id = %message.id,
                        "Wait for connection was cancelled, attached message not released"
                    );
                }
                Err(err @ WaitError::Failed { .. }) => {
                    tracing::error!(
                        error = %err,
                        message_id = %message.id,
                        "Waiting for connection failed, attached message not released"
                    );
                }
            }
        });
        self.pending.track(handle);

        Ok(())
    }

    /// Release an attached message without a connection.
    ///
    /// The first invitation service is copied onto the message as a `~service`
    /// decorator so peers that only understand connectionless messages can reply.
    pub(super) fn dispatch_without_connection(
        &self,
        invitation: &OutOfBandInvitation,
        messages: &[AgentMessage],
    ) -> Result<()> {
        let Some(service) = invitation.services.first() else {
            return Err(OutOfBandError::NoServices);
        };

        let mut message = self.select_supported_message(messages)?;

        let inline = match service {
            OutOfBandService::Inline(inline) => inline,
            OutOfBandService::Did(did) => {
                return Err(OutOfBandError::unsupported_service_type(format!(
                    "DID service '{did}' can not be used for connectionless delivery"
                )))
            }
        };

        message.service = Some(service_decorator(inline)?);
        tracing::debug!(
            invitation_id = %invitation.id,
            message_id = %message.id,
            "Releasing attached message without a connection"
        );
        self.events.deliver(message, None);
        Ok(())
    }
}
