//! Invitation acceptance: connection reuse and handshake negotiation

use super::{AcceptInvitationConfig, AcceptedInvitation, OutOfBandEngine};
use crate::effects::{AcceptOutOfBandParams, ConnectionRecord, OutboundMessage};
use crate::error::{OutOfBandError, Result};
use crate::invitation::OutOfBandInvitation;
use crate::messages::handshake_reuse;
use crate::protocol::HandshakeProtocol;
use crate::record::{OutOfBandRecord, OutOfBandRole, OutOfBandState};

impl OutOfBandEngine {
    /// Accept a received invitation.
    ///
    /// Reuses an existing connection to the inviter when one exists and
    /// `reuse_connection` is set, otherwise starts a handshake with the first
    /// invitation protocol this agent supports. Attached messages are released
    /// once a connection is ready, or without a connection when the invitation
    /// offers no handshake.
    pub async fn accept_invitation(
        &self,
        record_id: &str,
        config: AcceptInvitationConfig,
    ) -> Result<AcceptedInvitation> {
        let mut record = self.store.get_by_id(record_id).await?;
        record.assert_role(OutOfBandRole::Receiver)?;
        record.assert_state(OutOfBandState::Initial)?;
        self.update_state(&mut record, OutOfBandState::PrepareResponse)
            .await?;

        let invitation = record.out_of_band_invitation.clone();
        let messages = invitation.requests()?;
        let existing = self.find_existing_connection(&invitation).await?;

        let mut reuse_pending = false;
        let connection = if let Some(protocols) = invitation.handshake_protocols() {
            let connection = match existing {
                Some(existing) if config.reuse_connection => {
                    tracing::info!(
                        record_id = %record.id,
                        connection_id = %existing.id,
                        "Reusing existing connection"
                    );
                    if messages.is_empty() {
                        self.send_handshake_reuse(&mut record, &existing).await?;
                        reuse_pending = true;
                    }
                    existing
                }
                _ => {
                    let protocol = self.select_handshake_protocol(protocols)?;
                    let params = AcceptOutOfBandParams {
                        label: config.label.or_else(|| Some(self.config.label.clone())),
                        alias: config.alias,
                        image_url: config.image_url.or_else(|| self.config.image_url.clone()),
                        auto_accept_connection: config
                            .auto_accept_connection
                            .unwrap_or(record.auto_accept_connection),
                        protocol,
                        routing: config.routing,
                    };
                    let connection = self
                        .connections
                        .accept_out_of_band_invitation(&record, params)
                        .await?;
                    tracing::info!(
                        record_id = %record.id,
                        connection_id = %connection.id,
                        protocol = %protocol,
                        "Started handshake for out-of-band invitation"
                    );
                    connection
                }
            };

            if !messages.is_empty() {
                self.dispatch_with_connection(&messages, &connection)?;
            }
            Some(connection)
        } else if !messages.is_empty() {
            match &existing {
                Some(connection) => self.dispatch_with_connection(&messages, connection)?,
                None => self.dispatch_without_connection(&invitation, &messages)?,
            }
            existing
        } else {
            existing
        };

        // An outstanding reuse completes when the inviter acknowledges it
        if !reuse_pending {
            self.update_state(&mut record, OutOfBandState::Done).await?;
        }

        Ok(AcceptedInvitation { record, connection })
    }

    /// Existing connection made from one of the invitation's services.
    ///
    /// More than one match should not happen; the first is used and the
    /// anomaly logged.
    pub async fn find_existing_connection(
        &self,
        invitation: &OutOfBandInvitation,
    ) -> Result<Option<ConnectionRecord>> {
        for service in &invitation.services {
            let did = service.invitation_did()?;
            let mut matches = self.connections.find_by_invitation_did(&did).await?;
            match matches.len() {
                0 => continue,
                1 => return Ok(matches.pop()),
                count => {
                    tracing::warn!(
                        invitation_id = %invitation.id,
                        invitation_did = %did,
                        count,
                        "Multiple connections match the invitation service, using the first"
                    );
                    return Ok(Some(matches.swap_remove(0)));
                }
            }
        }
        Ok(None)
    }

    /// First invitation protocol this agent also supports (invitation order wins)
    fn select_handshake_protocol(&self, invitation_protocols: &[String]) -> Result<HandshakeProtocol> {
        let supported = self.supported_handshake_protocols();
        let selected = invitation_protocols
            .iter()
            .filter_map(|uri| HandshakeProtocol::from_uri(uri))
            .find(|protocol| supported.contains(protocol));

        match selected {
            Some(protocol) => {
                tracing::debug!(protocol = %protocol, offered = ?invitation_protocols, "Selected handshake protocol");
                Ok(protocol)
            }
            None => Err(OutOfBandError::UnsupportedProtocol {
                requested: invitation_protocols.to_vec(),
                supported: supported.iter().map(|p| p.uri().to_string()).collect(),
            }),
        }
    }

    async fn send_handshake_reuse(
        &self,
        record: &mut OutOfBandRecord,
        connection: &ConnectionRecord,
    ) -> Result<()> {
        let message = handshake_reuse(record.invitation_id());
        let reuse_thread_id = message.thread_id().to_string();

        // Persisted first: the acknowledgement may arrive before send returns
        record.reuse_connection_id = Some(connection.id.clone());
        self.store.update(record).await?;

        self.outbound
            .send_message(OutboundMessage {
                connection_id: connection.id.clone(),
                message,
            })
            .await?;

        tracing::info!(
            record_id = %record.id,
            connection_id = %connection.id,
            reuse_thread_id = %reuse_thread_id,
            "Sent handshake reuse"
        );
        Ok(())
    }

    async fn update_state(&self, record: &mut OutOfBandRecord, state: OutOfBandState) -> Result<()> {
        let previous = record.transition(state)?;
        self.store.update(record).await?;
        self.events.state_changed(record, Some(previous));
        Ok(())
    }
}
