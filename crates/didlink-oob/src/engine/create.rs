//! Invitation creation

use super::{CreateInvitationConfig, OutOfBandEngine};
use crate::effects::RoutingConstraints;
use crate::error::{OutOfBandError, Result};
use crate::invitation::{InlineService, OutOfBandInvitation, OutOfBandService};
use crate::legacy::{convert_to_legacy_invitation, ConnectionInvitation};
use crate::protocol::HandshakeProtocol;
use crate::record::{OutOfBandRecord, OutOfBandRole, OutOfBandState};

fn uris(protocols: &[HandshakeProtocol]) -> Vec<String> {
    protocols.iter().map(|p| p.uri().to_string()).collect()
}

impl OutOfBandEngine {
    /// Create an invitation and persist a sender record for it
    pub async fn create_invitation(&self, config: CreateInvitationConfig) -> Result<OutOfBandRecord> {
        if !config.handshake && config.messages.is_empty() {
            return Err(OutOfBandError::configuration(
                "One or both of handshake_protocols and requests~attach must be included in the invitation",
            ));
        }
        if !config.handshake && config.handshake_protocols.is_some() {
            return Err(OutOfBandError::configuration(
                "Handshake can not be disabled when handshake_protocols are defined",
            ));
        }
        if config.multi_use_invitation && !config.messages.is_empty() {
            return Err(OutOfBandError::configuration(
                "Attaching messages to multi-use invitations is not supported",
            ));
        }

        let handshake_protocols = if config.handshake {
            Some(self.resolve_handshake_protocols(config.handshake_protocols.as_deref())?)
        } else {
            None
        };

        let routing = match config.routing {
            Some(routing) => routing,
            None => {
                self.routing
                    .get_routing(RoutingConstraints {
                        mediator_id: None,
                        use_default_mediator: true,
                    })
                    .await?
            }
        };

        let recipient_key = routing.recipient_key.did_key();
        let routing_keys: Vec<String> = routing.routing_keys.iter().map(|k| k.did_key()).collect();
        let services: Vec<OutOfBandService> = routing
            .endpoints
            .iter()
            .enumerate()
            .map(|(index, endpoint)| {
                OutOfBandService::Inline(InlineService::new(
                    format!("#inline-{index}"),
                    endpoint.clone(),
                    vec![recipient_key.clone()],
                    routing_keys.clone(),
                ))
            })
            .collect();

        // Without a handshake the services are the only way to reach us
        if handshake_protocols.is_none() && services.is_empty() {
            return Err(OutOfBandError::configuration(
                "Routing provides no endpoints for an invitation without handshake",
            ));
        }

        let mut invitation =
            OutOfBandInvitation::new(Some(config.label.unwrap_or_else(|| self.config.label.clone())));
        invitation.image_url = config.image_url.or_else(|| self.config.image_url.clone());
        invitation.goal_code = config.goal_code;
        invitation.goal = config.goal;
        invitation.accept = config.accept.unwrap_or_else(|| self.config.accept.clone());
        invitation.handshake_protocols = handshake_protocols;
        invitation.services = services;
        for message in config.messages {
            invitation.add_request(message)?;
        }

        let mut record =
            OutOfBandRecord::new(OutOfBandRole::Sender, OutOfBandState::AwaitResponse, invitation);
        record.did = routing.did;
        record.mediator_id = routing.mediator_id;
        record.reusable = config.multi_use_invitation;
        record.auto_accept_connection = config
            .auto_accept_connection
            .unwrap_or(self.config.auto_accept_connections);

        self.store.save(&record).await?;
        self.events.state_changed(&record, None);

        tracing::info!(
            record_id = %record.id,
            invitation_id = %record.invitation_id(),
            multi_use = record.reusable,
            "Created out-of-band invitation"
        );

        Ok(record)
    }

    /// Create a connections 1.0 invitation, returning it in the legacy shape
    pub async fn create_legacy_invitation(
        &self,
        config: CreateInvitationConfig,
    ) -> Result<(OutOfBandRecord, ConnectionInvitation)> {
        if !config.handshake {
            return Err(OutOfBandError::configuration(
                "Legacy invitations always use a handshake",
            ));
        }
        if let Some(protocols) = &config.handshake_protocols {
            if protocols.as_slice() != [HandshakeProtocol::Connections] {
                return Err(OutOfBandError::configuration(format!(
                    "Legacy invitations only support {}",
                    HandshakeProtocol::Connections
                )));
            }
        }
        if !config.messages.is_empty() {
            return Err(OutOfBandError::configuration(
                "Legacy invitations can not carry attached messages",
            ));
        }

        let record = self
            .create_invitation(CreateInvitationConfig {
                handshake_protocols: Some(vec![HandshakeProtocol::Connections]),
                ..config
            })
            .await?;
        let legacy = convert_to_legacy_invitation(&record.out_of_band_invitation)?;
        Ok((record, legacy))
    }

    /// Explicit protocols must all be supported; otherwise every supported
    /// protocol in agent preference order.
    fn resolve_handshake_protocols(
        &self,
        requested: Option<&[HandshakeProtocol]>,
    ) -> Result<Vec<String>> {
        let supported = self.supported_handshake_protocols();

        match requested {
            Some(requested) => {
                if requested.iter().all(|p| supported.contains(p)) {
                    Ok(uris(requested))
                } else {
                    Err(OutOfBandError::UnsupportedProtocol {
                        requested: uris(requested),
                        supported: uris(&supported),
                    })
                }
            }
            None if supported.is_empty() => Err(OutOfBandError::UnsupportedProtocol {
                requested: uris(&HandshakeProtocol::PREFERENCE_ORDER),
                supported: Vec::new(),
            }),
            None => {
                tracing::debug!(protocols = ?supported, "Using agent handshake preference");
                Ok(uris(&supported))
            }
        }
    }
}
