//! Legacy (pre out-of-band) invitations and their conversion
//!
//! Connection invitations carry raw base58 verkeys where out-of-band
//! invitations carry `did:key` identifiers. Conversion between the two is
//! lossless for invitations with a single service and the connections
//! handshake protocol.

use crate::error::{OutOfBandError, Result};
use crate::invitation::{InlineService, OutOfBandInvitation, OutOfBandService};
use crate::messages::{AgentMessage, ServiceDecorator, CONNECTION_INVITATION_TYPE};
use crate::protocol::HandshakeProtocol;
use didlink_peer_did::{KeyType, PublicKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id given to the single inline service of converted invitations
pub const LEGACY_INLINE_SERVICE_ID: &str = "#inline";

/// Accept profiles assumed for agents that predate the `accept` field
pub const LEGACY_ACCEPT: [&str; 2] = ["didcomm/aip1", "didcomm/aip2;env=rfc19"];

/// Legacy connection invitation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInvitation {
    /// Message type
    #[serde(rename = "@type")]
    pub message_type: String,
    /// Invitation identifier
    #[serde(rename = "@id")]
    pub id: String,
    /// Sender label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Sender image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Public DID (instead of inline keys)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    /// Base58 recipient verkeys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_keys: Option<Vec<String>>,
    /// Endpoint URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_endpoint: Option<String>,
    /// Base58 routing verkeys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_keys: Option<Vec<String>>,
}

impl ConnectionInvitation {
    /// Invitation with inline keys and endpoint
    pub fn inline(
        label: Option<String>,
        recipient_keys: Vec<String>,
        service_endpoint: impl Into<String>,
        routing_keys: Vec<String>,
    ) -> Self {
        Self {
            message_type: CONNECTION_INVITATION_TYPE.to_string(),
            id: Uuid::new_v4().to_string(),
            label,
            image_url: None,
            did: None,
            recipient_keys: Some(recipient_keys),
            service_endpoint: Some(service_endpoint.into()),
            routing_keys: Some(routing_keys),
        }
    }

    /// Invitation referencing a public DID
    pub fn public_did(label: Option<String>, did: impl Into<String>) -> Self {
        Self {
            message_type: CONNECTION_INVITATION_TYPE.to_string(),
            id: Uuid::new_v4().to_string(),
            label,
            image_url: None,
            did: Some(did.into()),
            recipient_keys: None,
            service_endpoint: None,
            routing_keys: None,
        }
    }

    /// Require either a DID or recipient keys with an endpoint
    pub fn validate(&self) -> Result<()> {
        match (&self.did, &self.recipient_keys, &self.service_endpoint) {
            (Some(_), None, None) => Ok(()),
            (None, Some(keys), Some(_)) if !keys.is_empty() => Ok(()),
            _ => Err(OutOfBandError::invalid_invitation(format!(
                "connection invitation {} must carry either did or recipientKeys with serviceEndpoint",
                self.id
            ))),
        }
    }
}

fn verkey_to_did_key(verkey: &str) -> Result<String> {
    Ok(PublicKey::from_base58(KeyType::Ed25519, verkey)?.did_key())
}

fn did_key_to_verkey(did_key: &str) -> Result<String> {
    Ok(PublicKey::from_did_key(did_key)?.to_base58())
}

fn verkeys_to_did_keys(verkeys: &[String]) -> Result<Vec<String>> {
    verkeys.iter().map(|v| verkey_to_did_key(v)).collect()
}

fn did_keys_to_verkeys(did_keys: &[String]) -> Result<Vec<String>> {
    did_keys.iter().map(|k| did_key_to_verkey(k)).collect()
}

/// Upgrade a legacy connection invitation to an out-of-band invitation
pub fn convert_to_oob_invitation(legacy: &ConnectionInvitation) -> Result<OutOfBandInvitation> {
    legacy.validate()?;

    let service = match (&legacy.did, &legacy.recipient_keys, &legacy.service_endpoint) {
        (Some(did), _, _) => OutOfBandService::Did(did.clone()),
        (None, Some(recipient_keys), Some(endpoint)) => {
            OutOfBandService::Inline(InlineService::new(
                LEGACY_INLINE_SERVICE_ID,
                endpoint.clone(),
                verkeys_to_did_keys(recipient_keys)?,
                verkeys_to_did_keys(legacy.routing_keys.as_deref().unwrap_or_default())?,
            ))
        }
        _ => {
            return Err(OutOfBandError::invalid_invitation(format!(
                "connection invitation {} has no usable service",
                legacy.id
            )))
        }
    };

    let mut invitation = OutOfBandInvitation::new(legacy.label.clone());
    invitation.id = legacy.id.clone();
    invitation.image_url = legacy.image_url.clone();
    invitation.accept = LEGACY_ACCEPT.iter().map(|a| a.to_string()).collect();
    invitation.handshake_protocols = Some(vec![HandshakeProtocol::Connections.to_string()]);
    invitation.services = vec![service];
    Ok(invitation)
}

/// Downgrade an out-of-band invitation to the legacy shape, using its first service
pub fn convert_to_legacy_invitation(
    invitation: &OutOfBandInvitation,
) -> Result<ConnectionInvitation> {
    let service = invitation.services.first().ok_or_else(|| {
        OutOfBandError::invalid_invitation(format!(
            "invitation {} has no service to convert",
            invitation.id
        ))
    })?;

    let mut legacy = match service {
        OutOfBandService::Did(did) => {
            ConnectionInvitation::public_did(invitation.label.clone(), did.clone())
        }
        OutOfBandService::Inline(inline) => ConnectionInvitation::inline(
            invitation.label.clone(),
            did_keys_to_verkeys(&inline.recipient_keys)?,
            inline.service_endpoint.clone(),
            did_keys_to_verkeys(&inline.routing_keys)?,
        ),
    };
    legacy.id = invitation.id.clone();
    legacy.image_url = invitation.image_url.clone();
    Ok(legacy)
}

/// Wrap a legacy connectionless message in an out-of-band invitation.
///
/// The `~service` decorator becomes the single inline service and the message
/// (with the decorator cleared) the single attached request.
pub fn convert_connectionless_to_oob(message: AgentMessage) -> Result<OutOfBandInvitation> {
    let decorator = message.service.clone().ok_or_else(|| {
        OutOfBandError::invalid_invitation(format!(
            "connectionless message {} has no ~service decorator",
            message.id
        ))
    })?;

    let mut invitation = OutOfBandInvitation::new(None);
    invitation.services = vec![OutOfBandService::Inline(InlineService::new(
        LEGACY_INLINE_SERVICE_ID,
        decorator.service_endpoint.clone(),
        verkeys_to_did_keys(&decorator.recipient_keys)?,
        verkeys_to_did_keys(&decorator.routing_keys)?,
    ))];
    invitation.add_request(message)?;
    Ok(invitation)
}

/// Build a `~service` decorator from an inline service
pub fn service_decorator(service: &InlineService) -> Result<ServiceDecorator> {
    Ok(ServiceDecorator {
        recipient_keys: did_keys_to_verkeys(&service.recipient_keys)?,
        routing_keys: did_keys_to_verkeys(&service.routing_keys)?,
        service_endpoint: service.service_endpoint.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verkey(seed: u8) -> String {
        PublicKey::from_bytes(KeyType::Ed25519, &[seed; 32])
            .unwrap()
            .to_base58()
    }

    #[test]
    fn test_inline_roundtrip() {
        let mut legacy = ConnectionInvitation::inline(
            Some("Faber".to_string()),
            vec![verkey(1)],
            "https://faber.example",
            vec![verkey(2)],
        );
        legacy.image_url = Some("https://faber.example/logo.png".to_string());

        let oob = convert_to_oob_invitation(&legacy).unwrap();
        assert_eq!(oob.id, legacy.id);
        assert_eq!(
            oob.handshake_protocols(),
            Some(&[HandshakeProtocol::Connections.to_string()][..])
        );
        let inline = oob.inline_services().next().unwrap();
        assert_eq!(inline.id, LEGACY_INLINE_SERVICE_ID);
        assert!(inline.recipient_keys[0].starts_with("did:key:z6Mk"));

        let back = convert_to_legacy_invitation(&oob).unwrap();
        assert_eq!(back, legacy);
        assert_eq!(convert_to_oob_invitation(&back).unwrap(), oob);
    }

    #[test]
    fn test_public_did_roundtrip() {
        let legacy = ConnectionInvitation::public_did(None, "did:sov:LjgpST2rjsoxYegQDRm7EL");
        let oob = convert_to_oob_invitation(&legacy).unwrap();
        assert_eq!(
            oob.services,
            vec![OutOfBandService::Did("did:sov:LjgpST2rjsoxYegQDRm7EL".to_string())]
        );
        assert_eq!(convert_to_legacy_invitation(&oob).unwrap(), legacy);
    }

    #[test]
    fn test_legacy_requires_did_or_keys() {
        let mut legacy = ConnectionInvitation::public_did(None, "did:sov:abc");
        legacy.did = None;
        assert!(convert_to_oob_invitation(&legacy).is_err());
    }

    #[test]
    fn test_no_services_cannot_downgrade() {
        let invitation = OutOfBandInvitation::new(None);
        assert!(matches!(
            convert_to_legacy_invitation(&invitation),
            Err(OutOfBandError::InvalidInvitation { .. })
        ));
    }

    #[test]
    fn test_connectionless_message() {
        let mut message = AgentMessage::new("https://didcomm.org/present-proof/1.0/request-presentation");
        message.service = Some(ServiceDecorator {
            recipient_keys: vec![verkey(3)],
            routing_keys: Vec::new(),
            service_endpoint: "https://verifier.example".to_string(),
        });

        let invitation = convert_connectionless_to_oob(message.clone()).unwrap();
        assert!(invitation.handshake_protocols().is_none());
        let requests = invitation.requests().unwrap();
        assert_eq!(requests[0].id, message.id);
        assert!(requests[0].service.is_none());

        let inline = invitation.inline_services().next().unwrap();
        assert_eq!(
            service_decorator(inline).unwrap(),
            message.service.clone().unwrap()
        );

        message.service = None;
        assert!(convert_connectionless_to_oob(message).is_err());
    }
}
