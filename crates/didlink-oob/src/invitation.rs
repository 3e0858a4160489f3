//! Out-of-band invitation model
//!
//! An invitation is immutable once created or received. It offers a handshake
//! path (`handshake_protocols`), attached request messages (`requests~attach`),
//! or both, and lists the services the sender can be reached at.

use crate::error::{OutOfBandError, Result};
use crate::messages::{AgentMessage, Attachment, OUT_OF_BAND_INVITATION_TYPE};
use crate::protocol::HandshakeProtocol;
use didlink_peer_did::{service_to_peer_did, LegacyService, PeerDid, PublicKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Service type of inline invitation services
pub const DID_COMMUNICATION: &str = "did-communication";

/// An inline service descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineService {
    /// Service identifier, `#inline-N` for services this agent creates
    pub id: String,
    /// Always `did-communication`
    #[serde(rename = "type")]
    pub service_type: String,
    /// Endpoint URI
    pub service_endpoint: String,
    /// `did:key` recipient keys
    pub recipient_keys: Vec<String>,
    /// `did:key` routing keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_keys: Vec<String>,
}

impl InlineService {
    /// Create a `did-communication` service
    pub fn new(
        id: impl Into<String>,
        service_endpoint: impl Into<String>,
        recipient_keys: Vec<String>,
        routing_keys: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            service_type: DID_COMMUNICATION.to_string(),
            service_endpoint: service_endpoint.into(),
            recipient_keys,
            routing_keys,
        }
    }

    /// Decoded recipient keys
    pub fn recipient_public_keys(&self) -> Result<Vec<PublicKey>> {
        self.recipient_keys
            .iter()
            .map(|key| Ok(PublicKey::from_did_key(key)?))
            .collect()
    }

    /// Decoded routing keys
    pub fn routing_public_keys(&self) -> Result<Vec<PublicKey>> {
        self.routing_keys
            .iter()
            .map(|key| Ok(PublicKey::from_did_key(key)?))
            .collect()
    }

    /// Peer DID derived from this service
    pub fn to_peer_did(&self) -> Result<PeerDid> {
        let service = LegacyService {
            recipient_keys: self.recipient_public_keys()?,
            routing_keys: self.routing_keys.clone(),
            endpoint: self.service_endpoint.clone(),
            accept: Vec::new(),
        };
        Ok(service_to_peer_did(&service)?)
    }
}

/// An invitation service: inline descriptor or DID reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutOfBandService {
    /// Inline service descriptor
    Inline(InlineService),
    /// Resolvable DID
    Did(String),
}

impl OutOfBandService {
    /// Identifier existing connections record as their invitation DID
    pub fn invitation_did(&self) -> Result<String> {
        match self {
            OutOfBandService::Inline(service) => Ok(service.to_peer_did()?.to_string()),
            OutOfBandService::Did(did) => Ok(did.clone()),
        }
    }
}

/// Out-of-band invitation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutOfBandInvitation {
    /// Message type
    #[serde(rename = "@type")]
    pub message_type: String,
    /// Invitation identifier, parent thread of every exchange it starts
    #[serde(rename = "@id")]
    pub id: String,
    /// Sender label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Goal code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_code: Option<String>,
    /// Free-text goal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    /// Accepted message profiles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accept: Vec<String>,
    /// Handshake protocol URIs in sender preference order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handshake_protocols: Option<Vec<String>>,
    /// Services the sender can be reached at
    #[serde(default)]
    pub services: Vec<OutOfBandService>,
    /// Attached request messages
    #[serde(rename = "requests~attach", default, skip_serializing_if = "Vec::is_empty")]
    pub requests_attach: Vec<Attachment>,
    /// Sender image
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl OutOfBandInvitation {
    /// Create an empty invitation with a fresh id
    pub fn new(label: Option<String>) -> Self {
        Self {
            message_type: OUT_OF_BAND_INVITATION_TYPE.to_string(),
            id: Uuid::new_v4().to_string(),
            label,
            goal_code: None,
            goal: None,
            accept: Vec::new(),
            handshake_protocols: None,
            services: Vec::new(),
            requests_attach: Vec::new(),
            image_url: None,
        }
    }

    /// Attach a request message, clearing its `~service` decorator
    pub fn add_request(&mut self, mut message: AgentMessage) -> Result<()> {
        message.service = None;
        self.requests_attach.push(Attachment::from_message(&message)?);
        Ok(())
    }

    /// Decoded attached messages in order
    pub fn requests(&self) -> Result<Vec<AgentMessage>> {
        self.requests_attach.iter().map(Attachment::message).collect()
    }

    /// Ids of attached messages that decode
    pub fn request_ids(&self) -> Vec<String> {
        self.requests_attach
            .iter()
            .filter_map(|attachment| attachment.message().ok())
            .map(|message| message.id)
            .collect()
    }

    /// Whether any request messages are attached
    pub fn has_requests(&self) -> bool {
        !self.requests_attach.is_empty()
    }

    /// Handshake protocol URIs, `None` when no handshake is offered
    pub fn handshake_protocols(&self) -> Option<&[String]> {
        self.handshake_protocols.as_deref()
    }

    /// Handshake protocols this crate knows, in invitation order
    pub fn known_handshake_protocols(&self) -> Vec<HandshakeProtocol> {
        self.handshake_protocols()
            .unwrap_or_default()
            .iter()
            .filter_map(|uri| HandshakeProtocol::from_uri(uri))
            .collect()
    }

    /// Inline services in order
    pub fn inline_services(&self) -> impl Iterator<Item = &InlineService> {
        self.services.iter().filter_map(|service| match service {
            OutOfBandService::Inline(inline) => Some(inline),
            OutOfBandService::Did(_) => None,
        })
    }

    /// Recipient keys (`did:key`) of every inline service
    pub fn recipient_keys(&self) -> Vec<String> {
        self.inline_services()
            .flat_map(|service| service.recipient_keys.iter().cloned())
            .collect()
    }

    /// Reject invitations that offer neither a handshake nor attached messages
    pub fn validate(&self) -> Result<()> {
        if self.handshake_protocols.is_none() && !self.has_requests() {
            return Err(OutOfBandError::invalid_invitation(format!(
                "invitation {} has neither handshake_protocols nor requests~attach",
                self.id
            )));
        }
        Ok(())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode as an invitation URL under `domain`
    pub fn to_url(&self, domain: &str) -> Result<String> {
        crate::url::encode_invitation_url(domain, self)
    }

    /// Parse any supported invitation URL
    pub fn from_url(invitation_url: &str) -> Result<Self> {
        crate::url::parse_invitation(invitation_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use didlink_peer_did::KeyType;
    use serde_json::json;

    fn did_key(seed: u8) -> String {
        PublicKey::from_bytes(KeyType::Ed25519, &[seed; 32])
            .unwrap()
            .did_key()
    }

    #[test]
    fn test_wire_field_names() {
        let mut invitation = OutOfBandInvitation::new(Some("Faber".to_string()));
        invitation.handshake_protocols = Some(vec![HandshakeProtocol::DidExchange.to_string()]);
        invitation.image_url = Some("https://faber.example/logo.png".to_string());
        invitation.services.push(OutOfBandService::Inline(InlineService::new(
            "#inline-0",
            "https://faber.example",
            vec![did_key(1)],
            Vec::new(),
        )));
        invitation.services.push(OutOfBandService::Did("did:sov:LjgpST2rjsoxYegQDRm7EL".to_string()));

        let value = serde_json::to_value(&invitation).unwrap();
        assert_eq!(value["@type"], OUT_OF_BAND_INVITATION_TYPE);
        assert_eq!(
            value["handshake_protocols"],
            json!(["https://didcomm.org/didexchange/1.1"])
        );
        assert_eq!(value["imageUrl"], "https://faber.example/logo.png");
        assert_eq!(value["services"][0]["serviceEndpoint"], "https://faber.example");
        assert_eq!(value["services"][0]["type"], DID_COMMUNICATION);
        assert_eq!(value["services"][1], "did:sov:LjgpST2rjsoxYegQDRm7EL");
        assert!(value.get("requests~attach").is_none());

        let back: OutOfBandInvitation = serde_json::from_value(value).unwrap();
        assert_eq!(back, invitation);
    }

    #[test]
    fn test_add_request_clears_service_decorator() {
        let message: AgentMessage = serde_json::from_value(json!({
            "@id": "offer-1",
            "@type": "https://didcomm.org/issue-credential/1.0/offer-credential",
            "~service": {
                "recipientKeys": ["key"],
                "serviceEndpoint": "https://faber.example"
            }
        }))
        .unwrap();

        let mut invitation = OutOfBandInvitation::new(None);
        invitation.add_request(message).unwrap();

        let requests = invitation.requests().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].service.is_none());
        assert_eq!(invitation.request_ids(), vec!["offer-1".to_string()]);
    }

    #[test]
    fn test_validate_requires_handshake_or_requests() {
        let mut invitation = OutOfBandInvitation::new(None);
        assert!(matches!(
            invitation.validate(),
            Err(OutOfBandError::InvalidInvitation { .. })
        ));

        invitation.handshake_protocols = Some(Vec::new());
        invitation.validate().unwrap();
    }

    #[test]
    fn test_inline_service_peer_did_is_stable() {
        let service = InlineService::new(
            "#inline-0",
            "https://example.com/endpoint",
            vec![did_key(2)],
            Vec::new(),
        );
        let first = service.to_peer_did().unwrap();
        let second = OutOfBandService::Inline(service).invitation_did().unwrap();
        assert_eq!(first.to_string(), second);
        assert!(second.starts_with("did:peer:2.Vz6Mk"));
    }

    #[test]
    fn test_known_handshake_protocols_keeps_invitation_order() {
        let mut invitation = OutOfBandInvitation::new(None);
        invitation.handshake_protocols = Some(vec![
            "https://didcomm.org/connections/1.0".to_string(),
            "https://didcomm.org/unknown/1.0".to_string(),
            "https://didcomm.org/didexchange/1.0".to_string(),
        ]);
        assert_eq!(
            invitation.known_handshake_protocols(),
            vec![HandshakeProtocol::Connections, HandshakeProtocol::DidExchange]
        );
    }
}
