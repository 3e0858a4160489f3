//! Plaintext DIDComm messages, decorators and attachments
//!
//! The engine treats attached request messages opaquely: only `@id`, `@type`
//! and the `~service` / `~thread` decorators are interpreted, every other
//! field is carried through untouched.

use crate::error::{OutOfBandError, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// `@type` of out-of-band invitations
pub const OUT_OF_BAND_INVITATION_TYPE: &str = "https://didcomm.org/out-of-band/1.1/invitation";

/// `@type` of the handshake-reuse request
pub const HANDSHAKE_REUSE_TYPE: &str = "https://didcomm.org/out-of-band/1.1/handshake-reuse";

/// `@type` of the handshake-reuse acknowledgement
pub const HANDSHAKE_REUSE_ACCEPTED_TYPE: &str =
    "https://didcomm.org/out-of-band/1.1/handshake-reuse-accepted";

/// `@type` of legacy connection invitations
pub const CONNECTION_INVITATION_TYPE: &str = "https://didcomm.org/connections/1.0/invitation";

/// `~thread` decorator
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThreadDecorator {
    /// Thread identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,
    /// Parent thread identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pthid: Option<String>,
}

/// `~service` decorator carried by connectionless messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDecorator {
    /// Base58 verkeys of the sender
    pub recipient_keys: Vec<String>,
    /// Base58 verkeys of mediators
    #[serde(default)]
    pub routing_keys: Vec<String>,
    /// Where replies are sent
    pub service_endpoint: String,
}

/// A plaintext DIDComm v1 message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Message identifier
    #[serde(rename = "@id")]
    pub id: String,
    /// Message type URI
    #[serde(rename = "@type")]
    pub message_type: String,
    /// Threading decorator
    #[serde(rename = "~thread", default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<ThreadDecorator>,
    /// Connectionless service decorator
    #[serde(rename = "~service", default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceDecorator>,
    /// Every other field
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl AgentMessage {
    /// Create an empty message of the given type with a fresh id
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message_type: message_type.into(),
            thread: None,
            service: None,
            body: Map::new(),
        }
    }

    /// Add a body field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    /// Set the thread decorator
    pub fn with_thread(mut self, thid: Option<String>, pthid: Option<String>) -> Self {
        self.thread = Some(ThreadDecorator { thid, pthid });
        self
    }

    /// Thread id, defaulting to the message id
    pub fn thread_id(&self) -> &str {
        self.thread
            .as_ref()
            .and_then(|t| t.thid.as_deref())
            .unwrap_or(&self.id)
    }

    /// Parent thread id, if any
    pub fn parent_thread_id(&self) -> Option<&str> {
        self.thread.as_ref().and_then(|t| t.pthid.as_deref())
    }

    /// Serialize to a JSON value
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize from a JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Build a handshake-reuse request for an invitation.
///
/// The message starts its own thread and names the invitation as parent.
pub fn handshake_reuse(invitation_id: &str) -> AgentMessage {
    let message = AgentMessage::new(HANDSHAKE_REUSE_TYPE);
    let thid = message.id.clone();
    message.with_thread(Some(thid), Some(invitation_id.to_string()))
}

/// Build the acknowledgement of a handshake-reuse request
pub fn handshake_reuse_accepted(thread_id: &str, invitation_id: &str) -> AgentMessage {
    AgentMessage::new(HANDSHAKE_REUSE_ACCEPTED_TYPE).with_thread(
        Some(thread_id.to_string()),
        Some(invitation_id.to_string()),
    )
}

/// Attachment payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttachmentData {
    /// Inline JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    /// Base64 encoded JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

/// An attached message (`requests~attach` entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment identifier
    #[serde(rename = "@id")]
    pub id: String,
    /// Media type of the payload
    #[serde(rename = "mime-type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Payload
    pub data: AttachmentData,
}

impl Attachment {
    /// Wrap a message as inline JSON
    pub fn from_message(message: &AgentMessage) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            mime_type: Some("application/json".to_string()),
            data: AttachmentData {
                json: Some(message.to_value()?),
                base64: None,
            },
        })
    }

    /// Decode the attached message
    pub fn message(&self) -> Result<AgentMessage> {
        if let Some(json) = &self.data.json {
            return AgentMessage::from_value(json.clone());
        }
        if let Some(encoded) = &self.data.base64 {
            return decode_base64_json(encoded);
        }
        Err(OutOfBandError::invalid_invitation(format!(
            "attachment {} carries neither json nor base64 data",
            self.id
        )))
    }
}

/// Decode base64 JSON, tolerating padding and the standard alphabet
pub(crate) fn decode_base64_json<T: DeserializeOwned>(encoded: &str) -> Result<T> {
    let trimmed = encoded.trim_end_matches('=');
    let bytes = match URL_SAFE_NO_PAD.decode(trimmed) {
        Ok(bytes) => bytes,
        Err(_) => STANDARD.decode(encoded)?,
    };
    Ok(serde_json::from_slice(&bytes)?)
}

/// Encode JSON as unpadded base64url
pub(crate) fn encode_base64_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_survive() {
        let value = json!({
            "@id": "msg-1",
            "@type": "https://didcomm.org/issue-credential/1.0/offer-credential",
            "comment": "hello",
            "offers~attach": [],
            "~service": {
                "recipientKeys": ["8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K"],
                "serviceEndpoint": "https://faber.example"
            }
        });
        let message = AgentMessage::from_value(value.clone()).unwrap();
        assert_eq!(message.body["comment"], "hello");
        assert!(message.service.is_some());
        assert_eq!(message.to_value().unwrap()["offers~attach"], json!([]));
        assert_eq!(message.thread_id(), "msg-1");
    }

    #[test]
    fn test_handshake_reuse_threading() {
        let reuse = handshake_reuse("invitation-1");
        assert_eq!(reuse.thread_id(), reuse.id);
        assert_eq!(reuse.parent_thread_id(), Some("invitation-1"));

        let accepted = handshake_reuse_accepted(reuse.thread_id(), "invitation-1");
        assert_eq!(accepted.thread_id(), reuse.id);
        assert_eq!(accepted.message_type, HANDSHAKE_REUSE_ACCEPTED_TYPE);
    }

    #[test]
    fn test_attachment_json_and_base64() {
        let message = AgentMessage::new("https://didcomm.org/basicmessage/1.0/message")
            .with_field("content", "hi");
        let attachment = Attachment::from_message(&message).unwrap();
        assert_eq!(attachment.message().unwrap(), message);

        let padded = STANDARD.encode(serde_json::to_vec(&message).unwrap());
        let base64_attachment = Attachment {
            id: "a".to_string(),
            mime_type: None,
            data: AttachmentData {
                json: None,
                base64: Some(padded),
            },
        };
        assert_eq!(base64_attachment.message().unwrap(), message);

        let empty = Attachment {
            id: "b".to_string(),
            mime_type: None,
            data: AttachmentData::default(),
        };
        assert!(empty.message().is_err());
    }
}
