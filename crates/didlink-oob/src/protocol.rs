//! Message type and protocol URI parsing
//!
//! Message types have the shape `<doc-uri><protocol>/<major>.<minor>/<name>`,
//! protocol URIs the shape `<doc-uri><protocol>/<major>.<minor>`. Two types
//! are compatible when document URI, protocol name and major version agree;
//! minor versions may differ.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Document URI of protocols defined by the DIDComm community.
pub const DIDCOMM_DOCUMENT_URI: &str = "https://didcomm.org/";

/// Legacy document URI still emitted by older agents.
pub const LEGACY_DOCUMENT_URI: &str = "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/";

fn normalize(uri: &str) -> String {
    match uri.strip_prefix(LEGACY_DOCUMENT_URI) {
        Some(rest) => format!("{DIDCOMM_DOCUMENT_URI}{rest}"),
        None => uri.to_string(),
    }
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// A parsed protocol identifier such as `https://didcomm.org/didexchange/1.1`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedProtocolUri {
    /// Everything before the protocol name, including the trailing `/`
    pub document_uri: String,
    /// Protocol family name
    pub protocol_name: String,
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
}

impl ParsedProtocolUri {
    /// Parse a protocol URI. Legacy `did:sov` prefixes are normalized.
    pub fn parse(uri: &str) -> Option<Self> {
        let uri = normalize(uri);
        let mut parts = uri.rsplitn(3, '/');
        let version = parts.next()?;
        let protocol_name = parts.next()?;
        let document_uri = parts.next()?;
        if protocol_name.is_empty() {
            return None;
        }
        let (major, minor) = parse_version(version)?;
        Some(Self {
            document_uri: format!("{document_uri}/"),
            protocol_name: protocol_name.to_string(),
            major,
            minor,
        })
    }

    /// Whether two protocols share document URI, name and major version
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.document_uri == other.document_uri
            && self.protocol_name == other.protocol_name
            && self.major == other.major
    }

    /// The protocol URI with the major version only, used as a family key
    pub fn family(&self) -> String {
        format!("{}{}/{}", self.document_uri, self.protocol_name, self.major)
    }
}

impl fmt::Display for ParsedProtocolUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/{}.{}",
            self.document_uri, self.protocol_name, self.major, self.minor
        )
    }
}

/// A parsed message type such as `https://didcomm.org/out-of-band/1.1/invitation`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedMessageType {
    /// Protocol the message belongs to
    pub protocol: ParsedProtocolUri,
    /// Message name within the protocol
    pub message_name: String,
}

impl ParsedMessageType {
    /// Parse a message type. Legacy `did:sov` prefixes are normalized.
    pub fn parse(message_type: &str) -> Option<Self> {
        let (protocol_uri, message_name) = message_type.rsplit_once('/')?;
        if message_name.is_empty() {
            return None;
        }
        Some(Self {
            protocol: ParsedProtocolUri::parse(protocol_uri)?,
            message_name: message_name.to_string(),
        })
    }

    /// Whether an incoming message of type `self` can be handled by a handler of `supported`
    pub fn is_compatible_with(&self, supported: &Self) -> bool {
        self.message_name == supported.message_name
            && self.protocol.is_compatible_with(&supported.protocol)
    }
}

impl fmt::Display for ParsedMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol, self.message_name)
    }
}

/// Whether `incoming` is handled by any entry in `supported`
pub fn supports_message_type(supported: &[String], incoming: &str) -> bool {
    let Some(incoming) = ParsedMessageType::parse(incoming) else {
        return false;
    };
    supported
        .iter()
        .filter_map(|s| ParsedMessageType::parse(s))
        .any(|s| incoming.is_compatible_with(&s))
}

/// Handshake protocols the engine can negotiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HandshakeProtocol {
    /// DID exchange 1.x
    DidExchange,
    /// Legacy connections 1.x
    Connections,
}

impl HandshakeProtocol {
    /// This agent's preference order: DID exchange before legacy connections
    pub const PREFERENCE_ORDER: [HandshakeProtocol; 2] =
        [HandshakeProtocol::DidExchange, HandshakeProtocol::Connections];

    /// Canonical protocol URI
    pub fn uri(&self) -> &'static str {
        match self {
            HandshakeProtocol::DidExchange => "https://didcomm.org/didexchange/1.1",
            HandshakeProtocol::Connections => "https://didcomm.org/connections/1.0",
        }
    }

    /// Parsed form of [`Self::uri`]
    pub fn parsed(&self) -> ParsedProtocolUri {
        let (name, minor) = match self {
            HandshakeProtocol::DidExchange => ("didexchange", 1),
            HandshakeProtocol::Connections => ("connections", 0),
        };
        ParsedProtocolUri {
            document_uri: DIDCOMM_DOCUMENT_URI.to_string(),
            protocol_name: name.to_string(),
            major: 1,
            minor,
        }
    }

    /// Match a protocol URI against the known handshake families (major version match)
    pub fn from_uri(uri: &str) -> Option<Self> {
        let parsed = ParsedProtocolUri::parse(uri)?;
        Self::PREFERENCE_ORDER
            .into_iter()
            .find(|protocol| protocol.parsed().is_compatible_with(&parsed))
    }
}

impl fmt::Display for HandshakeProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

impl FromStr for HandshakeProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uri(s).ok_or_else(|| format!("unknown handshake protocol '{s}'"))
    }
}

impl TryFrom<String> for HandshakeProtocol {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HandshakeProtocol> for String {
    fn from(protocol: HandshakeProtocol) -> Self {
        protocol.uri().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_type() {
        let parsed =
            ParsedMessageType::parse("https://didcomm.org/out-of-band/1.1/handshake-reuse")
                .unwrap();
        assert_eq!(parsed.protocol.document_uri, "https://didcomm.org/");
        assert_eq!(parsed.protocol.protocol_name, "out-of-band");
        assert_eq!((parsed.protocol.major, parsed.protocol.minor), (1, 1));
        assert_eq!(parsed.message_name, "handshake-reuse");
        assert_eq!(
            parsed.to_string(),
            "https://didcomm.org/out-of-band/1.1/handshake-reuse"
        );
    }

    #[test]
    fn test_legacy_prefix_normalized() {
        let parsed = ParsedMessageType::parse(
            "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/connections/1.0/invitation",
        )
        .unwrap();
        assert_eq!(
            parsed.to_string(),
            "https://didcomm.org/connections/1.0/invitation"
        );
    }

    #[test]
    fn test_minor_version_mismatch_is_compatible() {
        let supported = vec!["https://didcomm.org/out-of-band/1.1/handshake-reuse".to_string()];
        assert!(supports_message_type(
            &supported,
            "https://didcomm.org/out-of-band/1.0/handshake-reuse"
        ));
        assert!(!supports_message_type(
            &supported,
            "https://didcomm.org/out-of-band/2.0/handshake-reuse"
        ));
        assert!(!supports_message_type(
            &supported,
            "https://didcomm.org/out-of-band/1.1/invitation"
        ));
        assert!(!supports_message_type(&supported, "garbage"));
    }

    #[test]
    fn test_handshake_protocol_from_uri() {
        assert_eq!(
            HandshakeProtocol::from_uri("https://didcomm.org/didexchange/1.0"),
            Some(HandshakeProtocol::DidExchange)
        );
        assert_eq!(
            HandshakeProtocol::from_uri("https://didcomm.org/connections/1.0"),
            Some(HandshakeProtocol::Connections)
        );
        assert_eq!(
            HandshakeProtocol::from_uri("https://didcomm.org/didexchange/2.0"),
            None
        );
        assert_eq!(
            HandshakeProtocol::DidExchange.parsed().to_string(),
            HandshakeProtocol::DidExchange.uri()
        );
    }

    #[test]
    fn test_handshake_protocol_serde() {
        let json = serde_json::to_string(&HandshakeProtocol::Connections).unwrap();
        assert_eq!(json, "\"https://didcomm.org/connections/1.0\"");
        let back: HandshakeProtocol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, HandshakeProtocol::Connections);
    }
}
