//! Peer DID numeric algorithm 2.
//!
//! A numalgo 2 peer DID inlines every key and service of the DID document into
//! the identifier itself:
//!
//! ```text
//! did:peer:2.Vz6Mkj3PU...Ez6LSg8zQ...SeyJ0IjoiZG0iLCJzIjoiaHR0cHM6Ly9...
//!           └ purpose code + element payload, joined by '.'
//! ```
//!
//! Keys are encoded as their did:key multibase fingerprint. Services are
//! minified JSON with abbreviated field names (`t`, `s`, `r`, `a`), base64url
//! encoded without padding. Encoding is a pure function of the ordered element
//! list, so the same input always yields the same identifier.

use crate::did_key::PublicKey;
use crate::{PeerDidError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Method prefix shared by every peer DID.
pub const PEER_DID_PREFIX: &str = "did:peer:";

/// Numeric algorithm tag for this codec.
pub const NUMALGO_2: char = '2';

/// Purpose code for service elements.
pub const SERVICE_PURPOSE_CODE: char = 'S';

/// Full service type abbreviated to `dm` inside encoded services.
pub const DIDCOMM_MESSAGING_TYPE: &str = "DIDCommMessaging";

const DIDCOMM_MESSAGING_ABBREVIATION: &str = "dm";

/// Relationship a key element has to the DID subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPurpose {
    /// `A` - assertion method
    Assertion,
    /// `E` - key agreement (encryption)
    Encryption,
    /// `V` - authentication (verification)
    Verification,
    /// `I` - capability invocation
    CapabilityInvocation,
    /// `D` - capability delegation
    CapabilityDelegation,
}

impl KeyPurpose {
    /// All key purposes in the order DID documents are re-encoded.
    pub const DOCUMENT_ORDER: [KeyPurpose; 5] = [
        KeyPurpose::Verification,
        KeyPurpose::Encryption,
        KeyPurpose::Assertion,
        KeyPurpose::CapabilityInvocation,
        KeyPurpose::CapabilityDelegation,
    ];

    /// Single-character prefix used in the identifier.
    pub fn code(&self) -> char {
        match self {
            KeyPurpose::Assertion => 'A',
            KeyPurpose::Encryption => 'E',
            KeyPurpose::Verification => 'V',
            KeyPurpose::CapabilityInvocation => 'I',
            KeyPurpose::CapabilityDelegation => 'D',
        }
    }

    /// Look up a key purpose from its prefix character.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'A' => Some(KeyPurpose::Assertion),
            'E' => Some(KeyPurpose::Encryption),
            'V' => Some(KeyPurpose::Verification),
            'I' => Some(KeyPurpose::CapabilityInvocation),
            'D' => Some(KeyPurpose::CapabilityDelegation),
            _ => None,
        }
    }
}

/// Service material carried by a peer DID.
///
/// Recipient keys are intentionally absent: they are expressed by sibling
/// [`Element::Key`] entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceElement {
    /// Service type (`did-communication`, `DIDCommMessaging`, ...)
    pub service_type: String,
    /// Service endpoint URI
    pub endpoint: String,
    /// Mediator routing keys, outermost last
    pub routing_keys: Vec<String>,
    /// Accepted message profiles
    pub accept: Vec<String>,
}

impl ServiceElement {
    /// Create a service element with no routing keys or accept profiles.
    pub fn new(service_type: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            endpoint: endpoint.into(),
            routing_keys: Vec::new(),
            accept: Vec::new(),
        }
    }
}

/// One dot-separated element of a numalgo 2 identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    /// A public key with its relationship
    Key {
        /// Relationship of the key to the subject
        purpose: KeyPurpose,
        /// The key itself
        key: PublicKey,
    },
    /// A service descriptor
    Service(ServiceElement),
}

/// Wire form of a service element.
#[derive(Serialize, Deserialize)]
struct AbbreviatedService {
    t: String,
    s: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    r: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    a: Vec<String>,
}

impl TryFrom<&ServiceElement> for AbbreviatedService {
    type Error = PeerDidError;

    fn try_from(service: &ServiceElement) -> Result<Self> {
        // A literal `dm` would decode as DIDCommMessaging
        let t = match service.service_type.as_str() {
            DIDCOMM_MESSAGING_TYPE => DIDCOMM_MESSAGING_ABBREVIATION.to_string(),
            DIDCOMM_MESSAGING_ABBREVIATION => {
                return Err(PeerDidError::ReservedServiceType {
                    service_type: service.service_type.clone(),
                })
            }
            other => other.to_string(),
        };
        Ok(Self {
            t,
            s: service.endpoint.clone(),
            r: service.routing_keys.clone(),
            a: service.accept.clone(),
        })
    }
}

impl From<AbbreviatedService> for ServiceElement {
    fn from(service: AbbreviatedService) -> Self {
        let service_type = if service.t == DIDCOMM_MESSAGING_ABBREVIATION {
            DIDCOMM_MESSAGING_TYPE.to_string()
        } else {
            service.t
        };
        Self {
            service_type,
            endpoint: service.s,
            routing_keys: service.r,
            accept: service.a,
        }
    }
}

/// A numalgo 2 peer DID string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerDid(String);

impl PeerDid {
    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the identifier back into its elements.
    pub fn elements(&self) -> Result<Vec<Element>> {
        decode(&self.0)
    }
}

impl fmt::Display for PeerDid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PeerDid {
    type Err = PeerDidError;

    fn from_str(s: &str) -> Result<Self> {
        decode(s)?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for PeerDid {
    type Error = PeerDidError;

    fn try_from(value: String) -> Result<Self> {
        decode(&value)?;
        Ok(Self(value))
    }
}

impl From<PeerDid> for String {
    fn from(did: PeerDid) -> Self {
        did.0
    }
}

impl AsRef<str> for PeerDid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Encode an ordered element list as a numalgo 2 peer DID.
///
/// Fails with [`PeerDidError::ReservedServiceType`] for a service whose type
/// is the literal `dm`, which could not be told apart from an abbreviated
/// `DIDCommMessaging` when decoding.
pub fn encode(elements: &[Element]) -> Result<PeerDid> {
    let mut did = format!("{PEER_DID_PREFIX}{NUMALGO_2}");
    for element in elements {
        did.push('.');
        match element {
            Element::Key { purpose, key } => {
                did.push(purpose.code());
                did.push_str(&key.fingerprint());
            }
            Element::Service(service) => {
                let json = serde_json::to_vec(&AbbreviatedService::try_from(service)?)?;
                did.push(SERVICE_PURPOSE_CODE);
                did.push_str(&URL_SAFE_NO_PAD.encode(json));
            }
        }
    }
    Ok(PeerDid(did))
}

/// Decode a numalgo 2 peer DID into its ordered element list.
pub fn decode(did: &str) -> Result<Vec<Element>> {
    let method_specific = did
        .strip_prefix(PEER_DID_PREFIX)
        .ok_or_else(|| PeerDidError::malformed(did, "must start with 'did:peer:'"))?;

    let mut segments = method_specific.split('.');
    let tag = segments.next().unwrap_or_default();
    let mut tag_chars = tag.chars();
    match (tag_chars.next(), tag_chars.next()) {
        (Some(NUMALGO_2), None) => {}
        (Some(numalgo), None) if numalgo.is_ascii_digit() => {
            return Err(PeerDidError::UnsupportedNumalgo { numalgo });
        }
        _ => {
            return Err(PeerDidError::malformed(
                did,
                format!("invalid numalgo tag '{tag}'"),
            ))
        }
    }

    segments
        .enumerate()
        .map(|(index, segment)| decode_segment(did, index, segment))
        .collect()
}

fn decode_segment(did: &str, index: usize, segment: &str) -> Result<Element> {
    let mut chars = segment.chars();
    let code = chars
        .next()
        .ok_or_else(|| PeerDidError::malformed(did, format!("element {index} is empty")))?;
    let payload = chars.as_str();

    if code == SERVICE_PURPOSE_CODE {
        let json = URL_SAFE_NO_PAD.decode(payload).map_err(|e| {
            PeerDidError::malformed(did, format!("service {index} is not base64url: {e}"))
        })?;
        let service: AbbreviatedService = serde_json::from_slice(&json).map_err(|e| {
            PeerDidError::malformed(did, format!("service {index} is not valid JSON: {e}"))
        })?;
        return Ok(Element::Service(service.into()));
    }

    let purpose = KeyPurpose::from_code(code).ok_or_else(|| {
        PeerDidError::malformed(did, format!("unrecognized purpose code '{code}'"))
    })?;
    let key = PublicKey::from_fingerprint(payload)
        .map_err(|e| PeerDidError::malformed(did, format!("key {index}: {e}")))?;

    Ok(Element::Key { purpose, key })
}

/// Legacy-style service descriptor: recipient keys, routing keys and endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyService {
    /// Keys messages to this service are encrypted for
    pub recipient_keys: Vec<PublicKey>,
    /// Routing keys, as did:key references
    pub routing_keys: Vec<String>,
    /// Service endpoint URI
    pub endpoint: String,
    /// Accepted message profiles
    pub accept: Vec<String>,
}

/// Service type of legacy DIDComm v1 services.
pub const DID_COMMUNICATION_TYPE: &str = "did-communication";

/// Derive a peer DID from a single legacy service descriptor.
///
/// Each recipient key becomes a verification key element, followed by one
/// `did-communication` service element.
pub fn service_to_peer_did(service: &LegacyService) -> Result<PeerDid> {
    let mut elements: Vec<Element> = service
        .recipient_keys
        .iter()
        .map(|key| Element::Key {
            purpose: KeyPurpose::Verification,
            key: key.clone(),
        })
        .collect();

    elements.push(Element::Service(ServiceElement {
        service_type: DID_COMMUNICATION_TYPE.to_string(),
        endpoint: service.endpoint.clone(),
        routing_keys: service.routing_keys.clone(),
        accept: service.accept.clone(),
    }));

    encode(&elements)
}
