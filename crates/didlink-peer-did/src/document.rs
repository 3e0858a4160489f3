//! DID documents resolved from numalgo 2 peer DIDs.
//!
//! Key elements become verification methods whose fragment identifiers are
//! numbered per relationship starting at 1 (`#key-1`, `#key-agreement-1`, ...).
//! Service elements are numbered in encounter order starting at 0
//! (`#service-0`, `#service-1`, ...).

use crate::did_key::PublicKey;
use crate::numalgo2::{
    self, Element, KeyPurpose, PeerDid, ServiceElement, DID_COMMUNICATION_TYPE,
};
use crate::{PeerDidError, Result};
use serde::{Deserialize, Serialize};

const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// A verification method (public key) in a DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// Full id, `<did>#<fragment>`
    pub id: String,
    /// Verification method type
    #[serde(rename = "type")]
    pub type_: String,
    /// Controller DID
    pub controller: String,
    /// Public key in multibase format
    pub public_key_multibase: String,
}

impl VerificationMethod {
    /// Decode the public key of this method.
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_fingerprint(&self.public_key_multibase)
    }

    fn fragment(&self) -> Option<&str> {
        self.id.split_once('#').map(|(_, fragment)| fragment)
    }
}

/// A service endpoint in a DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidCommService {
    /// Full id, `<did>#service-N`
    pub id: String,
    /// Service type
    #[serde(rename = "type")]
    pub type_: String,
    /// Service endpoint URI
    pub service_endpoint: String,
    /// Recipient key references (legacy `did-communication` services only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipient_keys: Vec<String>,
    /// Routing keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_keys: Vec<String>,
    /// Accepted message profiles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accept: Vec<String>,
}

/// DID document of a numalgo 2 peer DID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerDidDocument {
    /// JSON-LD context
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    /// The DID this document describes
    pub id: String,
    /// Every key referenced by a relationship
    pub verification_method: Vec<VerificationMethod>,
    /// Authentication key references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authentication: Vec<String>,
    /// Key agreement key references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_agreement: Vec<String>,
    /// Assertion method key references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertion_method: Vec<String>,
    /// Capability invocation key references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capability_invocation: Vec<String>,
    /// Capability delegation key references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capability_delegation: Vec<String>,
    /// Service endpoints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<DidCommService>,
}

fn fragment_prefix(purpose: KeyPurpose) -> &'static str {
    match purpose {
        KeyPurpose::Verification => "key",
        KeyPurpose::Encryption => "key-agreement",
        KeyPurpose::Assertion => "assertion",
        KeyPurpose::CapabilityInvocation => "capability-invocation",
        KeyPurpose::CapabilityDelegation => "capability-delegation",
    }
}

impl PeerDidDocument {
    /// Resolve a numalgo 2 peer DID into its DID document.
    pub fn resolve(did: &str) -> Result<Self> {
        let elements = numalgo2::decode(did)?;
        Ok(Self::from_elements(did, &elements))
    }

    /// Build the document for already-decoded elements.
    pub fn from_elements(did: &str, elements: &[Element]) -> Self {
        let mut document = Self {
            context: vec![DID_CONTEXT.to_string()],
            id: did.to_string(),
            verification_method: Vec::new(),
            authentication: Vec::new(),
            key_agreement: Vec::new(),
            assertion_method: Vec::new(),
            capability_invocation: Vec::new(),
            capability_delegation: Vec::new(),
            service: Vec::new(),
        };

        let mut services = Vec::new();
        for element in elements {
            match element {
                Element::Key { purpose, key } => {
                    let relationship = document.relationship_mut(*purpose);
                    let id = format!(
                        "{did}#{}-{}",
                        fragment_prefix(*purpose),
                        relationship.len() + 1
                    );
                    relationship.push(id.clone());
                    document.verification_method.push(VerificationMethod {
                        id,
                        type_: key.key_type().verification_method_type().to_string(),
                        controller: did.to_string(),
                        public_key_multibase: key.fingerprint(),
                    });
                }
                Element::Service(service) => services.push(service),
            }
        }

        // Recipient keys are only known once every key element has been seen
        for (index, service) in services.into_iter().enumerate() {
            let recipient_keys = if service.service_type == DID_COMMUNICATION_TYPE {
                document.authentication.clone()
            } else {
                Vec::new()
            };
            document.service.push(DidCommService {
                id: format!("{did}#service-{index}"),
                type_: service.service_type.clone(),
                service_endpoint: service.endpoint.clone(),
                recipient_keys,
                routing_keys: service.routing_keys.clone(),
                accept: service.accept.clone(),
            });
        }

        document
    }

    /// Key references for one relationship.
    pub fn relationship(&self, purpose: KeyPurpose) -> &[String] {
        match purpose {
            KeyPurpose::Verification => &self.authentication,
            KeyPurpose::Encryption => &self.key_agreement,
            KeyPurpose::Assertion => &self.assertion_method,
            KeyPurpose::CapabilityInvocation => &self.capability_invocation,
            KeyPurpose::CapabilityDelegation => &self.capability_delegation,
        }
    }

    fn relationship_mut(&mut self, purpose: KeyPurpose) -> &mut Vec<String> {
        match purpose {
            KeyPurpose::Verification => &mut self.authentication,
            KeyPurpose::Encryption => &mut self.key_agreement,
            KeyPurpose::Assertion => &mut self.assertion_method,
            KeyPurpose::CapabilityInvocation => &mut self.capability_invocation,
            KeyPurpose::CapabilityDelegation => &mut self.capability_delegation,
        }
    }

    /// Look up a verification method by full id or `#fragment`.
    pub fn verification_method(&self, reference: &str) -> Option<&VerificationMethod> {
        let fragment = reference.split_once('#').map(|(_, f)| f);
        self.verification_method.iter().find(|method| {
            method.id == reference || (fragment.is_some() && method.fragment() == fragment)
        })
    }
}

/// Encode a DID document as a numalgo 2 peer DID.
///
/// Keys are emitted per relationship (authentication, key agreement,
/// assertion, capability invocation, capability delegation) followed by the
/// services in document order.
pub fn encode_document(document: &PeerDidDocument) -> Result<PeerDid> {
    let mut elements = Vec::new();

    for purpose in KeyPurpose::DOCUMENT_ORDER {
        for reference in document.relationship(purpose) {
            let method = document.verification_method(reference).ok_or_else(|| {
                PeerDidError::invalid_key(format!(
                    "relationship references unknown verification method '{reference}'"
                ))
            })?;
            elements.push(Element::Key {
                purpose,
                key: method.public_key()?,
            });
        }
    }

    elements.extend(document.service.iter().map(|service| {
        Element::Service(ServiceElement {
            service_type: service.type_.clone(),
            endpoint: service.service_endpoint.clone(),
            routing_keys: service.routing_keys.clone(),
            accept: service.accept.clone(),
        })
    }));

    numalgo2::encode(&elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did_key::KeyType;

    fn elements() -> Vec<Element> {
        vec![
            Element::Key {
                purpose: KeyPurpose::Verification,
                key: PublicKey::from_bytes(KeyType::Ed25519, &[1; 32]).unwrap(),
            },
            Element::Key {
                purpose: KeyPurpose::Verification,
                key: PublicKey::from_bytes(KeyType::Ed25519, &[2; 32]).unwrap(),
            },
            Element::Key {
                purpose: KeyPurpose::Encryption,
                key: PublicKey::from_bytes(KeyType::X25519, &[3; 32]).unwrap(),
            },
            Element::Service(ServiceElement::new(
                DID_COMMUNICATION_TYPE,
                "https://example.com/endpoint",
            )),
            Element::Service(ServiceElement::new(
                "DIDCommMessaging",
                "wss://example.com/ws",
            )),
        ]
    }

    #[test]
    fn test_fragment_numbering() {
        let did = numalgo2::encode(&elements()).unwrap();
        let doc = PeerDidDocument::resolve(did.as_str()).unwrap();

        assert_eq!(
            doc.authentication,
            vec![format!("{did}#key-1"), format!("{did}#key-2")]
        );
        assert_eq!(doc.key_agreement, vec![format!("{did}#key-agreement-1")]);
        assert_eq!(doc.verification_method.len(), 3);
        assert_eq!(
            doc.verification_method[2].type_,
            "X25519KeyAgreementKey2020"
        );

        assert_eq!(doc.service[0].id, format!("{did}#service-0"));
        assert_eq!(doc.service[1].id, format!("{did}#service-1"));
    }

    #[test]
    fn test_did_communication_lists_authentication_keys() {
        let did = numalgo2::encode(&elements()).unwrap();
        let doc = PeerDidDocument::resolve(did.as_str()).unwrap();

        assert_eq!(doc.service[0].recipient_keys, doc.authentication);
        assert!(doc.service[1].recipient_keys.is_empty());
    }

    #[test]
    fn test_encode_document_roundtrip() {
        let did = numalgo2::encode(&elements()).unwrap();
        let doc = PeerDidDocument::resolve(did.as_str()).unwrap();
        assert_eq!(encode_document(&doc).unwrap(), did);
    }

    #[test]
    fn test_lookup_by_fragment() {
        let did = numalgo2::encode(&elements()).unwrap();
        let doc = PeerDidDocument::resolve(did.as_str()).unwrap();
        let method = doc.verification_method("#key-agreement-1").unwrap();
        assert_eq!(method.public_key().unwrap().key_type(), KeyType::X25519);
        assert!(doc.verification_method("#key-9").is_none());
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let did = numalgo2::encode(&elements()).unwrap();
        let mut doc = PeerDidDocument::resolve(did.as_str()).unwrap();
        doc.authentication.push("#missing".to_string());
        assert!(encode_document(&doc).is_err());
    }

    #[test]
    fn test_document_json_shape() {
        let did = numalgo2::encode(&elements()).unwrap();
        let doc = PeerDidDocument::resolve(did.as_str()).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["@context"][0], DID_CONTEXT);
        assert!(json["verificationMethod"][0]["publicKeyMultibase"]
            .as_str()
            .unwrap()
            .starts_with("z6Mk"));
        assert!(json.get("assertionMethod").is_none());
        assert_eq!(json["service"][1]["serviceEndpoint"], "wss://example.com/ws");
    }
}
