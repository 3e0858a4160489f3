//! Property-Based Tests for the numalgo 2 codec
//!
//! ## Properties Verified
//!
//! - Decode inverts encode: decode(encode(e)) = e whenever encode succeeds
//! - Encode refuses exactly the lists holding a literal `dm` service type
//! - Encode inverts decode on canonical identifiers: encode(decode(id)) = id
//! - Encoding is deterministic
//! - Document resolution followed by re-encoding reproduces identifiers whose
//!   keys are already in relationship order

use didlink_peer_did::document::{encode_document, PeerDidDocument};
use didlink_peer_did::{
    decode, encode, service_to_peer_did, Element, KeyPurpose, PeerDid, PeerDidError,
};
use didlink_testkit::strategies::{arb_elements, arb_legacy_service, proptest};
use proptest::prelude::*;

fn has_reserved_service_type(elements: &[Element]) -> bool {
    elements
        .iter()
        .any(|e| matches!(e, Element::Service(s) if s.service_type == "dm"))
}

/// Encode lists that avoid the reserved type; discard the rest
fn encodable(elements: &[Element]) -> Result<PeerDid, TestCaseError> {
    encode(elements).map_err(|e| TestCaseError::reject(e.to_string()))
}

// ============================================================================
// Codec Laws
// ============================================================================

proptest! {
    /// Property: decoding an encoded element list yields the same list, and
    /// only lists with a literal `dm` service type are refused
    #[test]
    fn prop_decode_inverts_encode(elements in arb_elements()) {
        match encode(&elements) {
            Ok(did) => {
                prop_assert!(!has_reserved_service_type(&elements));
                prop_assert_eq!(decode(did.as_str()).unwrap(), elements);
            }
            Err(err) => {
                prop_assert!(has_reserved_service_type(&elements));
                let is_reserved = matches!(err, PeerDidError::ReservedServiceType { .. });
                prop_assert!(is_reserved);
            }
        }
    }

    /// Property: re-encoding a decoded identifier is byte-identical
    #[test]
    fn prop_encode_inverts_decode(elements in arb_elements()) {
        let did = encodable(&elements)?;
        let decoded = decode(did.as_str()).unwrap();
        let reencoded = encode(&decoded).unwrap();
        prop_assert_eq!(reencoded.as_str(), did.as_str());
    }

    /// Property: encoding is a pure function of the element list
    #[test]
    fn prop_encode_deterministic(elements in arb_elements()) {
        prop_assert_eq!(encodable(&elements)?, encode(&elements).unwrap());
    }

    /// Property: one segment per element after the algorithm tag
    #[test]
    fn prop_segment_count_matches_elements(elements in arb_elements()) {
        let did = encodable(&elements)?;
        let segments = did.as_str().split('.').count() - 1;
        prop_assert_eq!(segments, elements.len());
    }

    /// Property: legacy services yield one key segment per recipient key plus one service
    #[test]
    fn prop_service_to_peer_did_shape(service in arb_legacy_service()) {
        let did = service_to_peer_did(&service).unwrap();
        let elements = decode(did.as_str()).unwrap();
        prop_assert_eq!(elements.len(), service.recipient_keys.len() + 1);

        let is_service = matches!(elements.last(), Some(Element::Service(s)) if s.endpoint == service.endpoint);
        prop_assert!(is_service);
    }
}

// ============================================================================
// Document Resolution
// ============================================================================

proptest! {
    /// Property: resolve then encode_document reproduces the identifier when keys
    /// are grouped in document order
    #[test]
    fn prop_document_roundtrip(elements in arb_elements()) {
        let mut ordered: Vec<Element> = Vec::new();
        for purpose in KeyPurpose::DOCUMENT_ORDER {
            ordered.extend(elements.iter().filter(|e| {
                matches!(e, Element::Key { purpose: p, .. } if *p == purpose)
            }).cloned());
        }
        ordered.extend(elements.iter().filter(|e| matches!(e, Element::Service(_))).cloned());

        let did = encodable(&ordered)?;
        let document = PeerDidDocument::resolve(did.as_str()).unwrap();
        prop_assert_eq!(encode_document(&document).unwrap(), did);
    }
}

// ============================================================================
// Malformed Input
// ============================================================================

#[test]
fn test_single_key_service_has_two_segments() {
    use didlink_peer_did::{KeyType, LegacyService, PublicKey};

    let key = PublicKey::from_bytes(KeyType::Ed25519, &[42; 32]).unwrap();
    let did = service_to_peer_did(&LegacyService {
        recipient_keys: vec![key],
        routing_keys: Vec::new(),
        endpoint: "https://example.com/endpoint".to_string(),
        accept: Vec::new(),
    })
    .unwrap();

    let payload = did.as_str().strip_prefix("did:peer:2.").unwrap();
    assert_eq!(payload.split('.').count(), 2);

    let document = PeerDidDocument::resolve(did.as_str()).unwrap();
    assert_eq!(document.service.len(), 1);
    assert_eq!(
        document.service[0].service_endpoint,
        "https://example.com/endpoint"
    );
}

#[test]
fn test_truncated_identifiers_are_malformed() {
    for did in [
        "did:peer:",
        "did:peer:2.",
        "did:peer:2.S",
        "did:peer:2.Ez6LS",
        "did:peer:2.Vz6Mkhello.",
    ] {
        assert!(decode(did).is_err(), "{did} should not decode");
    }
}
