//! Property test strategies for didlink types
//!
//! Keys are built from arbitrary bytes; no strategy depends on key validity
//! beyond length.

use proptest::prelude::*;

// Re-export proptest for convenience
pub use proptest;

use didlink_peer_did::{Element, KeyPurpose, KeyType, LegacyService, PublicKey, ServiceElement};

/// Strategy for Ed25519 and X25519 public keys
pub fn arb_public_key() -> impl Strategy<Value = PublicKey> {
    (
        prop_oneof![Just(KeyType::Ed25519), Just(KeyType::X25519)],
        any::<[u8; 32]>(),
    )
        .prop_map(|(key_type, bytes)| PublicKey::from_bytes(key_type, &bytes).unwrap())
}

/// Strategy for key purposes
pub fn arb_key_purpose() -> impl Strategy<Value = KeyPurpose> {
    prop_oneof![
        Just(KeyPurpose::Assertion),
        Just(KeyPurpose::Encryption),
        Just(KeyPurpose::Verification),
        Just(KeyPurpose::CapabilityInvocation),
        Just(KeyPurpose::CapabilityDelegation),
    ]
}

/// Strategy for service endpoints
pub fn arb_endpoint() -> impl Strategy<Value = String> {
    ("[a-z]{1,12}", "[a-z0-9]{0,8}")
        .prop_map(|(host, path)| format!("https://{host}.example/{path}"))
}

/// Strategy for service elements
///
/// Includes the reserved `dm` type, which `encode` must refuse.
pub fn arb_service_element() -> impl Strategy<Value = ServiceElement> {
    (
        prop_oneof![
            Just("did-communication"),
            Just("DIDCommMessaging"),
            Just("DIDCommV2"),
            Just("dm"),
        ],
        arb_endpoint(),
        prop::collection::vec(arb_public_key().prop_map(|k| k.did_key_reference()), 0..3),
        prop::collection::vec(
            prop_oneof![Just("didcomm/aip2;env=rfc19"), Just("didcomm/v2")],
            0..3,
        ),
    )
        .prop_map(|(service_type, endpoint, routing_keys, accept)| ServiceElement {
            service_type: service_type.to_string(),
            endpoint,
            routing_keys,
            accept: accept.into_iter().map(str::to_string).collect(),
        })
}

/// Strategy for a single numalgo 2 element
pub fn arb_element() -> impl Strategy<Value = Element> {
    prop_oneof![
        4 => (arb_key_purpose(), arb_public_key())
            .prop_map(|(purpose, key)| Element::Key { purpose, key }),
        1 => arb_service_element().prop_map(Element::Service),
    ]
}

/// Strategy for non-empty element lists
pub fn arb_elements() -> impl Strategy<Value = Vec<Element>> {
    prop::collection::vec(arb_element(), 1..6)
}

/// Strategy for legacy service descriptors
pub fn arb_legacy_service() -> impl Strategy<Value = LegacyService> {
    (
        prop::collection::vec(
            any::<[u8; 32]>().prop_map(|b| PublicKey::from_bytes(KeyType::Ed25519, &b).unwrap()),
            1..3,
        ),
        prop::collection::vec(arb_public_key().prop_map(|k| k.did_key_reference()), 0..2),
        arb_endpoint(),
    )
        .prop_map(|(recipient_keys, routing_keys, endpoint)| LegacyService {
            recipient_keys,
            routing_keys,
            endpoint,
            accept: Vec::new(),
        })
}
