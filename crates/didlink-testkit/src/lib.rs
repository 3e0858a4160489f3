//! Shared fixtures for didlink tests
//!
//! Every didlink test that needs more than one party builds it from here.
//! A [`TestAgent`] is an out-of-band engine wired to in-memory routing,
//! connection and outbound collaborators, so an inviter and an invitee can
//! live in the same test and hand messages to each other directly. Keys come
//! from fixed seeds, which keeps invitation services and derived peer DIDs
//! stable between runs. The `strategies` module feeds the codec property tests.
//!
//! ```rust,ignore
//! use didlink_oob::{CreateInvitationConfig, ReceiveInvitationConfig};
//! use didlink_testkit::TestAgent;
//!
//! #[tokio::test]
//! async fn alice_accepts_faber() {
//!     let faber = TestAgent::new("Faber", 1);
//!     let alice = TestAgent::new("Alice", 2);
//!
//!     let record = faber.engine.create_invitation(CreateInvitationConfig::default()).await.unwrap();
//!     alice
//!         .engine
//!         .receive_invitation(record.out_of_band_invitation, ReceiveInvitationConfig::default())
//!         .await
//!         .unwrap();
//! }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod agent;
pub mod effects;
pub mod handlers;
pub mod keys;
pub mod strategies;

// Re-export commonly used items
pub use agent::{TestAgent, TestAgentBuilder};
pub use effects::{InMemoryConnections, RecordingOutbound, StaticRouting};
pub use handlers::{
    basic_message, StubHandler, BASIC_MESSAGE_TYPE, CONNECTIONS_REQUEST_TYPE,
    DIDEXCHANGE_REQUEST_TYPE,
};
pub use keys::{test_agreement_key, test_did_key, test_public_key, KeyTestFixture};

/// Install a test tracing subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
