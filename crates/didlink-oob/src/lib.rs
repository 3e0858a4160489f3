//! Didlink Out-of-Band Protocol
//!
//! This crate bootstraps DIDComm connections from out-of-band invitations
//! (URLs, QR codes, deep links) without a central server.
//!
//! # Architecture
//!
//! - `invitation` / `legacy` / `url` - invitation model, connections 1.0
//!   conversion and the `oob` / `c_i` / `d_m` link formats
//! - `record` / `store` - lifecycle records and their persistence
//! - `effects` - routing, connection and outbound collaborators
//! - `registry` - message type parsing and handler dispatch
//! - `engine` - creation, receipt, negotiation and attached-message release
//! - `reuse` - handshake-reuse responders registered by the engine
//!
//! # Design Principles
//!
//! - Collaborators are passed in explicitly; there is no global registry
//! - Only the engine and its responders change record state, only forward
//! - Attached messages leave through an explicit channel, never a callback
//! - Existing connections are found by the peer DID derived from each
//!   invitation service

#![forbid(unsafe_code)]

pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod events;
pub mod invitation;
pub mod legacy;
pub mod messages;
pub mod protocol;
pub mod record;
pub mod registry;
pub mod reuse;
pub mod store;
pub mod url;

pub use config::OutOfBandConfig;
pub use effects::{
    AcceptOutOfBandParams, ConnectionEffects, ConnectionRecord, ConnectionState, EffectError,
    OutboundEffects, OutboundMessage, Routing, RoutingConstraints, RoutingEffects, WaitError,
};
pub use engine::{
    AcceptInvitationConfig, AcceptedInvitation, CreateInvitationConfig, OutOfBandCollaborators,
    OutOfBandEngine, ReceiveInvitationConfig,
};
pub use error::{OutOfBandError, Result};
pub use events::{OutOfBandEvent, ReceivedMessage};
pub use invitation::{InlineService, OutOfBandInvitation, OutOfBandService};
pub use legacy::{
    convert_connectionless_to_oob, convert_to_legacy_invitation, convert_to_oob_invitation,
    ConnectionInvitation,
};
pub use messages::{AgentMessage, ServiceDecorator};
pub use protocol::HandshakeProtocol;
pub use record::{OutOfBandRecord, OutOfBandRole, OutOfBandState};
pub use registry::{DispatchRegistry, HandlerRegistry, InboundMessageContext, MessageHandler};
pub use store::{MemoryOutOfBandStore, OutOfBandRepository};
pub use self::url::parse_invitation;
