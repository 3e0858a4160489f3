//! Out-of-band records
//!
//! A record wraps one invitation with the lifecycle state this agent keeps for
//! it. States only move forward:
//!
//! ```text
//! Initial -> PrepareResponse -> AwaitResponse -> Done
//! ```
//!
//! Sender records start in `AwaitResponse`; receiver records start in
//! `Initial` and reach `Done` once acceptance has finished.

use crate::error::{OutOfBandError, Result};
use crate::invitation::OutOfBandInvitation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which side of the invitation this agent is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutOfBandRole {
    /// Created the invitation
    Sender,
    /// Received the invitation
    Receiver,
}

impl fmt::Display for OutOfBandRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutOfBandRole::Sender => write!(f, "sender"),
            OutOfBandRole::Receiver => write!(f, "receiver"),
        }
    }
}

/// Lifecycle state, ordered by progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutOfBandState {
    /// Received, not yet accepted
    Initial,
    /// Acceptance in progress
    PrepareResponse,
    /// Created and waiting for receivers
    AwaitResponse,
    /// Finished
    Done,
}

impl fmt::Display for OutOfBandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutOfBandState::Initial => "initial",
            OutOfBandState::PrepareResponse => "prepare-response",
            OutOfBandState::AwaitResponse => "await-response",
            OutOfBandState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Persisted lifecycle wrapper around one invitation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutOfBandRecord {
    /// Record identifier
    pub id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last state change
    pub updated_at: DateTime<Utc>,
    /// Sender or receiver
    pub role: OutOfBandRole,
    /// Lifecycle state
    pub state: OutOfBandState,
    /// The invitation itself
    pub out_of_band_invitation: OutOfBandInvitation,
    /// Routing DID used for the invitation services (sender only)
    pub did: Option<String>,
    /// Mediator providing the routing (sender only)
    pub mediator_id: Option<String>,
    /// Whether the invitation can be used more than once
    pub reusable: bool,
    /// Whether connections from this invitation are accepted automatically
    pub auto_accept_connection: bool,
    /// Connection a handshake-reuse message was sent on (receiver only)
    pub reuse_connection_id: Option<String>,
}

impl OutOfBandRecord {
    /// Create a record for an invitation
    pub fn new(
        role: OutOfBandRole,
        state: OutOfBandState,
        out_of_band_invitation: OutOfBandInvitation,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            role,
            state,
            out_of_band_invitation,
            did: None,
            mediator_id: None,
            reusable: false,
            auto_accept_connection: true,
            reuse_connection_id: None,
        }
    }

    /// Id of the wrapped invitation
    pub fn invitation_id(&self) -> &str {
        &self.out_of_band_invitation.id
    }

    /// Move to `state`, rejecting backward transitions.
    ///
    /// Returns the previous state.
    pub fn transition(&mut self, state: OutOfBandState) -> Result<OutOfBandState> {
        if state < self.state {
            return Err(OutOfBandError::InvalidState {
                record_id: self.id.clone(),
                expected: state,
                actual: self.state,
            });
        }
        let previous = self.state;
        self.state = state;
        self.updated_at = Utc::now();
        Ok(previous)
    }

    /// Fail unless the record is in `expected`
    pub fn assert_state(&self, expected: OutOfBandState) -> Result<()> {
        if self.state != expected {
            return Err(OutOfBandError::InvalidState {
                record_id: self.id.clone(),
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Fail unless the record has `expected` role
    pub fn assert_role(&self, expected: OutOfBandRole) -> Result<()> {
        if self.role != expected {
            return Err(OutOfBandError::InvalidRole {
                record_id: self.id.clone(),
                expected,
                actual: self.role,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: OutOfBandState) -> OutOfBandRecord {
        OutOfBandRecord::new(
            OutOfBandRole::Receiver,
            state,
            OutOfBandInvitation::new(None),
        )
    }

    #[test]
    fn test_forward_transitions() {
        let mut record = record(OutOfBandState::Initial);
        assert_eq!(
            record.transition(OutOfBandState::PrepareResponse).unwrap(),
            OutOfBandState::Initial
        );
        record.transition(OutOfBandState::Done).unwrap();
        assert_eq!(record.state, OutOfBandState::Done);
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn test_backward_transition_rejected() {
        let mut record = record(OutOfBandState::AwaitResponse);
        let err = record.transition(OutOfBandState::PrepareResponse).unwrap_err();
        assert!(matches!(err, OutOfBandError::InvalidState { .. }));
        assert_eq!(record.state, OutOfBandState::AwaitResponse);
    }

    #[test]
    fn test_role_and_state_assertions() {
        let record = record(OutOfBandState::Initial);
        record.assert_role(OutOfBandRole::Receiver).unwrap();
        assert!(matches!(
            record.assert_role(OutOfBandRole::Sender),
            Err(OutOfBandError::InvalidRole { .. })
        ));
        assert!(record.assert_state(OutOfBandState::Done).is_err());
    }

    #[test]
    fn test_state_serde_names() {
        assert_eq!(
            serde_json::to_string(&OutOfBandState::PrepareResponse).unwrap(),
            "\"prepare-response\""
        );
        assert_eq!(OutOfBandState::AwaitResponse.to_string(), "await-response");
    }
}
