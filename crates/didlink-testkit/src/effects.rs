//! In-memory collaborators for the out-of-band engine
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::Mutex`; no lock is held across an `.await`.

use crate::keys::test_public_key;
use async_trait::async_trait;
use didlink_oob::{
    AcceptOutOfBandParams, ConnectionEffects, ConnectionRecord, ConnectionState, EffectError,
    OutOfBandRecord, OutboundEffects, OutboundMessage, Routing, RoutingConstraints,
    RoutingEffects, WaitError,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

// ============================================================================
// Routing
// ============================================================================

/// Routing provider that hands out the same routing on every call
#[derive(Debug)]
pub struct StaticRouting {
    routing: Routing,
    calls: AtomicUsize,
    last_constraints: Mutex<Option<RoutingConstraints>>,
}

impl StaticRouting {
    /// Routing with one endpoint and the deterministic key for `seed`
    pub fn new(seed: u8) -> Self {
        Self::from_routing(Routing {
            did: None,
            recipient_key: test_public_key(seed),
            routing_keys: Vec::new(),
            endpoints: vec![format!("https://agent-{seed}.example/didcomm")],
            mediator_id: None,
        })
    }

    /// Wrap an explicit routing
    pub fn from_routing(routing: Routing) -> Self {
        Self {
            routing,
            calls: AtomicUsize::new(0),
            last_constraints: Mutex::new(None),
        }
    }

    /// The routing returned by every call
    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    /// Number of `get_routing` calls
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Constraints of the most recent call
    pub fn last_constraints(&self) -> Option<RoutingConstraints> {
        self.last_constraints.lock().clone()
    }
}

#[async_trait]
impl RoutingEffects for StaticRouting {
    async fn get_routing(&self, constraints: RoutingConstraints) -> Result<Routing, EffectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_constraints.lock() = Some(constraints);
        Ok(self.routing.clone())
    }
}

// ============================================================================
// Connections
// ============================================================================

type Waiter = oneshot::Sender<Result<ConnectionRecord, WaitError>>;

#[derive(Default)]
struct ConnectionsState {
    connections: Vec<ConnectionRecord>,
    waiters: HashMap<String, Vec<Waiter>>,
    accepted: Vec<AcceptOutOfBandParams>,
}

impl ConnectionsState {
    fn get_mut(&mut self, connection_id: &str) -> Option<&mut ConnectionRecord> {
        self.connections.iter_mut().find(|c| c.id == connection_id)
    }
}

/// Connection collaborator that records handshakes and lets tests drive
/// their completion
pub struct InMemoryConnections {
    initial_state: ConnectionState,
    state: Mutex<ConnectionsState>,
}

impl Default for InMemoryConnections {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryConnections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryConnections")
            .field("initial_state", &self.initial_state)
            .field("connections", &self.state.lock().connections.len())
            .finish()
    }
}

impl InMemoryConnections {
    /// New handshakes start in `RequestSent` and wait for [`Self::complete`]
    pub fn new() -> Self {
        Self::with_initial_state(ConnectionState::RequestSent)
    }

    /// New handshakes complete immediately
    pub fn completing() -> Self {
        Self::with_initial_state(ConnectionState::Completed)
    }

    /// New handshakes start in `state`
    pub fn with_initial_state(state: ConnectionState) -> Self {
        Self {
            initial_state: state,
            state: Mutex::new(ConnectionsState::default()),
        }
    }

    /// Add a connection made outside the engine
    pub fn insert(&self, connection: ConnectionRecord) {
        self.state.lock().connections.push(connection);
    }

    /// Connection by id
    pub fn get(&self, connection_id: &str) -> Option<ConnectionRecord> {
        self.state
            .lock()
            .connections
            .iter()
            .find(|c| c.id == connection_id)
            .cloned()
    }

    /// Every connection, oldest first
    pub fn all(&self) -> Vec<ConnectionRecord> {
        self.state.lock().connections.clone()
    }

    /// Parameters of every handshake started so far
    pub fn accepted(&self) -> Vec<AcceptOutOfBandParams> {
        self.state.lock().accepted.clone()
    }

    /// Callers currently waiting on `connection_id`
    pub fn waiter_count(&self, connection_id: &str) -> usize {
        self.state
            .lock()
            .waiters
            .get(connection_id)
            .map_or(0, Vec::len)
    }

    /// Wait until at least `count` callers wait on `connection_id`
    pub async fn wait_for_waiters(&self, connection_id: &str, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.waiter_count(connection_id) < count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("timed out waiting for connection waiters");
    }

    /// Mark the connection completed and release its waiters
    pub fn complete(&self, connection_id: &str) -> ConnectionRecord {
        let mut state = self.state.lock();
        let connection = state
            .get_mut(connection_id)
            .expect("unknown connection");
        connection.state = ConnectionState::Completed;
        let connection = connection.clone();
        for waiter in state.waiters.remove(connection_id).unwrap_or_default() {
            let _ = waiter.send(Ok(connection.clone()));
        }
        connection
    }

    /// Cancel every wait on the connection without changing its state
    pub fn cancel(&self, connection_id: &str) {
        let waiters = self
            .state
            .lock()
            .waiters
            .remove(connection_id)
            .unwrap_or_default();
        for waiter in waiters {
            let _ = waiter.send(Err(WaitError::Cancelled {
                connection_id: connection_id.to_string(),
            }));
        }
    }

    /// Abandon the connection and fail its waiters
    pub fn fail(&self, connection_id: &str, message: &str) {
        let mut state = self.state.lock();
        if let Some(connection) = state.get_mut(connection_id) {
            connection.state = ConnectionState::Abandoned;
        }
        for waiter in state.waiters.remove(connection_id).unwrap_or_default() {
            let _ = waiter.send(Err(WaitError::Failed {
                connection_id: connection_id.to_string(),
                message: message.to_string(),
            }));
        }
    }
}

#[async_trait]
impl ConnectionEffects for InMemoryConnections {
    async fn accept_out_of_band_invitation(
        &self,
        record: &OutOfBandRecord,
        params: AcceptOutOfBandParams,
    ) -> Result<ConnectionRecord, EffectError> {
        let invitation = &record.out_of_band_invitation;
        let invitation_did = invitation
            .services
            .first()
            .and_then(|service| service.invitation_did().ok());

        let connection = ConnectionRecord {
            id: Uuid::new_v4().to_string(),
            state: self.initial_state,
            thread_id: Some(Uuid::new_v4().to_string()),
            invitation_did,
            out_of_band_id: Some(record.id.clone()),
            protocol: Some(params.protocol),
            their_label: invitation.label.clone(),
            alias: params.alias.clone(),
        };

        let mut state = self.state.lock();
        state.accepted.push(params);
        state.connections.push(connection.clone());
        Ok(connection)
    }

    async fn find_by_invitation_did(&self, did: &str) -> Result<Vec<ConnectionRecord>, EffectError> {
        Ok(self
            .state
            .lock()
            .connections
            .iter()
            .filter(|c| c.invitation_did.as_deref() == Some(did))
            .cloned()
            .collect())
    }

    async fn return_when_is_connected(
        &self,
        connection_id: &str,
    ) -> Result<ConnectionRecord, WaitError> {
        let receiver = {
            let mut state = self.state.lock();
            let connection = state.get_mut(connection_id).cloned().ok_or_else(|| {
                WaitError::Failed {
                    connection_id: connection_id.to_string(),
                    message: "unknown connection".to_string(),
                }
            })?;
            if connection.is_ready() {
                return Ok(connection);
            }
            let (sender, receiver) = oneshot::channel();
            state
                .waiters
                .entry(connection_id.to_string())
                .or_default()
                .push(sender);
            receiver
        };

        receiver.await.unwrap_or_else(|_| {
            Err(WaitError::Cancelled {
                connection_id: connection_id.to_string(),
            })
        })
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// Outbound transport that records every message
#[derive(Debug, Default)]
pub struct RecordingOutbound {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingOutbound {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }

    /// Remove and return the messages sent so far
    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock())
    }
}

#[async_trait]
impl OutboundEffects for RecordingOutbound {
    async fn send_message(&self, outbound: OutboundMessage) -> Result<(), EffectError> {
        tracing::debug!(
            connection_id = %outbound.connection_id,
            message_type = %outbound.message.message_type,
            "Recorded outbound message"
        );
        self.sent.lock().push(outbound);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_connection(id: &str) -> ConnectionRecord {
        ConnectionRecord {
            id: id.to_string(),
            state: ConnectionState::RequestSent,
            thread_id: None,
            invitation_did: Some("did:peer:2.test".to_string()),
            out_of_band_id: None,
            protocol: None,
            their_label: None,
            alias: None,
        }
    }

    #[tokio::test]
    async fn test_complete_releases_waiters() {
        let connections = std::sync::Arc::new(InMemoryConnections::new());
        connections.insert(pending_connection("c1"));

        let waiting = {
            let connections = connections.clone();
            tokio::spawn(async move { connections.return_when_is_connected("c1").await })
        };
        connections.wait_for_waiters("c1", 1).await;
        connections.complete("c1");

        let connection = waiting.await.unwrap().unwrap();
        assert_eq!(connection.state, ConnectionState::Completed);
    }

    #[tokio::test]
    async fn test_cancel_and_fail() {
        let connections = std::sync::Arc::new(InMemoryConnections::new());
        connections.insert(pending_connection("c1"));

        let waiting = {
            let connections = connections.clone();
            tokio::spawn(async move { connections.return_when_is_connected("c1").await })
        };
        connections.wait_for_waiters("c1", 1).await;
        connections.cancel("c1");
        assert!(matches!(
            waiting.await.unwrap(),
            Err(WaitError::Cancelled { .. })
        ));

        let waiting = {
            let connections = connections.clone();
            tokio::spawn(async move { connections.return_when_is_connected("c1").await })
        };
        connections.wait_for_waiters("c1", 1).await;
        connections.fail("c1", "abandoned");
        assert!(matches!(waiting.await.unwrap(), Err(WaitError::Failed { .. })));
        assert_eq!(
            connections.get("c1").unwrap().state,
            ConnectionState::Abandoned
        );
    }

    #[tokio::test]
    async fn test_find_by_invitation_did() {
        let connections = InMemoryConnections::new();
        connections.insert(pending_connection("c1"));
        assert_eq!(
            connections
                .find_by_invitation_did("did:peer:2.test")
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(connections
            .find_by_invitation_did("did:peer:2.other")
            .await
            .unwrap()
            .is_empty());
    }
}
