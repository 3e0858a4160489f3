//! Out-of-band record storage
//!
//! The engine reads and writes records exclusively through
//! [`OutOfBandRepository`]. [`MemoryOutOfBandStore`] keeps them in process and
//! is what tests and single-process agents use.

use crate::error::{OutOfBandError, Result};
use crate::record::{OutOfBandRecord, OutOfBandRole};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistence interface for out-of-band records
#[async_trait]
pub trait OutOfBandRepository: Send + Sync {
    /// Insert a new record
    async fn save(&self, record: &OutOfBandRecord) -> Result<()>;

    /// Replace an existing record
    async fn update(&self, record: &OutOfBandRecord) -> Result<()>;

    /// Look up a record by id
    async fn find_by_id(&self, record_id: &str) -> Result<Option<OutOfBandRecord>>;

    /// Record whose invitation services carry `recipient_key` (`did:key`)
    async fn find_by_recipient_key(&self, recipient_key: &str) -> Result<Option<OutOfBandRecord>>;

    /// Record whose invitation attaches a message with `message_id`
    async fn find_by_message_id(&self, message_id: &str) -> Result<Option<OutOfBandRecord>>;

    /// Record for `invitation_id` held in `role`
    async fn find_by_invitation_id(
        &self,
        invitation_id: &str,
        role: OutOfBandRole,
    ) -> Result<Option<OutOfBandRecord>>;

    /// Every record
    async fn get_all(&self) -> Result<Vec<OutOfBandRecord>>;

    /// Remove a record
    async fn delete_by_id(&self, record_id: &str) -> Result<()>;

    /// Look up a record by id, failing when it does not exist
    async fn get_by_id(&self, record_id: &str) -> Result<OutOfBandRecord> {
        self.find_by_id(record_id).await?.ok_or_else(|| {
            OutOfBandError::not_found(format!("out-of-band record {record_id}"))
        })
    }
}

#[async_trait]
impl<T: OutOfBandRepository + ?Sized> OutOfBandRepository for Arc<T> {
    async fn save(&self, record: &OutOfBandRecord) -> Result<()> {
        (**self).save(record).await
    }

    async fn update(&self, record: &OutOfBandRecord) -> Result<()> {
        (**self).update(record).await
    }

    async fn find_by_id(&self, record_id: &str) -> Result<Option<OutOfBandRecord>> {
        (**self).find_by_id(record_id).await
    }

    async fn find_by_recipient_key(&self, recipient_key: &str) -> Result<Option<OutOfBandRecord>> {
        (**self).find_by_recipient_key(recipient_key).await
    }

    async fn find_by_message_id(&self, message_id: &str) -> Result<Option<OutOfBandRecord>> {
        (**self).find_by_message_id(message_id).await
    }

    async fn find_by_invitation_id(
        &self,
        invitation_id: &str,
        role: OutOfBandRole,
    ) -> Result<Option<OutOfBandRecord>> {
        (**self).find_by_invitation_id(invitation_id, role).await
    }

    async fn get_all(&self) -> Result<Vec<OutOfBandRecord>> {
        (**self).get_all().await
    }

    async fn delete_by_id(&self, record_id: &str) -> Result<()> {
        (**self).delete_by_id(record_id).await
    }
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<String, OutOfBandRecord>,
}

impl StoreState {
    fn find(&self, predicate: impl Fn(&OutOfBandRecord) -> bool) -> Option<OutOfBandRecord> {
        // Oldest first so lookups are stable when several records match
        self.records
            .values()
            .filter(|record| predicate(record))
            .min_by_key(|record| record.created_at)
            .cloned()
    }
}

/// In-memory record store
#[derive(Debug, Clone, Default)]
pub struct MemoryOutOfBandStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryOutOfBandStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }
}

#[async_trait]
impl OutOfBandRepository for MemoryOutOfBandStore {
    async fn save(&self, record: &OutOfBandRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if state.records.contains_key(&record.id) {
            return Err(OutOfBandError::storage(format!(
                "record {} already exists",
                record.id
            )));
        }
        state.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &OutOfBandRecord) -> Result<()> {
        let mut state = self.state.write().await;
        match state.records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(OutOfBandError::not_found(format!(
                "out-of-band record {}",
                record.id
            ))),
        }
    }

    async fn find_by_id(&self, record_id: &str) -> Result<Option<OutOfBandRecord>> {
        Ok(self.state.read().await.records.get(record_id).cloned())
    }

    async fn find_by_recipient_key(&self, recipient_key: &str) -> Result<Option<OutOfBandRecord>> {
        Ok(self.state.read().await.find(|record| {
            record
                .out_of_band_invitation
                .recipient_keys()
                .iter()
                .any(|key| key == recipient_key)
        }))
    }

    async fn find_by_message_id(&self, message_id: &str) -> Result<Option<OutOfBandRecord>> {
        Ok(self.state.read().await.find(|record| {
            record
                .out_of_band_invitation
                .request_ids()
                .iter()
                .any(|id| id == message_id)
        }))
    }

    async fn find_by_invitation_id(
        &self,
        invitation_id: &str,
        role: OutOfBandRole,
    ) -> Result<Option<OutOfBandRecord>> {
        Ok(self.state.read().await.find(|record| {
            record.role == role && record.invitation_id() == invitation_id
        }))
    }

    async fn get_all(&self) -> Result<Vec<OutOfBandRecord>> {
        let mut records: Vec<_> = self.state.read().await.records.values().cloned().collect();
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }

    async fn delete_by_id(&self, record_id: &str) -> Result<()> {
        self.state
            .write()
            .await
            .records
            .remove(record_id)
            .map(|_| ())
            .ok_or_else(|| OutOfBandError::not_found(format!("out-of-band record {record_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invitation::{InlineService, OutOfBandInvitation, OutOfBandService};
    use crate::messages::AgentMessage;
    use crate::record::OutOfBandState;

    fn sender_record() -> OutOfBandRecord {
        let mut invitation = OutOfBandInvitation::new(Some("Faber".to_string()));
        invitation.services.push(OutOfBandService::Inline(InlineService::new(
            "#inline-0",
            "https://faber.example",
            vec!["did:key:z6MkqRYqQiSgvZQdnBytw86Qbs2ZWUkGv22od935YF4s8M7V".to_string()],
            Vec::new(),
        )));
        let mut message = AgentMessage::new("https://didcomm.org/basicmessage/1.0/message");
        message.id = "message-1".to_string();
        invitation.add_request(message).unwrap();
        OutOfBandRecord::new(OutOfBandRole::Sender, OutOfBandState::AwaitResponse, invitation)
    }

    #[tokio::test]
    async fn test_save_and_lookups() {
        let store = MemoryOutOfBandStore::new();
        let record = sender_record();
        store.save(&record).await.unwrap();

        assert_eq!(store.get_by_id(&record.id).await.unwrap(), record);
        assert_eq!(
            store
                .find_by_recipient_key("did:key:z6MkqRYqQiSgvZQdnBytw86Qbs2ZWUkGv22od935YF4s8M7V")
                .await
                .unwrap(),
            Some(record.clone())
        );
        assert_eq!(
            store.find_by_message_id("message-1").await.unwrap(),
            Some(record.clone())
        );
        assert_eq!(
            store
                .find_by_invitation_id(record.invitation_id(), OutOfBandRole::Sender)
                .await
                .unwrap(),
            Some(record.clone())
        );
        assert!(store
            .find_by_invitation_id(record.invitation_id(), OutOfBandRole::Receiver)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let store = MemoryOutOfBandStore::new();
        assert!(store.get_by_id("nope").await.unwrap_err().is_not_found());
        assert!(store.delete_by_id("nope").await.unwrap_err().is_not_found());
        assert!(store.update(&sender_record()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_save_rejected() {
        let store = MemoryOutOfBandStore::new();
        let record = sender_record();
        store.save(&record).await.unwrap();
        assert!(matches!(
            store.save(&record).await,
            Err(OutOfBandError::Storage { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryOutOfBandStore::new();
        let mut record = sender_record();
        store.save(&record).await.unwrap();

        record.transition(OutOfBandState::Done).unwrap();
        store.update(&record).await.unwrap();
        assert_eq!(
            store.get_by_id(&record.id).await.unwrap().state,
            OutOfBandState::Done
        );

        store.delete_by_id(&record.id).await.unwrap();
        assert!(store.is_empty().await);
    }
}
