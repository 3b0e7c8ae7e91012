//! In-memory relay outbox for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{ChannelId, MessageRef};

use crate::relay_outbox::{OutboxEntry, OutboxTarget, RelayOutbox};

/// Keeps outbox entries in a vector, in write order.
#[derive(Debug, Default)]
pub struct InMemoryRelayOutbox {
    entries: Mutex<Vec<OutboxEntry>>,
}

impl InMemoryRelayOutbox {
    /// Every entry written so far, deleted ones included.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn entries(&self) -> Vec<OutboxEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayOutbox for InMemoryRelayOutbox {
    async fn append(&self, entry: &OutboxEntry) -> Result<(), DomainError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn edit(&self, reference: &MessageRef, body: &str) -> Result<bool, DomainError> {
        let mut entries = self.entries.lock().unwrap();
        match entries
            .iter_mut()
            .find(|e| &e.reference == reference && !e.deleted)
        {
            Some(entry) => {
                body.clone_into(&mut entry.body);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_deleted(&self, reference: &MessageRef) -> Result<bool, DomainError> {
        let mut entries = self.entries.lock().unwrap();
        match entries
            .iter_mut()
            .find(|e| &e.reference == reference && !e.deleted)
        {
            Some(entry) => {
                entry.deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find(&self, reference: &MessageRef) -> Result<Option<OutboxEntry>, DomainError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| &e.reference == reference)
            .cloned())
    }

    async fn list_channel(&self, channel: &ChannelId) -> Result<Vec<OutboxEntry>, DomainError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !e.deleted && e.target == OutboxTarget::Channel(channel.clone()))
            .cloned()
            .collect())
    }
}
