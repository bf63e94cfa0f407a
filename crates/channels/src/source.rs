use std::{collections::HashMap, sync::Arc};

use {async_trait::async_trait, scrapbook_common::RawMessage, tokio::sync::RwLock};

use crate::Result;

/// Looks up chat messages by id.
///
/// Implementations must be cheap to share across tasks.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Fetch a message. `Ok(None)` means the source is healthy but has no
    /// message with this id.
    async fn fetch_message(&self, message_id: &str) -> Result<Option<RawMessage>>;
}

#[async_trait]
impl<T: MessageSource + ?Sized> MessageSource for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch_message(&self, message_id: &str) -> Result<Option<RawMessage>> {
        (**self).fetch_message(message_id).await
    }
}

/// In-memory message source, used by tests and by connectors that push
/// messages as they arrive.
#[derive(Default)]
pub struct MemorySource {
    messages: RwLock<HashMap<String, RawMessage>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: impl IntoIterator<Item = RawMessage>) -> Self {
        Self {
            messages: RwLock::new(messages.into_iter().map(|m| (m.id.clone(), m)).collect()),
        }
    }

    /// Insert or replace a message.
    pub async fn insert(&self, message: RawMessage) {
        self.messages
            .write()
            .await
            .insert(message.id.clone(), message);
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_message(&self, message_id: &str) -> Result<Option<RawMessage>> {
        Ok(self.messages.read().await.get(message_id).cloned())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_source_returns_inserted_messages() {
        let source = MemorySource::new();
        assert!(source.is_empty().await);
        source.insert(RawMessage::new("1", "first")).await;
        source.insert(RawMessage::new("1", "edited")).await;

        let msg = source.fetch_message("1").await.unwrap().unwrap();
        assert_eq!(msg.content, "edited");
        assert_eq!(source.len().await, 1);
        assert!(source.fetch_message("2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn arc_forwards_to_inner_source() {
        let source: Arc<dyn MessageSource> =
            Arc::new(MemorySource::from_messages([RawMessage::new("7", "hi")]));
        let shared = Arc::clone(&source);
        assert_eq!(shared.name(), "memory");
        assert!(shared.fetch_message("7").await.unwrap().is_some());
    }
}
