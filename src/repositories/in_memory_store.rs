use std::collections::HashMap;

use parking_lot::Mutex;
use std::sync::Arc;

use super::conversation_store::{
    apply_update, BoxFuture, ConversationRecord, ConversationStore, ConversationUpdate,
};
use super::error::{RepositoryError, RepositoryResult};

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: Arc<Mutex<HashMap<String, ConversationRecord>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn create(&self, title: Option<String>, project_id: Option<String>)
        -> BoxFuture<'static, RepositoryResult<ConversationRecord>> {
        let conversations = self.conversations.clone();

        Box::pin(async move {
            let record = ConversationRecord::new(title, project_id);
            conversations.lock().insert(record.id.clone(), record.clone());
            Ok(record)
        })
    }

    fn update(&self, id: &str, update: ConversationUpdate)
        -> BoxFuture<'static, RepositoryResult<ConversationRecord>> {
        let conversations = self.conversations.clone();
        let id = id.to_string();

        Box::pin(async move {
            let mut conversations = conversations.lock();
            let record = conversations
                .get_mut(&id)
                .ok_or(RepositoryError::NotFoundError { id })?;
            apply_update(record, update);
            Ok(record.clone())
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let conversations = self.conversations.clone();
        let id = id.to_string();

        Box::pin(async move {
            conversations.lock().remove(&id);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'static, RepositoryResult<Vec<ConversationRecord>>> {
        let conversations = self.conversations.clone();

        Box::pin(async move {
            let mut records: Vec<ConversationRecord> =
                conversations.lock().values().cloned().collect();
            records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(records)
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'static, RepositoryResult<ConversationRecord>> {
        let conversations = self.conversations.clone();
        let id = id.to_string();

        Box::pin(async move {
            conversations
                .lock()
                .get(&id)
                .cloned()
                .ok_or(RepositoryError::NotFoundError { id })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    #[tokio::test]
    async fn test_crud_cycle() {
        let store = InMemoryConversationStore::new();
        let record = store.create(None, None).await.unwrap();

        store
            .update(
                &record.id,
                ConversationUpdate::messages(vec![Message::user("hi", None)]),
            )
            .await
            .unwrap();
        let loaded = store.load(&record.id).await.unwrap();
        assert_eq!(loaded.messages.len(), 1);

        store.delete(&record.id).await.unwrap();
        let err = store.load(&record.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFoundError { .. }));
    }
}
