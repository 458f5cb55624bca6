use std::future::Future;
use std::pin::Pin;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::RepositoryResult;
use crate::models::Message;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Title given to a conversation created lazily on first send, before the
/// generated title arrives.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Persisted form of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: String,
    pub title: String,
    /// Workspace the conversation belongs to, when the app runs with
    /// project scoping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub messages: Vec<Message>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ConversationRecord {
    pub fn new(title: Option<String>, project_id: Option<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: new_conversation_id(),
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            project_id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields of a record that a single update may touch.
#[derive(Debug, Clone, Default)]
pub struct ConversationUpdate {
    pub title: Option<String>,
    pub messages: Option<Vec<Message>>,
    pub project_id: Option<String>,
}

impl ConversationUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Some(messages),
            ..Self::default()
        }
    }
}

/// Persistence seam for conversations.
pub trait ConversationStore: Send + Sync + 'static {
    /// Create and persist a fresh conversation; `None` title means the
    /// default.
    fn create(&self, title: Option<String>, project_id: Option<String>)
        -> BoxFuture<'static, RepositoryResult<ConversationRecord>>;

    /// Apply an update to an existing conversation, bumping `updated_at`.
    fn update(&self, id: &str, update: ConversationUpdate)
        -> BoxFuture<'static, RepositoryResult<ConversationRecord>>;

    fn delete(&self, id: &str) -> BoxFuture<'static, RepositoryResult<()>>;

    /// All conversations, most recently updated first.
    fn list(&self) -> BoxFuture<'static, RepositoryResult<Vec<ConversationRecord>>>;

    fn load(&self, id: &str) -> BoxFuture<'static, RepositoryResult<ConversationRecord>>;
}

fn new_conversation_id() -> String {
    format!("conv_{}", Uuid::new_v4().simple())
}

pub(super) fn apply_update(record: &mut ConversationRecord, update: ConversationUpdate) {
    if let Some(title) = update.title {
        record.title = title;
    }
    if let Some(messages) = update.messages {
        record.messages = messages;
    }
    if let Some(project_id) = update.project_id {
        record.project_id = Some(project_id);
    }
    record.updated_at = Utc::now().timestamp_millis();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let record = ConversationRecord::new(None, Some("proj_1".to_string()));
        assert!(record.id.starts_with("conv_"));
        assert_eq!(record.title, DEFAULT_TITLE);
        assert_eq!(record.project_id.as_deref(), Some("proj_1"));
        assert!(record.messages.is_empty());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_apply_update_touches_only_named_fields() {
        let mut record = ConversationRecord::new(None, None);
        let created = record.created_at;
        apply_update(&mut record, ConversationUpdate::title("Cluster comparison"));
        assert_eq!(record.title, "Cluster comparison");
        assert!(record.messages.is_empty());
        assert_eq!(record.created_at, created);
        assert!(record.updated_at >= created);
    }

    #[test]
    fn test_record_json_omits_missing_project() {
        let record = ConversationRecord::new(None, None);
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("projectId").is_none());
        assert!(value.get("createdAt").is_some());
    }
}
