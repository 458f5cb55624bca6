use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single transcript entry.
///
/// `images` carries data URLs attached by the user; it is omitted from the
/// persisted JSON when absent so stored conversations stay compact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    pub id: String,
    pub created_at: String,
}

impl Message {
    pub fn user(content: impl Into<String>, images: Option<Vec<String>>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images,
            id: new_message_id(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            images: None,
            id: new_message_id(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Same identity and metadata, different content. Used when the
    /// streaming placeholder is replaced by the finalized response.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }
}

fn new_message_id() -> String {
    format!("msg_{}", Uuid::new_v4().simple())
}
