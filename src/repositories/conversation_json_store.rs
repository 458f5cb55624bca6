use std::path::PathBuf;

use tracing::debug;

use super::conversation_store::{
    apply_update, BoxFuture, ConversationRecord, ConversationStore, ConversationUpdate,
};
use super::error::{RepositoryError, RepositoryResult};

/// JSON file-based store for conversations.
/// Stores each conversation as a separate file in ~/.config/cellchat/conversations/
pub struct ConversationJsonStore {
    conversations_dir: PathBuf,
}

impl ConversationJsonStore {
    pub fn new() -> RepositoryResult<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RepositoryError::InitializationError {
                message: "Could not determine config directory".to_string(),
            })?
            .join("cellchat")
            .join("conversations");

        Ok(Self {
            conversations_dir: config_dir,
        })
    }

    /// Store rooted at an explicit directory; used by tests and embedders.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            conversations_dir: dir.into(),
        }
    }

    fn conversation_path(&self, id: &str) -> PathBuf {
        self.conversations_dir.join(format!("{}.json", id))
    }

    async fn write_record(dir: PathBuf, path: PathBuf, record: &ConversationRecord)
        -> RepositoryResult<()> {
        tokio::fs::create_dir_all(&dir).await?;
        let json = serde_json::to_string_pretty(record)?;

        // Write to a temp file, then rename into place.
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, &path).await?;
        debug!(path = %path.display(), "Conversation persisted");
        Ok(())
    }

    async fn read_record(path: PathBuf, id: String) -> RepositoryResult<ConversationRecord> {
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RepositoryError::NotFoundError { id })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl ConversationStore for ConversationJsonStore {
    fn create(&self, title: Option<String>, project_id: Option<String>)
        -> BoxFuture<'static, RepositoryResult<ConversationRecord>> {
        let record = ConversationRecord::new(title, project_id);
        let dir = self.conversations_dir.clone();
        let path = self.conversation_path(&record.id);

        Box::pin(async move {
            Self::write_record(dir, path, &record).await?;
            Ok(record)
        })
    }

    fn update(&self, id: &str, update: ConversationUpdate)
        -> BoxFuture<'static, RepositoryResult<ConversationRecord>> {
        let dir = self.conversations_dir.clone();
        let path = self.conversation_path(id);
        let id = id.to_string();

        Box::pin(async move {
            let mut record = Self::read_record(path.clone(), id).await?;
            apply_update(&mut record, update);
            Self::write_record(dir, path, &record).await?;
            Ok(record)
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.conversation_path(id);

        Box::pin(async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn list(&self) -> BoxFuture<'static, RepositoryResult<Vec<ConversationRecord>>> {
        let dir = self.conversations_dir.clone();

        Box::pin(async move {
            tokio::fs::create_dir_all(&dir).await?;

            let mut conversations = Vec::new();
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|s| s.to_str()) == Some("json") {
                    let content = tokio::fs::read_to_string(&path).await?;
                    let record: ConversationRecord = serde_json::from_str(&content)?;
                    conversations.push(record);
                }
            }

            conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(conversations)
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'static, RepositoryResult<ConversationRecord>> {
        let path = self.conversation_path(id);
        let id = id.to_string();

        Box::pin(async move { Self::read_record(path, id).await })
    }
}
