pub mod conversation_json_store;
pub mod conversation_store;
pub mod error;
pub mod in_memory_store;

pub use conversation_json_store::ConversationJsonStore;
pub use conversation_store::{
    BoxFuture, ConversationRecord, ConversationStore, ConversationUpdate, DEFAULT_TITLE,
};
pub use error::{RepositoryError, RepositoryResult};
pub use in_memory_store::InMemoryConversationStore;
