pub mod chat_backend;
pub mod dataset_catalog;
pub mod title_generator;

pub use chat_backend::{
    ChatBackend, ChatRequest, HttpChatBackend, ResponseStream, StreamChunk, Utf8ChunkDecoder,
};
pub use dataset_catalog::{CatalogError, DatasetCatalog, InMemoryDatasetCatalog};
pub use title_generator::{fallback_title, resolve_title, typing_reveal_duration};
