use thiserror::Error;

#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Conversation not found: {id}")]
    NotFoundError { id: String },

    #[error("Repository initialization failed: {message}")]
    InitializationError { message: String },
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
