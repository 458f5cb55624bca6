pub mod dataset;
pub mod message;
pub mod model_option;

pub use dataset::{describe_for_llm, ActiveDatasets, Dataset};
pub use message::{Message, Role};
pub use model_option::{is_valid_model, model_by_id, ModelOption, AVAILABLE_MODELS};
