use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::Dataset;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Unsupported file type: {0} (only .h5ad and .json are accepted)")]
    UnsupportedType(String),
    #[error("Invalid JSON dataset: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// The set of datasets known to the app (uploaded this session or listed by
/// the server); the source of mention-dropdown candidates.
pub trait DatasetCatalog: Send + Sync + 'static {
    fn list(&self) -> Vec<Dataset>;

    /// Register an uploaded file. JSON files are parsed for their column
    /// names and rows; `.h5ad` files are tracked by metadata only.
    fn upload(&self, name: &str, content_type: &str, bytes: &[u8]) -> Result<Dataset, CatalogError>;
}

/// Session-local catalog held in memory.
#[derive(Default)]
pub struct InMemoryDatasetCatalog {
    datasets: Mutex<Vec<Dataset>>,
}

impl InMemoryDatasetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_datasets(datasets: Vec<Dataset>) -> Self {
        Self {
            datasets: Mutex::new(datasets),
        }
    }
}

impl DatasetCatalog for InMemoryDatasetCatalog {
    fn list(&self) -> Vec<Dataset> {
        self.datasets.lock().clone()
    }

    fn upload(&self, name: &str, content_type: &str, bytes: &[u8]) -> Result<Dataset, CatalogError> {
        let mut dataset = Dataset::new(name, bytes.len() as u64, content_type);

        if dataset.is_json() {
            let value: serde_json::Value = serde_json::from_slice(bytes)?;
            let rows = match value {
                serde_json::Value::Array(rows) => rows,
                other => vec![other],
            };
            if let Some(serde_json::Value::Object(first)) = rows.first() {
                dataset.columns = first.keys().cloned().collect();
            }
            dataset.rows = rows;
            debug!(
                dataset = %dataset.name,
                columns = dataset.columns.len(),
                rows = dataset.rows.len(),
                "Parsed JSON dataset"
            );
        } else if !dataset.is_h5ad() {
            return Err(CatalogError::UnsupportedType(name.to_string()));
        }

        let mut datasets = self.datasets.lock();
        // Re-uploading a file replaces the earlier entry.
        datasets.retain(|d| d.name != dataset.name);
        datasets.push(dataset.clone());
        info!(dataset = %dataset.name, size = dataset.size, "Dataset registered");
        Ok(dataset)
    }
}
