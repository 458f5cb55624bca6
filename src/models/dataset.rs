use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// How many sample rows of a JSON dataset are shown to the model.
const SAMPLE_ROW_LIMIT: usize = 5;

/// An uploaded dataset file. For `.json` uploads the parsed column names and
/// rows are kept alongside the file metadata; `.h5ad` files are tracked by
/// metadata only (binary parsing happens server-side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub last_modified: i64,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<serde_json::Value>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, size: u64, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            content_type: content_type.into(),
            last_modified: chrono::Utc::now().timestamp_millis(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn is_h5ad(&self) -> bool {
        self.name.ends_with(".h5ad")
    }

    pub fn is_json(&self) -> bool {
        self.name.ends_with(".json")
    }
}

/// The set of datasets currently attached to the in-progress conversation.
///
/// Shared between the composer (which inserts/removes mention tokens) and
/// whatever owns the upload pipeline, so it is handle-cloneable and
/// internally locked. Membership is keyed by file name.
#[derive(Clone, Default)]
pub struct ActiveDatasets {
    inner: Arc<RwLock<Vec<Dataset>>>,
}

impl ActiveDatasets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().iter().any(|d| d.name == name)
    }

    /// Insert if no dataset with the same name is present. Returns whether
    /// the set changed.
    pub fn add(&self, dataset: Dataset) -> bool {
        let mut datasets = self.inner.write();
        if datasets.iter().any(|d| d.name == dataset.name) {
            return false;
        }
        datasets.push(dataset);
        true
    }

    /// Remove by name. Returns whether the set changed.
    pub fn remove(&self, name: &str) -> bool {
        let mut datasets = self.inner.write();
        let before = datasets.len();
        datasets.retain(|d| d.name != name);
        datasets.len() != before
    }

    pub fn snapshot(&self) -> Vec<Dataset> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// The first message of a new chat requires one `.h5ad` and one `.json`
    /// dataset to be attached before sending is allowed.
    pub fn has_required_files(&self) -> bool {
        let datasets = self.inner.read();
        datasets.iter().any(|d| d.is_h5ad()) && datasets.iter().any(|d| d.is_json())
    }
}

/// Serialize the active datasets into the plain-text description sent with
/// the first message of a conversation.
pub fn describe_for_llm(datasets: &[Dataset]) -> String {
    if datasets.is_empty() {
        return String::new();
    }

    let descriptions: Vec<String> = datasets
        .iter()
        .map(|dataset| {
            if dataset.is_h5ad() {
                format!("Dataset: {} (H5AD file - single-cell data)", dataset.name)
            } else if dataset.is_json() {
                let sample: Vec<&serde_json::Value> =
                    dataset.rows.iter().take(SAMPLE_ROW_LIMIT).collect();
                format!(
                    "Dataset: {}\nColumns: {}\nSample data: {}",
                    dataset.name,
                    dataset.columns.join(", "),
                    serde_json::to_string_pretty(&sample).unwrap_or_else(|_| "[]".to_string()),
                )
            } else {
                format!("Dataset: {}", dataset.name)
            }
        })
        .collect();

    descriptions.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h5ad(name: &str) -> Dataset {
        Dataset::new(name, 1024, "application/octet-stream")
    }

    fn json_with_rows(name: &str) -> Dataset {
        let mut d = Dataset::new(name, 256, "application/json");
        d.columns = vec!["gene".to_string(), "count".to_string()];
        d.rows = vec![serde_json::json!({"gene": "CD4", "count": 12})];
        d
    }

    #[test]
    fn test_add_is_keyed_by_name() {
        let active = ActiveDatasets::new();
        assert!(active.add(h5ad("cells.h5ad")));
        assert!(!active.add(h5ad("cells.h5ad")));
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn test_remove_by_name() {
        let active = ActiveDatasets::new();
        active.add(h5ad("cells.h5ad"));
        assert!(active.remove("cells.h5ad"));
        assert!(!active.remove("cells.h5ad"));
        assert!(active.is_empty());
    }

    #[test]
    fn test_required_files_gate() {
        let active = ActiveDatasets::new();
        assert!(!active.has_required_files());
        active.add(h5ad("cells.h5ad"));
        assert!(!active.has_required_files());
        active.add(json_with_rows("annotations.json"));
        assert!(active.has_required_files());
    }

    #[test]
    fn test_describe_empty_is_blank() {
        assert_eq!(describe_for_llm(&[]), "");
    }

    #[test]
    fn test_describe_h5ad_layout() {
        let text = describe_for_llm(&[h5ad("pbmc3k.h5ad")]);
        assert_eq!(text, "Dataset: pbmc3k.h5ad (H5AD file - single-cell data)");
    }

    #[test]
    fn test_describe_json_includes_columns_and_sample() {
        let text = describe_for_llm(&[json_with_rows("annotations.json")]);
        assert!(text.starts_with("Dataset: annotations.json\nColumns: gene, count\nSample data:"));
        assert!(text.contains("CD4"));
    }

    #[test]
    fn test_describe_joins_with_blank_line() {
        let text = describe_for_llm(&[h5ad("a.h5ad"), json_with_rows("b.json")]);
        assert!(text.contains("single-cell data)\n\nDataset: b.json"));
    }
}
