//! Offline acceptance dataset.
//!
//! Turns a JSON chat dataset into a parquet table that records, for every
//! generated position, both models' hidden states and whether the draft's
//! greedy guess matched the main model.

pub mod pipeline;
pub mod text;
pub mod writer;

pub use pipeline::{prepare_dataset, PipelineReport};
pub use text::DatasetType;
pub use writer::{
    acceptance_schema, read_acceptance_records, AcceptanceDatasetWriter, AcceptanceRecord,
};

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};

/// Loads the source dataset: a JSON array of items.
pub fn load_items(path: impl AsRef<Path>) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&content)? {
        Value::Array(items) => Ok(items),
        _ => Err(Error::Dataset(format!(
            "{} does not contain a JSON array",
            path.display()
        ))),
    }
}

/// Text of one item in the given layout.
pub fn collect_text(item: &Value, dataset_type: DatasetType) -> Result<String> {
    dataset_type.collect_text(item)
}
