//! Model loading utilities.
//!
//! This module provides functions for:
//! - Downloading models from HuggingFace Hub
//! - Loading SafeTensors weights
//! - Parsing `config.json`

use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::{api::sync::Api, Repo, RepoType};
use tracing::info;

use super::llama::{LlamaConfig, LlamaForCausalLM};
use crate::error::{Error, Result};

/// Paths to downloaded model files.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    /// Path to config.json.
    pub config: PathBuf,
    /// Paths to weight files (SafeTensors).
    pub weights: Vec<PathBuf>,
    /// Path to tokenizer.json.
    pub tokenizer: PathBuf,
}

/// Downloads model files from HuggingFace Hub.
///
/// # Arguments
///
/// * `model_id` - HuggingFace model ID (e.g., "JackFram/llama-160m")
/// * `revision` - Git revision (branch, tag, or commit hash). Use "main" for latest.
pub fn download_model(model_id: &str, revision: &str) -> Result<ModelFiles> {
    let api = Api::new().map_err(|e| Error::ModelLoad(format!("Failed to create HF API: {e}")))?;

    let repo = api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    let config = repo
        .get("config.json")
        .map_err(|e| Error::ModelLoad(format!("Failed to download config.json: {e}")))?;
    let weights = download_weights(&repo)?;
    let tokenizer = repo
        .get("tokenizer.json")
        .map_err(|e| Error::ModelLoad(format!("Failed to download tokenizer.json: {e}")))?;

    Ok(ModelFiles {
        config,
        weights,
        tokenizer,
    })
}

/// Downloads a single `model.safetensors` or every shard of a sharded checkpoint.
fn download_weights(repo: &hf_hub::api::sync::ApiRepo) -> Result<Vec<PathBuf>> {
    if let Ok(path) = repo.get("model.safetensors") {
        return Ok(vec![path]);
    }

    let index_path = repo.get("model.safetensors.index.json").map_err(|_| {
        Error::ModelLoad("No SafeTensors weights found (only SafeTensors is supported)".into())
    })?;

    let mut paths = Vec::new();
    for filename in shard_files(&index_path)? {
        let path = repo
            .get(&filename)
            .map_err(|e| Error::ModelLoad(format!("Failed to download {filename}: {e}")))?;
        paths.push(path);
    }
    Ok(paths)
}

/// Unique, sorted shard filenames listed in a `model.safetensors.index.json`.
fn shard_files(index_path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(index_path)
        .map_err(|e| Error::ModelLoad(format!("Failed to read safetensors index: {e}")))?;
    parse_shard_index(&content)
}

fn parse_shard_index(content: &str) -> Result<Vec<String>> {
    let index: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| Error::ModelLoad(format!("Failed to parse safetensors index: {e}")))?;

    let weight_map = index["weight_map"]
        .as_object()
        .ok_or_else(|| Error::ModelLoad("Invalid safetensors index: missing weight_map".into()))?;

    let mut files: Vec<String> = weight_map
        .values()
        .filter_map(|v| v.as_str())
        .map(str::to_string)
        .collect();
    files.sort();
    files.dedup();
    Ok(files)
}

/// Creates a VarBuilder from SafeTensors files.
///
/// # Safety
///
/// Memory-maps the weight files. They must not be modified while the model is alive.
#[allow(unsafe_code)]
pub fn load_safetensors(
    paths: &[PathBuf],
    dtype: DType,
    device: &Device,
) -> Result<VarBuilder<'static>> {
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(paths, dtype, device)? };
    Ok(vb)
}

/// Loads a Llama configuration from config.json.
pub fn load_config(path: &Path) -> Result<LlamaConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::ModelLoad(format!("Failed to read config.json: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::ModelLoad(format!("Failed to parse config.json: {e}")))
}

/// Downloads and builds a model in one go.
pub fn load_model(
    model_id: &str,
    revision: &str,
    dtype: DType,
    device: &Device,
) -> Result<(LlamaForCausalLM, LlamaConfig, ModelFiles)> {
    info!(model = model_id, revision, "loading model");
    let files = download_model(model_id, revision)?;
    let config = load_config(&files.config)?;
    let vb = load_safetensors(&files.weights, dtype, device)?;
    let model = LlamaForCausalLM::new(&config, vb)?;
    info!(
        model = model_id,
        layers = config.num_hidden_layers,
        hidden_size = config.hidden_size,
        "model loaded"
    );
    Ok((model, config, files))
}
