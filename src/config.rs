//! Configuration types for draftsman.

use serde::{Deserialize, Serialize};

use crate::dataset::DatasetType;
use crate::error::{Error, Result};

/// Sampling configuration sent along with every verifier request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Temperature for sampling (0.0 = greedy).
    pub temperature: f32,
    /// Maximum new tokens to generate per prompt.
    pub max_tokens: usize,
    /// Number of samples per prompt.
    pub num_samples: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self::verification()
    }
}

impl SamplingConfig {
    /// Deterministic one-token continuation used to verify draft tokens.
    pub fn verification() -> Self {
        Self::greedy(1)
    }

    /// Deterministic greedy decoding of up to `max_tokens` tokens.
    pub fn greedy(max_tokens: usize) -> Self {
        Self {
            temperature: 0.0,
            max_tokens,
            num_samples: 1,
        }
    }

    /// Whether this configuration decodes deterministically.
    pub fn is_greedy(&self) -> bool {
        self.temperature == 0.0 && self.num_samples == 1
    }
}

/// Configuration for the offline acceptance dataset pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Prompt length in tokens. Shorter prompts are skipped, longer ones truncated.
    pub prompt_tokens: usize,
    /// Tokens the main model generates after each prompt.
    pub generation_tokens: usize,
    /// Number of examples to write.
    pub num_examples: usize,
    /// Prompts per verifier call.
    pub batch_size: usize,
    /// Rows buffered before a record batch is flushed to disk.
    pub writeback_interval: usize,
    /// Index of the first source item to read.
    pub offset: usize,
    /// Layout of the source JSON items.
    pub dataset_type: DatasetType,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prompt_tokens: 256,
            generation_tokens: 256,
            num_examples: 10_000,
            batch_size: 16,
            writeback_interval: 1000,
            offset: 0,
            dataset_type: DatasetType::ShareGpt,
        }
    }
}

impl PipelineConfig {
    /// Checks that every size parameter is non-zero.
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("prompt_tokens", self.prompt_tokens),
            ("generation_tokens", self.generation_tokens),
            ("batch_size", self.batch_size),
            ("writeback_interval", self.writeback_interval),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_sampling() {
        let sp = SamplingConfig::verification();
        assert_eq!(sp.temperature, 0.0);
        assert_eq!(sp.max_tokens, 1);
        assert_eq!(sp.num_samples, 1);
        assert!(sp.is_greedy());
    }

    #[test]
    fn test_pipeline_defaults_validate() {
        let config = PipelineConfig::default();
        assert_eq!(config.prompt_tokens, 256);
        assert_eq!(config.batch_size, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_rejects_zero_batch() {
        let config = PipelineConfig {
            batch_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("batch_size"));
    }
}
