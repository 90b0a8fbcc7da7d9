//! Speculative decoding environment configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for the speculative decoding environment.
///
/// The agent picks a speculation length in `[0, max_speculation_length)` each
/// step and is rewarded for draft tokens the verifier accepts, minus a penalty
/// for the ones it rejects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Number of discrete actions (speculation lengths `0..max_speculation_length`).
    pub max_speculation_length: usize,

    /// Episode ends once the token buffer reaches this length.
    pub max_tokens: usize,

    /// Reward per accepted draft token.
    pub accepted_tokens_weight: f32,

    /// Penalty per wasted draft token.
    pub rejected_tokens_weight: f32,

    /// Restrict sampling to the first N conversations of the corpus.
    #[serde(default)]
    pub n_conversations: Option<usize>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            max_speculation_length: 8,
            max_tokens: 100,
            accepted_tokens_weight: 1.0,
            rejected_tokens_weight: 1.0,
            n_conversations: None,
        }
    }
}

impl EnvConfig {
    /// Create a config with the given number of actions.
    pub fn new(max_speculation_length: usize) -> Self {
        Self {
            max_speculation_length,
            ..Default::default()
        }
    }

    /// Set the token buffer cap.
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the accepted/rejected reward weights.
    pub fn weights(mut self, accepted: f32, rejected: f32) -> Self {
        self.accepted_tokens_weight = accepted;
        self.rejected_tokens_weight = rejected;
        self
    }

    /// Restrict the sampled corpus prefix.
    pub fn n_conversations(mut self, n: usize) -> Self {
        self.n_conversations = Some(n);
        self
    }

    /// Load a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot run a single step.
    pub fn validate(&self) -> Result<()> {
        if self.max_speculation_length == 0 {
            return Err(Error::Config(
                "max_speculation_length must be at least 1".into(),
            ));
        }
        if self.max_tokens < 2 {
            return Err(Error::Config(format!(
                "max_tokens must be at least 2, got {}",
                self.max_tokens
            )));
        }
        if !self.accepted_tokens_weight.is_finite() || !self.rejected_tokens_weight.is_finite() {
            return Err(Error::Config("reward weights must be finite".into()));
        }
        if self.n_conversations == Some(0) {
            return Err(Error::Config("n_conversations must be positive".into()));
        }
        Ok(())
    }
}
