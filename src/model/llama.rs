//! Llama model for causal language modeling.
//!
//! ```text
//! Input Token IDs
//!       │
//!       ▼
//!   Embedding        vocab_size → hidden_size
//!       │
//!       ▼
//!   DecoderLayer  × num_hidden_layers
//!       │
//!       ▼
//!   RMSNorm          final hidden states (what the environment observes)
//!       │
//!       ▼
//!   LM Head          hidden_size → vocab_size
//! ```

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{embedding, linear_no_bias, Embedding, Linear, VarBuilder, VarMap};
use serde::Deserialize;

use super::layers::{DecoderLayer, RmsNorm};
use super::CausalLm;
use crate::error::Result;

/// Llama configuration as found in a HuggingFace `config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct LlamaConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub intermediate_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    /// Defaults to `num_attention_heads` (plain multi-head attention).
    #[serde(default)]
    pub num_key_value_heads: Option<usize>,
    #[serde(default = "default_rms_norm_eps")]
    pub rms_norm_eps: f64,
    #[serde(default = "default_rope_theta")]
    pub rope_theta: f64,
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,
    #[serde(default)]
    pub tie_word_embeddings: bool,
    #[serde(default)]
    pub eos_token_id: Option<EosTokenId>,
}

/// `eos_token_id` is a single id in most configs and a list in some.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EosTokenId {
    Single(u32),
    Multiple(Vec<u32>),
}

fn default_rms_norm_eps() -> f64 {
    1e-6
}

fn default_rope_theta() -> f64 {
    10000.0
}

fn default_max_position_embeddings() -> usize {
    2048
}

impl LlamaConfig {
    pub fn num_kv_heads(&self) -> usize {
        self.num_key_value_heads.unwrap_or(self.num_attention_heads)
    }

    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }

    /// First end-of-sequence id, if the config declares one.
    pub fn eos_token(&self) -> Option<u32> {
        match &self.eos_token_id {
            Some(EosTokenId::Single(id)) => Some(*id),
            Some(EosTokenId::Multiple(ids)) => ids.first().copied(),
            None => None,
        }
    }

    /// Tiny configuration for tests.
    pub fn tiny(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            hidden_size: 32,
            intermediate_size: 64,
            num_hidden_layers: 2,
            num_attention_heads: 4,
            num_key_value_heads: Some(2),
            rms_norm_eps: 1e-6,
            rope_theta: 10000.0,
            max_position_embeddings: 128,
            tie_word_embeddings: false,
            eos_token_id: None,
        }
    }
}

/// Llama model with language model head.
#[derive(Debug, Clone)]
pub struct LlamaForCausalLM {
    embed_tokens: Embedding,
    layers: Vec<DecoderLayer>,
    norm: RmsNorm,
    lm_head: Linear,
    hidden_size: usize,
    device: Device,
    dtype: DType,
}

impl LlamaForCausalLM {
    /// Builds the model from HF-named weights (`model.layers.{i}...`, `lm_head`).
    pub fn new(config: &LlamaConfig, vb: VarBuilder) -> Result<Self> {
        let embed_tokens = embedding(
            config.vocab_size,
            config.hidden_size,
            vb.pp("model.embed_tokens"),
        )?;

        let layers = (0..config.num_hidden_layers)
            .map(|i| DecoderLayer::new(config, vb.pp(format!("model.layers.{i}"))))
            .collect::<candle_core::Result<Vec<_>>>()?;

        let norm = RmsNorm::new(config.hidden_size, config.rms_norm_eps, vb.pp("model.norm"))?;

        let lm_head = if config.tie_word_embeddings {
            Linear::new(embed_tokens.embeddings().clone(), None)
        } else {
            linear_no_bias(config.hidden_size, config.vocab_size, vb.pp("lm_head"))?
        };

        Ok(Self {
            embed_tokens,
            layers,
            norm,
            lm_head,
            hidden_size: config.hidden_size,
            device: vb.device().clone(),
            dtype: vb.dtype(),
        })
    }

    /// Creates a model with freshly initialised weights.
    pub fn new_random(config: &LlamaConfig, dtype: DType, device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, dtype, device);
        Self::new(config, vb)
    }

    /// Logits for the last position of each sequence: [batch, vocab_size].
    pub fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let hidden = self.forward_hidden(input_ids)?;
        let seq_len = hidden.dim(1)?;
        let last = hidden.narrow(1, seq_len - 1, 1)?.squeeze(1)?;
        Ok(self.lm_head.forward(&last)?)
    }

    /// Final (post-norm) hidden states: [batch, seq_len, hidden_size].
    pub fn forward_hidden(&self, input_ids: &Tensor) -> Result<Tensor> {
        let mut hidden = self.embed_tokens.forward(input_ids)?;
        for layer in &self.layers {
            hidden = layer.forward(&hidden)?;
        }
        Ok(self.norm.forward(&hidden)?)
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }
}

impl CausalLm for LlamaForCausalLM {
    fn hidden_states(&mut self, input_ids: &Tensor) -> Result<Tensor> {
        self.forward_hidden(input_ids)
    }

    fn project(&self, hidden: &Tensor) -> Result<Tensor> {
        Ok(self.lm_head.forward(hidden)?)
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn device(&self) -> &Device {
        &self.device
    }
}
