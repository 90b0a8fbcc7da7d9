//! Model implementations.
//!
//! This module contains:
//! - The [`CausalLm`] seam used by the draft adapter, the local verifier and
//!   the dataset pipeline
//! - A compact Llama implementation (RMSNorm, RoPE, GQA, SwiGLU)
//! - Model loading from HuggingFace

pub mod layers;
pub mod llama;
pub mod loader;

pub use llama::{EosTokenId, LlamaConfig, LlamaForCausalLM};
pub use loader::{download_model, load_config, load_model, load_safetensors, ModelFiles};

use candle_core::{DType, Device, Tensor, D};

use crate::error::{Error, Result};

/// A causal language model that exposes its final hidden states.
pub trait CausalLm {
    /// Final-layer hidden states: [batch, seq_len, hidden_size].
    fn hidden_states(&mut self, input_ids: &Tensor) -> Result<Tensor>;

    /// Projects hidden states to vocabulary logits.
    fn project(&self, hidden: &Tensor) -> Result<Tensor>;

    /// Width of one hidden-state vector.
    fn hidden_size(&self) -> usize;

    fn device(&self) -> &Device;
}

/// Runs `model` over `tokens` and returns the hidden states [seq_len, hidden_size].
pub fn sequence_hidden_states<M: CausalLm + ?Sized>(model: &mut M, tokens: &[u32]) -> Result<Tensor> {
    if tokens.is_empty() {
        return Err(Error::HiddenState("empty token sequence".into()));
    }
    let input_ids = Tensor::new(tokens, model.device())?.unsqueeze(0)?;
    Ok(model.hidden_states(&input_ids)?.squeeze(0)?)
}

/// Greedy (argmax) prediction at every row of `hidden` [seq_len, hidden_size].
pub fn greedy_predictions<M: CausalLm + ?Sized>(model: &M, hidden: &Tensor) -> Result<Vec<u32>> {
    let logits = model.project(hidden)?;
    Ok(logits.argmax(D::Minus1)?.to_vec1::<u32>()?)
}

/// Greedy next token after `tokens`.
pub fn greedy_next<M: CausalLm + ?Sized>(model: &mut M, tokens: &[u32]) -> Result<u32> {
    let hidden = sequence_hidden_states(model, tokens)?;
    let last = hidden.narrow(0, hidden.dim(0)? - 1, 1)?;
    let predictions = greedy_predictions(&*model, &last)?;
    Ok(predictions[0])
}

/// Copies a hidden-state tensor to host memory as f32 rows.
pub fn to_host_rows(hidden: &Tensor) -> Result<Vec<Vec<f32>>> {
    Ok(hidden.to_dtype(DType::F32)?.to_vec2::<f32>()?)
}
