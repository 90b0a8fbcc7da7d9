//! Draft model adapter.
//!
//! The environment asks the draft model for two things: a greedy run of
//! candidate tokens and the final hidden state at the last position, which
//! becomes the observation. [`ModelDraft`] provides both on top of any
//! [`CausalLm`].

use candle_core::Tensor;

use crate::error::{Error, Result};
use crate::model::{greedy_next, sequence_hidden_states, CausalLm};

/// Draft-model capabilities the environment relies on.
pub trait DraftModel {
    /// Greedily generates up to `max_new_tokens` tokens after `prompt`.
    fn generate(&mut self, prompt: &[u32], max_new_tokens: usize) -> Result<Vec<u32>>;

    /// Final-layer hidden state at the last position of `prompt`.
    fn hidden_states(&mut self, prompt: &[u32]) -> Result<Vec<f32>>;

    /// Width of the vector returned by [`DraftModel::hidden_states`].
    fn hidden_size(&self) -> usize;

    /// Reseeds any stochastic component. Greedy models have none.
    fn reseed(&mut self, _seed: u64) {}
}

impl<D: DraftModel + ?Sized> DraftModel for Box<D> {
    fn generate(&mut self, prompt: &[u32], max_new_tokens: usize) -> Result<Vec<u32>> {
        (**self).generate(prompt, max_new_tokens)
    }

    fn hidden_states(&mut self, prompt: &[u32]) -> Result<Vec<f32>> {
        (**self).hidden_states(prompt)
    }

    fn hidden_size(&self) -> usize {
        (**self).hidden_size()
    }

    fn reseed(&mut self, seed: u64) {
        (**self).reseed(seed)
    }
}

/// [`DraftModel`] backed by a local [`CausalLm`].
///
/// Every call recomputes the full prefix, so no cache survives between steps.
pub struct ModelDraft<M: CausalLm> {
    model: M,
}

impl<M: CausalLm> ModelDraft<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_inner(self) -> M {
        self.model
    }
}

impl<M: CausalLm> DraftModel for ModelDraft<M> {
    fn generate(&mut self, prompt: &[u32], max_new_tokens: usize) -> Result<Vec<u32>> {
        let mut tokens = prompt.to_vec();
        let mut draft = Vec::with_capacity(max_new_tokens);

        for _ in 0..max_new_tokens {
            let next = greedy_next(&mut self.model, &tokens)
                .map_err(|e| Error::Draft(e.to_string()))?;
            draft.push(next);
            tokens.push(next);
        }

        Ok(draft)
    }

    fn hidden_states(&mut self, prompt: &[u32]) -> Result<Vec<f32>> {
        let hidden = sequence_hidden_states(&mut self.model, prompt)
            .and_then(|h| last_row(&h))
            .map_err(|e| match e {
                Error::HiddenState(msg) => Error::HiddenState(msg),
                other => Error::HiddenState(other.to_string()),
            })?;
        Ok(hidden)
    }

    fn hidden_size(&self) -> usize {
        self.model.hidden_size()
    }
}

fn last_row(hidden: &Tensor) -> Result<Vec<f32>> {
    let seq_len = hidden.dim(0)?;
    Ok(hidden
        .narrow(0, seq_len - 1, 1)?
        .squeeze(0)?
        .to_dtype(candle_core::DType::F32)?
        .to_vec1::<f32>()?)
}
