//! In-process verifier backed by a [`CausalLm`].

use tracing::debug;

use super::{Completion, StopReason, Verifier};
use crate::config::SamplingConfig;
use crate::error::{Error, Result};
use crate::model::{greedy_next, CausalLm};

/// Runs the large model locally with greedy decoding.
///
/// Stands in for the remote worker in tests and single-machine runs. Only
/// deterministic sampling is supported: temperature 0 and one sample per
/// prompt.
pub struct LocalVerifier<M: CausalLm> {
    model: M,
    /// Generation stops with [`StopReason::Stop`] after this token.
    eos_token_id: Option<u32>,
    /// Total prompts served.
    num_prompts: usize,
    /// Total `generate` calls.
    num_calls: usize,
}

impl<M: CausalLm> LocalVerifier<M> {
    pub fn new(model: M, eos_token_id: Option<u32>) -> Self {
        Self {
            model,
            eos_token_id,
            num_prompts: 0,
            num_calls: 0,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn num_calls(&self) -> usize {
        self.num_calls
    }

    pub fn num_prompts(&self) -> usize {
        self.num_prompts
    }

    fn complete(&mut self, prompt: &[u32], max_tokens: usize) -> Result<Completion> {
        let mut tokens = prompt.to_vec();
        let mut generated = Vec::with_capacity(max_tokens);

        while generated.len() < max_tokens {
            let next = greedy_next(&mut self.model, &tokens)
                .map_err(|e| Error::Verifier(e.to_string()))?;
            generated.push(next);
            if Some(next) == self.eos_token_id {
                return Ok(Completion::new(generated, StopReason::Stop));
            }
            tokens.push(next);
        }

        Ok(Completion::new(generated, StopReason::Length))
    }
}

impl<M: CausalLm> Verifier for LocalVerifier<M> {
    fn generate(
        &mut self,
        prompts: &[Vec<u32>],
        sampling: &SamplingConfig,
    ) -> Result<Vec<Completion>> {
        if !sampling.is_greedy() {
            return Err(Error::Config(format!(
                "local verifier only supports greedy decoding (temperature = {}, num_samples = {})",
                sampling.temperature, sampling.num_samples
            )));
        }

        self.num_calls += 1;
        self.num_prompts += prompts.len();
        debug!(
            prompts = prompts.len(),
            max_tokens = sampling.max_tokens,
            "local verifier batch"
        );

        prompts
            .iter()
            .map(|prompt| self.complete(prompt, sampling.max_tokens))
            .collect()
    }
}
