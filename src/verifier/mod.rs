//! Verifier service seam.
//!
//! The verifier is the large model whose greedy output is ground truth. In
//! production it is an out-of-process worker. The environment only needs a
//! single batched "generate continuation" call, so it is injected as a
//! [`Verifier`] implementation. [`LocalVerifier`] runs an in-process
//! [`CausalLm`](crate::model::CausalLm) behind the same contract.

pub mod local;

pub use local::LocalVerifier;

use crate::config::SamplingConfig;
use crate::error::Result;

/// Why the verifier stopped generating for one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Hit the `max_tokens` cap.
    Length,
    /// Stopped on its own (end-of-sequence token).
    Stop,
}

impl StopReason {
    /// Get the reason name as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Length => "length",
            Self::Stop => "stop",
        }
    }
}

/// Verifier output for a single prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Generated token ids.
    pub token_ids: Vec<u32>,
    /// Why generation ended.
    pub stop_reason: StopReason,
}

impl Completion {
    pub fn new(token_ids: Vec<u32>, stop_reason: StopReason) -> Self {
        Self {
            token_ids,
            stop_reason,
        }
    }

    /// First generated token, if any.
    pub fn first_token(&self) -> Option<u32> {
        self.token_ids.first().copied()
    }
}

/// Batched deterministic continuation by the large model.
///
/// One call is one round trip: all prompts of a step go out together and
/// the call blocks until every continuation is available. The reply holds
/// exactly one [`Completion`] per prompt, in prompt order.
pub trait Verifier {
    fn generate(
        &mut self,
        prompts: &[Vec<u32>],
        sampling: &SamplingConfig,
    ) -> Result<Vec<Completion>>;
}

impl<V: Verifier + ?Sized> Verifier for Box<V> {
    fn generate(
        &mut self,
        prompts: &[Vec<u32>],
        sampling: &SamplingConfig,
    ) -> Result<Vec<Completion>> {
        (**self).generate(prompts, sampling)
    }
}
