//! Exact-match verification of draft tokens.
//!
//! The verifier is asked for one greedy token after each of `k + 1` candidate
//! prompts: the prefix, the prefix plus the first draft token, and so on up
//! to the whole draft. Draft token `i` is accepted while it equals the
//! verifier's continuation of candidate `i`. The continuation of the first
//! mismatching candidate (or of the full draft, if everything matched) is the
//! corrective token, so the accepted run is exactly what greedy decoding with
//! the verifier alone would have produced.
//!
//! ```text
//! prefix:      [5, 9, 2]
//! draft:       [9, 7]
//! candidates:  [5, 9, 2] -> 9       draft[0] = 9  accept
//!              [5, 9, 2, 9] -> 3    draft[1] = 7  reject
//!              [5, 9, 2, 9, 7] -> (not needed)
//! appended:    [9, 3]
//! ```

use crate::error::{Error, Result};
use crate::verifier::{Completion, StopReason};

use super::config::EnvConfig;

/// Result of verifying one draft proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptanceOutcome {
    /// Draft tokens that matched the verifier, not counting the corrective token.
    pub accepted: usize,
    /// The verifier's own token after the accepted run.
    pub corrective_token: u32,
    /// The verifier stopped naturally after the corrective token.
    pub finished: bool,
}

impl AcceptanceOutcome {
    /// Draft tokens that were requested but not accepted.
    pub fn wasted_for(&self, action: usize) -> usize {
        action.saturating_sub(self.accepted)
    }

    /// `accepted_weight * accepted - rejected_weight * (action - accepted)`.
    pub fn reward(&self, action: usize, config: &EnvConfig) -> f32 {
        config.accepted_tokens_weight * self.accepted as f32
            - config.rejected_tokens_weight * self.wasted_for(action) as f32
    }

    /// Tokens to append: the accepted draft prefix plus the corrective token.
    pub fn accepted_run(&self, draft: &[u32]) -> Vec<u32> {
        let mut run = Vec::with_capacity(self.accepted + 1);
        run.extend_from_slice(&draft[..self.accepted]);
        run.push(self.corrective_token);
        run
    }
}

/// Builds the `draft.len() + 1` prompts sent to the verifier in one batch.
pub fn candidate_prompts(prefix: &[u32], draft: &[u32]) -> Vec<Vec<u32>> {
    (0..=draft.len())
        .map(|i| {
            let mut prompt = Vec::with_capacity(prefix.len() + i);
            prompt.extend_from_slice(prefix);
            prompt.extend_from_slice(&draft[..i]);
            prompt
        })
        .collect()
}

/// Walks the draft against the verifier's continuations.
///
/// `completions[i]` must be the verifier's reply to `candidate_prompts(..)[i]`.
pub fn count_accepted(draft: &[u32], completions: &[Completion]) -> Result<AcceptanceOutcome> {
    if completions.len() != draft.len() + 1 {
        return Err(Error::Verifier(format!(
            "expected {} completions, got {}",
            draft.len() + 1,
            completions.len()
        )));
    }

    let accepted = draft
        .iter()
        .zip(completions)
        .take_while(|(token, completion)| completion.first_token() == Some(**token))
        .count();

    let corrective = &completions[accepted];
    let corrective_token = corrective.first_token().ok_or_else(|| {
        Error::Verifier(format!("empty completion for candidate {accepted}"))
    })?;

    Ok(AcceptanceOutcome {
        accepted,
        corrective_token,
        finished: corrective.stop_reason != StopReason::Length,
    })
}
