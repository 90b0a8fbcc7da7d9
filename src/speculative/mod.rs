//! Speculative decoding verification.
//!
//! This module holds the pieces of the speculate-then-verify cycle that do
//! not depend on any model:
//!
//! 1. **Candidate prompts**: the prefix extended by each prefix of the draft.
//!
//! 2. **Acceptance counting**: strict token-id equality between each draft
//!    token and the verifier's greedy continuation of the matching candidate.
//!
//! 3. **Reward shaping**: accepted tokens are rewarded and wasted ones
//!    penalised, weighted by [`EnvConfig`].
//!
//! ## Example
//!
//! ```
//! use draftsman::speculative::{candidate_prompts, count_accepted};
//! use draftsman::verifier::{Completion, StopReason};
//!
//! let prompts = candidate_prompts(&[5, 9, 2], &[9, 7]);
//! assert_eq!(prompts.len(), 3);
//!
//! let completions = vec![
//!     Completion::new(vec![9], StopReason::Length),
//!     Completion::new(vec![3], StopReason::Length),
//!     Completion::new(vec![1], StopReason::Length),
//! ];
//! let outcome = count_accepted(&[9, 7], &completions).unwrap();
//! assert_eq!(outcome.accepted, 1);
//! assert_eq!(outcome.corrective_token, 3);
//! ```

pub mod config;
pub mod verify;

pub use config::EnvConfig;
pub use verify::{candidate_prompts, count_accepted, AcceptanceOutcome};
