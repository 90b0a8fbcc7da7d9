//! Environment-interaction contract and the speculative decoding environment.
//!
//! ```text
//! reset() ──► observation
//!    │
//!    ▼
//! step(action) ──► (observation, reward, done, info)   × until done
//! ```

pub mod corpus;
pub mod speculative;

pub use corpus::ConversationCorpus;
pub use speculative::SpeculativeDecodingEnv;

use crate::error::Result;
use crate::speculative::AcceptanceOutcome;

/// Fixed-length observation vector.
pub type Observation = Vec<f32>;

/// Per-step diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepInfo {
    /// Verification result for this step.
    pub outcome: AcceptanceOutcome,
    /// Draft tokens that were requested but not accepted.
    pub wasted: usize,
    /// Tokens actually appended to the buffer (clipped at the length cap).
    pub appended: usize,
}

/// Result of one [`Env::step`].
#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// Discrete-action episodic environment.
pub trait Env {
    /// Starts a new episode and returns its first observation.
    fn reset(&mut self) -> Result<Observation>;

    /// Applies `action` and advances the episode by one step.
    fn step(&mut self, action: usize) -> Result<StepResult>;

    /// Reseeds every stochastic component of the environment.
    fn seed(&mut self, seed: u64);

    /// Length of every observation.
    fn observation_size(&self) -> usize;

    /// Number of discrete actions.
    fn num_actions(&self) -> usize;
}
