//! Agents that choose speculation lengths.
//!
//! Training rules are out of scope here; the trait only fixes how an agent
//! plugs into [`rollout`](crate::rollout).

pub mod random;

pub use random::RandomAgent;

use std::collections::BTreeMap;

use crate::error::Result;
use crate::rollout::Trajectory;

/// Named scalar training metrics.
pub type Metrics = BTreeMap<String, f64>;

pub trait Agent {
    /// Picks an action in `[0, num_actions)` for `observation`.
    fn get_action(&mut self, observation: &[f32]) -> Result<usize>;

    /// Learns from a batch of experience.
    fn update(&mut self, batch: &Trajectory) -> Result<Metrics>;
}
