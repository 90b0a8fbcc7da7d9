//! Uniform random baseline agent.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Agent, Metrics};
use crate::error::{Error, Result};
use crate::rollout::Trajectory;

/// Picks every speculation length with equal probability and never learns.
#[derive(Debug, Clone)]
pub struct RandomAgent {
    observation_size: usize,
    num_actions: usize,
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(observation_size: usize, num_actions: usize) -> Self {
        Self {
            observation_size,
            num_actions,
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates an agent with a seeded RNG for reproducibility.
    pub fn with_seed(observation_size: usize, num_actions: usize, seed: u64) -> Self {
        Self {
            observation_size,
            num_actions,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }
}

impl Agent for RandomAgent {
    fn get_action(&mut self, observation: &[f32]) -> Result<usize> {
        if observation.len() != self.observation_size {
            return Err(Error::Config(format!(
                "observation has {} entries, agent expects {}",
                observation.len(),
                self.observation_size
            )));
        }
        if self.num_actions == 0 {
            return Err(Error::Config("agent has no actions".into()));
        }
        Ok(self.rng.gen_range(0..self.num_actions))
    }

    fn update(&mut self, _batch: &Trajectory) -> Result<Metrics> {
        Ok(Metrics::new())
    }
}
