//! Trajectory collection.

use tracing::info;

use crate::agent::Agent;
use crate::env::{Env, Observation};
use crate::error::Result;

/// One episode of experience, column-major.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    pub observations: Vec<Observation>,
    pub actions: Vec<usize>,
    pub rewards: Vec<f32>,
    pub next_observations: Vec<Observation>,
    pub dones: Vec<bool>,
    /// Accepted draft tokens per step.
    pub accepted: Vec<usize>,
    /// Wasted draft tokens per step.
    pub wasted: Vec<usize>,
}

/// Summary of one trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeStats {
    pub steps: usize,
    pub total_reward: f32,
    pub accepted: usize,
    pub wasted: usize,
    /// accepted / (accepted + wasted); 0 when nothing was drafted.
    pub acceptance_rate: f64,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn stats(&self) -> EpisodeStats {
        let accepted: usize = self.accepted.iter().sum();
        let wasted: usize = self.wasted.iter().sum();
        let drafted = accepted + wasted;
        EpisodeStats {
            steps: self.len(),
            total_reward: self.rewards.iter().sum(),
            accepted,
            wasted,
            acceptance_rate: if drafted == 0 {
                0.0
            } else {
                accepted as f64 / drafted as f64
            },
        }
    }
}

/// Runs one episode, stopping on `done` or after `max_length` steps.
pub fn sample_trajectory<E, A>(env: &mut E, agent: &mut A, max_length: usize) -> Result<Trajectory>
where
    E: Env + ?Sized,
    A: Agent + ?Sized,
{
    let mut trajectory = Trajectory::default();
    let mut observation = env.reset()?;

    while trajectory.len() < max_length {
        let action = agent.get_action(&observation)?;
        let result = env.step(action)?;

        trajectory.observations.push(observation);
        trajectory.actions.push(action);
        trajectory.rewards.push(result.reward);
        trajectory.next_observations.push(result.observation.clone());
        trajectory.dones.push(result.done);
        trajectory.accepted.push(result.info.outcome.accepted);
        trajectory.wasted.push(result.info.wasted);

        observation = result.observation;
        if result.done {
            break;
        }
    }

    let stats = trajectory.stats();
    info!(
        steps = stats.steps,
        total_reward = stats.total_reward,
        acceptance_rate = stats.acceptance_rate,
        "episode finished"
    );
    Ok(trajectory)
}
