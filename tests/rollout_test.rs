//! Integration tests for trajectory collection.

use draftsman::config::SamplingConfig;
use draftsman::env::{ConversationCorpus, Env, SpeculativeDecodingEnv};
use draftsman::rollout::sample_trajectory;
use draftsman::verifier::{Completion, StopReason, Verifier};
use draftsman::{Agent, DraftModel, EnvConfig, PromptEncoder, RandomAgent, Result};

/// Drafts `1, 2, 3, ...`; the hidden state is the prompt length.
struct CountingDraft;

impl DraftModel for CountingDraft {
    fn generate(&mut self, _prompt: &[u32], max_new_tokens: usize) -> Result<Vec<u32>> {
        Ok((1..=max_new_tokens as u32).collect())
    }

    fn hidden_states(&mut self, prompt: &[u32]) -> Result<Vec<f32>> {
        Ok(vec![prompt.len() as f32, 1.0])
    }

    fn hidden_size(&self) -> usize {
        2
    }
}

/// Continues with `prompt.len() % 3 + 1`, so some drafts match and some don't.
struct ModularVerifier;

impl Verifier for ModularVerifier {
    fn generate(
        &mut self,
        prompts: &[Vec<u32>],
        _sampling: &SamplingConfig,
    ) -> Result<Vec<Completion>> {
        Ok(prompts
            .iter()
            .map(|p| Completion::new(vec![p.len() as u32 % 3 + 1], StopReason::Length))
            .collect())
    }
}

struct Ids;

impl PromptEncoder for Ids {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text.split_whitespace().filter_map(|t| t.parse().ok()).collect())
    }
}

fn make_env(max_tokens: usize) -> SpeculativeDecodingEnv<CountingDraft, ModularVerifier, Ids> {
    SpeculativeDecodingEnv::with_seed(
        EnvConfig::new(5).max_tokens(max_tokens),
        ConversationCorpus::from_texts(["7 7", "8 8 8", "9"]),
        CountingDraft,
        ModularVerifier,
        Ids,
        3,
    )
    .unwrap()
}

#[test]
fn test_trajectory_runs_to_done() {
    let mut env = make_env(30);
    let mut agent = RandomAgent::with_seed(env.observation_size(), env.num_actions(), 11);

    let trajectory = sample_trajectory(&mut env, &mut agent, 1000).unwrap();

    let n = trajectory.len();
    assert!(n > 0);
    assert_eq!(trajectory.observations.len(), n);
    assert_eq!(trajectory.rewards.len(), n);
    assert_eq!(trajectory.next_observations.len(), n);
    assert_eq!(trajectory.dones.len(), n);
    assert_eq!(trajectory.dones.last(), Some(&true));
    assert!(trajectory.dones[..n - 1].iter().all(|&d| !d));
    assert_eq!(env.tokens().len(), 30);

    // Each next observation is the following step's observation.
    for i in 0..n - 1 {
        assert_eq!(trajectory.next_observations[i], trajectory.observations[i + 1]);
    }
    for (i, &action) in trajectory.actions.iter().enumerate() {
        assert!(action < 5);
        assert_eq!(trajectory.accepted[i] + trajectory.wasted[i], action);
    }

    let stats = trajectory.stats();
    assert_eq!(stats.steps, n);
    let expected: f32 = trajectory
        .accepted
        .iter()
        .zip(&trajectory.wasted)
        .map(|(&a, &w)| a as f32 - w as f32)
        .sum();
    assert_eq!(stats.total_reward, expected);
    assert!(agent.update(&trajectory).unwrap().is_empty());
}

#[test]
fn test_trajectory_respects_max_length() {
    let mut env = make_env(1000);
    let mut agent = RandomAgent::with_seed(env.observation_size(), env.num_actions(), 5);

    let trajectory = sample_trajectory(&mut env, &mut agent, 4).unwrap();

    assert_eq!(trajectory.len(), 4);
    assert!(trajectory.dones.iter().all(|&d| !d));
    assert!(!env.is_done());
}

#[test]
fn test_observation_width_mismatch_rejected_by_agent() {
    let mut env = make_env(30);
    let mut agent = RandomAgent::with_seed(env.observation_size() + 1, env.num_actions(), 0);
    assert!(sample_trajectory(&mut env, &mut agent, 10).is_err());
}
