//! Speculative decoding environment.
//!
//! Couples a small draft model with a large verifier. Each step the agent
//! picks how many tokens to speculate; the draft proposes them, the verifier
//! checks all of them in a single batched call, and the accepted run plus
//! the verifier's corrective token is appended to the conversation.
//!
//! ## Step
//!
//! ```text
//! tokens ──► draft.generate(tokens, action) ──► draft [d0 .. dk)
//!                                                   │
//!        candidate prompts: tokens, tokens+d0, .., tokens+d0..dk
//!                                                   │
//!                              verifier.generate(prompts)  (one call)
//!                                                   │
//!           accept while d_i == continuation_i ─► n accepted, corrective c
//!                                                   │
//!        tokens += d0..dn ++ [c]  ──► observation = hidden(tokens) ++ [n, action-n]
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::corpus::ConversationCorpus;
use super::{Env, Observation, StepInfo, StepResult};
use crate::config::SamplingConfig;
use crate::draft::DraftModel;
use crate::error::{Error, Result};
use crate::speculative::{candidate_prompts, count_accepted, EnvConfig};
use crate::tokenizer::PromptEncoder;
use crate::verifier::Verifier;

/// Per-episode mutable state.
#[derive(Debug, Clone, Default)]
struct Episode {
    /// Index of the sampled conversation.
    conversation: usize,
    /// Conversation processed so far.
    tokens: Vec<u32>,
    steps: usize,
    done: bool,
}

/// Speculative decoding simulation with the classic reset/step contract.
pub struct SpeculativeDecodingEnv<D, V, E> {
    config: EnvConfig,
    corpus: ConversationCorpus,
    draft: D,
    verifier: V,
    encoder: E,
    sampling: SamplingConfig,
    rng: StdRng,
    episode: Option<Episode>,
}

impl<D, V, E> SpeculativeDecodingEnv<D, V, E>
where
    D: DraftModel,
    V: Verifier,
    E: PromptEncoder,
{
    /// Creates an environment. Fails on an invalid config or empty corpus.
    pub fn new(
        config: EnvConfig,
        corpus: ConversationCorpus,
        draft: D,
        verifier: V,
        encoder: E,
    ) -> Result<Self> {
        config.validate()?;
        if corpus.is_empty() {
            return Err(Error::Config("conversation corpus is empty".into()));
        }
        if draft.hidden_size() == 0 {
            return Err(Error::Config("draft model reports zero hidden size".into()));
        }

        Ok(Self {
            config,
            corpus,
            draft,
            verifier,
            encoder,
            sampling: SamplingConfig::verification(),
            rng: StdRng::from_entropy(),
            episode: None,
        })
    }

    /// Creates an environment with a seeded conversation sampler.
    pub fn with_seed(
        config: EnvConfig,
        corpus: ConversationCorpus,
        draft: D,
        verifier: V,
        encoder: E,
        seed: u64,
    ) -> Result<Self> {
        let mut env = Self::new(config, corpus, draft, verifier, encoder)?;
        env.seed(seed);
        Ok(env)
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn corpus(&self) -> &ConversationCorpus {
        &self.corpus
    }

    /// Token buffer of the current episode (empty before the first reset).
    pub fn tokens(&self) -> &[u32] {
        self.episode
            .as_ref()
            .map(|e| e.tokens.as_slice())
            .unwrap_or(&[])
    }

    /// Index of the conversation the current episode started from.
    pub fn conversation_index(&self) -> Option<usize> {
        self.episode.as_ref().map(|e| e.conversation)
    }

    pub fn episode_steps(&self) -> usize {
        self.episode.as_ref().map_or(0, |e| e.steps)
    }

    pub fn is_done(&self) -> bool {
        self.episode.as_ref().is_some_and(|e| e.done)
    }

    pub fn draft(&self) -> &D {
        &self.draft
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Tears the environment down, handing back its collaborators.
    pub fn into_parts(self) -> (D, V, E) {
        (self.draft, self.verifier, self.encoder)
    }

    /// Draft hidden state over `tokens` followed by `[accepted, wasted]`.
    fn observe(&mut self, tokens: &[u32], accepted: usize, wasted: usize) -> Result<Observation> {
        let mut observation = self.draft.hidden_states(tokens)?;
        let width = self.draft.hidden_size();
        if observation.len() != width {
            return Err(Error::HiddenState(format!(
                "expected hidden state of width {width}, got {}",
                observation.len()
            )));
        }
        observation.push(accepted as f32);
        observation.push(wasted as f32);
        Ok(observation)
    }
}

impl<D, V, E> Env for SpeculativeDecodingEnv<D, V, E>
where
    D: DraftModel,
    V: Verifier,
    E: PromptEncoder,
{
    fn reset(&mut self) -> Result<Observation> {
        let n = self.corpus.sample_len(self.config.n_conversations);
        let conversation = self.rng.gen_range(0..n);
        let text = self
            .corpus
            .get(conversation)
            .ok_or_else(|| Error::Config(format!("conversation {conversation} out of range")))?;

        let mut tokens = self.encoder.encode(text)?;
        if tokens.is_empty() {
            return Err(Error::EmptyPrompt(conversation));
        }
        // Leave room for at least one step.
        tokens.truncate(self.config.max_tokens - 1);

        let observation = self.observe(&tokens, 0, 0)?;
        debug!(conversation, prefix_len = tokens.len(), "episode reset");

        self.episode = Some(Episode {
            conversation,
            tokens,
            steps: 0,
            done: false,
        });
        Ok(observation)
    }

    /// Drafts `action` tokens, verifies them in one batched call and appends
    /// the accepted run plus the corrective token.
    ///
    /// When `max_tokens` clips the appended run, reward and observation still
    /// count every accepted token. On error the episode is left untouched.
    fn step(&mut self, action: usize) -> Result<StepResult> {
        let num_actions = self.num_actions();
        if action >= num_actions {
            return Err(Error::InvalidAction {
                action,
                num_actions,
            });
        }
        let mut tokens = match &self.episode {
            None => return Err(Error::EpisodeNotStarted),
            Some(e) if e.done => return Err(Error::EpisodeFinished),
            Some(e) => e.tokens.clone(),
        };

        let draft = self.draft.generate(&tokens, action)?;
        if draft.len() > action {
            return Err(Error::Draft(format!(
                "requested {action} draft tokens, got {}",
                draft.len()
            )));
        }

        let prompts = candidate_prompts(&tokens, &draft);
        let completions = self.verifier.generate(&prompts, &self.sampling)?;
        let outcome = count_accepted(&draft, &completions)?;

        let wasted = outcome.wasted_for(action);
        let reward = outcome.reward(action, &self.config);

        // The cap clips only the appended run. Reward and observation still
        // count every accepted token.
        let mut run = outcome.accepted_run(&draft);
        run.truncate(self.config.max_tokens.saturating_sub(tokens.len()));
        let appended = run.len();
        tokens.extend(run);

        let done = outcome.finished || tokens.len() >= self.config.max_tokens;
        let observation = self.observe(&tokens, outcome.accepted, wasted)?;

        debug!(
            action,
            accepted = outcome.accepted,
            wasted,
            reward,
            done,
            len = tokens.len(),
            "speculative step"
        );

        if let Some(episode) = self.episode.as_mut() {
            episode.tokens = tokens;
            episode.steps += 1;
            episode.done = done;
        }

        Ok(StepResult {
            observation,
            reward,
            done,
            info: StepInfo {
                outcome,
                wasted,
                appended,
            },
        })
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
        self.draft.reseed(seed);
    }

    fn observation_size(&self) -> usize {
        self.draft.hidden_size() + 2
    }

    fn num_actions(&self) -> usize {
        self.config.max_speculation_length
    }
}
