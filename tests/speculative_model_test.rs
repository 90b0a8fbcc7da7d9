//! End-to-end speculative decoding with small randomly initialised Llama models.
//!
//! Whatever the draft proposes, the buffer must end up equal to what greedy
//! decoding with the verifier alone would have produced.

use candle_core::{DType, Device};

use draftsman::env::{ConversationCorpus, Env, SpeculativeDecodingEnv};
use draftsman::model::greedy_next;
use draftsman::rollout::sample_trajectory;
use draftsman::{
    EnvConfig, LlamaConfig, LlamaForCausalLM, LocalVerifier, ModelDraft, PromptEncoder,
    RandomAgent, Result,
};

const VOCAB: usize = 32;

struct Ids;

impl PromptEncoder for Ids {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text.split_whitespace().filter_map(|t| t.parse().ok()).collect())
    }
}

fn tiny_model() -> LlamaForCausalLM {
    LlamaForCausalLM::new_random(&LlamaConfig::tiny(VOCAB), DType::F32, &Device::Cpu).unwrap()
}

/// Greedy decoding with `model` from `prefix` up to `total` tokens.
fn greedy_reference(model: &mut LlamaForCausalLM, prefix: &[u32], total: usize) -> Vec<u32> {
    let mut tokens = prefix.to_vec();
    while tokens.len() < total {
        let next = greedy_next(model, &tokens).unwrap();
        tokens.push(next);
    }
    tokens
}

#[test]
fn test_output_matches_verifier_greedy_decoding() {
    let max_tokens = 16;
    let mut env = SpeculativeDecodingEnv::with_seed(
        EnvConfig::new(4).max_tokens(max_tokens),
        ConversationCorpus::from_texts(["3 14 15 9 26"]),
        ModelDraft::new(tiny_model()),
        LocalVerifier::new(tiny_model(), None),
        Ids,
        1,
    )
    .unwrap();
    let mut agent = RandomAgent::with_seed(env.observation_size(), env.num_actions(), 2);

    let trajectory = sample_trajectory(&mut env, &mut agent, 100).unwrap();
    assert_eq!(trajectory.dones.last(), Some(&true));
    assert_eq!(env.verifier().num_calls(), trajectory.len());

    let produced = env.tokens().to_vec();
    assert_eq!(produced.len(), max_tokens);

    let (_, verifier, _) = env.into_parts();
    let mut reference_model = verifier.model().clone();
    let expected = greedy_reference(&mut reference_model, &[3, 14, 15, 9, 26], max_tokens);
    assert_eq!(produced, expected);
}

#[test]
fn test_identical_draft_accepts_everything() {
    let model = tiny_model();
    let mut env = SpeculativeDecodingEnv::with_seed(
        EnvConfig::new(5).max_tokens(64),
        ConversationCorpus::from_texts(["1 2 3"]),
        ModelDraft::new(model.clone()),
        LocalVerifier::new(model, None),
        Ids,
        0,
    )
    .unwrap();

    let observation = env.reset().unwrap();
    assert_eq!(observation.len(), 32 + 2);

    for action in [4, 1, 3] {
        let result = env.step(action).unwrap();
        assert_eq!(result.info.outcome.accepted, action);
        assert_eq!(result.info.wasted, 0);
        assert_eq!(result.reward, action as f32);
    }
    assert_eq!(env.tokens().len(), 3 + 5 + 2 + 4);
    assert_eq!(env.verifier().num_prompts(), 5 + 2 + 4);
}
