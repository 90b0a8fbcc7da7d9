//! draftsman: a reinforcement-learning environment for speculative decoding.
//!
//! An agent chooses how many tokens a small draft model should speculate
//! before a large verifier model checks them. This crate provides:
//! - The speculative decoding environment with a reset/step contract
//! - Draft and verifier seams plus in-process candle-backed implementations
//! - Trajectory collection and a random baseline agent
//! - An offline pipeline that records where a draft model agrees with the main model

pub mod config;
pub mod error;

pub mod agent;
pub mod dataset;
pub mod draft;
pub mod env;
pub mod model;
pub mod rollout;
pub mod speculative;
pub mod tokenizer;
pub mod verifier;

pub use agent::{Agent, Metrics, RandomAgent};
pub use config::{PipelineConfig, SamplingConfig};
pub use dataset::{prepare_dataset, AcceptanceDatasetWriter, DatasetType, PipelineReport};
pub use draft::{DraftModel, ModelDraft};
pub use env::{ConversationCorpus, Env, SpeculativeDecodingEnv, StepInfo, StepResult};
pub use error::{Error, Result};
pub use model::{load_model, CausalLm, LlamaConfig, LlamaForCausalLM};
pub use rollout::{sample_trajectory, EpisodeStats, Trajectory};
pub use speculative::{AcceptanceOutcome, EnvConfig};
pub use tokenizer::PromptEncoder;
pub use verifier::{Completion, LocalVerifier, StopReason, Verifier};
