use std::path::PathBuf;

use anyhow::Context;
use candle_core::{DType, Device};
use clap::{Parser, Subcommand};
use tracing::info;

use draftsman::dataset::{load_items, prepare_dataset, AcceptanceDatasetWriter, DatasetType};
use draftsman::env::{ConversationCorpus, Env, SpeculativeDecodingEnv};
use draftsman::model::load_model;
use draftsman::rollout::sample_trajectory;
use draftsman::tokenizer::load_tokenizer;
use draftsman::{Agent, EnvConfig, LocalVerifier, ModelDraft, PipelineConfig, RandomAgent};

const DEFAULT_MODEL: &str = "JackFram/llama-160m";

#[derive(Parser)]
#[command(name = "draftsman")]
#[command(version, about = "Speculative decoding as a reinforcement-learning environment")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run random-agent episodes in the speculative decoding environment
    Rollout {
        /// Draft model (HuggingFace model ID)
        #[arg(long, default_value = DEFAULT_MODEL)]
        draft_model: String,

        /// Verifier model (HuggingFace model ID)
        #[arg(long, default_value = DEFAULT_MODEL)]
        main_model: String,

        /// Model revision
        #[arg(long, default_value = "main")]
        revision: String,

        /// Parquet file with conversation prefixes
        #[arg(long)]
        conversations: PathBuf,

        /// Name of the text column in the conversations file
        #[arg(long, default_value = "text")]
        text_column: String,

        /// Environment config (JSON). Overrides the flags below.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of episodes
        #[arg(long, default_value = "1")]
        episodes: usize,

        /// Steps per episode before the rollout is cut off
        #[arg(long, default_value = "1000")]
        max_steps: usize,

        /// Length cap of a conversation in tokens
        #[arg(long, default_value = "100")]
        max_tokens: usize,

        /// Number of actions (speculation lengths 0..N)
        #[arg(long, default_value = "8")]
        max_speculation: usize,

        /// Reward per accepted draft token
        #[arg(long, default_value = "1.0")]
        accepted_weight: f32,

        /// Penalty per wasted draft token
        #[arg(long, default_value = "1.0")]
        rejected_weight: f32,

        /// Only sample from the first N conversations
        #[arg(long)]
        n_conversations: Option<usize>,

        /// Seed for the conversation sampler and the agent
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Build an offline draft acceptance dataset
    Prepare {
        /// Source dataset (JSON array)
        input: PathBuf,

        /// Output parquet file
        output: PathBuf,

        /// Prompt length in tokens
        #[arg(long, default_value = "256")]
        prompt_tokens: usize,

        /// Tokens generated per prompt
        #[arg(long, default_value = "256")]
        generation_tokens: usize,

        /// Main model (HuggingFace model ID)
        #[arg(long, default_value = DEFAULT_MODEL)]
        main_model: String,

        /// Draft model (HuggingFace model ID)
        #[arg(long, default_value = DEFAULT_MODEL)]
        draft_model: String,

        /// Model revision
        #[arg(long, default_value = "main")]
        revision: String,

        /// Number of examples to write
        #[arg(short, long, default_value = "10000")]
        n: usize,

        /// Prompts per generation batch
        #[arg(long, default_value = "16")]
        batch_size: usize,

        /// Rows buffered between parquet flushes
        #[arg(long, default_value = "1000")]
        writeback_interval: usize,

        /// Index of the first source item
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Source layout: sharegpt or instruct_coder
        #[arg(long, default_value = "sharegpt", value_parser = parse_dataset_type)]
        dataset_type: DatasetType,

        /// Replace an existing output file instead of appending to it
        #[arg(long)]
        overwrite: bool,
    },
}

fn parse_dataset_type(s: &str) -> Result<DatasetType, String> {
    s.parse().map_err(|e: draftsman::Error| e.to_string())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let device = Device::cuda_if_available(0)?;

    match cli.command {
        Commands::Rollout {
            draft_model,
            main_model,
            revision,
            conversations,
            text_column,
            config,
            episodes,
            max_steps,
            max_tokens,
            max_speculation,
            accepted_weight,
            rejected_weight,
            n_conversations,
            seed,
        } => {
            let env_config = match config {
                Some(path) => EnvConfig::from_json_file(&path)
                    .with_context(|| format!("failed to load {}", path.display()))?,
                None => {
                    let mut config = EnvConfig::new(max_speculation)
                        .max_tokens(max_tokens)
                        .weights(accepted_weight, rejected_weight);
                    if let Some(n) = n_conversations {
                        config = config.n_conversations(n);
                    }
                    config
                }
            };

            let corpus = ConversationCorpus::from_parquet(&conversations, &text_column)?;
            let (draft, _, _) = load_model(&draft_model, &revision, DType::F32, &device)?;
            let (main, main_config, main_files) =
                load_model(&main_model, &revision, DType::F32, &device)?;
            let tokenizer = load_tokenizer(&main_files.tokenizer)?;
            let verifier = LocalVerifier::new(main, main_config.eos_token());

            let mut env = SpeculativeDecodingEnv::with_seed(
                env_config,
                corpus,
                ModelDraft::new(draft),
                verifier,
                tokenizer,
                seed,
            )?;
            let mut agent =
                RandomAgent::with_seed(env.observation_size(), env.num_actions(), seed);

            for episode in 0..episodes {
                let trajectory = sample_trajectory(&mut env, &mut agent, max_steps)?;
                agent.update(&trajectory)?;
                let stats = trajectory.stats();
                info!(
                    episode,
                    steps = stats.steps,
                    total_reward = stats.total_reward,
                    accepted = stats.accepted,
                    wasted = stats.wasted,
                    acceptance_rate = stats.acceptance_rate,
                    "rollout"
                );
            }
        }
        Commands::Prepare {
            input,
            output,
            prompt_tokens,
            generation_tokens,
            main_model,
            draft_model,
            revision,
            n,
            batch_size,
            writeback_interval,
            offset,
            dataset_type,
            overwrite,
        } => {
            let config = PipelineConfig {
                prompt_tokens,
                generation_tokens,
                num_examples: n,
                batch_size,
                writeback_interval,
                offset,
                dataset_type,
            };
            config.validate()?;

            let items = load_items(&input)
                .with_context(|| format!("failed to load {}", input.display()))?;
            info!(items = items.len(), path = %input.display(), "loaded source dataset");

            let (mut main, main_config, main_files) =
                load_model(&main_model, &revision, DType::F32, &device)?;
            let (mut draft, _, _) = load_model(&draft_model, &revision, DType::F32, &device)?;
            let tokenizer = load_tokenizer(&main_files.tokenizer)?;
            // Clones share the weight tensors.
            let mut verifier = LocalVerifier::new(main.clone(), main_config.eos_token());

            let mut writer = if overwrite {
                if output.exists() {
                    std::fs::remove_file(&output)
                        .with_context(|| format!("failed to remove {}", output.display()))?;
                }
                AcceptanceDatasetWriter::create(&output, writeback_interval)?
            } else {
                AcceptanceDatasetWriter::append(&output, writeback_interval)?
            };
            let report = prepare_dataset(
                &items,
                &config,
                &tokenizer,
                &mut verifier,
                &mut main,
                &mut draft,
                &mut writer,
            )?;
            let rows = writer.finish()?;

            info!(
                rows,
                generated_tokens = report.generated_tokens,
                accepted_tokens = report.accepted_tokens,
                acceptance_rate = report.acceptance_rate(),
                path = %output.display(),
                "wrote acceptance dataset"
            );
        }
    }

    Ok(())
}
