//! Offline acceptance dataset generation.
//!
//! For every source prompt the main model generates a greedy continuation.
//! Both models are then run over prompt + continuation and the draft's
//! greedy prediction at each generated position is compared against what
//! the main model actually produced.

use serde_json::Value;
use tracing::{debug, info};

use super::writer::{AcceptanceDatasetWriter, AcceptanceRecord};
use crate::config::{PipelineConfig, SamplingConfig};
use crate::error::{Error, Result};
use crate::model::{greedy_predictions, sequence_hidden_states, to_host_rows, CausalLm};
use crate::tokenizer::PromptEncoder;
use crate::verifier::{StopReason, Verifier};

/// Totals for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineReport {
    /// Rows written.
    pub examples: usize,
    /// Generated positions across all rows.
    pub generated_tokens: usize,
    /// Positions where the draft agreed with the main model.
    pub accepted_tokens: usize,
    /// Items skipped because the prompt was too short.
    pub skipped_short: usize,
    /// Completions dropped because generation stopped early.
    pub dropped_unfinished: usize,
    /// Index of the next unread source item.
    pub next_index: usize,
}

impl PipelineReport {
    pub fn acceptance_rate(&self) -> f64 {
        if self.generated_tokens == 0 {
            0.0
        } else {
            self.accepted_tokens as f64 / self.generated_tokens as f64
        }
    }
}

struct Prompt {
    tokens: Vec<u32>,
    index: usize,
}

/// Generates up to `config.num_examples` rows into `writer`.
///
/// The writer is not finished here; call [`AcceptanceDatasetWriter::finish`]
/// afterwards.
#[allow(clippy::too_many_arguments)]
pub fn prepare_dataset<E, V, M, Dm>(
    items: &[Value],
    config: &PipelineConfig,
    encoder: &E,
    verifier: &mut V,
    main: &mut M,
    draft: &mut Dm,
    writer: &mut AcceptanceDatasetWriter,
) -> Result<PipelineReport>
where
    E: PromptEncoder + ?Sized,
    V: Verifier + ?Sized,
    M: CausalLm + ?Sized,
    Dm: CausalLm + ?Sized,
{
    config.validate()?;
    let sampling = SamplingConfig::greedy(config.generation_tokens);
    let mut report = PipelineReport {
        next_index: config.offset,
        ..Default::default()
    };

    while report.examples < config.num_examples {
        let batch = next_batch(items, config, encoder, &mut report)?;
        if batch.is_empty() {
            info!(next_index = report.next_index, "source dataset exhausted");
            break;
        }

        let prompts: Vec<Vec<u32>> = batch.iter().map(|p| p.tokens.clone()).collect();
        let completions = verifier.generate(&prompts, &sampling)?;
        if completions.len() != batch.len() {
            return Err(Error::Verifier(format!(
                "expected {} completions, got {}",
                batch.len(),
                completions.len()
            )));
        }

        let mut added = 0usize;
        for (prompt, completion) in batch.iter().zip(&completions) {
            if report.examples >= config.num_examples {
                break;
            }
            if completion.stop_reason != StopReason::Length
                || completion.token_ids.len() != config.generation_tokens
            {
                report.dropped_unfinished += 1;
                continue;
            }

            let record = build_record(prompt, &completion.token_ids, main, draft)?;
            let missed = record.accept_mask.iter().filter(|&&m| m == 1).count();
            report.generated_tokens += record.accept_mask.len();
            report.accepted_tokens += record.accept_mask.len() - missed;
            writer.push(record)?;
            report.examples += 1;
            added += 1;
        }

        debug!(
            added,
            total = report.examples,
            next_index = report.next_index,
            "processed batch"
        );
    }

    info!(
        examples = report.examples,
        generated_tokens = report.generated_tokens,
        accepted_tokens = report.accepted_tokens,
        acceptance_rate = report.acceptance_rate(),
        skipped_short = report.skipped_short,
        dropped_unfinished = report.dropped_unfinished,
        "acceptance dataset prepared"
    );
    Ok(report)
}

/// Collects up to `batch_size` prompts longer than `prompt_tokens`.
fn next_batch<E: PromptEncoder + ?Sized>(
    items: &[Value],
    config: &PipelineConfig,
    encoder: &E,
    report: &mut PipelineReport,
) -> Result<Vec<Prompt>> {
    let mut batch = Vec::with_capacity(config.batch_size);
    while batch.len() < config.batch_size && report.next_index < items.len() {
        let index = report.next_index;
        report.next_index += 1;

        let text = config.dataset_type.collect_text(&items[index])?;
        let mut tokens = encoder.encode(&text)?;
        if tokens.len() <= config.prompt_tokens {
            report.skipped_short += 1;
            continue;
        }
        tokens.truncate(config.prompt_tokens);
        batch.push(Prompt { tokens, index });
    }
    Ok(batch)
}

fn build_record<M, Dm>(
    prompt: &Prompt,
    continuation: &[u32],
    main: &mut M,
    draft: &mut Dm,
) -> Result<AcceptanceRecord>
where
    M: CausalLm + ?Sized,
    Dm: CausalLm + ?Sized,
{
    let mut input_ids = prompt.tokens.clone();
    input_ids.extend_from_slice(continuation);

    // Position i predicts token i + 1, so the generated tokens are predicted
    // from positions prompt_len - 1 .. total - 1.
    let start = prompt.tokens.len() - 1;
    let len = continuation.len();

    let main_hidden = sequence_hidden_states(main, &input_ids)?.narrow(0, start, len)?;
    let draft_hidden = sequence_hidden_states(draft, &input_ids)?.narrow(0, start, len)?;
    let predictions = greedy_predictions(&*draft, &draft_hidden)?;

    let accept_mask = predictions
        .iter()
        .zip(continuation)
        .map(|(predicted, actual)| u8::from(predicted != actual))
        .collect();

    Ok(AcceptanceRecord {
        input_ids,
        main_hidden_states: to_host_rows(&main_hidden)?,
        draft_hidden_states: to_host_rows(&draft_hidden)?,
        accept_mask,
        dataset_index: prompt.index as u64,
    })
}
