//! Integration tests for the offline acceptance dataset pipeline.

use std::fs;

use candle_core::{DType, Device};
use serde_json::json;

use draftsman::dataset::{
    load_items, prepare_dataset, read_acceptance_records, AcceptanceDatasetWriter, DatasetType,
};
use draftsman::{
    LlamaConfig, LlamaForCausalLM, LocalVerifier, PipelineConfig, PromptEncoder, Result,
};

struct Ids;

impl PromptEncoder for Ids {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text.split_whitespace().filter_map(|t| t.parse().ok()).collect())
    }
}

fn sharegpt(human: &str, gpt: &str, follow_up: &str) -> serde_json::Value {
    json!({
        "conversations": [
            {"from": "human", "value": human},
            {"from": "gpt", "value": gpt},
            {"from": "human", "value": follow_up}
        ]
    })
}

#[test]
fn test_sharegpt_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sharegpt.json");
    let output = dir.path().join("acceptance.parquet");

    let items = json!([
        sharegpt("1", "2", "3"),
        sharegpt("4 5", "6 7", "8 9"),
        sharegpt("10 11", "12", "13 14 15"),
        sharegpt("16", "17", "18"),
        sharegpt("19 20 21", "22 23", "24"),
    ]);
    fs::write(&input, items.to_string()).unwrap();
    let items = load_items(&input).unwrap();

    let main = LlamaForCausalLM::new_random(&LlamaConfig::tiny(30), DType::F32, &Device::Cpu)
        .unwrap();
    let mut draft =
        LlamaForCausalLM::new_random(&LlamaConfig::tiny(30), DType::F32, &Device::Cpu).unwrap();
    let mut verifier = LocalVerifier::new(main.clone(), None);
    let mut main = main;

    let config = PipelineConfig {
        prompt_tokens: 4,
        generation_tokens: 3,
        num_examples: 100,
        batch_size: 2,
        writeback_interval: 2,
        offset: 0,
        dataset_type: DatasetType::ShareGpt,
    };
    let mut writer = AcceptanceDatasetWriter::create(&output, config.writeback_interval).unwrap();
    let report = prepare_dataset(
        &items,
        &config,
        &Ids,
        &mut verifier,
        &mut main,
        &mut draft,
        &mut writer,
    )
    .unwrap();
    assert_eq!(writer.finish().unwrap(), 3);

    // Items 0 and 3 have only three tokens.
    assert_eq!(report.examples, 3);
    assert_eq!(report.skipped_short, 2);
    assert_eq!(report.generated_tokens, 9);
    assert!(report.accepted_tokens <= report.generated_tokens);
    assert_eq!(verifier.num_calls(), 2);

    let records = read_acceptance_records(&output).unwrap();
    assert_eq!(
        records.iter().map(|r| r.dataset_index).collect::<Vec<_>>(),
        vec![1, 2, 4]
    );
    assert_eq!(&records[0].input_ids[..4], &[4, 5, 6, 7]);
    assert_eq!(&records[2].input_ids[..4], &[19, 20, 21, 22]);

    let missed: usize = records
        .iter()
        .map(|r| r.accept_mask.iter().filter(|&&m| m == 1).count())
        .sum();
    assert_eq!(report.accepted_tokens, report.generated_tokens - missed);

    for record in &records {
        assert_eq!(record.input_ids.len(), 7);
        assert_eq!(record.accept_mask.len(), 3);
        assert!(record.accept_mask.iter().all(|&m| m <= 1));
        assert_eq!(record.main_hidden_states.len(), 3);
        assert_eq!(record.draft_hidden_states.len(), 3);
        assert!(record.main_hidden_states.iter().all(|row| row.len() == 32));
    }
}

#[test]
fn test_resume_from_offset_keeps_earlier_rows() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("acceptance.parquet");
    let items: Vec<serde_json::Value> = (0..4)
        .map(|i| sharegpt(&format!("{i} 1 2"), "3 4", "5"))
        .collect();

    let model = LlamaForCausalLM::new_random(&LlamaConfig::tiny(30), DType::F32, &Device::Cpu)
        .unwrap();
    let mut verifier = LocalVerifier::new(model.clone(), None);
    let mut main = model.clone();
    let mut draft = model;

    let config = PipelineConfig {
        prompt_tokens: 4,
        generation_tokens: 2,
        num_examples: 3,
        batch_size: 2,
        writeback_interval: 2,
        offset: 0,
        dataset_type: DatasetType::ShareGpt,
    };
    let mut writer = AcceptanceDatasetWriter::append(&output, config.writeback_interval).unwrap();
    let first = prepare_dataset(
        &items,
        &config,
        &Ids,
        &mut verifier,
        &mut main,
        &mut draft,
        &mut writer,
    )
    .unwrap();
    assert_eq!(writer.finish().unwrap(), 3);
    assert_eq!(first.next_index, 3);

    let resumed = PipelineConfig {
        num_examples: 1,
        offset: first.next_index,
        ..config
    };
    let mut writer = AcceptanceDatasetWriter::append(&output, resumed.writeback_interval).unwrap();
    prepare_dataset(
        &items,
        &resumed,
        &Ids,
        &mut verifier,
        &mut main,
        &mut draft,
        &mut writer,
    )
    .unwrap();
    assert_eq!(writer.finish().unwrap(), 4);

    let records = read_acceptance_records(&output).unwrap();
    assert_eq!(
        records.iter().map(|r| r.dataset_index).collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );
}
