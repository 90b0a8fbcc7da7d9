//! Integration tests for model loading.

use candle_core::{DType, Device, Tensor};

use draftsman::model::{load_model, EosTokenId, LlamaConfig};
use draftsman::tokenizer::load_tokenizer;
use draftsman::PromptEncoder;

#[test]
fn test_parse_llama_config() {
    // config.json of JackFram/llama-160m
    let json = r#"{
        "architectures": ["LlamaForCausalLM"],
        "bos_token_id": 0,
        "eos_token_id": 2,
        "hidden_act": "silu",
        "hidden_size": 768,
        "initializer_range": 0.02,
        "intermediate_size": 3072,
        "max_position_embeddings": 2048,
        "model_type": "llama",
        "num_attention_heads": 12,
        "num_hidden_layers": 12,
        "pad_token_id": 1,
        "rms_norm_eps": 1e-06,
        "tie_word_embeddings": false,
        "torch_dtype": "float32",
        "use_cache": true,
        "vocab_size": 32000
    }"#;

    let config: LlamaConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.vocab_size, 32000);
    assert_eq!(config.hidden_size, 768);
    assert_eq!(config.num_hidden_layers, 12);
    assert_eq!(config.num_kv_heads(), 12); // falls back to num_attention_heads
    assert_eq!(config.head_dim(), 64);
    assert_eq!(config.eos_token(), Some(2));
    assert!(!config.tie_word_embeddings);
}

#[test]
fn test_config_with_defaults() {
    let json = r#"{
        "vocab_size": 100,
        "hidden_size": 64,
        "intermediate_size": 128,
        "num_hidden_layers": 2,
        "num_attention_heads": 4,
        "num_key_value_heads": 2,
        "eos_token_id": [7, 8]
    }"#;

    let config: LlamaConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.rms_norm_eps, 1e-6);
    assert_eq!(config.rope_theta, 10000.0);
    assert_eq!(config.max_position_embeddings, 2048);
    assert_eq!(config.num_kv_heads(), 2);
    assert_eq!(config.eos_token_id, Some(EosTokenId::Multiple(vec![7, 8])));
    assert_eq!(config.eos_token(), Some(7));
}

#[test]
#[ignore = "downloads weights from the HuggingFace Hub"]
fn test_load_llama_160m() {
    let device = Device::Cpu;
    let (mut model, config, files) =
        load_model("JackFram/llama-160m", "main", DType::F32, &device).unwrap();
    let tokenizer = load_tokenizer(&files.tokenizer).unwrap();

    let ids = PromptEncoder::encode(&tokenizer, "The capital of France is").unwrap();
    assert!(!ids.is_empty());

    let input = Tensor::new(ids.as_slice(), &device).unwrap().unsqueeze(0).unwrap();
    let logits = model.forward(&input).unwrap();
    assert_eq!(logits.dims(), &[1, config.vocab_size]);

    let hidden = draftsman::model::sequence_hidden_states(&mut model, &ids).unwrap();
    assert_eq!(hidden.dims(), &[ids.len(), config.hidden_size]);
}
