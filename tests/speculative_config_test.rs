//! Integration tests for EnvConfig.

use draftsman::{EnvConfig, Error};

#[test]
fn test_default_config() {
    let config = EnvConfig::default();
    assert_eq!(config.max_speculation_length, 8);
    assert_eq!(config.max_tokens, 100);
    assert_eq!(config.accepted_tokens_weight, 1.0);
    assert_eq!(config.rejected_tokens_weight, 1.0);
    assert_eq!(config.n_conversations, None);
}

#[test]
fn test_builder_pattern() {
    let config = EnvConfig::new(3)
        .max_tokens(32)
        .weights(1.5, 0.25)
        .n_conversations(10);

    assert_eq!(config.max_speculation_length, 3);
    assert_eq!(config.max_tokens, 32);
    assert_eq!(config.accepted_tokens_weight, 1.5);
    assert_eq!(config.rejected_tokens_weight, 0.25);
    assert_eq!(config.n_conversations, Some(10));
}

#[test]
fn test_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("env.json");
    std::fs::write(
        &path,
        r#"{
            "max_speculation_length": 4,
            "max_tokens": 50,
            "accepted_tokens_weight": 1.0,
            "rejected_tokens_weight": 2.0,
            "n_conversations": 100
        }"#,
    )
    .unwrap();

    let config = EnvConfig::from_json_file(&path).unwrap();
    assert_eq!(config, EnvConfig::new(4).max_tokens(50).weights(1.0, 2.0).n_conversations(100));
}

#[test]
fn test_from_json_file_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("env.json");
    std::fs::write(
        &path,
        r#"{
            "max_speculation_length": 0,
            "max_tokens": 50,
            "accepted_tokens_weight": 1.0,
            "rejected_tokens_weight": 1.0
        }"#,
    )
    .unwrap();

    assert!(matches!(EnvConfig::from_json_file(&path), Err(Error::Config(_))));
}

#[test]
fn test_validation() {
    assert!(EnvConfig::new(1).max_tokens(2).validate().is_ok());
    assert!(EnvConfig::new(1).max_tokens(1).validate().is_err());
    assert!(EnvConfig::new(4).n_conversations(0).validate().is_err());
    assert!(EnvConfig::new(4).weights(f32::NAN, 1.0).validate().is_err());
}
