//! Error types for draftsman.

use thiserror::Error;

/// Result type alias for draftsman operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for draftsman.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration (empty corpus, zero token budget, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// A conversation encoded to zero tokens.
    #[error("conversation {0} encodes to an empty prompt")]
    EmptyPrompt(usize),

    /// Action outside `[0, num_actions)`.
    #[error("action {action} out of range (num_actions = {num_actions})")]
    InvalidAction { action: usize, num_actions: usize },

    /// `step` called before the first `reset`.
    #[error("episode not started: call reset() first")]
    EpisodeNotStarted,

    /// `step` called after the episode terminated.
    #[error("episode finished: call reset() to start a new one")]
    EpisodeFinished,

    /// The draft model violated its generation contract.
    #[error("draft model error: {0}")]
    Draft(String),

    /// Hidden-state extraction from the draft model failed.
    #[error("hidden state extraction failed: {0}")]
    HiddenState(String),

    /// The verifier call failed or returned a malformed reply.
    #[error("verifier error: {0}")]
    Verifier(String),

    /// Model loading failed.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Tokenization error.
    #[error("tokenization error: {0}")]
    Tokenization(String),

    /// Malformed dataset input or output.
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Parquet read/write error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow array construction error.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}
