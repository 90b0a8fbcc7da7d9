//! Text-to-token encoding seam.

use std::path::Path;

use tokenizers::Tokenizer;

use crate::error::{Error, Result};

/// Turns conversation text into token ids.
pub trait PromptEncoder {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;
}

impl PromptEncoder for Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding =
            (**self).encode(text, true).map_err(|e| Error::Tokenization(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }
}

impl<E: PromptEncoder + ?Sized> PromptEncoder for Box<E> {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        (**self).encode(text)
    }
}

/// Loads a `tokenizer.json`.
pub fn load_tokenizer(path: impl AsRef<Path>) -> Result<Tokenizer> {
    Tokenizer::from_file(path.as_ref())
        .map_err(|e| Error::Tokenization(format!("Failed to load tokenizer: {e}")))
}
