//! Tokenizer backed by the `tokenizers` crate

use std::path::Path;

use crate::{Error, Result};

/// Wrapper around the `tokenizers` crate for serving causal LMs.
pub struct HfTokenizer {
    tokenizer: tokenizers::Tokenizer,
    pad_token_id: u32,
    bos_token_id: u32,
    eos_token_id: u32,
    eos_token: String,
}

impl HfTokenizer {
    /// Load a tokenizer from a directory containing `tokenizer.json`.
    ///
    /// Special-token ids are resolved by name with fallbacks covering the
    /// common GPT/OPT/Llama vocabularies.
    ///
    /// # Errors
    /// Returns an error if the tokenizer cannot be loaded.
    pub fn from_pretrained(model_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref();

        let tokenizer_path = model_path.join("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(Error::Tokenizer(format!(
                "No tokenizer.json found in {}",
                model_path.display()
            )));
        }
        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;

        let bos_token_id = tokenizer
            .token_to_id("<s>")
            .or_else(|| tokenizer.token_to_id("<|begin_of_text|>"))
            .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
            .unwrap_or(1);

        let (eos_token, eos_token_id) = ["</s>", "<|end_of_text|>", "<|endoftext|>"]
            .iter()
            .copied()
            .find_map(|name| tokenizer.token_to_id(name).map(|id| (name.to_string(), id)))
            .unwrap_or_else(|| ("</s>".to_string(), 2));

        let pad_token_id = tokenizer
            .token_to_id("<pad>")
            .or_else(|| tokenizer.token_to_id("<|pad|>"))
            .unwrap_or(eos_token_id);

        Ok(Self {
            tokenizer,
            pad_token_id,
            bos_token_id,
            eos_token_id,
            eos_token,
        })
    }
}

impl super::Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        // Keep special tokens: the session truncates decoded text at the
        // EOS marker, so it must survive decoding.
        self.tokenizer
            .decode(ids, false)
            .map_err(|e| Error::Tokenizer(e.to_string()))
    }

    fn pad_token_id(&self) -> u32 {
        self.pad_token_id
    }

    fn bos_token_id(&self) -> u32 {
        self.bos_token_id
    }

    fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }

    fn eos_token(&self) -> &str {
        &self.eos_token
    }
}
