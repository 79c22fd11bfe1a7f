//! Tokenizer integration
//!
//! Defines the [`Tokenizer`] trait and concrete implementations. Padding and
//! truncation policy is deliberately *not* part of the trait; the batch
//! builder applies it per call site (see [`crate::batch`]).

mod hf_tokenizer;

use crate::Result;

pub use hf_tokenizer::HfTokenizer;

/// Trait for tokenizers that convert between text and token IDs.
///
/// The session uses this trait to handle text in/out; the batch builder
/// uses the special-token ids for padding and teacher-forced shifting.
pub trait Tokenizer {
    /// Encode text to token IDs, without special tokens.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decode token IDs to text.
    ///
    /// # Errors
    /// Returns an error if decoding fails.
    fn decode(&self, ids: &[u32]) -> Result<String>;

    /// Get the padding token ID.
    fn pad_token_id(&self) -> u32;

    /// Get the beginning-of-sequence token ID.
    fn bos_token_id(&self) -> u32;

    /// Get the end-of-sequence token ID.
    fn eos_token_id(&self) -> u32;

    /// Text form of the end-of-sequence token, used to truncate decoded
    /// continuations.
    fn eos_token(&self) -> &str;
}
