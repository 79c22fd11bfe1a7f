//! Fixed-shape token batch construction
//!
//! Converts variable-length text into the exact-width arrays the executor
//! consumes. Three policies are in play, all silent (never errors):
//!
//! - prefixes are left-padded / left-truncated (oldest context drops first),
//! - continuations are right-padded / right-truncated,
//! - rolling sequences are never truncated, only right-padded up to at
//!   least one full window.

use crate::config::SessionConfig;
use crate::tokenizer::Tokenizer;
use crate::{Error, Result};

/// One tokenized sequence with its attention mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    /// Token IDs.
    pub ids: Vec<u32>,
    /// True at positions holding real (non-padding) tokens.
    pub mask: Vec<bool>,
}

impl Encoding {
    /// Wrap raw token IDs with an all-attended mask.
    #[must_use]
    pub fn new(ids: Vec<u32>) -> Self {
        let mask = vec![true; ids.len()];
        Self { ids, mask }
    }

    /// Force the encoding to exactly `width` tokens by left-padding with
    /// `pad_id` or keeping only the most recent `width` tokens.
    #[must_use]
    pub fn fit_left(self, width: usize, pad_id: u32) -> Self {
        let len = self.ids.len();
        if len >= width {
            Self {
                ids: self.ids[len - width..].to_vec(),
                mask: self.mask[len - width..].to_vec(),
            }
        } else {
            let extra = width - len;
            let mut ids = vec![pad_id; extra];
            ids.extend(self.ids);
            let mut mask = vec![false; extra];
            mask.extend(self.mask);
            Self { ids, mask }
        }
    }

    /// Force the encoding to exactly `width` tokens by right-padding with
    /// `pad_id` or keeping only the first `width` tokens.
    #[must_use]
    pub fn fit_right(mut self, width: usize, pad_id: u32) -> Self {
        if self.ids.len() >= width {
            self.ids.truncate(width);
            self.mask.truncate(width);
        } else {
            self.ids.resize(width, pad_id);
            self.mask.resize(width, false);
        }
        self
    }
}

/// Teacher-forced scoring batch.
///
/// All four arrays share the same batch size and the same width
/// (`seq_length` at the executor boundary). `input_tokens` is
/// `output_tokens` shifted right by one position behind a BOS token, so
/// position *i*'s input predicts position *i*'s target.
#[derive(Debug, Clone)]
pub struct ScoreBatch {
    pub input_tokens: Vec<Vec<u32>>,
    pub output_tokens: Vec<Vec<u32>>,
    pub input_mask: Vec<Vec<bool>>,
    pub output_mask: Vec<Vec<bool>>,
}

impl ScoreBatch {
    /// Number of sequences in the batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.output_tokens.len()
    }

    /// Check that every row of every array is exactly `width` tokens wide
    /// and all arrays agree on batch size.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] on any deviation.
    pub fn validate(&self, width: usize) -> Result<()> {
        let batch = self.output_tokens.len();
        check_rows(&self.input_tokens, batch, width)?;
        check_rows(&self.output_tokens, batch, width)?;
        check_rows(&self.input_mask, batch, width)?;
        check_rows(&self.output_mask, batch, width)?;
        Ok(())
    }
}

/// Generation batch: prefix tokens plus their attention mask, exactly
/// `input_length` wide.
#[derive(Debug, Clone)]
pub struct GenerateBatch {
    pub input_tokens: Vec<Vec<u32>>,
    pub attention_mask: Vec<Vec<bool>>,
}

impl GenerateBatch {
    /// Number of sequences in the batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.input_tokens.len()
    }

    /// Check row widths and batch-size agreement.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] on any deviation.
    pub fn validate(&self, width: usize) -> Result<()> {
        let batch = self.input_tokens.len();
        check_rows(&self.input_tokens, batch, width)?;
        check_rows(&self.attention_mask, batch, width)?;
        Ok(())
    }
}

/// Untruncated tokenization of a batch of texts, shifted for teacher
/// forcing and right-padded to a common length of at least one window.
/// The sliding-window scorer slices this into [`ScoreBatch`]es.
#[derive(Debug, Clone)]
pub struct RollingBatch {
    pub input_tokens: Vec<Vec<u32>>,
    pub output_tokens: Vec<Vec<u32>>,
    pub attention_mask: Vec<Vec<bool>>,
    /// Common padded length of every row.
    pub total_len: usize,
}

fn check_rows<E>(rows: &[Vec<E>], batch: usize, width: usize) -> Result<()> {
    if rows.len() != batch {
        return Err(Error::ShapeMismatch {
            expected: vec![batch, width],
            got: vec![rows.len(), width],
        });
    }
    for row in rows {
        if row.len() != width {
            return Err(Error::ShapeMismatch {
                expected: vec![batch, width],
                got: vec![batch, row.len()],
            });
        }
    }
    Ok(())
}

/// Builds fixed-shape batches from text, per the session's widths.
pub struct BatchBuilder<'a, T> {
    tokenizer: &'a T,
    config: &'a SessionConfig,
}

impl<'a, T: Tokenizer> BatchBuilder<'a, T> {
    /// Borrow a tokenizer and config for batch construction.
    #[must_use]
    pub fn new(tokenizer: &'a T, config: &'a SessionConfig) -> Self {
        Self { tokenizer, config }
    }

    /// Build a teacher-forced scoring batch from (prefix, continuation)
    /// pairs.
    ///
    /// Prefixes occupy the left-aligned `input_length` slot, continuations
    /// the right-aligned remainder of the window. Only continuation
    /// positions contribute to the likelihood (`output_mask`).
    ///
    /// # Errors
    /// Returns an error if the pair lists differ in length or encoding
    /// fails.
    pub fn score_batch<P: AsRef<str>, C: AsRef<str>>(
        &self,
        prefixes: &[P],
        continuations: &[C],
    ) -> Result<ScoreBatch> {
        if prefixes.len() != continuations.len() {
            return Err(Error::BatchMismatch {
                left: prefixes.len(),
                right: continuations.len(),
            });
        }
        let pad = self.tokenizer.pad_token_id();
        let bos = self.tokenizer.bos_token_id();
        let input_length = self.config.input_length;
        let cont_length = self.config.continuation_length();

        let mut batch = ScoreBatch {
            input_tokens: Vec::with_capacity(prefixes.len()),
            output_tokens: Vec::with_capacity(prefixes.len()),
            input_mask: Vec::with_capacity(prefixes.len()),
            output_mask: Vec::with_capacity(prefixes.len()),
        };
        for (prefix, continuation) in prefixes.iter().zip(continuations) {
            let prefix = Encoding::new(self.tokenizer.encode(prefix.as_ref())?)
                .fit_left(input_length, pad);
            let continuation = Encoding::new(self.tokenizer.encode(continuation.as_ref())?)
                .fit_right(cont_length, pad);

            let mut output_tokens = prefix.ids;
            output_tokens.extend(&continuation.ids);

            let mut input_tokens = Vec::with_capacity(output_tokens.len());
            input_tokens.push(bos);
            input_tokens.extend(&output_tokens[..output_tokens.len() - 1]);

            let mut attention = prefix.mask.clone();
            attention.extend(&continuation.mask);
            let mut input_mask = Vec::with_capacity(attention.len());
            input_mask.push(self.config.loglikelihood_add_bos_token);
            input_mask.extend(&attention[..attention.len() - 1]);

            let mut output_mask = vec![false; input_length];
            output_mask.extend(&continuation.mask);

            batch.input_tokens.push(input_tokens);
            batch.output_tokens.push(output_tokens);
            batch.input_mask.push(input_mask);
            batch.output_mask.push(output_mask);
        }
        batch.validate(self.config.seq_length)?;
        Ok(batch)
    }

    /// Build a generation batch from prefixes.
    ///
    /// Each prefix is left-padded to `input_length`, or hard-truncated to
    /// its most recent `input_length` tokens when longer. Truncation
    /// silently drops the oldest context; it is policy, not an error.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn generate_batch<S: AsRef<str>>(&self, prefixes: &[S]) -> Result<GenerateBatch> {
        let pad = self.tokenizer.pad_token_id();
        let input_length = self.config.input_length;

        let mut batch = GenerateBatch {
            input_tokens: Vec::with_capacity(prefixes.len()),
            attention_mask: Vec::with_capacity(prefixes.len()),
        };
        for prefix in prefixes {
            let encoding = Encoding::new(self.tokenizer.encode(prefix.as_ref())?)
                .fit_left(input_length, pad);
            batch.input_tokens.push(encoding.ids);
            batch.attention_mask.push(encoding.mask);
        }
        batch.validate(input_length)?;
        Ok(batch)
    }

    /// Tokenize texts without truncation for rolling likelihood.
    ///
    /// Rows are right-padded to the longest sequence in the batch, and to
    /// at least `seq_length` so even a short text fills one window. The
    /// teacher-forced shift happens here, once, over the full sequence.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn rolling_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<RollingBatch> {
        let pad = self.tokenizer.pad_token_id();
        let bos = self.tokenizer.bos_token_id();

        let encodings = texts
            .iter()
            .map(|t| self.tokenizer.encode(t.as_ref()).map(Encoding::new))
            .collect::<Result<Vec<_>>>()?;
        let longest = encodings.iter().map(|e| e.ids.len()).max().unwrap_or(0);
        let total_len = longest.max(self.config.seq_length);

        let mut batch = RollingBatch {
            input_tokens: Vec::with_capacity(texts.len()),
            output_tokens: Vec::with_capacity(texts.len()),
            attention_mask: Vec::with_capacity(texts.len()),
            total_len,
        };
        for encoding in encodings {
            let encoding = encoding.fit_right(total_len, pad);
            let mut input_tokens = Vec::with_capacity(total_len);
            input_tokens.push(bos);
            input_tokens.extend(&encoding.ids[..total_len - 1]);
            batch.input_tokens.push(input_tokens);
            batch.output_tokens.push(encoding.ids);
            batch.attention_mask.push(encoding.mask);
        }
        Ok(batch)
    }
}
