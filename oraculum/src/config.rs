//! Session configuration
//!
//! All parameters are fixed at session start and never mutated afterwards.
//! Parsed from a JSON file; every field has a serving-oriented default so a
//! partial config is enough to bring up a session.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::executor::SamplingConfig;
use crate::{Error, Result};

/// Read-only parameters for an inference session.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Width of the prefix region fed to the model for generation, and of
    /// the prefix slot in likelihood batches.
    #[serde(default = "default_input_length")]
    pub input_length: usize,

    /// Full window width the executor accepts for scoring. Continuations
    /// occupy the `seq_length - input_length` tail of the window.
    #[serde(default = "default_seq_length")]
    pub seq_length: usize,

    /// Seed for the session's counter-based RNG state.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Temperature for logit scaling during sampled generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Top-k cutoff for sampled generation.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Nucleus probability threshold in (0, 1].
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Number of beams; 1 disables beam search.
    #[serde(default = "default_num_beams")]
    pub num_beams: usize,

    /// Whether `generate` samples. When `false`, decoding is greedy.
    #[serde(default = "default_do_sample")]
    pub do_sample: bool,

    /// Whether the injected beginning-of-sequence position counts as
    /// attended in likelihood batches.
    #[serde(default)]
    pub loglikelihood_add_bos_token: bool,
}

fn default_input_length() -> usize {
    1024
}

fn default_seq_length() -> usize {
    2048
}

fn default_seed() -> u64 {
    42
}

fn default_temperature() -> f32 {
    1.0
}

fn default_top_k() -> usize {
    50
}

fn default_top_p() -> f32 {
    1.0
}

fn default_num_beams() -> usize {
    1
}

fn default_do_sample() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            input_length: default_input_length(),
            seq_length: default_seq_length(),
            seed: default_seed(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            num_beams: default_num_beams(),
            do_sample: default_do_sample(),
            loglikelihood_add_bos_token: false,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, fails to parse, or the
    /// parsed values are inconsistent.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency of the window widths.
    ///
    /// # Errors
    /// Returns an error unless `0 < input_length < seq_length`.
    pub fn validate(&self) -> Result<()> {
        if self.input_length == 0 {
            return Err(Error::Config("input_length must be non-zero".into()));
        }
        if self.input_length >= self.seq_length {
            return Err(Error::Config(format!(
                "input_length ({}) must be less than seq_length ({})",
                self.input_length, self.seq_length
            )));
        }
        Ok(())
    }

    /// Width of the continuation slot in a likelihood batch.
    #[must_use]
    pub fn continuation_length(&self) -> usize {
        self.seq_length - self.input_length
    }

    /// Sampling parameters passed to the executor's `generate` entry point.
    #[must_use]
    pub fn sampling(&self) -> SamplingConfig {
        SamplingConfig {
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
            num_beams: self.num_beams,
            do_sample: self.do_sample,
        }
    }
}
