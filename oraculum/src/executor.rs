//! Model executor trait
//!
//! Defines the interface the session uses to run numeric work. An executor
//! owns the model weights and whatever device mesh they are partitioned
//! across; the session only sees fixed-shape batches in and per-sequence
//! results out. This keeps the windowing and generation-loop logic testable
//! against an in-process stub with no numeric backend.

use std::sync::Arc;

use crate::batch::{GenerateBatch, ScoreBatch};
use crate::rng::RngState;
use crate::Result;

/// Sampling parameters for the executor's `generate` entry point.
///
/// Derived from [`SessionConfig`](crate::SessionConfig) at session start
/// and fixed for the session's lifetime.
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    /// Temperature for logit scaling (higher = more random). Must be > 0.
    pub temperature: f32,
    /// Top-k cutoff; 0 disables the cutoff.
    pub top_k: usize,
    /// Nucleus probability threshold in (0, 1].
    pub top_p: f32,
    /// Number of beams; 1 disables beam search.
    pub num_beams: usize,
    /// Whether to sample at all. When `false`, decoding is greedy.
    pub do_sample: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 50,
            top_p: 1.0,
            num_beams: 1,
            do_sample: true,
        }
    }
}

/// Per-sequence results of scoring one window.
#[derive(Debug, Clone)]
pub struct ScoreOutput {
    /// Summed log-likelihood over the positions selected by `output_mask`.
    pub loglikelihood: Vec<f32>,
    /// Whether the model's argmax matched the target at every scored position.
    pub is_greedy: Vec<bool>,
    /// Advanced RNG state; becomes the session's next current value.
    pub next_rng: RngState,
}

/// Tokens produced by one generation call.
#[derive(Debug, Clone)]
pub struct GenerateOutput {
    /// Generated token IDs per sequence, prompt excluded.
    pub tokens: Vec<Vec<u32>>,
    /// Advanced RNG state; becomes the session's next current value.
    pub next_rng: RngState,
}

/// Trait for model executors that run scoring and generation.
///
/// All three entry points thread RNG state: the executor wraps the state it
/// receives in an [`RngSequence`](crate::rng::RngSequence), draws the keys
/// its stochastic layers need (even deterministic scoring threads RNG
/// through the forward pass), and returns the advanced state. Implementors
/// must advance the state exactly once per call through that wrapper.
///
/// Shape requirements: `score_window` batches must be exactly `seq_length`
/// wide; `generate` and `greedy_generate` batches exactly `input_length`
/// wide. Implementations route computation across their weight shards
/// internally.
pub trait ModelExecutor {
    /// Score one fixed-width window of teacher-forced targets.
    ///
    /// # Errors
    /// Returns an error if the forward pass fails; the session does not
    /// retry, and leaves its RNG state unadvanced.
    fn score_window(&self, rng: RngState, batch: &ScoreBatch) -> Result<ScoreOutput>;

    /// Generate continuations with sampling per `sampling`.
    ///
    /// # Errors
    /// Returns an error if generation fails.
    fn generate(
        &self,
        rng: RngState,
        batch: &GenerateBatch,
        sampling: &SamplingConfig,
    ) -> Result<GenerateOutput>;

    /// Generate continuations with greedy decoding (no sampling).
    ///
    /// # Errors
    /// Returns an error if generation fails.
    fn greedy_generate(&self, rng: RngState, batch: &GenerateBatch) -> Result<GenerateOutput>;
}

/// Shared executors delegate to their inner value, so a single executor
/// (and the weights it owns) can be handed to a session while callers keep
/// a handle for inspection.
impl<M: ModelExecutor + ?Sized> ModelExecutor for Arc<M> {
    fn score_window(&self, rng: RngState, batch: &ScoreBatch) -> Result<ScoreOutput> {
        (**self).score_window(rng, batch)
    }

    fn generate(
        &self,
        rng: RngState,
        batch: &GenerateBatch,
        sampling: &SamplingConfig,
    ) -> Result<GenerateOutput> {
        (**self).generate(rng, batch, sampling)
    }

    fn greedy_generate(&self, rng: RngState, batch: &GenerateBatch) -> Result<GenerateOutput> {
        (**self).greedy_generate(rng, batch)
    }
}
