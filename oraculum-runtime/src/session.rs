//! Inference session
//!
//! The [`InferenceSession`] owns the executor (and through it the
//! partitioned weights and device context), the tokenizer, the read-only
//! config, and the single piece of mutable shared state: the RNG value.
//! It exposes the four request-level operations by composing the batch
//! builder, the sliding-window scorer, and the constrained generation
//! loop, and delegating numeric work to the executor.

use std::sync::{Mutex, PoisonError};

use tracing::{debug, trace};

use oraculum::{
    BatchBuilder, Error, ModelExecutor, Result, RngState, SessionConfig, Tokenizer,
};

use crate::generate::{GenerationState, StopSpec};
use crate::scorer::{window_batch, window_plan, ScoreAggregate};

/// A long-lived session answering independent requests against fixed
/// weights.
///
/// The four operations may be invoked concurrently from different threads;
/// every executor call runs under the session's RNG lock, which makes the
/// derive-and-replace of RNG state atomic and, because the executor is
/// bound to a fixed device pool, also serializes device access.
pub struct InferenceSession<E, T> {
    executor: E,
    tokenizer: T,
    config: SessionConfig,
    rng: Mutex<RngState>,
}

impl<E: ModelExecutor, T: Tokenizer> InferenceSession<E, T> {
    /// Create a session around an executor and tokenizer.
    ///
    /// The initial RNG state derives from `config.seed`, so two sessions
    /// built from the same config replay identically for the same call
    /// sequence.
    ///
    /// # Errors
    /// Returns an error if the config is inconsistent.
    pub fn new(executor: E, tokenizer: T, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let rng = Mutex::new(RngState::from_seed(config.seed));
        Ok(Self {
            executor,
            tokenizer,
            config,
            rng,
        })
    }

    /// Get the session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get a reference to the tokenizer.
    #[must_use]
    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    fn builder(&self) -> BatchBuilder<'_, T> {
        BatchBuilder::new(&self.tokenizer, &self.config)
    }

    /// Run one executor call under the RNG lock.
    ///
    /// The lock is held for the duration of the numeric call. The stored
    /// state is replaced only when the call succeeds; a failed call leaves
    /// the session's RNG state untouched, so no state value is ever
    /// consumed twice and a failed request leaves the session recoverable.
    fn with_rng<R>(&self, call: impl FnOnce(RngState) -> Result<(R, RngState)>) -> Result<R> {
        let mut state = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let (output, next) = call(*state)?;
        *state = next;
        Ok(output)
    }

    /// Score continuations under the model's likelihood.
    ///
    /// Each (prefix, continuation) pair fits a single window by
    /// construction: the prefix occupies `input_length` and the
    /// continuation the remaining `seq_length - input_length`.
    ///
    /// # Returns
    /// Per-pair summed log-likelihood over continuation tokens, and a flag
    /// telling whether greedy decoding would have produced exactly the
    /// continuation.
    ///
    /// # Errors
    /// Returns an error if tokenization or the executor call fails.
    pub fn score<P: AsRef<str>, C: AsRef<str>>(
        &self,
        prefixes: &[P],
        continuations: &[C],
    ) -> Result<(Vec<f32>, Vec<bool>)> {
        let batch = self.builder().score_batch(prefixes, continuations)?;
        if batch.batch_size() == 0 {
            return Ok((Vec::new(), Vec::new()));
        }
        debug!(batch = batch.batch_size(), "score request");
        self.with_rng(|rng| {
            let output = self.executor.score_window(rng, &batch)?;
            Ok(((output.loglikelihood, output.is_greedy), output.next_rng))
        })
    }

    /// Score whole texts of unbounded length under the model's likelihood.
    ///
    /// Delegates to the sliding-window scorer: one executor call per
    /// window, loglikelihoods summed and greedy flags ANDed across
    /// windows. Each window consumes one RNG derivation even though
    /// scoring is deterministic, because the executor's call signature
    /// always threads RNG state.
    ///
    /// # Errors
    /// Returns an error if tokenization or any executor call fails.
    pub fn score_rolling<S: AsRef<str>>(&self, texts: &[S]) -> Result<(Vec<f32>, Vec<bool>)> {
        if texts.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let rolling = self.builder().rolling_batch(texts)?;
        let plan = window_plan(rolling.total_len, self.config.seq_length);
        debug!(
            batch = texts.len(),
            total_len = rolling.total_len,
            windows = plan.len(),
            "rolling score request"
        );

        let mut aggregate = ScoreAggregate::new(texts.len());
        for window in plan {
            let batch = window_batch(&rolling, window, self.config.seq_length);
            let output = self.with_rng(|rng| {
                let output = self.executor.score_window(rng, &batch)?;
                let next = output.next_rng;
                Ok((output, next))
            })?;
            aggregate.absorb(&output);
            trace!(start = window.start, "scored window");
        }
        Ok((aggregate.loglikelihood, aggregate.is_greedy))
    }

    /// Generate free-form continuations, sampling per the session config.
    ///
    /// Each continuation is decoded and truncated at the first
    /// end-of-sequence marker, if present.
    ///
    /// # Errors
    /// Returns an error if tokenization, generation, or decoding fails.
    pub fn generate<S: AsRef<str>>(&self, prefixes: &[S]) -> Result<Vec<String>> {
        if prefixes.is_empty() {
            return Ok(Vec::new());
        }
        let batch = self.builder().generate_batch(prefixes)?;
        let sampling = self.config.sampling();
        debug!(batch = batch.batch_size(), "generate request");
        let tokens = self.with_rng(|rng| {
            let output = self.executor.generate(rng, &batch, &sampling)?;
            Ok((output.tokens, output.next_rng))
        })?;

        let eos = self.tokenizer.eos_token();
        tokens
            .iter()
            .map(|row| {
                let mut text = self.tokenizer.decode(row)?;
                if let Some(at) = text.find(eos) {
                    text.truncate(at);
                }
                Ok(text)
            })
            .collect()
    }

    /// Generate until a stop string is observed or `max_length` tokens
    /// have been produced.
    ///
    /// Each (prefix, stop-spec) pair runs its own loop, independently and
    /// sequentially: one bounded greedy generation call per iteration, the
    /// prefix growing by each step's output.
    ///
    /// # Errors
    /// Returns an error if the pair lists differ in length, or if
    /// tokenization, generation, or decoding fails.
    pub fn generate_until<S: AsRef<str>>(
        &self,
        prefixes: &[S],
        stops: &[StopSpec],
        max_length: usize,
    ) -> Result<Vec<String>> {
        if prefixes.len() != stops.len() {
            return Err(Error::BatchMismatch {
                left: prefixes.len(),
                right: stops.len(),
            });
        }
        prefixes
            .iter()
            .zip(stops)
            .map(|(prefix, stop)| self.run_until(prefix.as_ref(), stop.as_slice(), max_length))
            .collect()
    }

    /// Drive one constrained generation loop to its stopping condition.
    fn run_until(&self, prefix: &str, stops: &[String], max_length: usize) -> Result<String> {
        let mut state = GenerationState::new(prefix, stops, max_length);
        debug!(stops = stops.len(), max_length, "generate-until request");

        while !state.exhausted() {
            let batch = self.builder().generate_batch(&[state.prefix()])?;
            let mut tokens = self.with_rng(|rng| {
                let output = self.executor.greedy_generate(rng, &batch)?;
                Ok((output.tokens, output.next_rng))
            })?;
            let step = tokens.pop().unwrap_or_default();
            if step.is_empty() {
                // An executor that produces nothing would never reach the
                // length bound; treat it as terminal.
                break;
            }
            let produced = step.len();
            let decoded = self.tokenizer.decode(&step)?;
            trace!(produced, total = state.generated_len() + produced, "generation step");
            if state.advance(&decoded, produced) {
                break;
            }
        }
        Ok(state.into_text())
    }
}
