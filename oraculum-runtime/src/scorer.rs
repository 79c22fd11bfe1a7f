//! Sliding-window likelihood scoring
//!
//! A sequence longer than the executor's window width is scored in
//! fixed-width slices: full windows at offsets `0, seq_length, …`, and a
//! final right-aligned window whose overlap with the previous window is
//! masked out of the score. Window planning is pure; the session drives
//! the executor calls.

use oraculum::executor::ScoreOutput;
use oraculum::{RollingBatch, ScoreBatch};

/// One fixed-width slice of a longer sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Offset of the window's first token in the full sequence.
    pub start: usize,
    /// Number of leading positions whose `output_mask` is forced to zero
    /// because the previous window already scored them. Non-zero only for
    /// a right-aligned final window.
    pub masked_prefix: usize,
}

/// Plan the window offsets for a sequence of `total_len` tokens.
///
/// `total_len` is either zero (empty plan) or at least `seq_length`
/// (the rolling batch builder pads short sequences up to one window).
/// When the last stride would run past the end of the sequence, the final
/// window is right-aligned instead and its overlap masked, so every token
/// position is scored exactly once across the plan.
#[must_use]
pub fn window_plan(total_len: usize, seq_length: usize) -> Vec<Window> {
    if total_len == 0 || seq_length == 0 {
        return Vec::new();
    }
    if total_len <= seq_length {
        return vec![Window {
            start: 0,
            masked_prefix: 0,
        }];
    }
    let mut windows = Vec::with_capacity(total_len.div_ceil(seq_length));
    let mut offset = 0;
    while offset < total_len {
        if offset + seq_length > total_len {
            windows.push(Window {
                start: total_len - seq_length,
                masked_prefix: seq_length - (total_len - offset),
            });
        } else {
            windows.push(Window {
                start: offset,
                masked_prefix: 0,
            });
        }
        offset += seq_length;
    }
    windows
}

/// Slice one window out of a rolling batch as a scoring batch.
///
/// The window's attention mask doubles as its output mask, except for the
/// `masked_prefix` positions a right-aligned final window shares with its
/// predecessor.
#[must_use]
pub fn window_batch(rolling: &RollingBatch, window: Window, seq_length: usize) -> ScoreBatch {
    let range = window.start..window.start + seq_length;
    let batch_size = rolling.output_tokens.len();

    let mut batch = ScoreBatch {
        input_tokens: Vec::with_capacity(batch_size),
        output_tokens: Vec::with_capacity(batch_size),
        input_mask: Vec::with_capacity(batch_size),
        output_mask: Vec::with_capacity(batch_size),
    };
    for row in 0..batch_size {
        batch
            .input_tokens
            .push(rolling.input_tokens[row][range.clone()].to_vec());
        batch
            .output_tokens
            .push(rolling.output_tokens[row][range.clone()].to_vec());
        let attention = &rolling.attention_mask[row][range.clone()];
        batch.input_mask.push(attention.to_vec());
        let mut output_mask = attention.to_vec();
        for bit in &mut output_mask[..window.masked_prefix] {
            *bit = false;
        }
        batch.output_mask.push(output_mask);
    }
    batch
}

/// Running aggregate across the windows of one rolling-score request.
///
/// Loglikelihoods sum; the greedy flag is the AND across windows, so the
/// whole sequence is greedy only if every window matched at every scored
/// position. An empty aggregate (zero windows) is zero likelihood with a
/// vacuously true flag.
#[derive(Debug)]
pub struct ScoreAggregate {
    /// Per-sequence summed log-likelihood.
    pub loglikelihood: Vec<f32>,
    /// Per-sequence greedy-match flag.
    pub is_greedy: Vec<bool>,
}

impl ScoreAggregate {
    /// Start a zero aggregate for `batch_size` sequences.
    #[must_use]
    pub fn new(batch_size: usize) -> Self {
        Self {
            loglikelihood: vec![0.0; batch_size],
            is_greedy: vec![true; batch_size],
        }
    }

    /// Fold one window's results into the aggregate.
    pub fn absorb(&mut self, output: &ScoreOutput) {
        for (total, ll) in self.loglikelihood.iter_mut().zip(&output.loglikelihood) {
            *total += ll;
        }
        for (total, greedy) in self.is_greedy.iter_mut().zip(&output.is_greedy) {
            *total = *total && *greedy;
        }
    }
}
