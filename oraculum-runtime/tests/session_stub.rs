//! Integration tests for the inference session against a stub executor.
//!
//! The stub computes deterministic scores from the tokens selected by the
//! output mask and generates arithmetic continuations, so window planning,
//! mask placement, RNG threading, and loop termination are all observable
//! without a numeric backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use approx::assert_relative_eq;

use oraculum::executor::{GenerateOutput, SamplingConfig, ScoreOutput};
use oraculum::{
    Error, GenerateBatch, ModelExecutor, Result, RngSequence, RngState, ScoreBatch,
    SessionConfig, Tokenizer,
};
use oraculum_runtime::{InferenceSession, StopSpec};

const EOS_ID: u32 = 10002;
const WORD_ID: u32 = 999;

/// Tokenizer over a numeric toy vocabulary: the word `N` (optionally with a
/// trailing comma) encodes to id `N`; any other word encodes to 999.
struct StubTokenizer;

impl Tokenizer for StubTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text
            .split_whitespace()
            .map(|word| word.trim_end_matches(',').parse().unwrap_or(WORD_ID))
            .collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        Ok(ids
            .iter()
            .map(|&id| match id {
                EOS_ID => "</s>".to_string(),
                WORD_ID => " w".to_string(),
                _ => format!(" {id},"),
            })
            .collect())
    }

    fn pad_token_id(&self) -> u32 {
        0
    }

    fn bos_token_id(&self) -> u32 {
        10001
    }

    fn eos_token_id(&self) -> u32 {
        EOS_ID
    }

    fn eos_token(&self) -> &str {
        "</s>"
    }
}

/// Per-token score contribution; position-independent so that a single
/// window and a window split score identically.
fn token_cost(token: u32) -> f32 {
    (token % 7 + 1) as f32 * 0.25
}

fn token_is_greedy(token: u32) -> bool {
    token % 5 != 0
}

#[derive(Default)]
struct StubExecutor {
    /// Tokens produced per greedy_generate call.
    step_tokens: usize,
    /// Fixed output for the sampled generate entry point, if set.
    sampled_tokens: Option<Vec<u32>>,
    fail_next_score: AtomicBool,
    score_calls: AtomicUsize,
    greedy_calls: AtomicUsize,
    states_seen: Mutex<Vec<RngState>>,
    masks_seen: Mutex<Vec<Vec<Vec<bool>>>>,
}

impl StubExecutor {
    fn new(step_tokens: usize) -> Arc<Self> {
        Arc::new(Self {
            step_tokens,
            ..Self::default()
        })
    }

    fn with_sampled(tokens: Vec<u32>) -> Arc<Self> {
        Arc::new(Self {
            step_tokens: 2,
            sampled_tokens: Some(tokens),
            ..Self::default()
        })
    }

    fn record(&self, rng: RngState) {
        self.states_seen.lock().unwrap().push(rng);
    }
}

impl ModelExecutor for StubExecutor {
    fn score_window(&self, rng: RngState, batch: &ScoreBatch) -> Result<ScoreOutput> {
        self.record(rng);
        if self.fail_next_score.swap(false, Ordering::SeqCst) {
            return Err(Error::Executor("injected failure".into()));
        }
        self.score_calls.fetch_add(1, Ordering::SeqCst);
        self.masks_seen.lock().unwrap().push(batch.output_mask.clone());

        let mut seq = RngSequence::new(rng);
        let _key = seq.next_key();

        let mut loglikelihood = Vec::with_capacity(batch.batch_size());
        let mut is_greedy = Vec::with_capacity(batch.batch_size());
        for (tokens, mask) in batch.output_tokens.iter().zip(&batch.output_mask) {
            let scored = tokens
                .iter()
                .zip(mask)
                .filter(|(_, &m)| m)
                .map(|(&t, _)| t);
            loglikelihood.push(-scored.clone().map(token_cost).sum::<f32>());
            is_greedy.push(scored.clone().all(token_is_greedy));
        }
        Ok(ScoreOutput {
            loglikelihood,
            is_greedy,
            next_rng: seq.into_state(),
        })
    }

    fn generate(
        &self,
        rng: RngState,
        batch: &GenerateBatch,
        _sampling: &SamplingConfig,
    ) -> Result<GenerateOutput> {
        self.record(rng);
        let mut seq = RngSequence::new(rng);
        let key = seq.next_key();
        let tokens = batch
            .input_tokens
            .iter()
            .map(|_| {
                self.sampled_tokens.clone().unwrap_or_else(|| {
                    // Key-dependent output so replay differences are visible.
                    (0..self.step_tokens)
                        .map(|i| ((key.0 >> (8 * i)) % 50 + 1) as u32)
                        .collect()
                })
            })
            .collect();
        Ok(GenerateOutput {
            tokens,
            next_rng: seq.into_state(),
        })
    }

    fn greedy_generate(&self, rng: RngState, batch: &GenerateBatch) -> Result<GenerateOutput> {
        self.record(rng);
        self.greedy_calls.fetch_add(1, Ordering::SeqCst);
        let mut seq = RngSequence::new(rng);
        let _key = seq.next_key();

        // Continue the arithmetic sequence from the last real token.
        let tokens = batch
            .input_tokens
            .iter()
            .zip(&batch.attention_mask)
            .map(|(row, mask)| {
                let last = row
                    .iter()
                    .zip(mask)
                    .filter(|(_, &m)| m)
                    .map(|(&t, _)| t)
                    .last()
                    .unwrap_or(0);
                (1..=self.step_tokens as u32).map(|i| last + i).collect()
            })
            .collect();
        Ok(GenerateOutput {
            tokens,
            next_rng: seq.into_state(),
        })
    }
}

fn config(input_length: usize, seq_length: usize) -> SessionConfig {
    SessionConfig {
        input_length,
        seq_length,
        seed: 42,
        ..SessionConfig::default()
    }
}

fn session(
    stub: &Arc<StubExecutor>,
    cfg: SessionConfig,
) -> InferenceSession<Arc<StubExecutor>, StubTokenizer> {
    InferenceSession::new(Arc::clone(stub), StubTokenizer, cfg).unwrap()
}

fn numbers(range: std::ops::RangeInclusive<u32>) -> String {
    range.map(|i| format!("{i} ")).collect()
}

#[test]
fn score_uses_exactly_one_window() {
    let stub = StubExecutor::new(2);
    let session = session(&stub, config(8, 16));

    let (ll, greedy) = session
        .score(&["The capital of France is"], &[" Paris."])
        .unwrap();
    assert_eq!(ll.len(), 1);
    assert_eq!(greedy.len(), 1);
    assert!(ll[0] < 0.0);
    assert!(ll[0].is_finite());
    assert_eq!(stub.score_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn rolling_matches_single_window_for_short_text() {
    let text = "1 2 3 4 5";
    let stub = StubExecutor::new(2);
    let session = session(&stub, config(8, 16));

    let (single_ll, single_greedy) = session.score(&[""], &[text]).unwrap();
    let (rolling_ll, rolling_greedy) = session.score_rolling(&[text]).unwrap();

    assert_relative_eq!(single_ll[0], rolling_ll[0]);
    assert_eq!(single_greedy[0], rolling_greedy[0]);
    // 1..=5 cost: 2+3+4+5+6 quarters.
    assert_relative_eq!(rolling_ll[0], -5.0);
    // Token 5 breaks the greedy match in both paths.
    assert!(!rolling_greedy[0]);
}

#[test]
fn rolling_forty_tokens_runs_three_windows() {
    let stub = StubExecutor::new(2);
    let session = session(&stub, config(8, 16));

    let text = numbers(1..=40);
    let (ll, _) = session.score_rolling(&[text]).unwrap();
    assert_eq!(stub.score_calls.load(Ordering::SeqCst), 3);

    // The final right-aligned window masks its 8-token overlap with the
    // previous window.
    let masks = stub.masks_seen.lock().unwrap();
    assert_eq!(masks[0][0], vec![true; 16]);
    assert_eq!(masks[1][0], vec![true; 16]);
    let mut expected_last = vec![false; 8];
    expected_last.extend(vec![true; 8]);
    assert_eq!(masks[2][0], expected_last);

    let expected: f32 = (1..=40u32).map(token_cost).sum();
    assert_relative_eq!(ll[0], -expected);
}

#[test]
fn rolling_scores_each_position_exactly_once() {
    let stub = StubExecutor::new(2);
    let session = session(&stub, config(8, 16));

    session.score_rolling(&[numbers(1..=40)]).unwrap();
    let masks = stub.masks_seen.lock().unwrap();
    let scored: usize = masks
        .iter()
        .map(|call| call[0].iter().filter(|&&m| m).count())
        .sum();
    assert_eq!(scored, 40);
}

#[test]
fn generate_until_stops_at_first_occurrence() {
    let stub = StubExecutor::new(2);
    let session = session(&stub, config(8, 16));

    let out = session
        .generate_until(&["Count: 1, 2, 3,"], &[StopSpec::from(" 6,")], 20)
        .unwrap();
    assert_eq!(out, vec![" 4, 5,".to_string()]);
    assert_eq!(stub.greedy_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn generate_until_empty_stop_set_runs_to_length_bound() {
    let stub = StubExecutor::new(2);
    let session = session(&stub, config(8, 16));

    let max_length = 6;
    let out = session
        .generate_until(&["Count: 1, 2, 3,"], &[StopSpec::Many(Vec::new())], max_length)
        .unwrap();
    assert_eq!(out, vec![" 4, 5, 6, 7, 8, 9,".to_string()]);
    // Bounded iteration count: ceil(max_length / step_tokens).
    assert_eq!(stub.greedy_calls.load(Ordering::SeqCst), max_length.div_ceil(2));
}

#[test]
fn generate_until_processes_pairs_independently() {
    let stub = StubExecutor::new(2);
    let session = session(&stub, config(8, 16));

    let out = session
        .generate_until(
            &["Count: 1, 2, 3,", "Count: 10, 11,"],
            &[StopSpec::from(" 6,"), StopSpec::from(" 14,")],
            20,
        )
        .unwrap();
    assert_eq!(out[0], " 4, 5,");
    assert_eq!(out[1], " 12, 13,");
}

#[test]
fn generate_until_rejects_mismatched_pairs() {
    let stub = StubExecutor::new(2);
    let session = session(&stub, config(8, 16));
    let err = session
        .generate_until(&["a", "b"], &[StopSpec::from("x")], 10)
        .unwrap_err();
    assert!(matches!(err, Error::BatchMismatch { left: 2, right: 1 }));
}

#[test]
fn generate_truncates_at_eos_marker() {
    let stub = StubExecutor::with_sampled(vec![5, EOS_ID, 7]);
    let session = session(&stub, config(8, 16));

    let out = session.generate(&["1 2"]).unwrap();
    assert_eq!(out, vec![" 5,".to_string()]);
}

#[test]
fn replay_from_same_seed_is_identical() {
    let run = || {
        let stub = StubExecutor::new(2);
        let session = session(&stub, config(8, 16));
        let (ll, _) = session.score_rolling(&[numbers(1..=40)]).unwrap();
        let generated = session.generate(&["1 2 3"]).unwrap();
        let until = session
            .generate_until(&["Count: 1, 2, 3,"], &[StopSpec::from(" 6,")], 20)
            .unwrap();
        let states = stub.states_seen.lock().unwrap().clone();
        (ll, generated, until, states)
    };

    let first = run();
    let second = run();
    assert_eq!(first.0, second.0);
    assert_eq!(first.1, second.1);
    assert_eq!(first.2, second.2);
    assert_eq!(first.3, second.3);

    // No executor call ever observes the same state value twice.
    let states = &first.3;
    for (i, a) in states.iter().enumerate() {
        for b in &states[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn rng_state_is_not_advanced_on_failure() {
    let stub = StubExecutor::new(2);
    let session = session(&stub, config(8, 16));

    stub.fail_next_score.store(true, Ordering::SeqCst);
    assert!(session.score(&["a"], &["1"]).is_err());
    session.score(&["a"], &["1"]).unwrap();

    // The failed call consumed nothing: the retry saw the same state.
    let states = stub.states_seen.lock().unwrap();
    assert_eq!(states.len(), 2);
    assert_eq!(states[0], states[1]);
}

#[test]
fn empty_request_batches_short_circuit() {
    let stub = StubExecutor::new(2);
    let session = session(&stub, config(8, 16));

    let (ll, greedy) = session.score::<&str, &str>(&[], &[]).unwrap();
    assert!(ll.is_empty());
    assert!(greedy.is_empty());
    let (ll, greedy) = session.score_rolling::<&str>(&[]).unwrap();
    assert!(ll.is_empty());
    assert!(greedy.is_empty());
    let out = session.generate::<&str>(&[]).unwrap();
    assert!(out.is_empty());

    // No executor call and no RNG derivation were consumed.
    assert_eq!(stub.score_calls.load(Ordering::SeqCst), 0);
    assert!(stub.states_seen.lock().unwrap().is_empty());
}

#[test]
fn rolling_empty_text_scores_one_masked_window() {
    let stub = StubExecutor::new(2);
    let session = session(&stub, config(8, 16));

    // An empty text still fills one padded window; its all-zero output
    // mask yields zero likelihood and a vacuously true greedy flag.
    let (ll, greedy) = session.score_rolling(&[""]).unwrap();
    assert_eq!(ll, vec![0.0]);
    assert_eq!(greedy, vec![true]);
    assert_eq!(stub.score_calls.load(Ordering::SeqCst), 1);

    let masks = stub.masks_seen.lock().unwrap();
    assert_eq!(masks[0][0], vec![false; 16]);
}

#[test]
fn concurrent_requests_never_reuse_rng_state() {
    let stub = StubExecutor::new(2);
    let session = Arc::new(session(&stub, config(8, 16)));

    let mut handles = Vec::new();
    for t in 0u32..4 {
        let session = Arc::clone(&session);
        handles.push(thread::spawn(move || {
            let text = numbers(1..=(20 + t));
            session.score_rolling(&[text]).unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let states = stub.states_seen.lock().unwrap();
    assert!(!states.is_empty());
    for (i, a) in states.iter().enumerate() {
        for b in &states[i + 1..] {
            assert_ne!(a, b);
        }
    }
}
