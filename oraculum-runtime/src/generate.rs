//! Stop-condition-bounded generation state
//!
//! A model's generation primitive produces at most one fixed-length
//! continuation per call; stop-string detection and context growth require
//! re-invoking generation with updated context. [`GenerationState`] holds
//! the per-request loop state; the session drives the executor calls.

/// Stop condition for one prefix: a single stop string or a set of them.
///
/// An empty set means "never stop on content" — generation runs until the
/// length bound.
#[derive(Debug, Clone)]
pub enum StopSpec {
    One(String),
    Many(Vec<String>),
}

impl StopSpec {
    /// View the stop strings as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::One(stop) => std::slice::from_ref(stop),
            Self::Many(stops) => stops,
        }
    }
}

impl From<&str> for StopSpec {
    fn from(stop: &str) -> Self {
        Self::One(stop.to_string())
    }
}

impl From<String> for StopSpec {
    fn from(stop: String) -> Self {
        Self::One(stop)
    }
}

impl From<Vec<String>> for StopSpec {
    fn from(stops: Vec<String>) -> Self {
        Self::Many(stops)
    }
}

/// Byte offset of the earliest stop-string occurrence in `text`.
///
/// Empty stop strings are ignored; they would otherwise match at offset
/// zero and truncate everything.
#[must_use]
pub fn find_stop(text: &str, stops: &[String]) -> Option<usize> {
    stops
        .iter()
        .filter(|stop| !stop.is_empty())
        .filter_map(|stop| text.find(stop.as_str()))
        .min()
}

/// Per-request state of one "generate until" loop.
///
/// Mutated once per iteration; destroyed when the loop terminates. The
/// prefix grows by each step's decoded output, so the next executor call
/// sees the updated context (hard-truncated to the input window by the
/// batch builder).
#[derive(Debug)]
pub struct GenerationState {
    prefix: String,
    accumulated: String,
    generated_len: usize,
    stops: Vec<String>,
    max_length: usize,
}

impl GenerationState {
    /// Start a loop for one (prefix, stop-set) pair.
    #[must_use]
    pub fn new(prefix: &str, stops: &[String], max_length: usize) -> Self {
        Self {
            prefix: prefix.to_string(),
            accumulated: String::new(),
            generated_len: 0,
            stops: stops.to_vec(),
            max_length,
        }
    }

    /// The live prefix to rebuild the next batch from.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Total tokens generated so far.
    #[must_use]
    pub fn generated_len(&self) -> usize {
        self.generated_len
    }

    /// Whether the length bound has been reached.
    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.generated_len >= self.max_length
    }

    /// Fold one generation step into the state.
    ///
    /// Appends the decoded text to both the accumulated output and the
    /// live prefix, then scans the whole accumulated text so a stop string
    /// spanning a step boundary is still caught. Returns `true` when a
    /// stop string was found; the accumulated text is truncated at the
    /// match start.
    pub fn advance(&mut self, decoded: &str, tokens_produced: usize) -> bool {
        self.accumulated.push_str(decoded);
        self.prefix.push_str(decoded);
        self.generated_len += tokens_produced;
        if let Some(at) = find_stop(&self.accumulated, &self.stops) {
            self.accumulated.truncate(at);
            true
        } else {
            false
        }
    }

    /// Consume the state, yielding the accumulated (possibly truncated)
    /// generated text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.accumulated
    }
}
