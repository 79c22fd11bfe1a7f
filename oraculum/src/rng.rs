//! Counter-based pseudo-random state
//!
//! The session owns a single [`RngState`] and threads it through every
//! executor invocation: the executor receives the current state, draws the
//! per-call keys it needs through an [`RngSequence`], and hands back the
//! advanced state, which becomes the session's next current value. Replaying
//! the same seed with the same call ordering is bit-reproducible.
//!
//! This module holds no synchronization; concurrent callers serialize
//! through the session's lock.

/// A derived key consumed by exactly one randomness draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngKey(pub u64);

/// Counter-based RNG state: a fixed key word plus a call counter.
///
/// `derive` consumes the state by value and returns the successor, so a
/// state value cannot be reused once it has been advanced through the
/// normal flow. Sequential derivations never yield the same key twice
/// (the counter is injective through the mixing function).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngState {
    key: u64,
    counter: u64,
}

impl RngState {
    /// Construct the initial state for a session from its seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            key: splitmix64(seed),
            counter: 0,
        }
    }

    /// Derive one key and the successor state.
    ///
    /// The caller must use the key for exactly one draw and replace its
    /// stored state with the returned successor.
    #[must_use]
    pub fn derive(self) -> (RngKey, RngState) {
        let mixed = splitmix64(self.key ^ self.counter.wrapping_mul(GOLDEN_GAMMA));
        let next = Self {
            key: self.key,
            counter: self.counter.wrapping_add(1),
        };
        (RngKey(mixed), next)
    }
}

/// Per-call key dispenser, analogous to threading a split-off generator
/// through one executor invocation.
///
/// Executors construct one `RngSequence` from the state they were handed,
/// draw as many keys as their stochastic layers need, and surrender the
/// advanced state in their output. The wrapper guarantees the state moves
/// forward at least once per call even when no key is drawn.
#[derive(Debug)]
pub struct RngSequence {
    state: RngState,
    drawn: bool,
}

impl RngSequence {
    /// Wrap the state handed to one executor call.
    #[must_use]
    pub fn new(state: RngState) -> Self {
        Self {
            state,
            drawn: false,
        }
    }

    /// Draw the next key, advancing the wrapped state.
    pub fn next_key(&mut self) -> RngKey {
        let (key, next) = self.state.derive();
        self.state = next;
        self.drawn = true;
        key
    }

    /// Surrender the advanced state.
    ///
    /// If no key was drawn, the state is advanced once here so that no two
    /// executor calls ever observe the same state value.
    #[must_use]
    pub fn into_state(mut self) -> RngState {
        if !self.drawn {
            let (_, next) = self.state.derive();
            self.state = next;
        }
        self.state
    }
}

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// SplitMix64 finalizer. Bijective over u64, so distinct inputs always
/// produce distinct keys.
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(GOLDEN_GAMMA);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}
