//! Oraculum Runtime: request-level inference operations
//!
//! This crate provides the [`InferenceSession`] — the long-lived object
//! answering score / rolling-score / generate / generate-until requests —
//! plus the sliding-window scorer and the constrained generation loop it
//! composes.
//!
//! # Architecture
//!
//! ```text
//! InferenceSession<E, T>      ← text in, numbers/text out
//!   ├── BatchBuilder          ← fixed-shape batches (oraculum core)
//!   ├── window_plan/batch     ← sliding-window scoring
//!   ├── GenerationState       ← stop-bounded generation loop
//!   └── E: ModelExecutor      ← numeric work, owns weights + devices
//! ```

pub mod generate;
pub mod scorer;
pub mod session;

pub use generate::{find_stop, GenerationState, StopSpec};
pub use scorer::{window_batch, window_plan, ScoreAggregate, Window};
pub use session::InferenceSession;
