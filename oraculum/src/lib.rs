//! Oraculum: request-execution core for serving a causal language model
//!
//! This crate provides the core types and traits for turning text requests
//! into fixed-shape, model-consumable batches, and for threading shared RNG
//! state through executor calls. The numeric backend is abstracted behind
//! [`ModelExecutor`]; the request-level operations live in the
//! `oraculum-runtime` crate.

pub mod batch;
pub mod config;
pub mod error;
pub mod executor;
pub mod rng;
pub mod tokenizer;

pub use batch::{BatchBuilder, Encoding, GenerateBatch, RollingBatch, ScoreBatch};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use executor::{GenerateOutput, ModelExecutor, SamplingConfig, ScoreOutput};
pub use rng::{RngKey, RngSequence, RngState};
pub use tokenizer::{HfTokenizer, Tokenizer};
