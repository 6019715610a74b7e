//! Evolve Benchmark
//!
//! Objective capability measurement used to accept or roll back mutations.
//!
//! - [`bank`]: the fixed, weighted question bank
//! - [`Oracle`]: external answerer, with bounded retry on rate limits
//! - [`CapabilityBenchmark`]: sampling, loose answer matching and scoring
//! - [`HttpOracle`]: chat-completions backed oracle
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use evo_benchmark::{CapabilityBenchmark, HttpOracle, HttpOracleConfig};
//!
//! let oracle = Arc::new(HttpOracle::new(HttpOracleConfig::default())?);
//! let score = CapabilityBenchmark::new(oracle).with_seed(42).score(10).await;
//! println!("{:.1}%", score.percentage);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod bank;
pub mod benchmark;
pub mod http;
pub mod oracle;

pub use bank::{standard_bank, BenchmarkItem, QuestionCategory};
pub use benchmark::{
    is_correct, percentage, BenchmarkError, BenchmarkScore, CapabilityBenchmark, CategoryScore,
    ItemResult, Probe, PROMPT_PREFIX,
};
pub use http::{HttpOracle, HttpOracleConfig};
pub use oracle::{ask_with_retry, Oracle, OracleError, RetryPolicy};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
