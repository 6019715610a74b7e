//! Evolve Core - validated self-mutation engine
//!
//! Applies improvement proposals to allow-listed source files and keeps a
//! change only when a capability benchmark scores strictly better than the
//! best score so far:
//! - proposals are parsed, screened for dangerous code and classified
//! - every target is snapshotted before the first write
//! - patches are validated in memory and written atomically
//! - non-improvements and rejected patches are restored byte for byte
//! - every attempt lands in a hash-chained ledger
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use evo_benchmark::{CapabilityBenchmark, HttpOracle};
//! use evo_core::{EvolutionConfig, MutationRequest, Orchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EvolutionConfig::load("evolve.toml")?;
//! let oracle = Arc::new(HttpOracle::new(config.oracle.clone())?);
//! let probe = CapabilityBenchmark::new(oracle).with_retry(config.retry.clone());
//!
//! let mut orchestrator = Orchestrator::new(config, probe)?;
//! let outcome = orchestrator
//!     .run_batch(&[MutationRequest::new("agent.py", proposal_text)])
//!     .await?;
//!
//! println!("accepted {} changes", outcome.summary.accepted_count);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod state;
pub mod types;

pub use config::{EvolutionConfig, DEFAULT_SAMPLE_SIZE};
pub use error::{ConfigError, EvolutionError};
pub use ledger::{Ledger, GENESIS_HASH};
pub use orchestrator::{BatchOutcome, Orchestrator};
pub use state::{allowed_transitions, validate_transition, AttemptPhase, AttemptState};
pub use types::{
    AttemptId, AttemptOutcome, BatchReport, BatchSummary, EvolutionRecord, MutationRequest,
    SkipReason,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a batch
    pub use crate::{
        AttemptOutcome, BatchOutcome, EvolutionConfig, EvolutionError, EvolutionRecord,
        MutationRequest, Orchestrator,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
