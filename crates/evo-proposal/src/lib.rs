//! Evolve Proposal Layer
//!
//! Front half of a mutation attempt: freeform proposal text in, classified
//! and risk-screened fragments out.
//!
//! - [`ProposalParser`]: labeled spans and code fragments from proposal text
//! - [`ChangeClassifier`]: one [`ChangeKind`](evo_artifact::ChangeKind) per fragment
//! - [`SafetyScreen`]: pattern-based [`RiskTier`] gate

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod classifier;
pub mod parser;
pub mod safety;

pub use classifier::{normalize_import, ChangeClassifier};
pub use parser::{ProposalParser, CODE_LABEL, MODIFICATION_LABEL, REASON_LABEL};
pub use safety::{RiskAssessment, RiskTier, SafetyScreen};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
