//! Evolve command line
//!
//! Library half of the `evo` binary: proposal batch loading and the
//! subcommand bodies, kept here so they can be driven from tests.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod commands;
pub mod proposals;

pub use commands::{check, oracle_probe, restore, run, write_report, CheckReport, FragmentCheck};
pub use proposals::{load_requests, parse_requests, BatchFormat};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
