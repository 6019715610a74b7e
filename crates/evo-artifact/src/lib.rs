//! Evolve Artifact Layer
//!
//! Data model and syntax primitives shared by every stage of a mutation
//! attempt.
//!
//! # Core Concepts
//!
//! - [`ChangeProposal`]: structured form of freeform proposal text
//! - [`CodeFragment`] / [`ClassifiedFragment`]: candidate code and its [`ChangeKind`]
//! - [`syntax`]: tree-sitter backed Python validation and declaration scanning
//! - [`ContentHash`]: Blake3 checksum of file snapshots
//!
//! # Example
//!
//! ```rust,ignore
//! use evo_artifact::{syntax, CodeFragment};
//!
//! let fragment = CodeFragment::new("def f(): return 1");
//! assert!(fragment.parses);
//! assert!(syntax::validate("def broken(:").is_err());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod fragment;
mod hash;
pub mod syntax;

pub use fragment::{
    ChangeKind, ChangeProposal, ClassifiedFragment, CodeFragment, ImprovementCategory,
};
pub use hash::{ContentHash, HashError};
pub use syntax::{Declaration, DeclarationKind, SyntaxError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
