//! # stringsubs
//!
//! Streaming multi-pattern string substitution for configuration files.
//!
//! ## Features
//!
//! - Radix tree of substitution keys with path compression
//! - Character-at-a-time longest-match substitution with bounded look-ahead
//! - JSON substitution definitions grouping change pairs and files
//! - Path separator modes and `$NAME$` token preprocessing
//! - In-place file rewriting with optional backups and parallel groups

pub mod cli;
pub mod config;
pub mod definition;
pub mod engine;
pub mod error;
pub mod radix;
pub mod substitution;

pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::definition::StringsubsDefinition;
    pub use crate::engine::{StringSubstitutionEngine, SubstitutionReport};
    pub use crate::error::{Result, StringSubsError};
    pub use crate::radix::RadixTree;
    pub use crate::substitution::{StreamingSubstitutor, SubstitutionAlgorithm, substitute};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
