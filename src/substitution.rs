//! Streaming string substitution.
//!
//! A [`RadixTree`](crate::radix::RadixTree) built from `before -> after`
//! change pairs drives a [`StreamingSubstitutor`], which rewrites input one
//! character at a time with bounded look-ahead. The remaining modules adapt
//! that core to real resources:
//!
//! - [`algorithm`] - the [`SubstitutionAlgorithm`] seam and its radix tree implementation
//! - [`substitutable`] - files and in-memory buffers that can be rewritten
//! - [`archive`] - members of zip and jar archives
//! - [`mode`] - path separator rewriting of replacement values
//! - [`preprocessor`] - `$NAME$` expansion in definition attributes

pub mod algorithm;
pub mod archive;
pub mod mode;
pub mod preprocessor;
pub mod substitutable;
pub mod substitutor;

pub use algorithm::{RadixTreeSubstitutionAlgorithm, SubstitutionAlgorithm};
pub use archive::{ArchiveMemberSubstitutable, archive_member_substitutables};
pub use mode::ModeType;
pub use preprocessor::{AttributePreprocessor, VariablePreprocessor};
pub use substitutable::{
    FileSubstitutable, FileSubstitutableFactory, StringSubstitutable, Substitutable,
    SubstitutableFactory,
};
pub use substitutor::{StreamingSubstitutor, substitute};
