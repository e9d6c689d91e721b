//! Error types for the stringsubs library.
//!
//! All fallible operations return [`StringSubsError`] through the crate-wide
//! [`Result`] alias.
//!
//! # Examples
//!
//! ```
//! use stringsubs::error::{StringSubsError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(StringSubsError::invalid_argument("Key must not be empty"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for stringsubs operations.
#[derive(Error, Debug)]
pub enum StringSubsError {
    /// I/O errors outside of a substitution stream (backups, directory listing, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A caller passed an argument that can never be valid (empty key, empty map, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The radix tree's structural invariant has been violated
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Reading or writing the resource being substituted failed
    #[error("Substitution of '{resource}' failed: {source}")]
    Substitution {
        resource: String,
        #[source]
        source: io::Error,
    },

    /// A zip or jar archive could not be read or repacked
    #[error("Archive '{resource}' failed: {source}")]
    Archive {
        resource: String,
        #[source]
        source: zip::result::ZipError,
    },

    /// The substitution definition is malformed
    #[error("Definition error: {0}")]
    Definition(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with StringSubsError.
pub type Result<T> = std::result::Result<T, StringSubsError>;

impl StringSubsError {
    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        StringSubsError::InvalidArgument(msg.into())
    }

    /// Create a new invalid state error.
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        StringSubsError::InvalidState(msg.into())
    }

    /// Wrap an archive format failure on the named archive.
    pub fn archive<S: Into<String>>(resource: S, source: zip::result::ZipError) -> Self {
        StringSubsError::Archive {
            resource: resource.into(),
            source,
        }
    }

    /// Wrap an I/O failure on the named resource.
    pub fn substitution<S: Into<String>>(resource: S, source: io::Error) -> Self {
        StringSubsError::Substitution {
            resource: resource.into(),
            source,
        }
    }

    /// Create a new definition error.
    pub fn definition<S: Into<String>>(msg: S) -> Self {
        StringSubsError::Definition(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        StringSubsError::Other(msg.into())
    }
}
