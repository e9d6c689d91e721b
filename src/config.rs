//! Configuration for the substitution engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default capacity of the reader and writer buffers (8 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Configuration for [`StringSubstitutionEngine`](crate::engine::StringSubstitutionEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory receiving a copy of every file before it is rewritten.
    /// If None, no backups are made.
    pub backup_location: Option<PathBuf>,

    /// Capacity of the buffered reader and writer around each file.
    pub buffer_size: usize,

    /// Whether the files of a group are substituted in parallel.
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backup_location: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            parallel: false,
        }
    }
}

impl EngineConfig {
    /// Set the backup directory.
    pub fn with_backup_location<P: Into<PathBuf>>(mut self, location: P) -> Self {
        self.backup_location = Some(location.into());
        self
    }

    /// Set the I/O buffer size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Enable or disable parallel file processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
