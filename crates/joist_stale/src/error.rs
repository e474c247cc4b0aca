//! Error types for staleness inputs.

use std::path::PathBuf;

use joist_common::BlobError;

/// Faults reading or writing the inputs of a staleness decision.
///
/// The analyzer never propagates these: a step whose history or dependency
/// list cannot be read is treated as outdated.
#[derive(Debug, thiserror::Error)]
pub enum StaleError {
    /// An I/O error on a history or dependency file.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The persisted history blob is unusable.
    #[error("action history at {path} is unusable: {source}")]
    CorruptHistory {
        /// The history file.
        path: PathBuf,
        /// What was wrong with it.
        source: BlobError,
    },

    /// The history payload could not be encoded or decoded.
    #[error("action history serialization failed: {reason}")]
    Serialization {
        /// Description of the failure.
        reason: String,
    },

    /// A thread panicked while holding the history lock.
    #[error("action history lock poisoned")]
    Poisoned,
}
