//! Error types shared by the scanner, the rule engine and the rule document.
//!
//! Only `Validation` and `RuleDocument` ever escape to a caller as a hard
//! failure. Access problems are logged and skipped, and operation failures are
//! folded into a [`Report`](crate::engine::Report) entry per file.

use std::path::PathBuf;
use thiserror::Error;

use crate::rules::OperationKind;

/// Main error type for dataflux.
#[derive(Error, Debug)]
pub enum DatafluxError {
    /// A file or directory could not be read. Never fatal during a scan.
    #[error("Cannot access {path}: {source}")]
    Access {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A rule definition is malformed.
    #[error("Invalid rule definition: {0}")]
    Validation(String),

    /// A move, copy or link failed for one file.
    #[error("Failed to {operation} {from} to {to}: {source}")]
    Operation {
        operation: OperationKind,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// The platform cannot honor the requested operation, e.g. a hard link
    /// across filesystems.
    #[error("Cannot {operation} {from} to {to} on this platform: {reason}")]
    UnsupportedOperation {
        operation: OperationKind,
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    /// A destination could not be planned for a file.
    #[error("Cannot plan destination for {path}: {reason}")]
    Planning { path: PathBuf, reason: String },

    /// The rule document could not be read or written.
    #[error("Rule document error at {path}: {reason}")]
    RuleDocument { path: PathBuf, reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DatafluxError>;
