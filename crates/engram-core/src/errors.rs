//! Cross-cutting error types for Engram.
//!
//! Domain-specific errors (`EmbedError`, `StoreError`, `SearchError`, …) live
//! in their respective crates; this module defines the kinds that can
//! originate anywhere in the system.

use thiserror::Error;

/// Errors that can be raised by any Engram crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller supplied input the operation cannot act on (empty id list,
    /// malformed observation block, unknown filter semantics).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation was cancelled before completion; any partial result
    /// has been discarded.
    #[error("operation cancelled")]
    Cancelled,

    /// The component was asked to do work after `close()` / shutdown.
    #[error("component is shut down")]
    Shutdown,

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
