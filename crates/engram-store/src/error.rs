//! Vector store error types.

use thiserror::Error;

/// Errors from vector persistence, caching, and bulk import.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage I/O or schema mismatch from the DuckDB backend.
    #[error("vector backend error: {0}")]
    Backend(#[from] duckdb::Error),

    /// Backend-agnostic storage failure (corrupt row, shape mismatch).
    #[error("vector backend error: {0}")]
    BackendState(String),

    /// Error from the embedding service.
    #[error("embedding error: {0}")]
    Embed(#[from] engram_embed::EmbedError),

    /// Caller supplied input the operation cannot act on.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Bulk operation attempted within the cooldown window.
    #[error("rate limited: retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}
