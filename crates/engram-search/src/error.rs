//! Search error types for engram-search.

/// Errors from expansion, reranking, and the retrieval pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Error from the vector store layer.
    #[error("store error: {0}")]
    Store(#[from] engram_store::StoreError),

    /// Error from the embedding service.
    #[error("embedding error: {0}")]
    Embed(#[from] engram_embed::EmbedError),

    /// Error from the cross-encoder (tokenization or inference).
    #[error("rerank error: {0}")]
    Rerank(String),

    /// Invalid or empty search query.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}
