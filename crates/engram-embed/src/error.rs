//! Embedding error types.

use thiserror::Error;

/// Errors that can occur during model registry lookup, model
/// initialization, or embedding generation.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Model initialization failed (download, ONNX runtime, cache issues).
    #[error("model initialization failed: {0}")]
    InitFailed(String),

    /// Tokenization or inference failed. The batch is discarded whole;
    /// the service never returns a partial batch.
    #[error("embedding generation failed: {0}")]
    EmbedFailure(String),

    /// Registry lookup for an unregistered model version.
    #[error("unknown model version '{0}'")]
    UnknownModel(String),

    /// A required credential or setting is absent.
    #[error("missing configuration: {0}")]
    ConfigMissing(String),

    /// Non-2xx response from an HTTP embedding provider.
    #[error("embedding request for model '{model}' failed with status {status}")]
    Http { model: String, status: u16 },

    /// The service was used after `close()`.
    #[error("embedding service is shut down")]
    Shutdown,
}
