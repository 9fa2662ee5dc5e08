//! Process-wide ONNX runtime lifecycle.
//!
//! The ort environment is committed exactly once per process, before the
//! first session is built, and lives until process exit. Sessions (embedding
//! and reranking models) each hold their own handle and must all be dropped
//! before shutdown completes; none of this relies on destructors for
//! correctness.

use std::sync::OnceLock;

use crate::error::EmbedError;

static RUNTIME: OnceLock<Result<(), String>> = OnceLock::new();

/// Commit the global ort environment. Safe to call from every model
/// constructor; only the first call does work.
///
/// # Errors
///
/// Returns [`EmbedError::InitFailed`] if the runtime cannot be committed.
pub fn ensure_runtime() -> Result<(), EmbedError> {
    let result = RUNTIME.get_or_init(|| {
        ort::init().with_name("engram").commit();
        Ok(())
    });
    result
        .as_ref()
        .map(|_| ())
        .map_err(|e| EmbedError::InitFailed(format!("ort runtime: {e}")))
}
