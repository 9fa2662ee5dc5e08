//! Local ONNX bi-encoder embedding service.
//!
//! Resolves model files via `hf-hub` (stable cache under
//! `~/.engram/cache/models`), tokenizes with `tokenizers`, runs inference
//! through `ort` with the standard BERT input tensors (`input_ids`,
//! `attention_mask`, `token_type_ids`, all int64 `[batch, seq]`), then
//! applies the configured pooling strategy.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use engram_config::EmbeddingConfig;
use engram_core::ModelMetadata;
use tracing::{debug, info};

use crate::error::EmbedError;
use crate::pooling::{Pooling, pool_row};
use crate::runtime::ensure_runtime;
use crate::service::{Embedder, l2_normalize, zero_vector};

/// Session + tokenizer behind a single mutex; inference is serialized.
struct InferenceState {
    session: ort::session::Session,
    tokenizer: tokenizers::Tokenizer,
}

/// ONNX-backed bi-encoder. The default model is all-MiniLM-L6-v2
/// (384-dim, mean pooling, L2-normalized).
pub struct OnnxEmbedder {
    meta: ModelMetadata,
    pooling: Pooling,
    max_seq_len: usize,
    normalize: bool,
    output_tensor: Option<String>,
    state: Mutex<Option<InferenceState>>,
}

impl OnnxEmbedder {
    /// Download (or resolve from cache) and load the model.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::InitFailed`] when the runtime, download,
    /// tokenizer, or session setup fails.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        ensure_runtime()?;
        let pooling: Pooling = config.pooling.parse()?;

        let (tokenizer, session) = load_model_files(config)
            .map_err(|e| EmbedError::InitFailed(e.to_string()))?;

        info!(model = %config.model_id, dims = config.dimensions, "embedding model loaded");

        Ok(Self {
            meta: ModelMetadata {
                name: config.model_id.clone(),
                version: config.version.clone(),
                dimensions: config.dimensions,
                default: true,
            },
            pooling,
            max_seq_len: config.max_seq_len,
            normalize: config.normalize,
            output_tensor: if config.output_tensor.is_empty() {
                None
            } else {
                Some(config.output_tensor.clone())
            },
            state: Mutex::new(Some(InferenceState { session, tokenizer })),
        })
    }

    fn run_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = guard.as_mut().ok_or(EmbedError::Shutdown)?;
        run_inference(
            state,
            texts,
            self.pooling,
            self.max_seq_len,
            self.meta.dimensions,
            self.normalize,
            self.output_tensor.as_deref(),
        )
    }
}

impl Embedder for OnnxEmbedder {
    fn name(&self) -> &str {
        &self.meta.name
    }

    fn version(&self) -> &str {
        &self.meta.version
    }

    fn dimensions(&self) -> usize {
        self.meta.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Ok(zero_vector(self.meta.dimensions));
        }
        let mut out = self.run_batch(&[text])?;
        out.pop()
            .ok_or_else(|| EmbedError::EmbedFailure("empty inference result".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut live_indices = Vec::with_capacity(texts.len());
        let mut live_texts: Vec<&str> = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                results[i] = Some(zero_vector(self.meta.dimensions));
            } else {
                live_indices.push(i);
                live_texts.push(text.as_str());
            }
        }

        if !live_texts.is_empty() {
            // All non-empty inputs go through one inference call.
            let vectors = self.run_batch(&live_texts)?;
            for (idx, vector) in live_indices.into_iter().zip(vectors) {
                results[idx] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn close(&self) {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            debug!(model = %self.meta.name, "embedding session released");
        }
    }
}

/// Resolve model + tokenizer files via hf-hub and build the ort session.
fn load_model_files(
    config: &EmbeddingConfig,
) -> Result<(tokenizers::Tokenizer, ort::session::Session), Box<dyn std::error::Error + Send + Sync>>
{
    let cache_dir: PathBuf = config.resolved_cache_dir();
    debug!(cache_dir = %cache_dir.display(), model = %config.model_id, "resolving model files");

    let api = hf_hub::api::sync::ApiBuilder::new()
        .with_cache_dir(cache_dir)
        .build()?;
    let repo = api.model(config.model_id.clone());

    let model_path = repo
        .get("onnx/model.onnx")
        .or_else(|_| repo.get("model.onnx"))?;
    let tokenizer_path = repo.get("tokenizer.json")?;

    let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| format!("tokenizer load: {e}"))?;

    let session = ort::session::Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(&model_path)?;

    Ok((tokenizer, session))
}

/// Tokenize, pad, run, and pool one batch of non-empty texts.
#[allow(clippy::too_many_lines)]
fn run_inference(
    state: &mut InferenceState,
    texts: &[&str],
    pooling: Pooling,
    max_seq_len: usize,
    dims: usize,
    normalize: bool,
    output_tensor: Option<&str>,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let fail = |msg: String| EmbedError::EmbedFailure(msg);

    let inputs: Vec<String> = texts.iter().map(ToString::to_string).collect();
    let encodings = state
        .tokenizer
        .encode_batch(inputs, true)
        .map_err(|e| fail(format!("tokenize: {e}")))?;

    let longest = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
    // Per-sequence length clamps to min(model max, longest in batch).
    let seq = longest.min(max_seq_len);
    if seq == 0 {
        return Err(fail("empty tokenization".to_string()));
    }

    let batch = texts.len();
    let mut input_ids = vec![0_i64; batch * seq];
    let mut attention_mask = vec![0_i64; batch * seq];
    let mut token_type_ids = vec![0_i64; batch * seq];

    for (b, enc) in encodings.iter().enumerate() {
        let offset = b * seq;
        for (j, &id) in enc.get_ids().iter().take(seq).enumerate() {
            input_ids[offset + j] = i64::from(id);
        }
        for (j, &m) in enc.get_attention_mask().iter().take(seq).enumerate() {
            attention_mask[offset + j] = i64::from(m);
        }
        for (j, &t) in enc.get_type_ids().iter().take(seq).enumerate() {
            token_type_ids[offset + j] = i64::from(t);
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    let shape = vec![batch as i64, seq as i64];

    let ids_tensor = ort::value::Tensor::from_array((shape.clone(), input_ids))
        .map_err(|e| fail(format!("input_ids tensor: {e}")))?;
    let mask_tensor = ort::value::Tensor::from_array((shape.clone(), attention_mask.clone()))
        .map_err(|e| fail(format!("attention_mask tensor: {e}")))?;
    let type_tensor = ort::value::Tensor::from_array((shape, token_type_ids))
        .map_err(|e| fail(format!("token_type_ids tensor: {e}")))?;

    let outputs = state
        .session
        .run(ort::inputs![
            "input_ids" => ids_tensor,
            "attention_mask" => mask_tensor,
            "token_type_ids" => type_tensor,
        ])
        .map_err(|e| fail(format!("inference: {e}")))?;

    let output_value = match output_tensor {
        Some(name) => outputs
            .get(name)
            .ok_or_else(|| fail(format!("output tensor '{name}' not found")))?,
        None => &outputs[0],
    };
    let (output_shape, output_data) = output_value
        .try_extract_tensor::<f32>()
        .map_err(|e| fail(format!("extract output: {e}")))?;

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let out_dims: Vec<usize> = output_shape.iter().map(|&d| d as usize).collect();

    let (seq_out, hidden) = match (pooling, out_dims.as_slice()) {
        (Pooling::None, [b, h]) if *b == batch => (0, *h),
        (Pooling::Mean | Pooling::Cls, [b, s, h]) if *b == batch => (*s, *h),
        _ => {
            return Err(fail(format!(
                "unexpected output shape {out_dims:?} for batch {batch}"
            )));
        }
    };
    if hidden != dims {
        return Err(fail(format!(
            "model produced {hidden}-dim vectors, expected {dims}"
        )));
    }

    let mut results = Vec::with_capacity(batch);
    for b in 0..batch {
        let mask_row = if pooling == Pooling::Mean {
            &attention_mask[b * seq..(b + 1) * seq]
        } else {
            &[]
        };
        let row_seq = if pooling == Pooling::None { 0 } else { seq_out };
        let mut vector = pool_row(pooling, output_data, b, row_seq, dims, mask_row);
        if normalize {
            l2_normalize(&mut vector);
        }
        results.push(vector);
    }

    Ok(results)
}
