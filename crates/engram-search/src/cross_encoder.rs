//! ONNX cross-encoder producing one relevance logit per (query, document)
//! pair.
//!
//! Uses dual-sequence tokenization with longest-first truncation at the
//! configured max length, the standard BERT input tensors, and a `logits`
//! output of shape `[batch, 1]`.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use engram_config::RerankConfig;
use tokenizers::{TruncationParams, TruncationStrategy};
use tracing::{debug, info};

use crate::error::SearchError;
use crate::rerank::PairScorer;

struct InferenceState {
    session: ort::session::Session,
    tokenizer: tokenizers::Tokenizer,
}

/// ONNX cross-encoder (default model: ms-marco-MiniLM-L-6-v2).
pub struct CrossEncoder {
    model_id: String,
    state: Mutex<Option<InferenceState>>,
}

impl CrossEncoder {
    /// Download (or resolve from cache) and load the cross-encoder.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Rerank`] when the runtime, download,
    /// tokenizer, or session setup fails.
    pub fn new(config: &RerankConfig) -> Result<Self, SearchError> {
        engram_embed::runtime::ensure_runtime()
            .map_err(|e| SearchError::Rerank(e.to_string()))?;

        let (tokenizer, session) =
            load_model_files(config).map_err(|e| SearchError::Rerank(e.to_string()))?;

        info!(model = %config.model_id, "cross-encoder loaded");
        Ok(Self {
            model_id: config.model_id.clone(),
            state: Mutex::new(Some(InferenceState { session, tokenizer })),
        })
    }

    /// Model repo id, for diagnostics.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Release the model session. Idempotent.
    pub fn close(&self) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            debug!(model = %self.model_id, "cross-encoder session released");
        }
    }
}

impl PairScorer for CrossEncoder {
    fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<f64>, SearchError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = guard
            .as_mut()
            .ok_or_else(|| SearchError::Rerank("cross-encoder is shut down".to_string()))?;
        run_inference(state, query, documents)
    }
}

fn load_model_files(
    config: &RerankConfig,
) -> Result<(tokenizers::Tokenizer, ort::session::Session), Box<dyn std::error::Error + Send + Sync>>
{
    let cache_dir = if config.cache_dir.is_empty() {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".engram")
            .join("cache")
            .join("models")
    } else {
        PathBuf::from(&config.cache_dir)
    };

    let api = hf_hub::api::sync::ApiBuilder::new()
        .with_cache_dir(cache_dir)
        .build()?;
    let repo = api.model(config.model_id.clone());

    let model_path = repo
        .get("onnx/model.onnx")
        .or_else(|_| repo.get("model.onnx"))?;
    let tokenizer_path = repo.get("tokenizer.json")?;

    let mut tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| format!("tokenizer load: {e}"))?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: config.max_length,
            strategy: TruncationStrategy::LongestFirst,
            ..TruncationParams::default()
        }))
        .map_err(|e| format!("tokenizer truncation: {e}"))?;

    let session = ort::session::Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(&model_path)?;

    Ok((tokenizer, session))
}

fn run_inference(
    state: &mut InferenceState,
    query: &str,
    documents: &[String],
) -> Result<Vec<f64>, SearchError> {
    let fail = |msg: String| SearchError::Rerank(msg);

    let pairs: Vec<(String, String)> = documents
        .iter()
        .map(|doc| (query.to_string(), doc.clone()))
        .collect();
    let encodings = state
        .tokenizer
        .encode_batch(pairs, true)
        .map_err(|e| fail(format!("tokenize pairs: {e}")))?;

    let seq = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
    if seq == 0 {
        return Err(fail("empty tokenization".to_string()));
    }

    let batch = documents.len();
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
    let mask_tensor = ort::value::Tensor::from_array((shape.clone(), attention_mask))
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

    let logits_value = outputs
        .get("logits")
        .unwrap_or_else(|| &outputs[0]);
    let (logits_shape, logits_data) = logits_value
        .try_extract_tensor::<f32>()
        .map_err(|e| fail(format!("extract logits: {e}")))?;

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let dims: Vec<usize> = logits_shape.iter().map(|&d| d as usize).collect();
    if dims.first() != Some(&batch) {
        return Err(fail(format!(
            "unexpected logits shape {dims:?} for batch {batch}"
        )));
    }
    let stride = dims.get(1).copied().unwrap_or(1);

    Ok((0..batch)
        .map(|b| f64::from(logits_data[b * stride]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rerank::{Reranker, RerankCandidate};

    // Real-model tests are ignored by default; run with:
    //   cargo test -p engram-search -- --ignored

    #[test]
    #[ignore = "downloads the ms-marco cross-encoder from the Hugging Face hub"]
    fn relevant_pair_scores_above_irrelevant_pair() {
        let encoder = CrossEncoder::new(&RerankConfig::default()).expect("model loads");
        let logits = encoder
            .score_pairs(
                "How to handle errors in Go?",
                &[
                    "Go error handling uses explicit return values.".to_string(),
                    "Chocolate cake requires three cups of flour.".to_string(),
                ],
            )
            .unwrap();
        assert!(
            logits[0] > logits[1],
            "relevant logit {:.3} should beat irrelevant {:.3}",
            logits[0],
            logits[1]
        );
    }

    #[test]
    #[ignore = "downloads the ms-marco cross-encoder from the Hugging Face hub"]
    fn go_candidate_wins_the_blended_rerank() {
        let encoder = CrossEncoder::new(&RerankConfig::default()).expect("model loads");
        let reranker = Reranker::new(Box::new(encoder), 0.7);

        let candidates = vec![
            RerankCandidate {
                id: "A".to_string(),
                content: "Python try/except error handling.".to_string(),
                score: 0.8,
                metadata: serde_json::Value::Null,
            },
            RerankCandidate {
                id: "B".to_string(),
                content: "Go error handling uses explicit return values.".to_string(),
                score: 0.6,
                metadata: serde_json::Value::Null,
            },
            RerankCandidate {
                id: "C".to_string(),
                content: "JavaScript Promise.catch async.".to_string(),
                score: 0.7,
                metadata: serde_json::Value::Null,
            },
        ];

        let results = reranker
            .rerank("How to handle errors in Go?", &candidates, 10)
            .unwrap();
        assert_eq!(results[0].id, "B");
    }
}
