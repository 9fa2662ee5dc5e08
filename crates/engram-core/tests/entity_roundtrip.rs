//! Serde round-trip coverage for the shared entity types.

use engram_core::{
    Concept, DocMetadata, DocType, Document, ModelMetadata, Observation, ObservationType,
    QueryResult, Scope,
};
use pretty_assertions::assert_eq;

#[test]
fn document_round_trips_through_json() {
    let mut metadata = DocMetadata::new(42, DocType::Observation);
    metadata.field_type = Some("narrative".to_string());
    metadata.project = Some("engram".to_string());
    metadata.scope = Scope::Project;
    metadata.created_at_epoch = Some(1_750_000_000_000);
    metadata.obs_type = Some("bugfix".to_string());
    metadata.extra.insert("lang".to_string(), "rust".to_string());

    let document = Document {
        doc_id: "obs_42_narrative".to_string(),
        content: "Fixed JWT validation to handle expired tokens".to_string(),
        metadata,
    };

    let json = serde_json::to_string(&document).unwrap();
    let back: Document = serde_json::from_str(&json).unwrap();
    assert_eq!(back, document);
}

#[test]
fn observation_round_trips_with_defaults_filled() {
    let mut observation = Observation::new(7, ObservationType::Discovery);
    observation.narrative = Some("retry loops need jitter".to_string());
    observation.concepts = vec![Concept::Gotcha, Concept::Concurrency];
    observation.user_feedback = 1;

    let json = serde_json::to_string(&observation).unwrap();
    let back: Observation = serde_json::from_str(&json).unwrap();
    assert_eq!(back, observation);

    // Sparse JSON relies on serde defaults.
    let sparse: Observation = serde_json::from_str(
        r#"{"id": 1, "obs_type": "bugfix", "created_at_epoch": 1750000000000}"#,
    )
    .unwrap();
    assert_eq!(sparse.obs_type, ObservationType::Bugfix);
    assert_eq!(sparse.user_feedback, 0);
    assert_eq!(sparse.scope, Scope::Unset);
    assert!(sparse.facts.is_empty());
}

#[test]
fn query_result_serializes_both_distance_and_similarity() {
    let result = QueryResult::from_distance(
        "prompt_3".to_string(),
        0.8,
        DocMetadata::new(3, DocType::UserPrompt),
    );
    let value: serde_json::Value = serde_json::to_value(&result).unwrap();
    assert!((value["distance"].as_f64().unwrap() - 0.8).abs() < 1e-12);
    assert!((value["similarity"].as_f64().unwrap() - 0.6).abs() < 1e-12);
}

#[test]
fn model_metadata_default_flag_defaults_to_false() {
    let meta: ModelMetadata = serde_json::from_str(
        r#"{"name": "all-MiniLM-L6-v2", "version": "all-MiniLM-L6-v2", "dimensions": 384}"#,
    )
    .unwrap();
    assert!(!meta.default);
    assert_eq!(meta.dimensions, 384);
}
