//! End-to-end pipeline tests over the stub provider: full two-phase flows,
//! handler isolation, and clarification round trips without any network.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chartcode::{
    Category, CodingError, CodingPipeline, ExpertHandler, LlmProviderConfig, MemoryStore,
    PipelineSettings, PipelineStage, SqliteStore, StubProvider, SubtopicRegistry,
};

fn stub_pipeline() -> CodingPipeline {
    let provider = Arc::new(StubProvider::new(LlmProviderConfig::default()));
    let store = Arc::new(MemoryStore::new());
    CodingPipeline::new(provider, store, &PipelineSettings::default())
}

fn count(codes: &[String], code: &str) -> usize {
    codes.iter().filter(|c| c.as_str() == code).count()
}

#[tokio::test]
async fn test_end_to_end_bitewing_and_cleaning() {
    let pipeline = stub_pipeline();
    let outcome = pipeline
        .submit("Patient returns for scheduled four-film bitewing x-rays and routine adult cleaning, no complaints.")
        .await
        .unwrap();

    // Sufficient information: no clarification pause.
    assert!(!outcome.has_questions());

    // One imaging code per exposure plus one prophylaxis code.
    assert_eq!(count(&outcome.accepted_codes, "D0270"), 4);
    assert_eq!(count(&outcome.accepted_codes, "D1110"), 1);
    assert_eq!(outcome.accepted_codes.len(), 5);

    let stored = pipeline.fetch(&outcome.record_id).unwrap().unwrap();
    assert_eq!(stored.stage, PipelineStage::Finalized);
    let adjudication = stored.adjudication.unwrap();
    assert!(adjudication.rejected_codes.is_empty());
    assert!(!adjudication.explanation.is_empty());

    // Both categories produced candidates.
    let categories: Vec<Category> = stored
        .candidates
        .iter()
        .map(|c| c.source_category)
        .collect();
    assert!(categories.contains(&Category::Diagnostic));
    assert!(categories.contains(&Category::Preventive));
}

#[tokio::test]
async fn test_clarification_round_trip() {
    let pipeline = stub_pipeline();
    let outcome = pipeline
        .submit("Fractured tooth, extraction performed today.")
        .await
        .unwrap();

    let questions = outcome.questions.clone().expect("expected questions");
    assert_eq!(
        questions.clinical_questions,
        vec!["Which tooth was extracted?".to_string()]
    );
    assert!(outcome.accepted_codes.is_empty());

    let before = pipeline.fetch(&outcome.record_id).unwrap().unwrap();
    assert_eq!(before.stage, PipelineStage::AwaitingAnswers);
    let phase_one_candidates = before.candidates.clone();

    let mut answers = BTreeMap::new();
    answers.insert(
        "Which tooth was extracted?".to_string(),
        "Tooth 30, simple extraction.".to_string(),
    );
    let answered = pipeline
        .answer(&outcome.record_id, answers)
        .await
        .unwrap();

    assert_eq!(answered.accepted_codes, vec!["D7140".to_string()]);

    let after = pipeline.fetch(&outcome.record_id).unwrap().unwrap();
    assert_eq!(after.stage, PipelineStage::Finalized);

    // No re-classification: the candidate set is exactly the phase-one
    // set, and every accepted code was drawn from it.
    assert_eq!(after.candidates, phase_one_candidates);
    for code in &answered.accepted_codes {
        assert!(phase_one_candidates.iter().any(|c| &c.code == code));
    }

    // The answers were appended to the narrative, original text intact.
    assert!(after.record.processed_text.starts_with("Fractured tooth"));
    assert!(after.record.processed_text.contains("A: Tooth 30"));
    let clarification = after.clarification.unwrap();
    assert!(clarification.has_answers);
}

#[tokio::test]
async fn test_duplicate_answer_is_idempotent() {
    let pipeline = stub_pipeline();
    let outcome = pipeline
        .submit("Fractured tooth, extraction performed today.")
        .await
        .unwrap();

    let mut answers = BTreeMap::new();
    answers.insert(
        "Which tooth was extracted?".to_string(),
        "Tooth 30.".to_string(),
    );
    let first = pipeline
        .answer(&outcome.record_id, answers.clone())
        .await
        .unwrap();
    let replay = pipeline
        .answer(&outcome.record_id, answers)
        .await
        .unwrap();
    assert_eq!(first, replay);

    // Different answers against the finalized record are rejected.
    let mut different = BTreeMap::new();
    different.insert(
        "Which tooth was extracted?".to_string(),
        "Tooth 12.".to_string(),
    );
    let result = pipeline.answer(&outcome.record_id, different).await;
    assert!(matches!(result, Err(CodingError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_mutually_exclusive_crown_candidates() {
    let pipeline = stub_pipeline();
    let outcome = pipeline
        .submit("Crown prepared and seated on tooth 8.")
        .await
        .unwrap();

    // The material doubt pauses the pipeline.
    let questions = outcome.questions.clone().expect("expected questions");
    assert!(questions
        .clinical_questions
        .contains(&"What crown material was placed?".to_string()));

    let mut answers = BTreeMap::new();
    answers.insert(
        "What crown material was placed?".to_string(),
        "Full ceramic.".to_string(),
    );
    let answered = pipeline
        .answer(&outcome.record_id, answers)
        .await
        .unwrap();

    // Two alternative descriptions of one crown: at most one accepted.
    assert_eq!(answered.accepted_codes, vec!["D2740".to_string()]);
    assert_eq!(answered.rejected_codes, vec!["D2750".to_string()]);

    // Rejected codes only ever name actual candidates.
    let stored = pipeline.fetch(&outcome.record_id).unwrap().unwrap();
    for code in &answered.rejected_codes {
        assert!(stored.candidates.iter().any(|c| &c.code == code));
    }
}

#[tokio::test]
async fn test_handler_isolation_end_to_end() {
    // Diagnostic expert fails; the preventive result still flows through
    // to adjudication.
    let provider: Arc<StubProvider> = Arc::new(StubProvider::new(LlmProviderConfig::default()));
    let mut registry = SubtopicRegistry::new(4, Duration::from_secs(5));
    registry.register(
        Category::Diagnostic,
        ExpertHandler::from_sync(|_| Err(CodingError::Inference("transport failure".to_string()))),
        "failing diagnostic expert",
    );
    registry.register(
        Category::Preventive,
        ExpertHandler::from_sync(|_| {
            Ok("CODE:\nD1110\nEXPLANATION:\nAdult prophylaxis.\nDOUBT:\nnone".to_string())
        }),
        "preventive expert",
    );

    let pipeline = CodingPipeline::with_registry(
        provider,
        Arc::new(MemoryStore::new()),
        registry,
    );
    let outcome = pipeline
        .submit("Bitewing x-rays and adult cleaning today.")
        .await
        .unwrap();

    assert_eq!(outcome.accepted_codes, vec!["D1110".to_string()]);
    let stored = pipeline.fetch(&outcome.record_id).unwrap().unwrap();
    assert!(stored
        .candidates
        .iter()
        .all(|c| c.source_category == Category::Preventive));
}

#[tokio::test]
async fn test_state_survives_across_pipeline_instances() {
    // Phase two resumes from durable state alone: a fresh pipeline over
    // the same SQLite file picks up where the first left off.
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("chartcode.sqlite");

    let record_id = {
        let provider = Arc::new(StubProvider::new(LlmProviderConfig::default()));
        let store = Arc::new(SqliteStore::new(&db_path).unwrap());
        let pipeline = CodingPipeline::new(provider, store, &PipelineSettings::default());
        let outcome = pipeline
            .submit("Fractured tooth, extraction performed today.")
            .await
            .unwrap();
        assert!(outcome.has_questions());
        outcome.record_id
    };

    let provider = Arc::new(StubProvider::new(LlmProviderConfig::default()));
    let store = Arc::new(SqliteStore::new(&db_path).unwrap());
    let pipeline = CodingPipeline::new(provider, store, &PipelineSettings::default());

    let mut answers = BTreeMap::new();
    answers.insert(
        "Which tooth was extracted?".to_string(),
        "Tooth 30.".to_string(),
    );
    let answered = pipeline.answer(&record_id, answers).await.unwrap();
    assert_eq!(answered.accepted_codes, vec!["D7140".to_string()]);
}
