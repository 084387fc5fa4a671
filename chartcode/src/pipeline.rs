//! The two-phase coding pipeline.
//!
//! Phase one (`submit`): classify the narrative into category buckets, fan
//! out to the matching experts, parse candidates, then either pause for
//! clarification or adjudicate immediately. Phase two (`answer`): resume a
//! paused scenario with the caller's answers and re-adjudicate the
//! original candidate set against the enriched narrative. The registry is
//! never re-run in phase two; only adjudication repeats, so the candidate
//! set cannot drift between the two calls.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::adjudicate::Adjudicator;
use crate::categories::ActivationTracker;
use crate::clarify::{answers_hash, QuestionGenerator};
use crate::config::PipelineSettings;
use crate::error::{CodingError, CodingResult};
use crate::experts::{self, TopicClassifier};
use crate::llm::LlmProvider;
use crate::protocol;
use crate::registry::SubtopicRegistry;
use crate::store::{PipelineStore, StoredScenario};
use crate::types::{AnswerOutcome, PipelineStage, ScenarioRecord, SubmitOutcome};

pub struct CodingPipeline {
    classifier: TopicClassifier,
    registry: SubtopicRegistry,
    question_generator: QuestionGenerator,
    adjudicator: Adjudicator,
    store: Arc<dyn PipelineStore>,
}

impl CodingPipeline {
    /// Pipeline with the default expert per category bucket.
    pub fn new(
        provider: Arc<dyn LlmProvider + Send + Sync>,
        store: Arc<dyn PipelineStore>,
        settings: &PipelineSettings,
    ) -> Self {
        let mut registry = SubtopicRegistry::new(
            settings.max_parallel_experts,
            Duration::from_secs(settings.expert_timeout_seconds),
        );
        experts::register_default_experts(&mut registry, Arc::clone(&provider));
        Self::with_registry(provider, store, registry)
    }

    /// Pipeline over a caller-assembled registry (custom handler sets).
    pub fn with_registry(
        provider: Arc<dyn LlmProvider + Send + Sync>,
        store: Arc<dyn PipelineStore>,
        registry: SubtopicRegistry,
    ) -> Self {
        Self {
            classifier: TopicClassifier::new(Arc::clone(&provider)),
            registry,
            question_generator: QuestionGenerator::new(Arc::clone(&provider)),
            adjudicator: Adjudicator::new(provider),
            store,
        }
    }

    /// Phase one: classify, fan out, parse, and either pause for
    /// clarification or adjudicate.
    pub async fn submit(&self, scenario_text: &str) -> CodingResult<SubmitOutcome> {
        if scenario_text.trim().is_empty() {
            return Err(CodingError::InvalidRequest(
                "scenario text must not be empty".to_string(),
            ));
        }

        let record = ScenarioRecord::new(scenario_text.trim());
        let mut stored = StoredScenario::new(record);
        self.store.create(&stored)?;
        info!(record_id = %stored.record.id, "scenario submitted");

        let identifiers = self
            .classifier
            .classify(&stored.record.processed_text)
            .await?;
        let mut tracker = ActivationTracker::new();
        for identifier in &identifiers {
            tracker.claim(identifier);
        }
        let active = tracker.claimed().clone();
        info!(
            record_id = %stored.record.id,
            categories = active.len(),
            "topic classification complete"
        );

        let (activations, activated_names) = self
            .registry
            .activate_all(&stored.record.processed_text, &active)
            .await;
        debug!(
            record_id = %stored.record.id,
            activated = ?activated_names,
            produced = activations.len(),
            "expert fan-out complete"
        );

        for activation in &activations {
            stored.candidates.extend(protocol::parse_response(
                &activation.raw_text,
                activation.category,
            ));
        }

        let questions = self
            .question_generator
            .generate(&stored.record.processed_text, &stored.candidates)
            .await;

        if !questions.is_empty() {
            stored.clarification = Some(questions.clone());
            stored.stage = PipelineStage::AwaitingAnswers;
            self.store.update(&stored)?;
            info!(
                record_id = %stored.record.id,
                clinical = questions.clinical_questions.len(),
                billing = questions.billing_questions.len(),
                "awaiting clarification answers"
            );
            return Ok(SubmitOutcome {
                record_id: stored.record.id,
                accepted_codes: Vec::new(),
                questions: Some(questions),
                explanation: "Clarification required before adjudication.".to_string(),
            });
        }

        let adjudication = self
            .adjudicator
            .adjudicate(&stored.record.processed_text, &stored.candidates)
            .await;
        stored.adjudication = Some(adjudication.clone());
        stored.stage = PipelineStage::Finalized;
        self.store.update(&stored)?;
        info!(
            record_id = %stored.record.id,
            accepted = adjudication.accepted_codes.len(),
            rejected = adjudication.rejected_codes.len(),
            "scenario finalized"
        );

        Ok(SubmitOutcome {
            record_id: stored.record.id,
            accepted_codes: adjudication.accepted_codes,
            questions: None,
            explanation: adjudication.explanation,
        })
    }

    /// Phase two: resume a paused scenario with clarification answers.
    ///
    /// Replaying the same answers against an already finalized record
    /// returns the stored result; different answers are rejected.
    pub async fn answer(
        &self,
        record_id: &str,
        answers: BTreeMap<String, String>,
    ) -> CodingResult<AnswerOutcome> {
        if answers.is_empty() {
            return Err(CodingError::InvalidRequest(
                "no answers supplied".to_string(),
            ));
        }

        let mut stored = self
            .store
            .fetch(record_id)?
            .ok_or_else(|| CodingError::InvalidRequest(format!("record {} not found", record_id)))?;

        let hash = answers_hash(&answers);
        match stored.stage {
            PipelineStage::AwaitingAnswers => {}
            PipelineStage::Finalized => {
                if stored.answers_hash.as_deref() == Some(hash.as_str()) {
                    let adjudication = stored.adjudication.unwrap_or_default();
                    info!(record_id, "replaying finalized result for identical answers");
                    return Ok(AnswerOutcome {
                        record_id: stored.record.id,
                        accepted_codes: adjudication.accepted_codes,
                        rejected_codes: adjudication.rejected_codes,
                        explanation: adjudication.explanation,
                    });
                }
                return Err(CodingError::InvalidRequest(format!(
                    "record {} is already finalized",
                    record_id
                )));
            }
            PipelineStage::Classified => {
                return Err(CodingError::InvalidRequest(format!(
                    "record {} is not awaiting answers",
                    record_id
                )));
            }
        }

        let mut clarification = stored.clarification.take().unwrap_or_default();
        clarification.has_answers = true;
        clarification.answers.extend(answers.clone());
        stored.clarification = Some(clarification);
        stored.record.append_answers(&answers);

        // Re-adjudication only: the candidate set persisted in phase one
        // is the sole basis for the verdict.
        let adjudication = self
            .adjudicator
            .adjudicate(&stored.record.processed_text, &stored.candidates)
            .await;
        stored.adjudication = Some(adjudication.clone());
        stored.stage = PipelineStage::Finalized;
        stored.answers_hash = Some(hash);
        self.store.update(&stored)?;
        info!(
            record_id = %stored.record.id,
            accepted = adjudication.accepted_codes.len(),
            "scenario finalized after clarification"
        );

        Ok(AnswerOutcome {
            record_id: stored.record.id,
            accepted_codes: adjudication.accepted_codes,
            rejected_codes: adjudication.rejected_codes,
            explanation: adjudication.explanation,
        })
    }

    /// Read-only view of a stored scenario.
    pub fn fetch(&self, record_id: &str) -> CodingResult<Option<StoredScenario>> {
        self.store.fetch(record_id)
    }
}
