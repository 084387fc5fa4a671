//! Core data model for the coding pipeline.
//!
//! Everything here is plain data with serde derives: records are persisted
//! as JSON payloads inside the pipeline store, so the shapes in this module
//! are also the durable wire format between the two pipeline phases.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::categories::Category;

/// A submitted scenario: the free-text narrative to be coded.
///
/// `processed_text` starts as a copy of `raw_text` and is append-only:
/// clarification answers are appended as Q/A lines, original text is never
/// removed or rewritten.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioRecord {
    pub id: String,
    pub raw_text: String,
    pub processed_text: String,
    pub created_at: DateTime<Utc>,
}

impl ScenarioRecord {
    pub fn new(raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        Self {
            id: format!("scn-{}", uuid::Uuid::new_v4()),
            processed_text: raw_text.clone(),
            raw_text,
            created_at: Utc::now(),
        }
    }

    /// Append answered clarification questions to the processed text.
    pub fn append_answers(&mut self, answers: &BTreeMap<String, String>) {
        for (question, answer) in answers {
            self.processed_text
                .push_str(&format!("\nQ: {}\nA: {}", question, answer));
        }
    }
}

/// Raw output of one successfully invoked expert handler.
///
/// Failed handlers produce no activation at all, not a placeholder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryActivation {
    pub category: Category,
    pub name: String,
    /// Verbatim LLM output, before any protocol parsing.
    pub raw_text: String,
}

/// One code proposed by some expert, not yet accepted.
///
/// Not unique per scenario: the same code may appear once per billable unit
/// implied by the narrative. Immutable once parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeCandidate {
    pub code: String,
    pub explanation: String,
    pub doubt: String,
    pub source_category: Category,
}

impl CodeCandidate {
    /// True when the parser could not extract a real code from the block.
    pub fn is_degenerate(&self) -> bool {
        self.code.is_empty()
    }
}

/// Clarifying questions split into two independent domains, plus the
/// answers once the caller supplies them. Append-only once answered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClarificationRequest {
    pub clinical_questions: Vec<String>,
    pub billing_questions: Vec<String>,
    pub has_answers: bool,
    pub answers: BTreeMap<String, String>,
}

impl ClarificationRequest {
    pub fn is_empty(&self) -> bool {
        self.clinical_questions.is_empty() && self.billing_questions.is_empty()
    }

    pub fn all_questions(&self) -> impl Iterator<Item = &String> {
        self.clinical_questions
            .iter()
            .chain(self.billing_questions.iter())
    }
}

/// Final accept/reject decision over all candidates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdjudicationResult {
    /// Ordered multiset: a code appears once per accepted billable unit.
    pub accepted_codes: Vec<String>,
    /// Deduped set, always a subset of the codes that appeared as candidates.
    pub rejected_codes: Vec<String>,
    pub explanation: String,
}

impl AdjudicationResult {
    /// Error-shaped result for upstream failure: empty code sets, failure
    /// message in the explanation. The adjudicator never raises past its
    /// own boundary.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            accepted_codes: Vec::new(),
            rejected_codes: Vec::new(),
            explanation: message.into(),
        }
    }
}

/// Stage of a scenario in the two-phase pipeline.
///
/// Transitions only move forward: `Classified -> AwaitingAnswers ->
/// Finalized` or `Classified -> Finalized`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PipelineStage {
    Classified,
    AwaitingAnswers,
    Finalized,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Classified => "CLASSIFIED",
            PipelineStage::AwaitingAnswers => "AWAITING_ANSWERS",
            PipelineStage::Finalized => "FINALIZED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CLASSIFIED" => Some(PipelineStage::Classified),
            "AWAITING_ANSWERS" => Some(PipelineStage::AwaitingAnswers),
            "FINALIZED" => Some(PipelineStage::Finalized),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            PipelineStage::Classified => 0,
            PipelineStage::AwaitingAnswers => 1,
            PipelineStage::Finalized => 2,
        }
    }

    /// A stage may only advance, never move backward.
    pub fn can_advance_to(&self, next: PipelineStage) -> bool {
        next.rank() > self.rank()
    }
}

/// Response of the `submit` entry point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitOutcome {
    pub record_id: String,
    pub accepted_codes: Vec<String>,
    /// Present when the pipeline paused for clarification; the caller
    /// answers via `answer()`.
    pub questions: Option<ClarificationRequest>,
    pub explanation: String,
}

impl SubmitOutcome {
    pub fn has_questions(&self) -> bool {
        self.questions.is_some()
    }
}

/// Response of the `answer` entry point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerOutcome {
    pub record_id: String,
    pub accepted_codes: Vec<String>,
    pub rejected_codes: Vec<String>,
    pub explanation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_transitions_forward_only() {
        use PipelineStage::*;
        assert!(Classified.can_advance_to(AwaitingAnswers));
        assert!(Classified.can_advance_to(Finalized));
        assert!(AwaitingAnswers.can_advance_to(Finalized));
        assert!(!Finalized.can_advance_to(AwaitingAnswers));
        assert!(!Finalized.can_advance_to(Classified));
        assert!(!AwaitingAnswers.can_advance_to(Classified));
        assert!(!Classified.can_advance_to(Classified));
    }

    #[test]
    fn test_stage_round_trips_through_str() {
        for stage in [
            PipelineStage::Classified,
            PipelineStage::AwaitingAnswers,
            PipelineStage::Finalized,
        ] {
            assert_eq!(PipelineStage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(PipelineStage::parse("DONE"), None);
    }

    #[test]
    fn test_append_answers_preserves_original_text() {
        let mut record = ScenarioRecord::new("Patient presents with pain.");
        let mut answers = BTreeMap::new();
        answers.insert("Which tooth?".to_string(), "Tooth 30".to_string());
        record.append_answers(&answers);

        assert!(record.processed_text.starts_with("Patient presents with pain."));
        assert!(record.processed_text.contains("Q: Which tooth?"));
        assert!(record.processed_text.contains("A: Tooth 30"));
        assert_eq!(record.raw_text, "Patient presents with pain.");
    }
}
