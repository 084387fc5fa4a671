//! Clarification question generation and answer bookkeeping.
//!
//! After candidates are aggregated, one LLM call inspects them and may
//! return clarifying questions, split into two independent domains
//! (clinical and billing). A failed or unrecognizable generation call
//! degrades to "no questions": clarification is an enrichment step, never
//! a reason to abort the pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::llm::LlmProvider;
use crate::types::{ClarificationRequest, CodeCandidate};

const CLINICAL_MARKER: &str = "CLINICAL QUESTIONS:";
const BILLING_MARKER: &str = "BILLING QUESTIONS:";

fn question_prompt(scenario: &str, candidates: &[CodeCandidate]) -> String {
    let mut candidate_lines = String::new();
    for candidate in candidates {
        if candidate.is_degenerate() {
            continue;
        }
        candidate_lines.push_str(&format!(
            "- {} [{}] {}",
            candidate.code,
            candidate.source_category.name(),
            candidate.explanation
        ));
        if !candidate.doubt.is_empty() && !candidate.doubt.eq_ignore_ascii_case("none") {
            candidate_lines.push_str(&format!(" | doubt: {}", candidate.doubt));
        }
        candidate_lines.push('\n');
    }

    format!(
        "Review the candidate codes proposed for the narrative below and list any clarifying \
questions whose answers would change which codes are billed. Split them into two sections, \
one question per line; write none under a section with no questions.\n\
{}\n{}\n\nNARRATIVE:\n{}\n\nCANDIDATES:\n{}",
        CLINICAL_MARKER, BILLING_MARKER, scenario, candidate_lines
    )
}

#[derive(Clone, Copy)]
enum Domain {
    Clinical,
    Billing,
}

fn parse_questions(response: &str) -> ClarificationRequest {
    let mut clinical = Vec::new();
    let mut billing = Vec::new();
    let mut current: Option<Domain> = None;

    for line in response.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with(CLINICAL_MARKER) {
            clinical.extend(inline_question(trimmed, CLINICAL_MARKER));
            current = Some(Domain::Clinical);
            continue;
        }
        if trimmed.starts_with(BILLING_MARKER) {
            billing.extend(inline_question(trimmed, BILLING_MARKER));
            current = Some(Domain::Billing);
            continue;
        }
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            continue;
        }
        match current {
            Some(Domain::Clinical) => clinical.push(trimmed.trim_start_matches("- ").to_string()),
            Some(Domain::Billing) => billing.push(trimmed.trim_start_matches("- ").to_string()),
            None => {}
        }
    }

    ClarificationRequest {
        clinical_questions: clinical,
        billing_questions: billing,
        ..Default::default()
    }
}

fn inline_question(line: &str, marker: &str) -> Option<String> {
    let rest = line[marker.len()..].trim();
    if rest.is_empty() || rest.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(rest.to_string())
    }
}

pub struct QuestionGenerator {
    provider: Arc<dyn LlmProvider + Send + Sync>,
}

impl QuestionGenerator {
    pub fn new(provider: Arc<dyn LlmProvider + Send + Sync>) -> Self {
        Self { provider }
    }

    pub async fn generate(
        &self,
        scenario: &str,
        candidates: &[CodeCandidate],
    ) -> ClarificationRequest {
        if candidates.iter().all(|c| c.is_degenerate()) {
            return ClarificationRequest::default();
        }
        let prompt = question_prompt(scenario, candidates);
        match self.provider.generate_text(&prompt).await {
            Ok(response) => parse_questions(&response),
            Err(e) => {
                warn!(error = %e, "question generation failed, continuing without clarification");
                ClarificationRequest::default()
            }
        }
    }
}

/// Stable digest of an answer set, used to make finalization idempotent:
/// replaying `answer()` with the same answers returns the stored result.
pub fn answers_hash(answers: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (question, answer) in answers {
        hasher.update(question.as_bytes());
        hasher.update([0u8]);
        hasher.update(answer.as_bytes());
        hasher.update([b'\n']);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::categories::Category;
    use crate::llm::{LlmProviderConfig, StubProvider};

    fn candidate(code: &str, doubt: &str) -> CodeCandidate {
        CodeCandidate {
            code: code.to_string(),
            explanation: "explanation".to_string(),
            doubt: doubt.to_string(),
            source_category: Category::OralSurgery,
        }
    }

    #[test]
    fn test_parse_questions_two_domains() {
        let response = "CLINICAL QUESTIONS:\nWhich tooth was extracted?\nWas the extraction surgical?\nBILLING QUESTIONS:\nIs the patient covered for same-day imaging?";
        let parsed = parse_questions(response);
        assert_eq!(
            parsed.clinical_questions,
            vec![
                "Which tooth was extracted?".to_string(),
                "Was the extraction surgical?".to_string(),
            ]
        );
        assert_eq!(
            parsed.billing_questions,
            vec!["Is the patient covered for same-day imaging?".to_string()]
        );
        assert!(!parsed.is_empty());
    }

    #[test]
    fn test_parse_questions_none_sections() {
        let parsed = parse_questions("CLINICAL QUESTIONS:\nnone\nBILLING QUESTIONS:\nnone");
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_parse_questions_junk_response() {
        let parsed = parse_questions("I have no questions at this time, everything is clear.");
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn test_generator_surfaces_doubt_driven_questions() {
        let generator = QuestionGenerator::new(Arc::new(StubProvider::new(
            LlmProviderConfig::default(),
        )));
        let candidates = vec![candidate("D7140", "Tooth number not documented.")];
        let request = generator.generate("extraction today", &candidates).await;
        assert_eq!(
            request.clinical_questions,
            vec!["Which tooth was extracted?".to_string()]
        );
        assert!(request.billing_questions.is_empty());
    }

    #[tokio::test]
    async fn test_generator_skips_degenerate_candidates() {
        let generator = QuestionGenerator::new(Arc::new(StubProvider::new(
            LlmProviderConfig::default(),
        )));
        let candidates = vec![CodeCandidate {
            code: String::new(),
            explanation: "unparseable response".to_string(),
            doubt: String::new(),
            source_category: Category::Diagnostic,
        }];
        let request = generator.generate("scenario", &candidates).await;
        assert!(request.is_empty());
    }

    #[test]
    fn test_answers_hash_is_stable_and_order_independent() {
        let mut a = BTreeMap::new();
        a.insert("Which tooth?".to_string(), "Tooth 30".to_string());
        a.insert("Surgical?".to_string(), "No".to_string());

        let mut b = BTreeMap::new();
        b.insert("Surgical?".to_string(), "No".to_string());
        b.insert("Which tooth?".to_string(), "Tooth 30".to_string());

        assert_eq!(answers_hash(&a), answers_hash(&b));

        let mut c = a.clone();
        c.insert("Which tooth?".to_string(), "Tooth 31".to_string());
        assert_ne!(answers_hash(&a), answers_hash(&c));
    }
}
