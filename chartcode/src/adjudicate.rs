//! Final adjudication over the aggregated candidate set.
//!
//! The adjudicator asks the LLM for a definitive accept/reject decision,
//! then reconciles the answer against what was actually proposed: a code
//! nobody proposed can be neither accepted nor rejected, and a code can
//! only be accepted as many times as it was proposed. The adjudicator
//! never raises past its own boundary; upstream failure produces an
//! error-shaped result with the message in the explanation.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use tracing::warn;

use crate::categories::Category;
use crate::llm::LlmProvider;
use crate::types::{AdjudicationResult, CodeCandidate};

const ACCEPTED_MARKER: &str = "ACCEPTED:";
const REJECTED_MARKER: &str = "REJECTED:";
const EXPLANATION_MARKER: &str = "EXPLANATION:";

fn adjudication_prompt(scenario: &str, candidates: &[CodeCandidate]) -> String {
    let by_category: HashMap<Category, Vec<&CodeCandidate>> = candidates
        .iter()
        .filter(|c| !c.is_degenerate())
        .map(|c| (c.source_category, c))
        .into_group_map();

    let mut candidate_lines = String::new();
    for category in Category::ALL {
        let Some(group) = by_category.get(&category) else {
            continue;
        };
        for candidate in group {
            candidate_lines.push_str(&format!(
                "- {} [{}] {}",
                candidate.code,
                category.name(),
                candidate.explanation
            ));
            if !candidate.doubt.is_empty() && !candidate.doubt.eq_ignore_ascii_case("none") {
                candidate_lines.push_str(&format!(" | doubt: {}", candidate.doubt));
            }
            candidate_lines.push('\n');
        }
    }

    format!(
        "You are the final coding adjudicator for a dental claim. Decide which of the candidate \
codes below to bill for the narrative. Rules: only codes listed as candidates may be accepted \
or rejected; accept a code once per billable unit it describes (list it once per unit); when \
two candidates are alternative descriptions of the same event, accept at most one and reject \
the rest; address every candidate in your explanation.\n\
Respond with exactly these sections:\n{}\n{}\n{}\n\
List one code per line under ACCEPTED: and REJECTED:, or none.\n\n\
NARRATIVE:\n{}\n\nCANDIDATES:\n{}",
        ACCEPTED_MARKER, REJECTED_MARKER, EXPLANATION_MARKER, scenario, candidate_lines
    )
}

#[derive(Debug, Default)]
struct ParsedVerdict {
    accepted: Vec<String>,
    rejected: Vec<String>,
    explanation: String,
    saw_marker: bool,
}

fn parse_verdict(response: &str) -> ParsedVerdict {
    #[derive(Clone, Copy)]
    enum Section {
        Accepted,
        Rejected,
        Explanation,
    }

    let mut verdict = ParsedVerdict::default();
    let mut current: Option<Section> = None;

    for line in response.lines() {
        let trimmed = line.trim();
        let marker = [
            (ACCEPTED_MARKER, Section::Accepted),
            (REJECTED_MARKER, Section::Rejected),
            (EXPLANATION_MARKER, Section::Explanation),
        ]
        .into_iter()
        .find_map(|(marker, section)| {
            trimmed
                .strip_prefix(marker)
                .map(|rest| (section, rest.trim().to_string()))
        });

        if let Some((section, inline)) = marker {
            verdict.saw_marker = true;
            current = Some(section);
            if !inline.is_empty() {
                append_line(&mut verdict, section, &inline);
            }
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }
        if let Some(section) = current {
            append_line(&mut verdict, section, trimmed);
        }
    }

    fn code_on_line(text: &str) -> Option<String> {
        let code = text
            .trim_start_matches("- ")
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_matches(|c: char| !c.is_ascii_alphanumeric());
        if code.is_empty() || code.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(code.to_string())
        }
    }

    fn append_line(verdict: &mut ParsedVerdict, section: Section, text: &str) {
        match section {
            Section::Accepted => verdict.accepted.extend(code_on_line(text)),
            Section::Rejected => verdict.rejected.extend(code_on_line(text)),
            Section::Explanation => {
                if !verdict.explanation.is_empty() {
                    verdict.explanation.push(' ');
                }
                verdict.explanation.push_str(text);
            }
        }
    }

    verdict
}

pub struct Adjudicator {
    provider: Arc<dyn LlmProvider + Send + Sync>,
}

impl Adjudicator {
    pub fn new(provider: Arc<dyn LlmProvider + Send + Sync>) -> Self {
        Self { provider }
    }

    /// Produce the final verdict. Infallible by contract: any upstream
    /// failure becomes an error-shaped result.
    pub async fn adjudicate(
        &self,
        scenario: &str,
        candidates: &[CodeCandidate],
    ) -> AdjudicationResult {
        let proposed: Vec<&CodeCandidate> =
            candidates.iter().filter(|c| !c.is_degenerate()).collect();
        if proposed.is_empty() {
            return AdjudicationResult {
                accepted_codes: Vec::new(),
                rejected_codes: Vec::new(),
                explanation: "No billable candidates were proposed for this narrative."
                    .to_string(),
            };
        }

        let prompt = adjudication_prompt(scenario, candidates);
        let response = match self.provider.generate_text(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "adjudication call failed");
                return AdjudicationResult::failed(format!("adjudication failed: {}", e));
            }
        };

        let verdict = parse_verdict(&response);
        if !verdict.saw_marker {
            warn!("adjudication response did not match the expected protocol");
            return AdjudicationResult::failed(format!(
                "adjudication response could not be parsed: {}",
                response.trim()
            ));
        }

        reconcile(verdict, &proposed)
    }
}

/// Clamp the parsed verdict to the candidate multiset.
fn reconcile(verdict: ParsedVerdict, proposed: &[&CodeCandidate]) -> AdjudicationResult {
    let mut budget: HashMap<&str, usize> = HashMap::new();
    for candidate in proposed {
        *budget.entry(candidate.code.as_str()).or_insert(0) += 1;
    }

    let mut accepted = Vec::new();
    for code in verdict.accepted {
        match budget.get_mut(code.as_str()) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                accepted.push(code);
            }
            Some(_) => {
                warn!(code = %code, "adjudicator accepted a code more times than proposed, clamping");
            }
            None => {
                warn!(code = %code, "adjudicator accepted a code nobody proposed, dropping");
            }
        }
    }

    let candidate_codes: std::collections::HashSet<&str> =
        proposed.iter().map(|c| c.code.as_str()).collect();
    let rejected: Vec<String> = verdict
        .rejected
        .into_iter()
        .filter(|code| {
            let known = candidate_codes.contains(code.as_str());
            if !known {
                warn!(code = %code, "adjudicator rejected a code nobody proposed, dropping");
            }
            known
        })
        .unique()
        .collect();

    let explanation = if verdict.explanation.is_empty() {
        "No explanation provided by the adjudication response.".to_string()
    } else {
        verdict.explanation
    };

    AdjudicationResult {
        accepted_codes: accepted,
        rejected_codes: rejected,
        explanation,
    }
}
