//! Parser for the free-text expert response protocol.
//!
//! Expert responses follow a loose convention: blocks separated by `###`
//! lines, each block carrying `CODE:` / `EXPLANATION:` / `DOUBT:` sections
//! in roughly fixed order. A block may open with a topic-level explanation
//! or doubt before the first `CODE:` marker; that content backfills any
//! code entry in the block that came back without its own.
//!
//! The parser is total: for any input it returns a (possibly degenerate)
//! result and never errors. Everything the protocol does not recognize
//! degrades, it does not fail.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::categories::Category;
use crate::types::CodeCandidate;

/// Code-like token: one letter followed by 4-6 digits, or 5-6 digit numeric.
static CODE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[A-Za-z][0-9]{4,6}|[0-9]{5,6})\b").unwrap());

/// Every code-like token in `text`, in order of appearance, duplicates
/// preserved. Shared by the parser fallback and topic classification.
pub fn extract_code_tokens(text: &str) -> Vec<String> {
    CODE_TOKEN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

const BLOCK_MARKER: &str = "###";
const CODE_MARKER: &str = "CODE:";
const EXPLANATION_MARKER: &str = "EXPLANATION:";
const DOUBT_MARKER: &str = "DOUBT:";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Code,
    Explanation,
    Doubt,
}

/// One accumulating entry while scanning a block. Entries without a code
/// are topic-level commentary.
#[derive(Debug, Default)]
struct Entry {
    code: String,
    explanation: String,
    doubt: String,
}

impl Entry {
    fn is_empty(&self) -> bool {
        self.code.is_empty() && self.explanation.is_empty() && self.doubt.is_empty()
    }

    fn section(&mut self, section: Section) -> &mut String {
        match section {
            Section::Code => &mut self.code,
            Section::Explanation => &mut self.explanation,
            Section::Doubt => &mut self.doubt,
        }
    }

    fn append(&mut self, section: Section, text: &str) {
        let slot = self.section(section);
        if !slot.is_empty() {
            slot.push(' ');
        }
        slot.push_str(text);
    }
}

/// Strip surrounding brackets and quotes from a code value and filter the
/// literal `none`.
fn clean_code(raw: &str) -> String {
    let cleaned = raw
        .trim()
        .trim_matches(|c| matches!(c, '[' | ']' | '(' | ')' | '{' | '}' | '"' | '\'' | '`' | '<' | '>'))
        .trim()
        .to_string();
    if cleaned.eq_ignore_ascii_case("none") {
        String::new()
    } else {
        cleaned
    }
}

fn marker_for(line: &str) -> Option<(Section, &str)> {
    let trimmed = line.trim();
    for (marker, section) in [
        (CODE_MARKER, Section::Code),
        (EXPLANATION_MARKER, Section::Explanation),
        (DOUBT_MARKER, Section::Doubt),
    ] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return Some((section, rest.trim()));
        }
    }
    None
}

/// Parse one verbatim expert response into zero or more candidates.
///
/// Totality contract: if nothing recognizable is found anywhere in the
/// input, the result is a single degenerate candidate with an empty code
/// and the raw text preserved in the explanation, so downstream can treat
/// it as "no candidate" without losing the response.
pub fn parse_response(raw: &str, source_category: Category) -> Vec<CodeCandidate> {
    let mut candidates = Vec::new();

    for block in raw.split(BLOCK_MARKER) {
        candidates.extend(parse_block(block, source_category));
    }

    if candidates.is_empty() {
        candidates.push(CodeCandidate {
            code: String::new(),
            explanation: raw.trim().to_string(),
            doubt: String::new(),
            source_category,
        });
    }
    candidates
}

fn parse_block(block: &str, source_category: Category) -> Vec<CodeCandidate> {
    if block.trim().is_empty() {
        return Vec::new();
    }

    let mut entries: Vec<Entry> = vec![Entry::default()];
    let mut current: Option<Section> = None;
    let mut saw_marker = false;

    for line in block.lines() {
        match marker_for(line) {
            Some((section, inline)) => {
                saw_marker = true;
                // A marker for a section the open entry already filled
                // starts the next code entry, but only once the open entry
                // carries a code: content before the first CODE: stays
                // topic-level.
                let open = entries.last_mut().unwrap();
                if !open.section(section).is_empty() && !open.code.is_empty() {
                    entries.push(Entry::default());
                }
                current = Some(section);
                if !inline.is_empty() {
                    entries.last_mut().unwrap().append(section, inline);
                }
            }
            None => {
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if let Some(section) = current {
                    entries.last_mut().unwrap().append(section, text);
                }
            }
        }
    }

    if !saw_marker {
        // No protocol at all in this block: best-effort extraction of
        // code-like tokens from the free text, one candidate per match.
        return extract_code_tokens(block)
            .into_iter()
            .map(|code| CodeCandidate {
                code,
                explanation: String::new(),
                doubt: String::new(),
                source_category,
            })
            .collect();
    }

    // Topic-level commentary: entries that never received a code.
    let mut topic_explanation = String::new();
    let mut topic_doubt = String::new();
    let mut coded: Vec<Entry> = Vec::new();
    for mut entry in entries {
        entry.code = clean_code(&entry.code);
        if entry.code.is_empty() {
            if !entry.explanation.is_empty() {
                if !topic_explanation.is_empty() {
                    topic_explanation.push(' ');
                }
                topic_explanation.push_str(&entry.explanation);
            }
            if !entry.doubt.is_empty() {
                if !topic_doubt.is_empty() {
                    topic_doubt.push(' ');
                }
                topic_doubt.push_str(&entry.doubt);
            }
        } else if !entry.is_empty() {
            coded.push(entry);
        }
    }

    coded
        .into_iter()
        .map(|entry| CodeCandidate {
            code: entry.code,
            explanation: if entry.explanation.is_empty() {
                topic_explanation.clone()
            } else {
                entry.explanation
            },
            doubt: if entry.doubt.is_empty() {
                topic_doubt.clone()
            } else {
                entry.doubt
            },
            source_category,
        })
        .collect()
}
