//! Topic classification: the first LLM call of the pipeline.
//!
//! Produces the set of fine-grained range identifiers the narrative
//! touches. Transport failures propagate (nothing downstream can run
//! without a classification); unparseable responses degrade to an empty
//! set, which the pipeline reports as "no categories matched".

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::CodingResult;
use crate::llm::LlmProvider;
use crate::protocol;

use super::prompts;

pub struct TopicClassifier {
    provider: Arc<dyn LlmProvider + Send + Sync>,
}

impl TopicClassifier {
    pub fn new(provider: Arc<dyn LlmProvider + Send + Sync>) -> Self {
        Self { provider }
    }

    /// Identifiers (codes or range starts) found in the classification
    /// response. Duplicates are preserved; the category mapper dedupes
    /// at the bucket level.
    pub async fn classify(&self, scenario: &str) -> CodingResult<Vec<String>> {
        let prompt = prompts::topic_prompt(scenario);
        let response = self.provider.generate_text(&prompt).await?;
        let identifiers = protocol::extract_code_tokens(&response);
        if identifiers.is_empty() {
            warn!(response = %response.trim(), "topic classification produced no identifiers");
        } else {
            debug!(count = identifiers.len(), "topic classification identifiers");
        }
        Ok(identifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmProviderConfig, StubProvider};

    #[tokio::test]
    async fn test_classify_extracts_range_identifiers() {
        let classifier = TopicClassifier::new(Arc::new(StubProvider::new(
            LlmProviderConfig::default(),
        )));
        let identifiers = classifier
            .classify("four-film bitewing x-rays and routine adult cleaning")
            .await
            .unwrap();
        assert!(identifiers.contains(&"D0100".to_string()));
        assert!(identifiers.contains(&"D1000".to_string()));
    }

    #[tokio::test]
    async fn test_classify_degrades_to_empty_on_unrecognized_response() {
        let classifier = TopicClassifier::new(Arc::new(StubProvider::new(
            LlmProviderConfig::default(),
        )));
        let identifiers = classifier.classify("no dental content here").await.unwrap();
        assert!(identifiers.is_empty());
    }
}
