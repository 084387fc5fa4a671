//! Expert handlers: one per category bucket.
//!
//! Each handler builds its category prompt from the shared templates and
//! calls the LLM provider. Handlers are registered as asynchronous
//! entries in the subtopic registry; the registry is equally able to host
//! synchronous handlers (see `registry::ExpertHandler`).

pub mod prompts;
pub mod topic;

pub use topic::TopicClassifier;

use std::sync::Arc;

use crate::categories::Category;
use crate::llm::LlmProvider;
use crate::registry::{ExpertHandler, SubtopicRegistry};

/// Register the default expert for every category bucket.
pub fn register_default_experts(
    registry: &mut SubtopicRegistry,
    provider: Arc<dyn LlmProvider + Send + Sync>,
) {
    for category in Category::ALL {
        let provider = Arc::clone(&provider);
        let handler = ExpertHandler::from_async(move |scenario| {
            let provider = Arc::clone(&provider);
            Box::pin(async move {
                let prompt = prompts::expert_prompt(category, &scenario);
                provider.generate_text(&prompt).await
            })
        });
        registry.register(category, handler, format!("{} expert", category.name()));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::*;
    use crate::llm::{LlmProviderConfig, StubProvider};

    #[tokio::test]
    async fn test_default_experts_cover_every_category() {
        let mut registry = SubtopicRegistry::new(4, Duration::from_secs(5));
        let provider = Arc::new(StubProvider::new(LlmProviderConfig::default()));
        register_default_experts(&mut registry, provider);
        assert_eq!(registry.len(), Category::ALL.len());
    }

    #[tokio::test]
    async fn test_expert_handler_calls_provider() {
        let mut registry = SubtopicRegistry::new(4, Duration::from_secs(5));
        let provider = Arc::new(StubProvider::new(LlmProviderConfig::default()));
        register_default_experts(&mut registry, provider);

        let (activations, _) = registry
            .activate_all(
                "Routine adult cleaning today.",
                &HashSet::from([Category::Preventive]),
            )
            .await;
        assert_eq!(activations.len(), 1);
        assert!(activations[0].raw_text.contains("D1110"));
    }
}
