// chartcode
// Clinical narratives in, CDT billing codes out: a two-phase pipeline that
// fans a scenario out to per-category LLM experts, parses their free-text
// answers into candidates, optionally pauses for clarifying questions, and
// adjudicates a definitive accepted/rejected code set.

pub mod adjudicate;
pub mod categories;
pub mod clarify;
pub mod config;
pub mod error;
pub mod experts;
pub mod llm;
pub mod pipeline;
pub mod protocol;
pub mod registry;
pub mod store;
pub mod types;

// Re-export the main entry points for easy access
pub use adjudicate::Adjudicator;
pub use categories::{ActivationTracker, Category};
pub use clarify::QuestionGenerator;
pub use config::{ChartcodeConfig, PipelineSettings};
pub use error::{CodingError, CodingResult};
pub use llm::{LlmProvider, LlmProviderConfig, LlmProviderFactory, LlmProviderType, StubProvider};
pub use pipeline::CodingPipeline;
pub use registry::{ExpertHandler, SubtopicRegistry};
pub use store::{MemoryStore, PipelineStore, SqliteStore, StoredScenario};
pub use types::{
    AdjudicationResult, AnswerOutcome, CategoryActivation, ClarificationRequest, CodeCandidate,
    PipelineStage, ScenarioRecord, SubmitOutcome,
};
