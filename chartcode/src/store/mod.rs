//! Pipeline state store: durable keyed storage for scenario state across
//! the two pipeline phases.
//!
//! The store is the single source of truth between `submit` and `answer`:
//! the candidate set is persisted before control returns to the caller,
//! because phase two has no other way to recover it. Operations are
//! create, read-by-id, and update-by-id; there is no delete and no
//! version history. Stage transitions are enforced here so no backend
//! can move a scenario backward.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::{Deserialize, Serialize};

use crate::error::{CodingError, CodingResult};
use crate::types::{
    AdjudicationResult, ClarificationRequest, CodeCandidate, PipelineStage, ScenarioRecord,
};

/// Everything persisted for one scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredScenario {
    pub record: ScenarioRecord,
    pub candidates: Vec<CodeCandidate>,
    pub clarification: Option<ClarificationRequest>,
    pub adjudication: Option<AdjudicationResult>,
    pub stage: PipelineStage,
    /// Digest of the answer set that finalized this scenario, for
    /// idempotent `answer()` replays.
    pub answers_hash: Option<String>,
}

impl StoredScenario {
    pub fn new(record: ScenarioRecord) -> Self {
        Self {
            record,
            candidates: Vec::new(),
            clarification: None,
            adjudication: None,
            stage: PipelineStage::Classified,
            answers_hash: None,
        }
    }
}

/// Minimal storage-agnostic store API.
///
/// Backends must be Send + Sync to allow concurrent access behind Arcs.
pub trait PipelineStore: Send + Sync {
    fn create(&self, scenario: &StoredScenario) -> CodingResult<()>;
    fn fetch(&self, id: &str) -> CodingResult<Option<StoredScenario>>;
    fn update(&self, scenario: &StoredScenario) -> CodingResult<()>;
}

/// Shared transition guard for backends: an update must move the stage
/// strictly forward.
pub(crate) fn check_transition(
    existing: PipelineStage,
    next: PipelineStage,
) -> CodingResult<()> {
    if existing.can_advance_to(next) {
        Ok(())
    } else {
        Err(CodingError::InvalidRequest(format!(
            "illegal stage transition {} -> {}",
            existing.as_str(),
            next.as_str()
        )))
    }
}
