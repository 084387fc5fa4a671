//! In-memory store backend, primarily for tests and offline runs.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{CodingError, CodingResult};

use super::{check_transition, PipelineStore, StoredScenario};

#[derive(Debug, Default)]
pub struct MemoryStore {
    scenarios: Mutex<HashMap<String, StoredScenario>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PipelineStore for MemoryStore {
    fn create(&self, scenario: &StoredScenario) -> CodingResult<()> {
        let mut guard = self
            .scenarios
            .lock()
            .map_err(|_| CodingError::Storage("store lock poisoned".to_string()))?;
        if guard.contains_key(&scenario.record.id) {
            return Err(CodingError::Storage(format!(
                "record {} already exists",
                scenario.record.id
            )));
        }
        guard.insert(scenario.record.id.clone(), scenario.clone());
        Ok(())
    }

    fn fetch(&self, id: &str) -> CodingResult<Option<StoredScenario>> {
        let guard = self
            .scenarios
            .lock()
            .map_err(|_| CodingError::Storage("store lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    fn update(&self, scenario: &StoredScenario) -> CodingResult<()> {
        let mut guard = self
            .scenarios
            .lock()
            .map_err(|_| CodingError::Storage("store lock poisoned".to_string()))?;
        let existing = guard.get(&scenario.record.id).ok_or_else(|| {
            CodingError::InvalidRequest(format!("record {} not found", scenario.record.id))
        })?;
        check_transition(existing.stage, scenario.stage)?;
        guard.insert(scenario.record.id.clone(), scenario.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PipelineStage, ScenarioRecord};

    #[test]
    fn test_create_fetch_round_trip() {
        let store = MemoryStore::new();
        let scenario = StoredScenario::new(ScenarioRecord::new("narrative"));
        let id = scenario.record.id.clone();
        store.create(&scenario).unwrap();

        let fetched = store.fetch(&id).unwrap().unwrap();
        assert_eq!(fetched, scenario);
        assert!(store.fetch("scn-missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_create_rejected() {
        let store = MemoryStore::new();
        let scenario = StoredScenario::new(ScenarioRecord::new("narrative"));
        store.create(&scenario).unwrap();
        assert!(store.create(&scenario).is_err());
    }

    #[test]
    fn test_update_enforces_forward_transition() {
        let store = MemoryStore::new();
        let mut scenario = StoredScenario::new(ScenarioRecord::new("narrative"));
        store.create(&scenario).unwrap();

        scenario.stage = PipelineStage::Finalized;
        store.update(&scenario).unwrap();

        scenario.stage = PipelineStage::AwaitingAnswers;
        assert!(store.update(&scenario).is_err());
    }

    #[test]
    fn test_update_missing_record_rejected() {
        let store = MemoryStore::new();
        let scenario = StoredScenario::new(ScenarioRecord::new("narrative"));
        assert!(store.update(&scenario).is_err());
    }
}
