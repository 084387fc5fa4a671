//! SQLite store backend.
//!
//! One row per scenario: the full `StoredScenario` as a JSON payload,
//! plus the stage and creation time as queryable columns.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CodingError, CodingResult};
use crate::types::PipelineStage;

use super::{check_transition, PipelineStore, StoredScenario};

#[derive(Debug)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> CodingResult<Self> {
        let db_path = path.into();
        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "BEGIN;CREATE TABLE IF NOT EXISTS scenarios(
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                stage TEXT NOT NULL,
                created_at TEXT NOT NULL
            );CREATE INDEX IF NOT EXISTS idx_scenarios_stage ON scenarios(stage);COMMIT;",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    fn lock(&self) -> CodingResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CodingError::Storage("connection lock poisoned".to_string()))
    }
}

impl PipelineStore for SqliteStore {
    fn create(&self, scenario: &StoredScenario) -> CodingResult<()> {
        let payload = serde_json::to_string(scenario)?;
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO scenarios(id, payload, stage, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                scenario.record.id,
                payload,
                scenario.stage.as_str(),
                scenario.record.created_at.to_rfc3339()
            ],
        )?;
        if inserted == 0 {
            return Err(CodingError::Storage(format!(
                "record {} already exists",
                scenario.record.id
            )));
        }
        Ok(())
    }

    fn fetch(&self, id: &str) -> CodingResult<Option<StoredScenario>> {
        let conn = self.lock()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM scenarios WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(p) => Ok(Some(serde_json::from_str(&p)?)),
            None => Ok(None),
        }
    }

    fn update(&self, scenario: &StoredScenario) -> CodingResult<()> {
        let payload = serde_json::to_string(scenario)?;
        let conn = self.lock()?;

        let existing: Option<String> = conn
            .query_row(
                "SELECT stage FROM scenarios WHERE id = ?1",
                params![scenario.record.id],
                |row| row.get(0),
            )
            .optional()?;
        let existing = existing.ok_or_else(|| {
            CodingError::InvalidRequest(format!("record {} not found", scenario.record.id))
        })?;
        let existing_stage = PipelineStage::parse(&existing).ok_or_else(|| {
            CodingError::Storage(format!("record carries unknown stage {:?}", existing))
        })?;
        check_transition(existing_stage, scenario.stage)?;

        // Payload and stage move in one statement, so the stage flag can
        // never diverge from the persisted candidate set.
        conn.execute(
            "UPDATE scenarios SET payload = ?2, stage = ?3 WHERE id = ?1",
            params![scenario.record.id, payload, scenario.stage.as_str()],
        )?;
        Ok(())
    }
}
