//! Persistence layer for test run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::testing::TestRun;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Summary row of a stored run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,

    pub pipeline_name: String,

    pub started_at: DateTime<Utc>,

    pub ended_at: DateTime<Utc>,

    pub total: usize,

    pub passed: usize,

    pub failed: usize,

    /// Passed over total, 0.0 for an empty run
    pub accuracy: f64,
}

impl From<&TestRun> for RunRecord {
    fn from(run: &TestRun) -> Self {
        let summary = run.summary();
        Self {
            run_id: run.run_id(),
            pipeline_name: run.pipeline_name().to_string(),
            started_at: run.started_at(),
            ended_at: run.ended_at(),
            total: summary.total,
            passed: summary.passed,
            failed: summary.failed,
            accuracy: summary.accuracy,
        }
    }
}

/// Trait for run history backends
#[async_trait::async_trait]
pub trait RunStore: Send + Sync {
    /// Save a completed run
    async fn save_run(&self, run: &TestRun) -> Result<()>;

    /// Load a run with all of its results
    async fn load_run(&self, run_id: Uuid) -> Result<Option<TestRun>>;

    /// Most recent runs first, optionally for one pipeline only
    async fn list_runs(&self, pipeline_name: Option<&str>, limit: usize) -> Result<Vec<RunRecord>>;

    /// Names of all pipelines with stored runs, sorted
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory history (for testing or ephemeral use)
pub struct InMemoryRunStore {
    runs: tokio::sync::RwLock<HashMap<Uuid, TestRun>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self {
            runs: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRunStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RunStore for InMemoryRunStore {
    async fn save_run(&self, run: &TestRun) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.insert(run.run_id(), run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<TestRun>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&run_id).cloned())
    }

    async fn list_runs(&self, pipeline_name: Option<&str>, limit: usize) -> Result<Vec<RunRecord>> {
        let runs = self.runs.read().await;
        let mut records: Vec<RunRecord> = runs
            .values()
            .filter(|run| pipeline_name.map_or(true, |name| run.pipeline_name() == name))
            .map(RunRecord::from)
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut names: Vec<String> = runs
            .values()
            .map(|run| run.pipeline_name().to_string())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
