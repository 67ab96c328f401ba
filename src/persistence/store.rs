//! SQLite-based run history

use crate::persistence::{RunRecord, RunStore};
use crate::testing::{RunReport, TestRun};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;
use uuid::Uuid;

/// SQLite run store
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    /// Open (or create) the database at `db_path`
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("promptcheck");
        std::fs::create_dir_all(&db_dir)
            .with_context(|| format!("Failed to create {}", db_dir.display()))?;

        Self::new(db_dir.join("runs.db")).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                pipeline_name TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                total INTEGER NOT NULL DEFAULT 0,
                passed INTEGER NOT NULL DEFAULT 0,
                failed INTEGER NOT NULL DEFAULT 0,
                accuracy REAL NOT NULL DEFAULT 0.0,
                report TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_runs_pipeline_name ON runs(pipeline_name);
            CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize database schema")?;

        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    /// Convert NaiveDateTime to DateTime<Utc>
    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn record_from_row(row: &SqliteRow) -> Result<RunRecord> {
        Ok(RunRecord {
            run_id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            pipeline_name: row.get("pipeline_name"),
            started_at: Self::from_naive(row.get("started_at")),
            ended_at: Self::from_naive(row.get("ended_at")),
            total: row.get::<i64, _>("total") as usize,
            passed: row.get::<i64, _>("passed") as usize,
            failed: row.get::<i64, _>("failed") as usize,
            accuracy: row.get("accuracy"),
        })
    }
}

#[async_trait::async_trait]
impl RunStore for SqliteRunStore {
    async fn save_run(&self, run: &TestRun) -> Result<()> {
        let summary = run.summary();
        let report = serde_json::to_string(&run.report()).context("Failed to encode run report")?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO runs
            (id, pipeline_name, started_at, ended_at, total, passed, failed, accuracy, report)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(run.run_id().to_string())
        .bind(run.pipeline_name())
        .bind(Self::to_naive(run.started_at()))
        .bind(Self::to_naive(run.ended_at()))
        .bind(summary.total as i64)
        .bind(summary.passed as i64)
        .bind(summary.failed as i64)
        .bind(summary.accuracy)
        .bind(report)
        .execute(&self.pool)
        .await
        .context("Failed to save run")?;

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<TestRun>> {
        let row = sqlx::query("SELECT report FROM runs WHERE id = ?1")
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load run")?;

        match row {
            Some(row) => {
                let report: RunReport = serde_json::from_str(&row.get::<String, _>("report"))
                    .with_context(|| format!("Corrupt report stored for run {}", run_id))?;
                Ok(Some(TestRun::from(report)))
            }
            None => Ok(None),
        }
    }

    async fn list_runs(&self, pipeline_name: Option<&str>, limit: usize) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, pipeline_name, started_at, ended_at, total, passed, failed, accuracy
            FROM runs
            WHERE ?1 IS NULL OR pipeline_name = ?1
            ORDER BY started_at DESC
            LIMIT ?2
            "#,
        )
        .bind(pipeline_name)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list runs")?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT pipeline_name FROM runs ORDER BY pipeline_name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list pipelines")?;

        Ok(rows.iter().map(|row| row.get("pipeline_name")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestResult;
    use chrono::TimeZone;
    use serde_json::json;

    #[tokio::test]
    async fn test_sqlite_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRunStore::new(dir.path().join("runs.db")).await.unwrap();

        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 4).unwrap();
        let run = TestRun::new(
            "Greeter",
            start,
            end,
            vec![
                TestResult::completed("ok", json!("Hi"), json!("Hi"), true, start, end),
                TestResult::errored("bad", json!("Hi"), "Missing parameter", start, end),
            ],
        );
        store.save_run(&run).await.unwrap();

        let loaded = store.load_run(run.run_id()).await.unwrap().unwrap();
        assert_eq!(loaded, run);

        let records = store.list_runs(Some("Greeter"), 5).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total, 2);
        assert_eq!(records[0].passed, 1);
        assert_eq!(records[0].accuracy, 0.5);
        assert_eq!(records[0].started_at, start);

        assert!(store.list_runs(Some("Other"), 5).await.unwrap().is_empty());
        assert_eq!(store.list_runs(None, 5).await.unwrap().len(), 1);
        assert_eq!(store.list_pipelines().await.unwrap(), vec!["Greeter"]);
    }
}
