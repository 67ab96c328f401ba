//! Test results, runs and the report format

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

fn seconds_between(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> f64 {
    (ended_at - started_at)
        .to_std()
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Outcome of one executed test case
///
/// A result carrying an error never passed and has a null output.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    id: String,
    passed: bool,
    output: Value,
    expected_output: Value,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    error: Option<String>,
}

impl TestResult {
    /// The pipeline produced an output and the comparator judged it
    pub fn completed(
        id: impl Into<String>,
        output: Value,
        expected_output: Value,
        passed: bool,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            passed,
            output,
            expected_output,
            started_at,
            ended_at,
            error: None,
        }
    }

    /// Executing the case failed
    pub fn errored(
        id: impl Into<String>,
        expected_output: Value,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            passed: false,
            output: Value::Null,
            expected_output,
            started_at,
            ended_at,
            error: Some(error.into()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn output(&self) -> &Value {
        &self.output
    }

    pub fn expected_output(&self) -> &Value {
        &self.expected_output
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }

    pub fn duration_seconds(&self) -> f64 {
        seconds_between(self.started_at, self.ended_at)
    }
}

/// Aggregate counts, always derived from the results
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub accuracy: f64,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let accuracy = if total == 0 {
            0.0
        } else {
            passed as f64 / total as f64
        };
        Self {
            total,
            passed,
            failed: total - passed,
            accuracy,
        }
    }
}

/// Record of one runner invocation; immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct TestRun {
    run_id: Uuid,
    pipeline_name: String,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    results: Vec<TestResult>,
}

impl TestRun {
    pub fn new(
        pipeline_name: impl Into<String>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        results: Vec<TestResult>,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), pipeline_name, started_at, ended_at, results)
    }

    /// Rebuild a run with a known id, e.g. from history
    pub fn with_id(
        run_id: Uuid,
        pipeline_name: impl Into<String>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        results: Vec<TestResult>,
    ) -> Self {
        Self {
            run_id,
            pipeline_name: pipeline_name.into(),
            started_at,
            ended_at,
            results,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    /// Results in input order
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_results(&self.results)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }

    pub fn duration_seconds(&self) -> f64 {
        seconds_between(self.started_at, self.ended_at)
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(TestResult::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            run_id: Some(self.run_id),
            pipeline_name: self.pipeline_name.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            duration_seconds: self.duration_seconds(),
            summary: self.summary(),
            results: self.results.iter().map(ResultReport::from).collect(),
        }
    }
}

impl From<RunReport> for TestRun {
    fn from(report: RunReport) -> Self {
        let results = report
            .results
            .into_iter()
            .map(|r| TestResult {
                passed: r.passed && r.error.is_none(),
                output: if r.error.is_some() { Value::Null } else { r.output },
                id: r.id,
                expected_output: r.expected_output,
                started_at: r.started_at,
                ended_at: r.ended_at,
                error: r.error,
            })
            .collect();
        TestRun::with_id(
            report.run_id.unwrap_or_else(Uuid::new_v4),
            report.pipeline_name,
            report.started_at,
            report.ended_at,
            results,
        )
    }
}

/// Serialized form of a test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    pub pipeline_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub summary: RunSummary,
    pub results: Vec<ResultReport>,
}

/// Serialized form of a test result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultReport {
    pub id: String,
    pub passed: bool,
    pub output: Value,
    pub expected_output: Value,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub error: Option<String>,
}

impl From<&TestResult> for ResultReport {
    fn from(result: &TestResult) -> Self {
        Self {
            id: result.id.clone(),
            passed: result.passed,
            output: result.output.clone(),
            expected_output: result.expected_output.clone(),
            started_at: result.started_at,
            ended_at: result.ended_at,
            duration_seconds: result.duration_seconds(),
            error: result.error.clone(),
        }
    }
}

impl RunReport {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
