//! Test runner: comparator resolution and isolated per-case execution

use crate::core::{exact_match, Comparator, ComparatorRegistry, Pipeline};
use crate::testing::{ComparatorRef, RunSummary, TestCase, TestResult, TestRun};
use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Failures while preparing a single case
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("Unknown comparator '{name}' for test case {case_id}")]
    UnknownComparator { name: String, case_id: String },
}

/// Progress notifications emitted while a batch runs
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
        total: usize,
    },
    CaseStarted {
        index: usize,
        case_id: String,
    },
    CaseFinished {
        index: usize,
        case_id: String,
        passed: bool,
        error: Option<String>,
    },
    RunCompleted {
        run_id: Uuid,
        summary: RunSummary,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(RunnerEvent) + Send + Sync>;

/// Executes a pipeline over a batch of test cases, one at a time
#[derive(Clone, Default)]
pub struct TestRunner {
    comparator: Option<Comparator>,
    comparators: ComparatorRegistry,
    event_handlers: Vec<EventHandler>,
}

impl TestRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner-wide override, used when a case names no comparator
    pub fn with_comparator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.comparator = Some(Arc::new(f));
        self
    }

    pub fn with_shared_comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// Registry consulted first for named comparators
    pub fn with_comparators(mut self, comparators: ComparatorRegistry) -> Self {
        self.comparators = comparators;
        self
    }

    pub fn with_named_comparator<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.comparators.insert(name, f);
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(RunnerEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    pub fn comparators(&self) -> &ComparatorRegistry {
        &self.comparators
    }

    fn emit_event(&self, event: RunnerEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Pick the comparator for one case; the first applicable source wins
    pub fn resolve_comparator<P>(
        &self,
        case: &TestCase,
        pipeline: &P,
    ) -> Result<Comparator, RunnerError>
    where
        P: Pipeline + ?Sized,
    {
        match &case.comparator {
            Some(ComparatorRef::Custom(comparator)) => Ok(comparator.clone()),
            Some(ComparatorRef::Named(name)) => self
                .comparators
                .get(name)
                .or_else(|| pipeline.named_comparator(name))
                .ok_or_else(|| RunnerError::UnknownComparator {
                    name: name.clone(),
                    case_id: case.id.clone(),
                }),
            None => Ok(self
                .comparator
                .clone()
                .or_else(|| pipeline.default_comparator())
                .unwrap_or_else(exact_match)),
        }
    }

    /// Execute every case in input order and collect the run
    pub async fn run<P>(&self, pipeline: &P, cases: &[TestCase]) -> TestRun
    where
        P: Pipeline + ?Sized,
    {
        let run_id = Uuid::new_v4();
        let pipeline_name = pipeline_display_name(pipeline);
        let started_at = Utc::now();

        info!(
            "Starting test run {} for {} ({} cases)",
            run_id,
            pipeline_name,
            cases.len()
        );
        self.emit_event(RunnerEvent::RunStarted {
            run_id,
            pipeline_name: pipeline_name.clone(),
            total: cases.len(),
        });

        let mut results = Vec::with_capacity(cases.len());
        for (index, case) in cases.iter().enumerate() {
            self.emit_event(RunnerEvent::CaseStarted {
                index,
                case_id: case.id.clone(),
            });

            let result = self.run_case(pipeline, case).await;
            match result.error() {
                Some(error) => warn!("Test case {} failed: {}", case.id, error),
                None if !result.passed() => debug!("Test case {} did not match", case.id),
                None => debug!("Test case {} passed", case.id),
            }

            self.emit_event(RunnerEvent::CaseFinished {
                index,
                case_id: case.id.clone(),
                passed: result.passed(),
                error: result.error().map(str::to_string),
            });
            results.push(result);
        }

        let run = TestRun::with_id(run_id, pipeline_name, started_at, Utc::now(), results);
        let summary = run.summary();
        info!(
            "Test run {} finished: {}/{} passed",
            run_id, summary.passed, summary.total
        );
        self.emit_event(RunnerEvent::RunCompleted { run_id, summary });
        run
    }

    async fn run_case<P>(&self, pipeline: &P, case: &TestCase) -> TestResult
    where
        P: Pipeline + ?Sized,
    {
        let started_at = Utc::now();

        let outcome = match self.resolve_comparator(case, pipeline) {
            Err(error) => Err(error.to_string()),
            Ok(comparator) => {
                let attempt = async {
                    let output = pipeline
                        .execute(&case.params)
                        .await
                        .map_err(|e| e.to_string())?;
                    let passed = comparator(&output, &case.expected_output);
                    Ok::<_, String>((output, passed))
                };
                match AssertUnwindSafe(attempt).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(panic) => Err(format!("panicked: {}", panic_message(panic.as_ref()))),
                }
            }
        };

        let ended_at = Utc::now();
        match outcome {
            Ok((output, passed)) => TestResult::completed(
                case.id.clone(),
                output,
                case.expected_output.clone(),
                passed,
                started_at,
                ended_at,
            ),
            Err(error) => TestResult::errored(
                case.id.clone(),
                case.expected_output.clone(),
                error,
                started_at,
                ended_at,
            ),
        }
    }
}

impl std::fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRunner")
            .field("has_comparator", &self.comparator.is_some())
            .field("comparators", &self.comparators)
            .field("event_handlers", &self.event_handlers.len())
            .finish()
    }
}

/// Explicit name if the pipeline has one, otherwise its bare type name
pub fn pipeline_display_name<P: Pipeline + ?Sized>(pipeline: &P) -> String {
    match pipeline.name() {
        Some(name) => name.to_string(),
        None => short_type_name(pipeline.type_name()).to_string(),
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
