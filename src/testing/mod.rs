//! Running labeled test cases against pipelines

pub mod batch;
pub mod case;
pub mod result;
pub mod runner;

pub use batch::{
    load_test_cases, parse_test_cases, test_cases_json_schema, BatchError, TestCasePayload,
};
pub use case::{ComparatorRef, TestCase};
pub use result::{ResultReport, RunReport, RunSummary, TestResult, TestRun};
pub use runner::{pipeline_display_name, EventHandler, RunnerError, RunnerEvent, TestRunner};
