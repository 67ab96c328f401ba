//! CLI output formatting

use crate::persistence::RunRecord;
use crate::testing::{RunSummary, TestResult};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let progress_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(progress_style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Horizontal rule spanning the terminal width
pub fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    "─".repeat(width.min(120))
}

/// Compact single-line rendering of a value, truncated to `max_chars`
pub fn format_value(value: &Value, max_chars: usize) -> String {
    let text = match value {
        Value::String(s) => s.replace('\n', " "),
        other => other.to_string(),
    };
    if text.chars().count() <= max_chars {
        text
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

pub fn format_duration(seconds: f64) -> String {
    if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else if seconds < 60.0 {
        format!("{:.2}s", seconds)
    } else {
        let secs = seconds as u64;
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

pub fn format_accuracy(accuracy: f64) -> String {
    format!("{:.1}%", accuracy * 100.0)
}

/// One line per test result, with details for failures
pub fn format_result(result: &TestResult) -> String {
    let duration = style(format_duration(result.duration_seconds())).dim();
    if result.passed() {
        return format!("{} {} {}", CHECK, style(result.id()).green(), duration);
    }

    let detail = match result.error() {
        Some(error) => format!("    error: {}", style(error).red()),
        None => format!(
            "    expected: {}\n    actual:   {}",
            style(format_value(result.expected_output(), 200)).dim(),
            style(format_value(result.output(), 200)).yellow()
        ),
    };
    format!(
        "{} {} {}\n{}",
        CROSS,
        style(result.id()).red(),
        duration,
        detail
    )
}

/// Totals line for a finished run
pub fn format_summary(summary: &RunSummary) -> String {
    let accuracy = format_accuracy(summary.accuracy);
    let accuracy = if summary.failed == 0 {
        style(accuracy).green()
    } else {
        style(accuracy).yellow()
    };
    format!(
        "{} passed, {} failed, {} total ({})",
        style(summary.passed).green(),
        style(summary.failed).red(),
        style(summary.total).bold(),
        accuracy
    )
}

/// History line for a stored run
pub fn format_run_record(record: &RunRecord) -> String {
    let icon = if record.failed == 0 { CHECK } else { CROSS };
    format!(
        "{} {} - {} - {}/{} passed ({}) - {}",
        icon,
        style(&record.run_id.to_string()[..8]).dim(),
        style(&record.pipeline_name).bold(),
        record.passed,
        record.total,
        style(format_accuracy(record.accuracy)).cyan(),
        style(record.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}
