use anyhow::{Context, Result};
use promptcheck::cli::commands::{HistoryCommand, RunCommand, ValidateCommand};
use promptcheck::cli::output::*;
use promptcheck::cli::{Cli, Command};
use promptcheck::core::{ComparatorRegistry, Pipeline, PipelineConfig};
use promptcheck::llm::ClientConfig;
use promptcheck::persistence::{InMemoryRunStore, RunStore};
use promptcheck::pipelines::PipelineRegistry;
use promptcheck::testing::{
    load_test_cases, test_cases_json_schema, RunnerEvent, TestRun, TestRunner,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();
    dotenvy::dotenv().ok();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_tests(cmd, &cli).await?,
        Command::Validate(cmd) => validate_tests(cmd)?,
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&test_cases_json_schema())?);
        }
        Command::Pipelines => list_pipelines(&cli),
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

/// Client configuration from the environment plus global flags
fn client_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env().context("Failed to read client configuration")?;
    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }
    Ok(config)
}

/// Resolve `--pipeline` against the registry first, then as a definition file
fn resolve_pipeline(reference: &str, config: ClientConfig) -> Result<Arc<dyn Pipeline>> {
    let registry = PipelineRegistry::builtin(config.clone());
    if let Some(pipeline) = registry.resolve(reference)? {
        return Ok(pipeline);
    }

    if Path::new(reference).is_file() {
        let definition = PipelineConfig::from_file(reference)?;
        return definition.build(config);
    }

    anyhow::bail!(
        "Unknown pipeline '{}': not a built-in pipeline ({}) or a definition file",
        reference,
        registry.names().join(", ")
    )
}

#[cfg(feature = "sqlite")]
async fn open_store() -> Result<Arc<dyn RunStore>> {
    let store = promptcheck::persistence::SqliteRunStore::with_default_path().await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store() -> Result<Arc<dyn RunStore>> {
    warn!("Built without sqlite support; history is not persisted");
    Ok(Arc::new(InMemoryRunStore::new()))
}

async fn run_tests(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    let cases = load_test_cases(&cmd.tests)?;
    println!(
        "{} Loaded {} test cases from {}",
        INFO,
        style(cases.len()).cyan(),
        style(cmd.tests.display()).dim()
    );

    let pipeline = resolve_pipeline(&cmd.pipeline, client_config(cli)?)?;

    let comparators = ComparatorRegistry::builtin();
    let mut runner = TestRunner::new().with_comparators(comparators.clone());
    if let Some(name) = &cmd.comparator {
        let comparator = comparators.get(name).with_context(|| {
            format!(
                "Unknown comparator '{}' (available: {})",
                name,
                comparators.names().join(", ")
            )
        })?;
        runner = runner.with_shared_comparator(comparator);
    }

    let progress = create_progress_bar(cases.len());
    let bar = progress.clone();
    runner.add_event_handler(move |event| match event {
        RunnerEvent::RunStarted { pipeline_name, .. } => {
            bar.println(format!("{} Running {}", ROCKET, style(pipeline_name).bold()));
        }
        RunnerEvent::CaseStarted { case_id, .. } => bar.set_message(case_id),
        RunnerEvent::CaseFinished { .. } => bar.inc(1),
        RunnerEvent::RunCompleted { .. } => bar.finish_and_clear(),
    });

    let run = runner.run(pipeline.as_ref(), &cases).await;
    progress.finish_and_clear();

    print_run(&run);

    if let Some(path) = &cmd.output {
        let report = run.report().to_json_pretty()?;
        std::fs::write(path, report)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("{} Report written to {}", INFO, style(path.display()).dim());
    }

    // Save to history
    let store: Arc<dyn RunStore> = if cmd.no_history {
        Arc::new(InMemoryRunStore::new())
    } else {
        open_store().await?
    };
    match store.save_run(&run).await {
        Ok(()) if !cmd.no_history => println!(
            "{} Run saved to history (ID: {})",
            INFO,
            style(&run.run_id().to_string()[..8]).dim()
        ),
        Ok(()) => {}
        Err(e) => warn!("Failed to save run to history: {:#}", e),
    }

    if !run.all_passed() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_run(run: &TestRun) {
    println!("{}", separator());
    for result in run.results() {
        println!("{}", format_result(result));
    }
    println!("{}", separator());

    let summary = run.summary();
    let icon = if run.all_passed() { CHECK } else { CROSS };
    println!(
        "{} {}: {} in {}",
        icon,
        style(run.pipeline_name()).bold(),
        format_summary(&summary),
        format_duration(run.duration_seconds())
    );
}

fn validate_tests(cmd: &ValidateCommand) -> Result<()> {
    match load_test_cases(&cmd.tests) {
        Ok(cases) => {
            if cmd.json {
                let ids: Vec<&str> = cases.iter().map(|case| case.id.as_str()).collect();
                let data = serde_json::json!({ "valid": true, "count": cases.len(), "ids": ids });
                println!("{}", serde_json::to_string_pretty(&data)?);
                return Ok(());
            }

            println!("{} Test cases are valid!", CHECK);
            println!("  Cases: {}", style(cases.len()).cyan());
            for case in &cases {
                let comparator = case
                    .comparator_name()
                    .map(|name| format!(" [{}]", name))
                    .unwrap_or_default();
                let description = case
                    .description
                    .as_deref()
                    .map(|d| format!(" - {}", d))
                    .unwrap_or_default();
                println!(
                    "  {}{}{}",
                    style(&case.id).bold(),
                    style(comparator).cyan(),
                    style(description).dim()
                );
            }
            Ok(())
        }
        Err(e) => {
            if cmd.json {
                let data = serde_json::json!({ "valid": false, "error": e.to_string() });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{} Validation failed:", CROSS);
                println!("  {}", style(e).red());
            }
            std::process::exit(1);
        }
    }
}

fn list_pipelines(cli: &Cli) {
    // Listing never invokes the factories, so a missing credential is fine here
    let config = client_config(cli).unwrap_or_else(|_| ClientConfig::new(String::new()));
    let registry = PipelineRegistry::builtin(config);

    println!("{} Built-in pipelines:", INFO);
    for name in registry.names() {
        println!("  {}", style(name).bold());
    }
    println!(
        "\n{} Any pipeline definition YAML file can be passed to --pipeline as well",
        INFO
    );
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_store().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(run) if cmd.json => println!("{}", run.report().to_json_pretty()?),
            Some(run) => {
                println!("{} Run {}", INFO, style(run.run_id()).cyan());
                println!("  Started: {}", style(run.started_at().to_rfc3339()).dim());
                print_run(&run);
            }
            None => {
                error!("Run {} not found", run_id);
                println!("{} Run not found", WARN);
            }
        }
        return Ok(());
    }

    let records = store.list_runs(cmd.pipeline.as_deref(), cmd.limit).await?;

    if cmd.json {
        let data = serde_json::json!({ "runs": records });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for record in &records {
        println!("  {}", format_run_record(record));
    }

    Ok(())
}
