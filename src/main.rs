use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;

use adlens_core::provider::ChatModel;
use adlens_core::{RunOutput, RunResult};
use adlens_engine::{Pipeline, PipelineConfig, StageEvent, SvgChartRenderer};
use adlens_llm::{LlmPlanner, LlmSynthesizer, OllamaProvider};
use adlens_settings::{AdlensSettings, LoadedSettings};
use adlens_store::{seed_demo, Database, SqliteQueryRunner};
use adlens_telemetry::{init_telemetry, TelemetryConfig, TelemetryGuard};

#[derive(Parser)]
#[command(name = "adlens", version, about = "Ask marketing-analytics questions in plain language")]
struct Cli {
    /// Settings file (defaults to ~/.adlens/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one question
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
        /// Print the run result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive session; `exit` or `quit` ends it
    Repl,
    /// Show the sanitized plan for a question without running it
    Plan {
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Create the schema and load the demo dataset
    Seed,
    /// Show persisted warnings and errors
    Logs {
        #[arg(long)]
        run_id: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let LoadedSettings {
        settings,
        ignored_env,
    } = match &cli.config {
        Some(path) => adlens_settings::load_settings_from_path(path),
        None => adlens_settings::load_settings(),
    }
    .context("failed to load settings")?;

    let guard = init_telemetry(telemetry_config(&settings));
    for ignored in &ignored_env {
        ignored.warn();
    }
    tracing::debug!(model = %settings.llm.model, db = %settings.database.path, "settings loaded");

    match cli.command {
        Command::Ask { question, json } => {
            let pipeline = build_pipeline(&settings, None)?;
            let result = pipeline.answer(&question.join(" ")).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
            if result.is_error() {
                std::process::exit(1);
            }
        }
        Command::Repl => repl(&settings).await?,
        Command::Plan { question } => {
            let pipeline = build_pipeline(&settings, None)?;
            let plan = pipeline.plan(&question.join(" ")).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Seed => {
            let db = open_database(&settings)?;
            let inserted = seed_demo(&db)?;
            println!("seeded {inserted} performance rows into {}", db.path().display());
        }
        Command::Logs { run_id, limit } => print_logs(&guard, run_id, limit)?,
    }

    Ok(())
}

fn telemetry_config(settings: &AdlensSettings) -> TelemetryConfig {
    TelemetryConfig {
        json: settings.logging.json,
        log_to_sqlite: settings.logging.persist_warnings,
        log_db_path: PathBuf::from(&settings.logging.log_db_path),
        ..TelemetryConfig::default()
    }
    .with_level_name(&settings.logging.level)
    .with_module_levels(
        settings
            .logging
            .modules
            .iter()
            .map(|(module, level)| (module.as_str(), level.as_str())),
    )
}

fn open_database(settings: &AdlensSettings) -> anyhow::Result<Database> {
    let path = Path::new(&settings.database.path);
    Database::open(path).with_context(|| format!("failed to open database {}", path.display()))
}

fn build_pipeline(
    settings: &AdlensSettings,
    stage_tx: Option<broadcast::Sender<StageEvent>>,
) -> anyhow::Result<Pipeline> {
    let db = open_database(settings)?;
    let model: Arc<dyn ChatModel> = Arc::new(OllamaProvider::new(
        settings.llm.base_url.clone(),
        settings.llm.model.clone(),
        Duration::from_millis(settings.llm.timeout_ms),
    )?);

    let config = PipelineConfig {
        charts_enabled: settings.charts.enabled,
        empty_data_message: settings.pipeline.empty_data_message.clone(),
    };

    let mut builder = Pipeline::builder(
        config,
        Arc::new(LlmPlanner::new(model.clone()).with_temperature(settings.llm.temperature)),
        Arc::new(SqliteQueryRunner::new(db)),
        Arc::new(LlmSynthesizer::new(model).with_temperature(settings.llm.temperature)),
    )
    .chart_renderer(Arc::new(SvgChartRenderer::new(&settings.charts.output_dir)));

    if let Some(tx) = stage_tx {
        builder = builder.on_stage(tx);
    }
    Ok(builder.build())
}

fn print_result(result: &RunResult) {
    match result {
        RunResult::Completed(output) => print_output(output),
        RunResult::Failed { error } => eprintln!("error: {error}"),
    }
}

fn print_output(output: &RunOutput) {
    println!("{}\n", output.narrative);

    if !output.calculation_log.is_empty() {
        println!("Calculations:");
        for entry in &output.calculation_log {
            println!("  - {entry}");
        }
        println!();
    }
    if output.show_table && !output.table.is_empty() {
        println!("{}\n", output.table.to_text());
    }
    if let Some(chart) = &output.chart_reference {
        println!("Chart: {chart}");
    }
}

async fn repl(settings: &AdlensSettings) -> anyhow::Result<()> {
    let (tx, mut rx) = broadcast::channel::<StageEvent>(64);
    let pipeline = build_pipeline(settings, Some(tx))?;

    let progress = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => eprintln!("  [{}]", event.stage.as_str()),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    println!("adlens ({}) - ask a question, or `exit` to leave.", settings.llm.model);

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_ascii_lowercase().as_str(), "exit" | "quit") {
            break;
        }
        print_result(&pipeline.answer(question).await);
    }

    drop(pipeline);
    progress.abort();
    Ok(())
}

fn print_logs(guard: &TelemetryGuard, run_id: Option<String>, limit: u32) -> anyhow::Result<()> {
    let Some(sink) = guard.logs() else {
        bail!("log persistence is disabled (logging.persistWarnings = false)");
    };
    let records = sink.recent(run_id.as_deref(), limit)?;

    if records.is_empty() {
        println!("no persisted logs");
    }
    for record in records {
        println!(
            "{} {:5} {} {} {}{}",
            record.timestamp,
            record.level,
            record.run_id.as_deref().unwrap_or("-"),
            record.stage.as_deref().unwrap_or("-"),
            record.message,
            record.fields.map(|f| format!(" {f}")).unwrap_or_default()
        );
    }
    Ok(())
}
