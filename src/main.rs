//! Deposition Indexer CLI
//!
//! Builds resumable, page:line-anchored topic outlines for deposition transcripts.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use depo_indexer::{
    checkpoint::{CheckpointStore, FileCheckpointStore},
    config::Config,
    document::Transcript,
    labeler::{Labeler, LlmLabeler},
    llm::LlmClient,
    persistence::{
        DEFAULT_OUTLINE_DIR, load_outline, outline_exists, outline_path_for, outline_size,
    },
    pipeline::{Orchestrator, PipelineOptions, RunOutcome, RunReport, build_units},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Deposition Indexer - topic outlines for deposition transcripts
#[derive(Parser)]
#[command(name = "depo-indexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a topic outline for one transcript
    Index {
        /// Path to the transcript (text file, pages split by form feeds)
        transcript: PathBuf,

        /// Output path for the outline, .json or .bin (defaults to data/<transcript>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Checkpoint file (defaults to <output>.checkpoint.json)
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Stop after this many units; run again to resume
        #[arg(long)]
        max_units: Option<usize>,

        /// Ignore any saved progress and start over
        #[arg(long)]
        fresh: bool,
    },

    /// Build outlines for every .txt transcript in a directory
    Batch {
        /// Directory containing transcripts
        dir: PathBuf,

        /// Directory for the outlines
        #[arg(short, long, default_value = DEFAULT_OUTLINE_DIR)]
        output: PathBuf,
    },

    /// Display an outline
    Show {
        /// Path to the outline file
        outline: PathBuf,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Show information about an outline
    Info {
        /// Path to the outline file
        outline: PathBuf,
    },

    /// Test LLM connection
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Index {
            transcript,
            output,
            checkpoint,
            max_units,
            fresh,
        } => cmd_index(config_path, transcript, output, checkpoint, max_units, fresh).await,
        Commands::Batch { dir, output } => cmd_batch(config_path, dir, output).await,
        Commands::Show { outline, json } => cmd_show(outline, json),
        Commands::Info { outline } => cmd_info(outline),
        Commands::Test => cmd_test(config_path).await,
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("depo_indexer=info,warn"),
        _ => EnvFilter::new("depo_indexer=debug,info"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load_with(path).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Flag flipped by Ctrl-C; the run stops after the unit in progress.
fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received, stopping after the current batch...");
            flag.store(true, Ordering::SeqCst);
        }
    });
    cancel
}

async fn index_one(
    config: &Config,
    labeler: Arc<dyn Labeler>,
    cancel: Arc<AtomicBool>,
    transcript_path: &Path,
    output: &Path,
    checkpoint: FileCheckpointStore,
    max_units: Option<usize>,
) -> Result<RunReport> {
    let transcript =
        Transcript::from_text_file(transcript_path).context("Failed to load transcript")?;

    println!(
        "  Transcript: {} ({} pages, ~{} words)",
        transcript.name,
        transcript.page_count(),
        transcript.total_words()
    );

    let units = build_units(&transcript.pages, &config.pipeline);
    println!("  Units:      {}", units.len());

    let mut orchestrator = Orchestrator::from_config(
        transcript.name.clone(),
        labeler,
        checkpoint,
        output,
        &config.pipeline,
    )
    .with_options(PipelineOptions {
        max_units,
        ..PipelineOptions::from(&config.pipeline)
    })
    .with_cancel(cancel);

    orchestrator
        .run(&units)
        .await
        .with_context(|| format!("Failed to index '{}'", transcript_path.display()))
}

fn print_report(report: &RunReport) {
    let outcome = match report.outcome {
        RunOutcome::Exhausted => "complete",
        RunOutcome::EndDetected => "complete (end of testimony detected)",
        RunOutcome::Suspended => "suspended, run again to resume",
    };

    println!("  Outcome:    {}", outcome);
    if let Some(from) = report.resumed_from {
        println!("  Resumed:    after unit {}", from);
    }
    if let Some(end) = report.end_detected_at {
        println!("  Ended at:   unit {}", end + 1);
    }
    println!("  Processed:  {}/{}", report.units_processed, report.units_total);
    println!("  Skipped:    {}", report.units_skipped);
    println!("  Topics:     {}", report.topics_emitted);
}

async fn cmd_index(
    config_path: Option<&Path>,
    transcript_path: PathBuf,
    output: Option<PathBuf>,
    checkpoint: Option<PathBuf>,
    max_units: Option<usize>,
    fresh: bool,
) -> Result<()> {
    println!("Loading configuration...");
    let config = load_config(config_path)?;

    let output = output
        .unwrap_or_else(|| outline_path_for(Path::new(DEFAULT_OUTLINE_DIR), &transcript_path));
    let mut store = match checkpoint {
        Some(path) => FileCheckpointStore::new(path),
        None => FileCheckpointStore::beside(&output),
    };
    if fresh {
        store.reset().context("Failed to reset checkpoint")?;
    }

    println!("Indexing transcript: {}", transcript_path.display());
    println!("Using model: {}", config.llm.model);

    let start = Instant::now();
    let labeler: Arc<dyn Labeler> = Arc::new(LlmLabeler::new(LlmClient::new(config.llm.clone())));
    let report = index_one(
        &config,
        labeler,
        cancel_on_ctrl_c(),
        &transcript_path,
        &output,
        store,
        max_units,
    )
    .await?;

    println!("\nOutline built in {:.2?}:", start.elapsed());
    print_report(&report);

    if outline_exists(&output) {
        let size = outline_size(&output)?;
        println!("\nOutline saved to: {}", output.display());
        println!("  File size: {:.1} KB", size as f64 / 1024.0);
    }

    Ok(())
}

async fn cmd_batch(config_path: Option<&Path>, dir: PathBuf, output_dir: PathBuf) -> Result<()> {
    println!("Loading configuration...");
    let config = load_config(config_path)?;

    let transcripts = Transcript::discover(&dir).context("Failed to discover transcripts")?;
    println!("Found {} transcripts in {}", transcripts.len(), dir.display());

    let labeler: Arc<dyn Labeler> = Arc::new(LlmLabeler::new(LlmClient::new(config.llm.clone())));
    let cancel = cancel_on_ctrl_c();
    let start = Instant::now();
    let mut complete = 0;

    for path in &transcripts {
        if cancel.load(Ordering::SeqCst) {
            break;
        }

        let output = outline_path_for(&output_dir, path);

        println!("\n{}", path.display());
        let report = index_one(
            &config,
            Arc::clone(&labeler),
            Arc::clone(&cancel),
            path,
            &output,
            FileCheckpointStore::beside(&output),
            None,
        )
        .await?;
        print_report(&report);

        if report.outcome != RunOutcome::Suspended {
            complete += 1;
        }
    }

    println!(
        "\n{}/{} outlines complete in {:.2?}, written to {}",
        complete,
        transcripts.len(),
        start.elapsed(),
        output_dir.display()
    );

    Ok(())
}

fn cmd_show(outline_path: PathBuf, json: bool) -> Result<()> {
    if !outline_exists(&outline_path) {
        anyhow::bail!(
            "Outline not found at '{}'. Run 'index' command first.",
            outline_path.display()
        );
    }

    let outline = load_outline(&outline_path).context("Failed to load outline")?;

    if json {
        let json_str = outline.to_json().context("Failed to serialize outline")?;
        println!("{}", json_str);
    } else {
        println!("{}", outline.format());
    }

    Ok(())
}

fn cmd_info(outline_path: PathBuf) -> Result<()> {
    if !outline_exists(&outline_path) {
        anyhow::bail!(
            "Outline not found at '{}'. Run 'index' command first.",
            outline_path.display()
        );
    }

    let outline = load_outline(&outline_path).context("Failed to load outline")?;
    let size = outline_size(&outline_path)?;
    let checkpoint = FileCheckpointStore::beside(&outline_path)
        .get()
        .context("Failed to read checkpoint")?;

    println!("Outline Information");
    println!("{}", "─".repeat(40));
    println!("  Transcript:   {}", outline.name);
    println!("  Topics:       {}", outline.topic_count());
    println!("  Last page:    {}", outline.last_page());
    println!("  Units done:   {}", outline.last_unit);
    println!("  Processed:    {}", outline.stats.processed);
    println!("  Skipped:      {}", outline.stats.skipped);
    println!("  Complete:     {}", if outline.complete { "yes" } else { "no" });
    println!(
        "  End marker:   {}",
        if outline.ends_with_terminal() { "yes" } else { "no" }
    );
    if checkpoint > 0 {
        println!("  Checkpoint:   unit {}", checkpoint);
    }
    println!("  File size:    {:.1} KB", size as f64 / 1024.0);
    println!("  Outline path: {}", outline_path.display());

    Ok(())
}

async fn cmd_test(config_path: Option<&Path>) -> Result<()> {
    println!("Testing LLM connection...\n");

    let config = Config::load_with(config_path).context("Failed to load configuration")?;

    println!("Configuration:");
    println!("  API Base:  {}", config.llm.api_base);
    println!("  Model:     {}", config.llm.model);
    let key_preview: String = config.llm.api_key.chars().take(8).collect();
    println!("  API Key:   {}...", key_preview);
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = LlmClient::new(config.llm);

    println!("Sending test request...");
    match client.test_connection().await {
        Ok(()) => {
            println!("Connection successful!");
        }
        Err(e) => {
            println!("Connection failed: {}", e);
        }
    }

    Ok(())
}
