//! dumpbeam CLI
//!
//! Splits dump files into line-aligned chunks and processes them in parallel.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use dumpbeam::dispatcher::{DispatchMode, Dispatcher, WorkerCommand, worker_main};
use dumpbeam::io::{FileChunker, resolve_inputs};
use dumpbeam::{Chunk, RunConfig, logging};

#[derive(Parser)]
#[command(name = "dumpbeam")]
#[command(about = "Chunked, parallel processing of record dumps", long_about = None)]
struct Cli {
    /// Path to configuration file (.json, .yaml or .yml)
    #[arg(short, long, default_value = "dumpbeam.yaml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the configured input (default if no command specified)
    Run(RunArgs),

    /// Print the chunk plan of each input file as JSON
    Chunks {
        /// Dump file or glob pattern
        #[arg(short, long)]
        input: String,

        /// Upper bound on chunks per file
        #[arg(long, default_value_t = 16)]
        max_workers: usize,
    },

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path; the extension picks the format
        #[arg(short, long, default_value = "dumpbeam.yaml")]
        output: PathBuf,
    },

    /// Process one chunk (spawned by the process dispatcher)
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(clap::Args, Default)]
struct RunArgs {
    /// Override the input file or glob pattern
    #[arg(short, long)]
    input: Option<String>,

    /// Override the maximum number of chunks per file
    #[arg(long)]
    max_workers: Option<usize>,

    /// Override the number of concurrent workers
    #[arg(long)]
    pool_size: Option<usize>,

    /// Override the batch size
    #[arg(long)]
    batch_size: Option<usize>,

    /// Override the dispatch mode
    #[arg(long, value_enum)]
    mode: Option<DispatchMode>,
}

#[derive(clap::Args)]
struct WorkerArgs {
    #[arg(long)]
    file: PathBuf,
    #[arg(long)]
    start: u64,
    #[arg(long)]
    end: u64,
    #[arg(long)]
    batch_size: usize,
    #[arg(long)]
    label: String,
    #[arg(long)]
    plan_json: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => run_command(&cli.config, RunArgs::default()),
        Some(Commands::Run(args)) => run_command(&cli.config, args),
        Some(Commands::Chunks { input, max_workers }) => {
            logging::init("info");
            chunks_command(&input, max_workers)
        }
        Some(Commands::GenerateConfig { output }) => generate_config_command(output),
        Some(Commands::Worker(args)) => {
            logging::init("info");
            worker_main(
                &args.file,
                args.start,
                args.end,
                args.batch_size,
                &args.label,
                &args.plan_json,
            )?;
            Ok(())
        }
    }
}

fn load_config(path: &Path, input: Option<&str>) -> Result<RunConfig> {
    if path.exists() {
        return RunConfig::from_file(path);
    }
    match input {
        Some(input) => Ok(RunConfig::new(input)),
        None => bail!(
            "config {} not found; pass --input or run `dumpbeam generate-config`",
            path.display()
        ),
    }
}

fn run_command(config_path: &Path, args: RunArgs) -> Result<()> {
    let mut config = load_config(config_path, args.input.as_deref())?;

    // Apply overrides
    if let Some(input) = args.input {
        config.input = input;
    }
    if let Some(n) = args.max_workers {
        config.max_workers = n;
    }
    if let Some(n) = args.pool_size {
        config.pool_size = Some(n);
    }
    if let Some(n) = args.batch_size {
        config.batch_size = n;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }

    logging::init(&config.log_level);
    config.validate()?;

    let chunker = FileChunker::new();
    let mut chunks: Vec<Chunk> = Vec::new();
    for file in resolve_inputs(&config.input)? {
        let plan = chunker.split(&file, config.max_workers)?;
        tracing::info!(
            file = %file.display(),
            workers = plan.workers_used,
            chunks = plan.chunk_count,
            "planned chunks"
        );
        chunks.extend(plan.chunks);
    }
    if chunks.is_empty() {
        tracing::warn!("input is empty, nothing to do");
        return Ok(());
    }

    let pool_size = config.pool_size.unwrap_or(chunks.len());
    let dispatcher = Dispatcher::new(pool_size, config.batch_size)?;
    let summary = dispatcher.run_plan(
        config.mode,
        &config.plan,
        &chunks,
        &WorkerCommand::current_exe()?,
    )?;

    if !summary.is_success() {
        bail!(
            "{} of {} workers failed: {}",
            summary.failed,
            summary.failed + summary.completed,
            summary.failed_workers.join(", ")
        );
    }
    Ok(())
}

fn chunks_command(input: &str, max_workers: usize) -> Result<()> {
    let chunker = FileChunker::new();
    for file in resolve_inputs(input)? {
        let plan = chunker.split(&file, max_workers)?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
    }
    Ok(())
}

fn generate_config_command(output: PathBuf) -> Result<()> {
    let rendered = RunConfig::sample().render_for(&output)?;
    std::fs::write(&output, rendered)?;
    println!("Generated configuration at {}", output.display());
    Ok(())
}
