use anyhow::{Context, Result};
use bytescout::{scan, DispatchSummary, ScanConfig, ScanOutcome, ScanRecord};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Count occurrences of a byte pattern in every file of a directory,
/// scanning at most N files at the same time.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to scan
    root: Option<PathBuf>,

    /// Byte pattern in hex, 1 to 255 bytes (e.g. DEADBEEF)
    pattern: Option<String>,

    /// Maximum number of files scanned at the same time
    capacity: Option<usize>,

    /// Configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Entries to skip (glob format, relative to the root)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Print one JSON object per file
    #[arg(long, conflicts_with = "stats")]
    json: bool,

    /// Show only statistics, not per-file counts
    #[arg(short, long)]
    stats: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Clone, Copy)]
enum OutputMode {
    Human,
    Json,
    StatsOnly,
}

fn main() -> Result<()> {
    run()
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let file_config = ScanConfig::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let cli_config = ScanConfig {
        root_path: cli.root.unwrap_or_else(|| file_config.root_path.clone()),
        pattern: cli.pattern.unwrap_or_default(),
        capacity: cli.capacity.unwrap_or(file_config.capacity),
        recursive: cli.recursive,
        ignore_patterns: cli.ignore,
        log_level: cli
            .log_level
            .unwrap_or_else(|| file_config.log_level.clone()),
    };
    let config = file_config.merge_with_cli(cli_config);

    init_logging(&config.log_level);

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.stats {
        OutputMode::StatsOnly
    } else {
        OutputMode::Human
    };

    let mut sink = |record: ScanRecord| print_record(&record, mode);
    let summary = scan(&config, &mut sink)?;

    print_summary(&summary, mode);
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_record(record: &ScanRecord, mode: OutputMode) {
    match mode {
        OutputMode::StatsOnly => {}
        OutputMode::Json => match serde_json::to_string(&record.to_report()) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("{} {}", "error:".red(), e),
        },
        OutputMode::Human => match &record.outcome {
            ScanOutcome::Matched(count) => {
                println!("File name: {}", record.path.display().to_string().blue());
                if let Some(worker) = &record.worker {
                    println!("Worker: {}", worker);
                }
                println!("Found equal sequences: {}\n", count.to_string().green());
            }
            ScanOutcome::Failed(e) => {
                eprintln!("{} {}", "error:".red(), e);
            }
        },
    }
}

fn print_summary(summary: &DispatchSummary, mode: OutputMode) {
    if let OutputMode::Json = mode {
        return;
    }
    println!(
        "Scanned {} files, found {} matches in {} files",
        summary.files_scanned, summary.total_matches, summary.files_with_matches
    );
    if summary.scan_failures + summary.classify_errors + summary.spawn_failures > 0 {
        eprintln!(
            "{} {} unreadable, {} unclassifiable, {} not started",
            "warning:".yellow(),
            summary.scan_failures,
            summary.classify_errors,
            summary.spawn_failures
        );
    }
}
