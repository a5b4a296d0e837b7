//! apimapper CLI
//!
//! CLI tool for compiling filter lists, checking URLs against them and
//! running a monitoring session over a JSONL host event stream.

mod origins;
mod session;
mod source;
mod transport;

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tokio::io::{AsyncWrite, BufReader};
use tracing_subscriber::EnvFilter;

use am_compiler::refresh::{RefreshConfig, DEFAULT_REFRESH_INTERVAL, DEFAULT_SUBSCRIPTION_URL};
use am_compiler::{compile_with_stats, RefreshOutcome};
use am_core::{decide, Engine, SharedFilterSet};

use crate::origins::ContextOrigins;
use crate::session::run_session;
use crate::source::{refresh_loop, refresh_once, SubscriptionSource};

#[derive(Parser)]
#[command(name = "apimapper")]
#[command(about = "Request monitor with ABP-style blocking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile filter lists and report rule statistics
    Compile {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check URLs against a filter list
    Match {
        /// Filter list file
        #[arg(short, long)]
        input: String,

        /// URLs to check
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Run a monitoring session over a JSONL event stream
    Run {
        /// Subscription URL or local filter list
        #[arg(long, env = "APIMAPPER_FILTERS", default_value = DEFAULT_SUBSCRIPTION_URL)]
        filters: String,

        /// Seconds between subscription refreshes
        #[arg(long, env = "APIMAPPER_REFRESH_SECS", default_value_t = DEFAULT_REFRESH_INTERVAL.as_secs())]
        refresh_secs: u64,

        /// Event stream to read, `-` for stdin
        #[arg(long, default_value = "-")]
        events: String,

        /// Snapshot output file (stdout when absent)
        #[arg(short, long)]
        output: Option<String>,

        /// Load the subscription before handling the first event
        #[arg(long)]
        wait_for_filters: bool,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { input, verbose } => cmd_compile(&input, verbose),
        Commands::Match { input, urls } => cmd_match(&input, &urls),
        Commands::Run {
            filters,
            refresh_secs,
            events,
            output,
            wait_for_filters,
        } => {
            let config = RefreshConfig {
                source: filters,
                interval: Duration::from_secs(refresh_secs),
            };
            cmd_run(&config, &events, output.as_deref(), wait_for_filters)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_compile(inputs: &[String], verbose: bool) -> Result<(), String> {
    if inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    let start = Instant::now();
    let mut total_lines = 0usize;
    let mut total_rules = 0usize;
    let mut dropped = 0usize;
    let mut deduped = 0usize;

    for (list_id, path) in inputs.iter().enumerate() {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path, e))?;

        let (set, stats) = compile_with_stats(&content);
        total_lines += stats.parse.lines;
        total_rules += set.len();
        dropped += stats.dropped;
        deduped += stats.deduped;

        if verbose {
            println!(
                "  [{}] {} - {} lines, {} rules ({} comments, {} exceptions, {} cosmetic, {} with options)",
                list_id,
                Path::new(path).file_name().unwrap_or_default().to_string_lossy(),
                stats.parse.lines,
                set.len(),
                stats.parse.comments,
                stats.parse.exceptions,
                stats.parse.cosmetic,
                stats.parse.options,
            );
        }
    }

    let total_time = start.elapsed();

    println!("Compiled {} filter lists", inputs.len());
    println!("  Lines:    {}", total_lines);
    println!("  Rules:    {} (dedupe removed {}, {} failed to compile)", total_rules, deduped, dropped);
    println!("  Time:     {:.1}ms", total_time.as_secs_f64() * 1000.0);

    Ok(())
}

fn cmd_match(input: &str, urls: &[String]) -> Result<(), String> {
    let content = fs::read_to_string(input)
        .map_err(|e| format!("Failed to read '{}': {}", input, e))?;

    let (set, stats) = compile_with_stats(&content);
    log::debug!("{} rules compiled, {} skipped lines", stats.rules, stats.parse.skipped());

    for url in urls {
        let decision = decide(&set, url);
        match decision.rule.as_deref() {
            Some(rule) => println!("BLOCK  {url}  ({rule})"),
            None => println!("ALLOW  {url}"),
        }
    }

    Ok(())
}

fn cmd_run(config: &RefreshConfig, events: &str, output: Option<&str>, wait_for_filters: bool) -> Result<(), String> {
    if config.interval.is_zero() {
        return Err("--refresh-secs must be positive".to_string());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;

    runtime.block_on(async {
        let shared = SharedFilterSet::default();
        let source = SubscriptionSource::parse(&config.source);
        let interval = config.interval;

        let refresher = if wait_for_filters {
            match refresh_once(&source, &shared).await {
                Ok(RefreshOutcome::Updated(stats)) => {
                    log::info!("loaded {} rules from {}", stats.rules, source.describe())
                }
                Ok(RefreshOutcome::Unchanged) => {}
                Err(e) => log::warn!("initial filter load failed, starting with no rules: {e}"),
            }
            // The first tick would refetch what was just loaded.
            let shared = shared.clone();
            tokio::spawn(async move {
                tokio::time::sleep(interval).await;
                refresh_loop(source, shared, interval).await
            })
        } else {
            tokio::spawn(refresh_loop(source, shared.clone(), interval))
        };

        let mut engine = Engine::new(shared);
        let origins = ContextOrigins::new();
        let mut writer = open_output(output).await?;

        let stats = if events == "-" {
            let input = BufReader::new(tokio::io::stdin());
            run_session(&mut engine, input, &mut writer, origins).await
        } else {
            let file = tokio::fs::File::open(events)
                .await
                .map_err(|e| format!("Failed to open '{}': {}", events, e))?;
            run_session(&mut engine, BufReader::new(file), &mut writer, origins).await
        }
        .map_err(|e| format!("Session failed: {}", e))?;

        refresher.abort();
        log::info!("{} snapshots written", stats.snapshots);
        Ok::<(), String>(())
    })
}

async fn open_output(output: Option<&str>) -> Result<Box<dyn AsyncWrite + Unpin + Send>, String> {
    match output {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .map_err(|e| format!("Failed to create '{}': {}", path, e))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}
