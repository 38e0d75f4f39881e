//! Rivalry - comparative scoring for developers and repositories
//!
//! A CLI tool that aggregates already-fetched analytics payloads,
//! ranks entities by a weighted composite score and decides
//! per-metric and overall winners.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, invalid scheme, unreadable config, etc.)
//!   2 - No overall winner while --require-winner is set

mod analysis;
mod cli;
mod config;
mod ingest;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use ingest::{IngestOptions, PayloadLoader};
use models::{ComparisonReport, ReportMetadata};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Rivalry v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_comparison(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Comparison failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .rivalry.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to pick a preset, filter, or define custom metrics and weights.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete comparison workflow. Returns exit code (0 or 2).
fn run_comparison(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Resolve and validate the scoring profile before touching any payload
    let profile = config.profile();
    profile
        .scheme
        .validate(&profile.definitions)
        .with_context(|| format!("Invalid weighting scheme for profile '{}'", profile.name))?;
    info!(
        "Profile: {} ({} metrics, scheme: {})",
        profile.name,
        profile.definitions.len(),
        profile.scheme.name
    );
    if !profile.filter.is_match_all() {
        info!(
            "Filtering {} on {} = {}",
            profile.filter.collection,
            profile.filter.fields.join("|"),
            profile.filter.label()
        );
    }

    // Step 1: Load payloads
    let loader = PayloadLoader::new(IngestOptions::from(&config.ingest));
    let entities = loader.load(&args.input)?;
    if entities.len() < 2 {
        warn!("Only {} entity loaded; no winners can be declared", entities.len());
    }

    // Step 2: Aggregate
    let metrics = analysis::aggregate_all(&entities, &profile.filter, &profile.definitions);

    // Step 3: Score and rank
    let scores = analysis::score(&metrics, &profile.scheme, &profile.definitions)
        .context("Scoring failed")?;
    let ranking = analysis::rank(scores);

    // Step 4: Decide winners
    let decision = analysis::decide_winners(&metrics, &profile.tracked);

    let metadata = ReportMetadata {
        generated_at: Utc::now(),
        profile: profile.name.clone(),
        scheme: profile.scheme.name.clone(),
        filter: profile.filter.label().to_string(),
        entities: entities.len(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let report = ComparisonReport {
        metadata,
        ranking,
        metrics,
        decision,
    };

    // Step 5: Generate and emit the report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    if args.stdout {
        println!("{}", output);
    } else {
        let path = PathBuf::from(&config.general.output);
        std::fs::write(&path, &output)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;

        print_summary(&report);
        println!("\n✅ Comparison complete! Report saved to: {}", path.display());
    }

    // Check --require-winner
    if args.require_winner && report.decision.overall_winner.is_none() {
        eprintln!("\n⛔ No overall winner could be declared. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Print a short ranking summary to stdout.
fn print_summary(report: &ComparisonReport) {
    println!("\n📊 Ranking ({}):", report.metadata.filter);
    for (i, score) in report.ranking.iter().enumerate() {
        println!("   {}. {} - {:.2}", i + 1, score.entity, score.total);
    }

    match report.decision.overall_winner {
        Some(ref winner) => println!("\n🏆 Overall winner: {}", winner),
        None => println!("\n🤝 No overall winner"),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
