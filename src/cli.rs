//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::Preset;
use clap::Parser;
use std::path::PathBuf;

/// Rivalry - head-to-head scoring for developers and repositories
///
/// Ranks already-fetched analytics payloads with a weighted composite score
/// and decides per-metric and overall winners. Markdown/JSON reports.
///
/// Examples:
///   rivalry --input alice.json --input bob.json
///   rivalry --input payloads/ --preset profiles --filter Rust
///   rivalry --input team.json --filter "bug fix" --format json --stdout
///   rivalry --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Payload files or directories to compare
    ///
    /// Directories are searched recursively for JSON payloads.
    #[arg(
        short,
        long,
        value_name = "PATH",
        required_unless_present = "init_config",
        num_args = 1..
    )]
    pub input: Vec<PathBuf>,

    /// Built-in scoring profile
    ///
    /// Can also be set via RIVALRY_PRESET env var or .rivalry.toml config.
    #[arg(short, long, value_name = "PRESET", env = "RIVALRY_PRESET")]
    pub preset: Option<Preset>,

    /// Category or language to filter on ("All" for everything)
    #[arg(short, long, value_name = "VALUE")]
    pub filter: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .rivalry.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Print the report to stdout instead of writing a file
    #[arg(long)]
    pub stdout: bool,

    /// Payload field used to name each entity
    #[arg(long, value_name = "FIELD")]
    pub id_field: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Fail if no overall winner can be declared
    ///
    /// Useful for scripted comparisons. Exit code 2 when nobody wins outright.
    #[arg(long)]
    pub require_winner: bool,

    /// Generate a default .rivalry.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.input.is_empty() {
            return Err("At least one --input path is required".to_string());
        }

        for path in &self.input {
            if !path.exists() {
                return Err(format!("Input path does not exist: {}", path.display()));
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.stdout && self.output.is_some() {
            return Err("Cannot use both --stdout and --output".to_string());
        }

        if let Some(ref field) = self.id_field {
            if field.trim().is_empty() {
                return Err("--id-field must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
