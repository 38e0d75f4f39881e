//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.rivalry.toml` files and resolving the active scoring profile.

use crate::analysis::{Preset, ScoringProfile, WeightingScheme};
use crate::models::MetricDefinition;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".rivalry.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Filter settings.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Payload discovery settings.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Custom metric definitions; replace the preset's when non-empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<MetricDefinition>,

    /// Custom weighting scheme; replaces the preset's when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<WeightingScheme>,

    /// Winner settings.
    #[serde(default)]
    pub winners: WinnersConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Built-in scoring profile.
    #[serde(default)]
    pub preset: Preset,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            preset: Preset::default(),
        }
    }
}

fn default_output() -> String {
    "rivalry_report.md".to_string()
}

/// Category/language filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Selected value; "All" matches everything.
    #[serde(default = "default_filter_value")]
    pub value: String,

    /// Collection carrying the tag; defaults to the preset's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Tag fields; default to the preset's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            value: default_filter_value(),
            collection: None,
            fields: None,
        }
    }
}

fn default_filter_value() -> String {
    crate::models::MATCH_ALL.to_string()
}

/// Payload discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// File extensions to include.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Names to exclude while walking directories.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,

    /// Maximum payload size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Fields tried, in order, to name an entity.
    #[serde(default = "default_id_fields")]
    pub id_fields: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            excludes: default_excludes(),
            max_file_size: default_max_file_size(),
            id_fields: default_id_fields(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["json".to_string()]
}

fn default_excludes() -> Vec<String> {
    vec!["node_modules", "target", "dist", "build"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

fn default_id_fields() -> Vec<String> {
    crate::ingest::DEFAULT_ID_FIELDS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Winner decision settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WinnersConfig {
    /// Metrics tracked for winners; defaults to the preset's.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracked: Vec<String>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(preset) = args.preset {
            self.general.preset = preset;
        }

        if let Some(ref value) = args.filter {
            self.filter.value = value.clone();
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if let Some(ref id_field) = args.id_field {
            self.ingest.id_fields.retain(|f| f != id_field);
            self.ingest.id_fields.insert(0, id_field.clone());
        }
    }

    /// Resolve the scoring profile: the preset, with any custom sections applied.
    pub fn profile(&self) -> ScoringProfile {
        let mut profile = self.general.preset.profile();

        if !self.metrics.is_empty() {
            profile.definitions = self.metrics.clone();
            profile.name = "custom".to_string();
        }
        if let Some(ref scheme) = self.scheme {
            profile.scheme = scheme.clone();
        }
        if !self.winners.tracked.is_empty() {
            profile.tracked = self.winners.tracked.clone();
        }

        if let Some(ref collection) = self.filter.collection {
            profile.filter.collection = collection.clone();
        }
        if let Some(ref fields) = self.filter.fields {
            profile.filter.fields = fields.clone();
        }
        profile.filter = profile.filter.with_value(Some(&self.filter.value));

        profile
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
