//! Payload discovery and loading.
//!
//! This module finds already-fetched JSON payloads on disk, respecting
//! configured extensions, excludes and size limits, and turns each one
//! into comparable entities.

pub mod payload;

use anyhow::{bail, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::models::Entity;
pub use payload::{entity_from_json, DEFAULT_ID_FIELDS};

/// Configuration for payload discovery.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// File extensions to include (e.g., ["json"])
    pub extensions: Vec<String>,
    /// Directory or file names to skip
    pub excludes: Vec<String>,
    /// Maximum payload size in bytes
    pub max_file_size: u64,
    /// Fields tried, in order, to name an entity
    pub id_fields: Vec<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["json".to_string()],
            excludes: vec!["node_modules".to_string(), "target".to_string()],
            max_file_size: 50 * 1024 * 1024, // 50MB
            id_fields: DEFAULT_ID_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<&crate::config::IngestConfig> for IngestOptions {
    fn from(config: &crate::config::IngestConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            excludes: config.excludes.clone(),
            max_file_size: config.max_file_size,
            id_fields: config.id_fields.clone(),
        }
    }
}

/// Loader for entity payloads.
pub struct PayloadLoader {
    options: IngestOptions,
}

impl PayloadLoader {
    /// Create a new payload loader.
    pub fn new(options: IngestOptions) -> Self {
        Self { options }
    }

    /// Expand inputs into payload files; directories are walked recursively.
    pub fn discover(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for input in inputs {
            if input.is_file() {
                files.push(input.clone());
            } else if input.is_dir() {
                let mut found: Vec<PathBuf> = WalkDir::new(input)
                    .follow_links(false)
                    .into_iter()
                    .filter_entry(|e| e.depth() == 0 || !self.is_excluded(e))
                    .filter_map(|e| match e {
                        Ok(entry) => Some(entry),
                        Err(err) => {
                            debug!("Skipping unreadable entry: {}", err);
                            None
                        }
                    })
                    .filter(|e| e.file_type().is_file() && self.matches(e.path()))
                    .map(DirEntry::into_path)
                    .collect();
                found.sort();
                files.extend(found);
            } else {
                bail!("Input not found: {}", input.display());
            }
        }

        Ok(files)
    }

    /// Load every entity from the given inputs, in discovery order.
    ///
    /// Files that cannot be read or parsed are skipped with a warning.
    pub fn load(&self, inputs: &[PathBuf]) -> Result<Vec<Entity>> {
        let files = self.discover(inputs)?;
        let mut entities = Vec::new();

        for file in &files {
            match self.load_file(file) {
                Ok(mut loaded) => {
                    debug!("{}: {} entities", file.display(), loaded.len());
                    entities.append(&mut loaded);
                }
                Err(e) => warn!("Skipping {}: {}", file.display(), e),
            }
        }

        if entities.is_empty() {
            bail!("No entities found in {} payload file(s)", files.len());
        }

        dedupe_ids(&mut entities);
        info!("Loaded {} entities from {} files", entities.len(), files.len());
        Ok(entities)
    }

    /// Load the entities held by one payload file.
    ///
    /// A top-level array yields one entity per element.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Entity>> {
        let size = fs::metadata(path)?.len();
        if size > self.options.max_file_size {
            bail!(
                "payload is {} bytes, limit is {}",
                size,
                self.options.max_file_size
            );
        }

        let content = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "entity".to_string());

        let entities = match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let fallback = format!("{}#{}", stem, i + 1);
                    entity_from_json(item, &self.options.id_fields, &fallback)
                })
                .collect(),
            other => vec![entity_from_json(&other, &self.options.id_fields, &stem)],
        };

        Ok(entities)
    }

    /// Check if a file matches the configured extensions.
    fn matches(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.options
            .extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }

    /// Check if an entry is hidden or explicitly excluded.
    fn is_excluded(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();

        if name.starts_with('.') {
            return true;
        }

        self.options.excludes.iter().any(|pattern| name == pattern.as_str())
    }
}

/// Make entity ids unique by suffixing repeats with their occurrence number.
fn dedupe_ids(entities: &mut [Entity]) {
    let mut seen: HashMap<String, usize> = HashMap::new();

    for entity in entities.iter_mut() {
        let count = seen.entry(entity.id.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            let renamed = format!("{}#{}", entity.id, count);
            warn!("Duplicate entity id {}, renamed to {}", entity.id, renamed);
            entity.id = renamed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordNode;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_discover_skips_hidden_excluded_and_other_extensions() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "alice.json", "{}");
        write(temp.path(), "nested/bob.JSON", "{}");
        write(temp.path(), "notes.txt", "hi");
        write(temp.path(), ".cache/old.json", "{}");
        write(temp.path(), "node_modules/dep.json", "{}");

        let loader = PayloadLoader::new(IngestOptions::default());
        let files = loader.discover(&[temp.path().to_path_buf()]).unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"alice.json".to_string()));
        assert!(names.contains(&"bob.JSON".to_string()));
    }

    #[test]
    fn test_load_array_and_object_payloads() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "team.json",
            r#"[{"username": "alice"}, {"username": "bob"}, 7]"#,
        );
        write(temp.path(), "carol.json", r#"{"repositories": []}"#);

        let loader = PayloadLoader::new(IngestOptions::default());
        let entities = loader.load(&[temp.path().to_path_buf()]).unwrap();
        let ids: Vec<&str> = entities.iter().map(|e| e.id.as_str()).collect();

        assert_eq!(ids, vec!["carol", "alice", "bob", "team#3"]);
    }

    #[test]
    fn test_unparseable_file_is_skipped() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "broken.json", "{ not json");
        write(temp.path(), "ok.json", r#"{"username": "ok"}"#);

        let loader = PayloadLoader::new(IngestOptions::default());
        let entities = loader.load(&[temp.path().to_path_buf()]).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id, "ok");
    }

    #[test]
    fn test_no_entities_is_an_error() {
        let temp = TempDir::new().unwrap();
        let loader = PayloadLoader::new(IngestOptions::default());
        assert!(loader.load(&[temp.path().to_path_buf()]).is_err());
        assert!(loader.load(&[temp.path().join("missing.json")]).is_err());
    }

    #[test]
    fn test_duplicate_ids_are_renamed() {
        let mut entities: Vec<Entity> = ["alice", "alice", "bob"]
            .iter()
            .map(|id| Entity::new(*id, RecordNode::default()))
            .collect();
        dedupe_ids(&mut entities);
        assert_eq!(entities[0].id, "alice");
        assert_eq!(entities[1].id, "alice#2");
        assert_eq!(entities[2].id, "bob");
    }
}
