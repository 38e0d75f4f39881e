//! Conversion of already-fetched JSON payloads into record trees.
//!
//! Objects become records: scalars become fields, arrays of objects become
//! named child collections and nested objects are flattened with dotted
//! keys (`duration.commitsPerDay`, `gitDiffAnalysis.new_code_analysis`).
//! Anything that does not fit is dropped rather than rejected.

use crate::models::{Entity, FieldValue, Fields, RecordNode};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Fields tried, in order, to identify an entity.
pub const DEFAULT_ID_FIELDS: &[&str] = &["username", "repositoryName", "name", "login"];

/// Convert a JSON value into a record.
///
/// Non-object values yield an empty record.
pub fn record_from_json(value: &Value) -> RecordNode {
    match value {
        Value::Object(map) => {
            let mut fields = Fields::new();
            let mut children = BTreeMap::new();
            flatten_object(map, "", &mut fields, &mut children);
            RecordNode::composite(fields, children)
        }
        other => {
            debug!("Expected an object record, got {}", kind_of(other));
            RecordNode::default()
        }
    }
}

/// Convert one payload into an entity, naming it from `id_fields` or `fallback_id`.
pub fn entity_from_json(value: &Value, id_fields: &[String], fallback_id: &str) -> Entity {
    let id = value
        .as_object()
        .and_then(|map| {
            id_fields
                .iter()
                .filter_map(|f| map.get(f))
                .find_map(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()))
        })
        .unwrap_or(fallback_id);

    Entity::new(id, record_from_json(value))
}

fn flatten_object(
    map: &Map<String, Value>,
    prefix: &str,
    fields: &mut Fields,
    children: &mut BTreeMap<String, Vec<RecordNode>>,
) {
    for (key, value) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Null => {}
            Value::Bool(b) => {
                fields.insert(name, FieldValue::Flag(*b));
            }
            Value::Number(n) => {
                fields.insert(name, FieldValue::Number(n.as_f64().unwrap_or(0.0)));
            }
            Value::String(s) => {
                fields.insert(name, FieldValue::Text(s.clone()));
            }
            Value::Object(inner) => flatten_object(inner, &name, fields, children),
            Value::Array(items) => flatten_array(name, items, fields, children),
        }
    }
}

fn flatten_array(
    name: String,
    items: &[Value],
    fields: &mut Fields,
    children: &mut BTreeMap<String, Vec<RecordNode>>,
) {
    if items.iter().any(Value::is_object) {
        let records: Vec<RecordNode> = items
            .iter()
            .filter(|v| v.is_object())
            .map(record_from_json)
            .collect();
        if records.len() < items.len() {
            debug!(
                "Dropped {} non-object entries from {}",
                items.len() - records.len(),
                name
            );
        }
        children.insert(name, records);
        return;
    }

    let tags: Vec<String> = items
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    fields.insert(name, FieldValue::List(tags));
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
