//! JSON records and their source files.

use crate::error::{GigmatchError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A flat JSON object loaded verbatim from a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Wrap a JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// The record's `name` field, when present and a string.
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// All fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Canonical text: compact JSON with keys in sorted order.
    ///
    /// This is both what gets embedded and what the model sees, so it must be
    /// stable across runs for ids to stay stable.
    pub fn canonical_text(&self) -> String {
        canonical(&Value::Object(self.0.clone())).to_string()
    }
}

/// Rebuild a value with object keys inserted in sorted order, at every depth.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonical(&fields[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

/// Read every record from a JSON file, or from each `*.json` file in a directory.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        return Err(GigmatchError::SourceNotFound(path.to_path_buf()));
    }

    let files = if path.is_dir() {
        json_files_in(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut records = Vec::new();
    for file in &files {
        let mut parsed = parse_file(file)?;
        debug!("Read {} records from {}", parsed.len(), file.display());
        records.append(&mut parsed);
    }

    if records.is_empty() {
        return Err(GigmatchError::MalformedSource {
            path: path.to_path_buf(),
            reason: "source contains no records".to_string(),
        });
    }

    Ok(records)
}

fn json_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

fn parse_file(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)?;

    let malformed = |reason: String| GigmatchError::MalformedSource {
        path: path.to_path_buf(),
        reason,
    };

    let value: Value = serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        // A single object is accepted as a one-record source.
        Value::Object(fields) => return Ok(vec![Record::new(fields)]),
        other => {
            return Err(malformed(format!(
                "expected an array of objects, found {}",
                json_kind(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(fields) => Ok(Record::new(fields)),
            other => Err(malformed(format!(
                "entry {} is {}, expected an object",
                i,
                json_kind(&other)
            ))),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_array_of_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "artists.json",
            r#"[{"name": "Echo Valley", "genre": "indie", "popularity": 8}]"#,
        );

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), Some("Echo Valley"));
        assert_eq!(records[0].get("popularity"), Some(&json!(8)));
    }

    #[test]
    fn test_missing_file_is_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_records(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, GigmatchError::SourceNotFound(_)));
    }

    #[test]
    fn test_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "venues.json", r#"[{"name": "Blue Room",]"#);
        let err = load_records(&path).unwrap_err();
        assert!(matches!(err, GigmatchError::MalformedSource { .. }));
    }

    #[test]
    fn test_non_object_entry_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "venues.json", r#"[{"name": "Blue Room"}, 42]"#);
        let err = load_records(&path).unwrap_err();
        assert!(err.to_string().contains("entry 1 is a number"));
    }

    #[test]
    fn test_empty_source_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "venues.json", "[]");
        let err = load_records(&path).unwrap_err();
        assert!(err.is_source());
    }

    #[test]
    fn test_directory_source_reads_json_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.json", r#"[{"name": "Second"}]"#);
        write(dir.path(), "a.json", r#"{"name": "First"}"#);
        write(dir.path(), "notes.txt", "ignored");

        let records = load_records(dir.path()).unwrap();
        let names: Vec<_> = records.iter().filter_map(Record::name).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn test_canonical_text_is_key_ordered() {
        let a: Record = serde_json::from_value(json!({"genre": "indie", "name": "Echo Valley"})).unwrap();
        let b: Record = serde_json::from_value(json!({"name": "Echo Valley", "genre": "indie"})).unwrap();
        assert_eq!(a.canonical_text(), b.canonical_text());
        assert_eq!(a.canonical_text(), r#"{"genre":"indie","name":"Echo Valley"}"#);
    }
}
