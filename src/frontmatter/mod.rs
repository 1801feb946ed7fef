//! YAML frontmatter documents.
//!
//! A work package file is Markdown with a leading YAML block:
//!
//! ```text
//! ---
//! work_package_id: WP01
//! title: Setup
//! lane: planned
//! history:
//! - timestamp: 2025-01-01T10:00:00Z
//!   lane: planned
//!   agent: system
//!   action: Prompt generated
//! ---
//! # Body
//! ```
//!
//! Every write goes through [`canonicalize`], so any mutation also
//! normalizes field order and scalar quoting. The Markdown body is carried
//! through byte for byte.

mod canonical;

pub use canonical::{canonicalize, is_reserved, HISTORY_FIELD, ID_FIELD, KNOWN_FIELDS};

use std::fs;
use std::path::Path;

use chrono::Utc;
use serde_yaml::{Mapping, Value};

use crate::error::{KittyError, Result};
use crate::lane::Lane;
use crate::paths;

const DELIMITER: &str = "---";

/// Parsed frontmatter plus the untouched Markdown body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Insertion-ordered metadata.
    pub metadata: Mapping,

    /// Everything after the closing delimiter line.
    pub body: String,
}

impl Document {
    /// Create a document from parts.
    pub fn new(metadata: Mapping, body: impl Into<String>) -> Self {
        Self { metadata, body: body.into() }
    }

    /// Parse file content. `path` is only used for error reporting.
    ///
    /// Content without a leading `---` line has no frontmatter: the result
    /// has empty metadata and the whole content as body.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut lines = content.split_inclusive('\n');

        let Some(first) = lines.next() else {
            return Ok(Self::default());
        };
        if first.trim_end() != DELIMITER {
            return Ok(Self::new(Mapping::new(), content));
        }

        let mut offset = first.len();
        let mut yaml_end = None;
        for line in lines {
            if line.trim_end() == DELIMITER {
                yaml_end = Some((offset, offset + line.len()));
                break;
            }
            offset += line.len();
        }

        let Some((yaml_end, body_start)) = yaml_end else {
            return Err(KittyError::Decode {
                path: path.to_path_buf(),
                line: 1,
                column: 1,
                message: "frontmatter opened with '---' but never closed".to_string(),
            });
        };

        let yaml = &content[first.len()..yaml_end];
        let metadata = parse_yaml(yaml, path)?;

        Ok(Self::new(metadata, &content[body_start..]))
    }

    /// Render to file content in canonical form.
    ///
    /// Empty metadata renders as the body alone.
    pub fn render(&self) -> std::result::Result<String, serde_yaml::Error> {
        if self.metadata.is_empty() {
            return Ok(self.body.clone());
        }
        let yaml = serde_yaml::to_string(&canonicalize(&self.metadata))?;
        Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{}", self.body))
    }

    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Look up a field as a string, rendering numbers and booleans.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(scalar_to_string)
    }

    /// Set a field, keeping its position if it already exists.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(Value::from(key), value.into());
    }

    /// Remove a field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.metadata.remove(key)
    }

    /// History entries as raw YAML values, oldest first.
    pub fn history(&self) -> &[Value] {
        match self.get(HISTORY_FIELD) {
            Some(Value::Sequence(seq)) => seq.as_slice(),
            _ => &[],
        }
    }

    /// Append one history entry, creating the list if needed.
    pub fn push_history(&mut self, entry: Mapping) {
        match self.metadata.get_mut(HISTORY_FIELD) {
            Some(Value::Sequence(seq)) => seq.push(Value::Mapping(entry)),
            _ => {
                self.metadata
                    .insert(Value::from(HISTORY_FIELD), Value::Sequence(vec![Value::Mapping(entry)]));
            }
        }
    }
}

fn parse_yaml(yaml: &str, path: &Path) -> Result<Mapping> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }

    let value: Value = serde_yaml::from_str(yaml).map_err(|e| {
        // Positions are relative to the YAML block; shift past the opening delimiter.
        let (line, column) = e.location().map_or((1, 1), |loc| (loc.line() + 1, loc.column()));
        KittyError::Decode { path: path.to_path_buf(), line, column, message: e.to_string() }
    })?;

    match value {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => Err(KittyError::Decode {
            path: path.to_path_buf(),
            line: 2,
            column: 1,
            message: "frontmatter must be a mapping of fields".to_string(),
        }),
    }
}

/// Render a scalar YAML value as a string. Collections yield `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}

/// Shell pids are written as integers when they look like one.
pub fn pid_value(pid: &str) -> Value {
    pid.trim().parse::<u64>().map_or_else(|_| Value::from(pid), Value::from)
}

/// Current UTC time in the history timestamp format.
pub fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Build a history entry mapping in canonical key order.
pub fn history_entry(
    timestamp: &str,
    lane: Lane,
    agent: &str,
    action: &str,
    shell_pid: Option<&str>,
) -> Mapping {
    let mut entry = Mapping::new();
    entry.insert("timestamp".into(), timestamp.into());
    entry.insert("lane".into(), lane.as_str().into());
    entry.insert("agent".into(), agent.into());
    entry.insert("action".into(), action.into());
    if let Some(pid) = shell_pid {
        entry.insert("shell_pid".into(), pid_value(pid));
    }
    entry
}

/// Read and parse a document from disk.
pub fn read(path: &Path) -> Result<Document> {
    let content = fs::read_to_string(path).map_err(|e| KittyError::io_at(path, e))?;
    Document::parse(&content, path)
}

/// Write `metadata` and `body` to `path` in canonical form.
pub fn write(path: &Path, metadata: &Mapping, body: &str) -> Result<()> {
    let doc = Document::new(metadata.clone(), body);
    write_document(path, &doc)
}

/// Write a whole document to `path` in canonical form.
pub fn write_document(path: &Path, doc: &Document) -> Result<()> {
    let rendered = render_at(doc, path)?;
    paths::atomic_write(path, rendered.as_bytes())
}

fn render_at(doc: &Document, path: &Path) -> Result<String> {
    doc.render().map_err(|e| KittyError::Decode {
        path: path.to_path_buf(),
        line: 0,
        column: 0,
        message: format!("failed to serialize frontmatter: {e}"),
    })
}

/// Read a single field.
pub fn get_field(path: &Path, key: &str) -> Result<Option<Value>> {
    Ok(read(path)?.get(key).cloned())
}

/// Set a single field, preserving all others.
pub fn update_field(path: &Path, key: &str, value: impl Into<Value>) -> Result<()> {
    update_fields(path, [(key.to_string(), value.into())])
}

/// Set several fields in one write, preserving all others.
pub fn update_fields<I>(path: &Path, fields: I) -> Result<()>
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut doc = read(path)?;
    for (key, value) in fields {
        doc.set(&key, value);
    }
    write_document(path, &doc)
}

/// Append a history entry stamped with the current time.
pub fn append_history_entry(
    path: &Path,
    lane: Lane,
    agent: &str,
    action: &str,
    shell_pid: Option<&str>,
) -> Result<()> {
    let mut doc = read(path)?;
    doc.push_history(history_entry(&timestamp_now(), lane, agent, action, shell_pid));
    write_document(path, &doc)
}

/// Canonical bytes for the file at `path`, without writing anything.
///
/// Returns the current content alongside the canonical rendering.
pub fn normalized_content(path: &Path) -> Result<(String, String)> {
    let content = fs::read_to_string(path).map_err(|e| KittyError::io_at(path, e))?;
    let doc = Document::parse(&content, path)?;
    let rendered = render_at(&doc, path)?;
    Ok((content, rendered))
}

/// True when [`normalize`] would change the file.
pub fn needs_normalization(path: &Path) -> Result<bool> {
    let (current, rendered) = normalized_content(path)?;
    Ok(current != rendered)
}

/// Rewrite the file in canonical form. Returns whether its bytes changed.
pub fn normalize(path: &Path) -> Result<bool> {
    let (current, rendered) = normalized_content(path)?;
    if current == rendered {
        return Ok(false);
    }
    paths::atomic_write(path, rendered.as_bytes())?;
    tracing::debug!(path = %path.display(), "Normalized frontmatter");
    Ok(true)
}
