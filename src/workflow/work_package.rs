//! Work package documents.
//!
//! A [`WorkPackage`] is a typed view over one frontmatter document. Known
//! fields have accessors; anything else stays in the document's ordered
//! mapping and is written back untouched. Existing history entries are
//! kept as their original YAML values, so appending never rewrites them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};

use crate::error::{KittyError, Result};
use crate::frontmatter::{self, Document, HISTORY_FIELD, ID_FIELD};
use crate::lane::Lane;

/// One recorded lane transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// UTC time, `YYYY-MM-DDTHH:MM:SSZ`
    pub timestamp: String,

    /// Lane the work package entered
    pub lane: Lane,

    /// Agent that made the transition
    pub agent: String,

    /// What happened
    pub action: String,

    /// Shell process id of the agent, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell_pid: Option<String>,
}

impl HistoryEntry {
    /// New entry stamped with the current time.
    pub fn now(lane: Lane, agent: &str, action: &str, shell_pid: Option<&str>) -> Self {
        Self {
            timestamp: frontmatter::timestamp_now(),
            lane,
            agent: agent.to_string(),
            action: action.to_string(),
            shell_pid: shell_pid.map(String::from),
        }
    }

    /// Parse a raw history value. `index` is used for error messages.
    fn from_value(value: &Value, index: usize, path: &Path) -> Result<Self> {
        let Some(map) = value.as_mapping() else {
            return Err(decode(path, format!("history entry {} is not a mapping", index + 1)));
        };
        let text = |key: &str| map.get(key).and_then(frontmatter::scalar_to_string);

        let lane = text("lane")
            .ok_or_else(|| decode(path, format!("history entry {} has no lane", index + 1)))?
            .parse()?;

        Ok(Self {
            timestamp: text("timestamp").unwrap_or_default(),
            lane,
            agent: text("agent").unwrap_or_default(),
            action: text("action").unwrap_or_default(),
            shell_pid: text("shell_pid"),
        })
    }

    /// YAML mapping in canonical entry order.
    pub fn to_mapping(&self) -> Mapping {
        frontmatter::history_entry(
            &self.timestamp,
            self.lane,
            &self.agent,
            &self.action,
            self.shell_pid.as_deref(),
        )
    }
}

fn decode(path: &Path, message: String) -> KittyError {
    KittyError::Decode { path: path.to_path_buf(), line: 1, column: 1, message }
}

/// A work package loaded fresh from disk.
#[derive(Debug, Clone)]
pub struct WorkPackage {
    path: PathBuf,
    id: String,
    lane: Option<Lane>,
    history: Vec<HistoryEntry>,
    doc: Document,
    content_hash: String,
}

impl WorkPackage {
    /// Load and validate a work package file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| KittyError::io_at(path, e))?;
        Self::from_content(path, &raw)
    }

    /// Build from file content already in memory.
    pub fn from_content(path: &Path, raw: &str) -> Result<Self> {
        let doc = Document::parse(raw, path)?;

        let id = doc
            .get_str(ID_FIELD)
            .or_else(|| id_from_file_name(path))
            .ok_or_else(|| decode(path, format!("missing '{ID_FIELD}'")))?;

        let lane = doc.get_str("lane").map(|l| l.parse::<Lane>()).transpose()?;

        let history = doc
            .history()
            .iter()
            .enumerate()
            .map(|(i, v)| HistoryEntry::from_value(v, i, path))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            path: path.to_path_buf(),
            id,
            lane,
            history,
            doc,
            content_hash: content_hash(raw.as_bytes()),
        })
    }

    /// Work package id, e.g. `WP01`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lane; `None` when the field is absent.
    pub fn lane(&self) -> Option<Lane> {
        self.lane
    }

    /// File location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Markdown body.
    pub fn body(&self) -> &str {
        &self.doc.body
    }

    /// Transition log, oldest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// SHA-256 of the file content this value was loaded from.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// A field rendered as a string.
    pub fn field(&self, key: &str) -> Option<String> {
        self.doc.get_str(key)
    }

    pub fn title(&self) -> Option<String> {
        self.field("title")
    }

    pub fn agent(&self) -> Option<String> {
        self.field("agent")
    }

    pub fn shell_pid(&self) -> Option<String> {
        self.field("shell_pid")
    }

    pub fn assignee(&self) -> Option<String> {
        self.field("assignee")
    }

    pub fn review_status(&self) -> Option<String> {
        self.field("review_status")
    }

    pub fn reviewed_by(&self) -> Option<String> {
        self.field("reviewed_by")
    }

    /// Unrecognized fields, in file order.
    pub fn custom_fields(&self) -> Mapping {
        self.doc
            .metadata
            .iter()
            .filter(|(k, _)| !frontmatter::is_reserved(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Set the lane field.
    pub fn set_lane(&mut self, lane: Lane) {
        self.doc.set("lane", lane.as_str());
        self.lane = Some(lane);
    }

    /// Set any field other than `lane` and `history`.
    pub fn set_field(&mut self, key: &str, value: impl Into<Value>) {
        debug_assert!(key != "lane" && key != HISTORY_FIELD);
        self.doc.set(key, value);
    }

    /// Remove a field other than `lane` and `history`.
    pub fn clear_field(&mut self, key: &str) {
        debug_assert!(key != "lane" && key != HISTORY_FIELD);
        self.doc.remove(key);
    }

    /// Record who is acting on the work package.
    pub fn set_identity(&mut self, agent: &str, shell_pid: Option<&str>) {
        self.doc.set("agent", agent);
        match shell_pid {
            Some(pid) => self.doc.set("shell_pid", frontmatter::pid_value(pid)),
            None => {
                self.doc.remove("shell_pid");
            }
        }
    }

    /// Append a history entry after the existing ones.
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.doc.push_history(entry.to_mapping());
        self.history.push(entry);
    }

    /// Drop the most recent history entry.
    pub fn pop_history(&mut self) -> Option<HistoryEntry> {
        let entry = self.history.pop()?;
        if let Some(Value::Sequence(seq)) = self.doc.metadata.get_mut(HISTORY_FIELD) {
            seq.pop();
        }
        Some(entry)
    }

    /// Write the work package back to its file.
    ///
    /// Fails with [`KittyError::ConcurrentModification`] if the file no
    /// longer matches the content this value was loaded from.
    pub fn save(&mut self) -> Result<()> {
        let current = fs::read(&self.path).map_err(|e| KittyError::io_at(&self.path, e))?;
        if content_hash(&current) != self.content_hash {
            return Err(KittyError::ConcurrentModification { path: self.path.clone() });
        }

        frontmatter::write_document(&self.path, &self.doc)?;

        let written = fs::read(&self.path).map_err(|e| KittyError::io_at(&self.path, e))?;
        self.content_hash = content_hash(&written);
        Ok(())
    }
}

/// Hex SHA-256 of file content.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// `WP01` from `WP01-setup.md`, if the file name starts with a WP id.
pub fn id_from_file_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let rest = stem.strip_prefix("WP")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    (!digits.is_empty()).then(|| format!("WP{digits}"))
}

/// True for files named like `WP*.md`.
pub fn is_work_package_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with("WP") && name.ends_with(".md"))
}
