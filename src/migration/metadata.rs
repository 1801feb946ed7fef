//! `.kittify/metadata.yaml`: project version and applied migrations.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::PROJECT_MARKER;
use crate::error::{KittyError, Result};
use crate::frontmatter::timestamp_now;
use crate::paths;

/// Metadata file name inside `.kittify/`.
pub const METADATA_FILE: &str = "metadata.yaml";

/// One migration recorded as applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration {
    pub id: String,
    pub applied_at: String,
    pub resulting_version: String,
}

/// Persistent project metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Layout version of the project
    #[serde(default, deserialize_with = "version_string")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialized_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_upgraded_at: Option<String>,

    #[serde(default)]
    pub applied_migrations: Vec<AppliedMigration>,

    /// Keys written by other tools, kept as-is
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ProjectMetadata {
    /// Fresh metadata for a project created at `version`.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            initialized_at: Some(timestamp_now()),
            last_upgraded_at: None,
            applied_migrations: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Location of the metadata file for a project root.
    pub fn path(root: &Path) -> PathBuf {
        root.join(PROJECT_MARKER).join(METADATA_FILE)
    }

    /// Create and save metadata for a newly initialized project.
    pub fn init(root: &Path, version: &str) -> Result<Self> {
        let metadata = Self::new(version);
        metadata.save(root)?;
        tracing::info!(root = %root.display(), version, "Initialized project metadata");
        Ok(metadata)
    }

    /// Load the metadata, `None` if the file does not exist.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = Self::path(root);
        if !paths::entry_exists(&path) {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| KittyError::io_at(&path, e))?;
        serde_yaml::from_str(&content)
            .map(Some)
            .map_err(|e| KittyError::Metadata(format!("{}: {e}", path.display())))
    }

    /// Write the metadata file.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = Self::path(root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| KittyError::io_at(parent, e))?;
        }
        let content =
            serde_yaml::to_string(self).map_err(|e| KittyError::Metadata(e.to_string()))?;
        paths::atomic_write(&path, content.as_bytes())
    }

    /// Whether `id` has been recorded.
    pub fn has_applied(&self, id: &str) -> bool {
        self.applied_migrations.iter().any(|m| m.id == id)
    }

    /// Record a successful migration.
    pub fn record_migration(&mut self, id: &str, resulting_version: &str) {
        if self.has_applied(id) {
            return;
        }
        self.applied_migrations.push(AppliedMigration {
            id: id.to_string(),
            applied_at: timestamp_now(),
            resulting_version: resulting_version.to_string(),
        });
    }
}

// `version: 0.10` would otherwise arrive as a float.
fn version_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(crate::frontmatter::scalar_to_string(&value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProjectMetadata::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_init_record_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut metadata = ProjectMetadata::init(dir.path(), "0.9.0").unwrap();
        metadata.record_migration("0.9.0_flatten_lane_directories", "0.9.0");
        metadata.record_migration("0.9.0_flatten_lane_directories", "0.9.0");
        metadata.save(dir.path()).unwrap();

        let loaded = ProjectMetadata::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.version, "0.9.0");
        assert_eq!(loaded.applied_migrations.len(), 1);
        assert!(loaded.has_applied("0.9.0_flatten_lane_directories"));
        assert!(loaded.initialized_at.is_some());
    }

    #[test]
    fn test_unknown_keys_survive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".kittify")).unwrap();
        fs::write(
            ProjectMetadata::path(dir.path()),
            "version: 0.8.0\nagents:\n  - claude\n  - codex\n",
        )
        .unwrap();

        let mut metadata = ProjectMetadata::load(dir.path()).unwrap().unwrap();
        metadata.version = "0.10.2".to_string();
        metadata.save(dir.path()).unwrap();

        let text = fs::read_to_string(ProjectMetadata::path(dir.path())).unwrap();
        assert!(text.contains("agents:"));
        assert!(text.contains("- codex"));
        assert!(text.contains("version: 0.10.2"));
    }

    #[test]
    fn test_garbled_metadata_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".kittify")).unwrap();
        fs::write(ProjectMetadata::path(dir.path()), "version: [unclosed\n").unwrap();

        assert!(matches!(ProjectMetadata::load(dir.path()).unwrap_err(), KittyError::Metadata(_)));
    }
}
