//! Tool/project version gate.

use std::cmp::Ordering;
use std::path::Path;

use serde::Serialize;

use super::metadata::ProjectMetadata;
use crate::error::{KittyError, Result};

/// Numeric components of a version string, e.g. `v0.10.2` -> `[0, 10, 2]`.
///
/// Pre-release suffixes on the last component are ignored. Returns `None`
/// when the string has no leading numeric component.
pub fn parse_version(version: &str) -> Option<Vec<u32>> {
    let version = version.trim().trim_start_matches('v');
    let core = version.split(['-', '+']).next()?;
    let parts: Vec<u32> = core.split('.').map(|p| p.parse().ok()).collect::<Option<_>>()?;
    (!parts.is_empty()).then_some(parts)
}

/// Compare two version strings component by component.
///
/// Missing components count as zero; non-numeric parts are skipped.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let digits = |v: &str| -> Vec<u32> {
        v.split(|c: char| !c.is_ascii_digit())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect()
    };
    let a_parts = digits(a);
    let b_parts = digits(b);

    let max_len = a_parts.len().max(b_parts.len());
    for i in 0..max_len {
        let a_val = a_parts.get(i).copied().unwrap_or(0);
        let b_val = b_parts.get(i).copied().unwrap_or(0);
        match a_val.cmp(&b_val) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// Result of comparing the tool version with a project's recorded version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VersionCheck {
    /// Versions match.
    Compatible { version: String },

    /// The project was created by an older tool; run `kitty upgrade`.
    UpgradeRequired { tool: String, project: String },

    /// The project was upgraded by a newer tool than this one.
    ToolOutdated { tool: String, project: String },

    /// No usable version recorded; commands proceed with a warning.
    Unknown { tool: String, reason: String },
}

impl VersionCheck {
    /// Whether commands must refuse to run.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::UpgradeRequired { .. } | Self::ToolOutdated { .. })
    }

    /// What the user should do, if anything.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::UpgradeRequired { .. } => {
                Some("Run `kitty upgrade` to migrate the project.".to_string())
            }
            Self::ToolOutdated { project, .. } => {
                Some(format!("Install kittify {project} or newer to work on this project."))
            }
            Self::Unknown { .. } => Some("Run `kitty upgrade` to record the project version.".to_string()),
            Self::Compatible { .. } => None,
        }
    }

    /// Turn a blocking result into [`KittyError::IncompatibleVersion`].
    ///
    /// Unknown versions are logged and allowed through.
    pub fn into_result(self) -> Result<()> {
        let suggestion = self.suggestion().unwrap_or_default();
        match self {
            Self::Compatible { .. } => Ok(()),
            Self::Unknown { reason, .. } => {
                tracing::warn!(reason = %reason, "Project version unknown, continuing");
                Ok(())
            }
            Self::UpgradeRequired { tool, project } | Self::ToolOutdated { tool, project } => {
                Err(KittyError::IncompatibleVersion { tool, project, suggestion })
            }
        }
    }
}

/// Compare `tool_version` with the version recorded for the project at `root`.
pub fn check_compatibility(tool_version: &str, root: &Path) -> VersionCheck {
    let tool = tool_version.to_string();

    let metadata = match ProjectMetadata::load(root) {
        Ok(Some(metadata)) => metadata,
        Ok(None) => {
            return VersionCheck::Unknown { tool, reason: "no project metadata".to_string() };
        }
        Err(e) => return VersionCheck::Unknown { tool, reason: e.to_string() },
    };

    let project = metadata.version;
    if parse_version(&project).is_none() {
        return VersionCheck::Unknown { tool, reason: format!("unparseable version '{project}'") };
    }
    if parse_version(&tool).is_none() {
        return VersionCheck::Unknown {
            tool: tool.clone(),
            reason: format!("unparseable tool version '{tool}'"),
        };
    }

    match compare_versions(&tool, &project) {
        Ordering::Equal => VersionCheck::Compatible { version: project },
        Ordering::Greater => VersionCheck::UpgradeRequired { tool, project },
        Ordering::Less => VersionCheck::ToolOutdated { tool, project },
    }
}
