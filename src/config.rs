//! Project configuration.
//!
//! Loaded from `.kittify/config.toml` in the project root. Every section
//! is optional; a missing file yields the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::DEFAULT_WORKTREES_DIR;
use crate::error::{KittyError, Result};

/// Directory marking a kittify project root.
pub const PROJECT_MARKER: &str = ".kittify";

/// Configuration file name inside [`PROJECT_MARKER`].
pub const CONFIG_FILE: &str = "config.toml";

/// Project configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where features and worktrees live
    pub layout: LayoutConfig,

    /// Agent asset directories shared between the main checkout and worktrees
    pub agents: AgentsConfig,

    /// Lane workflow settings
    pub workflow: WorkflowConfig,
}

/// Project layout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Directory (relative to the root) holding one directory per feature
    pub specs_dir: String,

    /// Directory (relative to the root) holding feature worktrees
    pub worktrees_dir: String,
}

/// Agent asset settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Per-agent command and prompt directories, relative to a checkout root
    pub asset_dirs: Vec<String>,

    /// Whether `.kittify/scripts` is treated as a shared asset
    pub include_scripts: bool,
}

/// Lane workflow settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// `review_status` written by approvals that do not specify one
    pub default_review_status: String,
}

impl Config {
    /// Load `<root>/.kittify/config.toml`, falling back to defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path(root);
        if !path.is_file() {
            return Ok(Self::default());
        }
        Self::load_from_file(&path)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| KittyError::io_at(path, e))?;
        toml::from_str(&content).map_err(|e| KittyError::Config(format!("{}: {e}", path.display())))
    }

    /// Save configuration into the project.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = Self::path(root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KittyError::io_at(parent, e))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| KittyError::Config(e.to_string()))?;
        crate::paths::atomic_write(&path, content.as_bytes())
    }

    /// Path of the configuration file for a project root.
    pub fn path(root: &Path) -> PathBuf {
        root.join(PROJECT_MARKER).join(CONFIG_FILE)
    }

    /// Feature directory root for a checkout.
    pub fn specs_root(&self, checkout: &Path) -> PathBuf {
        checkout.join(&self.layout.specs_dir)
    }

    /// Every shared asset path, relative to a checkout root.
    pub fn shared_assets(&self) -> Vec<PathBuf> {
        let mut assets: Vec<PathBuf> = self.agents.asset_dirs.iter().map(PathBuf::from).collect();
        if self.agents.include_scripts {
            assets.push(Path::new(PROJECT_MARKER).join("scripts"));
        }
        assets
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            specs_dir: "kitty-specs".to_string(),
            worktrees_dir: DEFAULT_WORKTREES_DIR.to_string(),
        }
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            asset_dirs: vec![
                ".claude/commands".to_string(),
                ".github/prompts".to_string(),
                ".gemini/commands".to_string(),
                ".cursor/commands".to_string(),
                ".qwen/commands".to_string(),
                ".opencode/command".to_string(),
                ".windsurf/workflows".to_string(),
                ".codex/prompts".to_string(),
                ".kilocode/workflows".to_string(),
                ".augment/commands".to_string(),
                ".roo/commands".to_string(),
                ".amazonq/prompts".to_string(),
            ],
            include_scripts: true,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { default_review_status: "approved".to_string() }
    }
}
