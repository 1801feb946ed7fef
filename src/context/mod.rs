//! Repository context resolution.
//!
//! A [`RepoContext`] is computed once per command from a starting
//! directory and passed explicitly to every operation that needs to know
//! where the project lives. Nothing here is persisted.

mod root;

pub use root::{
    has_marker, is_worktree, list_worktrees, main_repo_root, resolve_root, DEFAULT_WORKTREES_DIR,
    ROOT_OVERRIDE_ENV,
};

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::Config;
use crate::error::{KittyError, Result};
use crate::git;

/// Feature ids look like `001-user-auth`.
static FEATURE_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{3}-[a-z0-9][a-z0-9-]*$").expect("feature slug pattern is valid"));

/// True when `name` has the `NNN-slug` feature id shape.
pub fn is_feature_slug(name: &str) -> bool {
    FEATURE_SLUG.is_match(name)
}

/// Resolved location of the project a command runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoContext {
    /// Checkout containing `.kittify/` (a worktree or the main checkout)
    pub root: PathBuf,

    /// Main checkout; equal to `root` outside worktrees
    pub main_root: PathBuf,

    /// Whether `root` is a linked worktree
    pub is_worktree: bool,

    /// Active feature, when one could be inferred
    pub feature: Option<String>,
}

impl RepoContext {
    /// Resolve the context for a working directory.
    pub fn resolve(cwd: &Path) -> Result<Self> {
        let root = resolve_root(cwd)?;
        let main_root = main_repo_root(&root);
        let is_worktree = main_root != root;
        let feature = current_feature_slug(&root, cwd);

        tracing::debug!(
            root = %root.display(),
            is_worktree,
            feature = feature.as_deref().unwrap_or("-"),
            "Resolved repository context"
        );

        Ok(Self { root, main_root, is_worktree, feature })
    }

    /// Build a context for a known root without inspecting the filesystem.
    pub fn at(root: impl Into<PathBuf>, feature: Option<String>) -> Self {
        let root = root.into();
        Self { main_root: root.clone(), root, is_worktree: false, feature }
    }

    /// Project configuration for this checkout.
    pub fn config(&self) -> Result<Config> {
        Config::load(&self.root)
    }

    /// The explicit feature if given, else the detected one.
    pub fn feature_or(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(String::from)
            .or_else(|| self.feature.clone())
            .ok_or_else(|| KittyError::FeatureNotFound("<none detected; pass --feature>".to_string()))
    }
}

/// Feature slug for a command run from `cwd` inside the checkout at `root`.
///
/// The checked-out branch wins when it is shaped like a feature id;
/// otherwise the nearest `kitty-specs/NNN-slug` ancestor of `cwd` is used.
pub fn current_feature_slug(root: &Path, cwd: &Path) -> Option<String> {
    if let Some(branch) = current_branch(root) {
        if is_feature_slug(&branch) {
            return Some(branch);
        }
    }

    let specs_dir = Config::load(root).map(|c| c.layout.specs_dir).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring unreadable config while detecting feature");
        Config::default().layout.specs_dir
    });

    cwd.ancestors().find_map(|dir| {
        let name = dir.file_name()?.to_str()?;
        let parent_name = dir.parent()?.file_name()?.to_str()?;
        (parent_name == specs_dir && is_feature_slug(name)).then(|| name.to_string())
    })
}

fn current_branch(root: &Path) -> Option<String> {
    if let Some(branch) = git::head_branch(root) {
        return Some(branch);
    }
    #[cfg(feature = "git")]
    {
        git::GitRepository::discover(root).and_then(|repo| repo.current_branch())
    }
    #[cfg(not(feature = "git"))]
    {
        None
    }
}
