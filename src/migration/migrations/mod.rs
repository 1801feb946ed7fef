//! Built-in layout migrations.

mod flatten_lanes;
mod normalize_frontmatter;
mod worktree_dedup;

pub use flatten_lanes::FlattenLaneDirectories;
pub use normalize_frontmatter::NormalizeFrontmatter;
pub use worktree_dedup::DedupeWorktreeAssets;

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::context::{list_worktrees, main_repo_root};
use crate::workflow::Feature;

/// The main checkout of a project and its worktrees.
pub(crate) struct Checkouts {
    pub config: Config,
    pub main: PathBuf,
    pub worktrees: Vec<PathBuf>,
}

impl Checkouts {
    /// Find every checkout belonging to the project at `root`.
    pub fn of(root: &Path) -> Self {
        let main = main_repo_root(root);
        let config = Config::load(&main).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring unreadable config");
            Config::default()
        });
        let worktrees = list_worktrees(&main, &config.layout.worktrees_dir);
        Self { config, main, worktrees }
    }

    /// Main checkout first, then worktrees.
    pub fn all(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.main.as_path()).chain(self.worktrees.iter().map(PathBuf::as_path))
    }

    /// Every feature in every checkout.
    pub fn features(&self) -> Vec<Feature> {
        self.all().flat_map(|checkout| Feature::discover(&self.config.specs_root(checkout))).collect()
    }
}

/// `path` relative to `base` for messages.
pub(crate) fn relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base).unwrap_or(path).display().to_string()
}
