//! Project root and worktree discovery.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::PROJECT_MARKER;
use crate::error::{KittyError, Result};
use crate::git;
use crate::paths;

/// Environment variable that pins the project root.
pub const ROOT_OVERRIDE_ENV: &str = "KITTIFY_REPO_ROOT";

/// Directory, under the main checkout, where feature worktrees are created.
pub const DEFAULT_WORKTREES_DIR: &str = ".worktrees";

/// True when `dir` holds a live `.kittify/` directory.
pub fn has_marker(dir: &Path) -> bool {
    paths::is_live_dir(&dir.join(PROJECT_MARKER))
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Locate the project root for `start_dir`.
///
/// Strategies, in order: the [`ROOT_OVERRIDE_ENV`] override, an upward walk
/// for `.kittify/`, then the version-control root. Broken symlinks on the
/// way are skipped.
pub fn resolve_root(start_dir: &Path) -> Result<PathBuf> {
    if let Some(value) = std::env::var_os(ROOT_OVERRIDE_ENV).filter(|v| !v.is_empty()) {
        let root = absolute(Path::new(&value));
        if has_marker(&root) {
            tracing::debug!(root = %root.display(), "Project root from override");
            return Ok(root);
        }
        return Err(KittyError::ProjectNotFound { start: root });
    }

    let start = absolute(start_dir);

    if let Some(root) = start.ancestors().find(|dir| has_marker(dir)) {
        tracing::debug!(root = %root.display(), "Project root from directory walk");
        return Ok(root.to_path_buf());
    }

    if let Some(vcs_root) = git::discover_root(&start) {
        if has_marker(&vcs_root) {
            tracing::debug!(root = %vcs_root.display(), "Project root from version control");
            return Ok(vcs_root);
        }
    }

    Err(KittyError::ProjectNotFound { start })
}

/// True when `root` is inside a linked worktree rather than the main checkout.
///
/// Decided by version control metadata only, never by the path.
pub fn is_worktree(root: &Path) -> bool {
    git::main_checkout(root).is_some()
}

/// Main checkout for `root`: itself unless `root` is a worktree.
pub fn main_repo_root(root: &Path) -> PathBuf {
    git::main_checkout(root).unwrap_or_else(|| root.to_path_buf())
}

/// Every worktree of the project whose main checkout is `main_root`.
///
/// Combines the directories under `worktrees_dir` with the worktrees version
/// control knows about. The main checkout itself is never included.
pub fn list_worktrees(main_root: &Path, worktrees_dir: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();

    let dir = main_root.join(worktrees_dir);
    if paths::is_live_dir(&dir) {
        if let Ok(entries) = fs::read_dir(&dir) {
            let mut local: Vec<PathBuf> = entries
                .filter_map(std::result::Result::ok)
                .map(|e| e.path())
                .filter(|p| paths::is_live_dir(p))
                .collect();
            local.sort();
            found.extend(local);
        }
    }

    found.extend(git::worktree_paths(main_root).into_iter().filter(|p| paths::is_live_dir(p)));

    let main_key = fs::canonicalize(main_root).unwrap_or_else(|_| main_root.to_path_buf());
    let mut seen = HashSet::new();
    found.retain(|path| {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.clone());
        key != main_key && seen.insert(key)
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_resolve_root_walks_upward() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(".kittify")).unwrap();
        let nested = root.join("kitty-specs/001-auth/tasks");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(resolve_root(&nested).unwrap(), absolute(root));
    }

    #[test]
    #[serial]
    fn test_resolve_root_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_root(dir.path()).unwrap_err();
        assert!(matches!(err, KittyError::ProjectNotFound { .. }));
        assert!(err.to_string().contains("kitty init"));
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_broken_marker_symlink_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let outer = dir.path();
        fs::create_dir_all(outer.join(".kittify")).unwrap();
        let inner = outer.join("inner");
        fs::create_dir_all(&inner).unwrap();
        std::os::unix::fs::symlink(inner.join("missing"), inner.join(".kittify")).unwrap();

        assert_eq!(resolve_root(&inner).unwrap(), absolute(outer));
    }

    #[test]
    fn test_location_alone_is_not_a_worktree() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join(".worktrees/proj");
        fs::create_dir_all(main.join(".git")).unwrap();
        fs::create_dir_all(main.join(".kittify")).unwrap();

        assert!(!is_worktree(&main));
        assert_eq!(main_repo_root(&main), main);
    }

    #[test]
    fn test_list_worktrees_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path();
        fs::create_dir_all(main.join(".worktrees/002-b")).unwrap();
        fs::create_dir_all(main.join(".worktrees/001-a")).unwrap();
        fs::write(main.join(".worktrees/notes.txt"), "x").unwrap();

        let worktrees = list_worktrees(main, DEFAULT_WORKTREES_DIR);

        assert_eq!(worktrees.len(), 2);
        assert!(worktrees[0].ends_with("001-a"));
        assert!(worktrees[1].ends_with("002-b"));
    }
}
