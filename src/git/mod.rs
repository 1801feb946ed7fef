//! Git integration module.
//!
//! The engine only asks version control three questions: where the
//! repository root is, which branch is checked out, and which worktrees
//! exist. Branch and worktree-pointer lookups read the `.git` metadata
//! files directly; root discovery and worktree listing go through libgit2
//! when the `git` feature is enabled.

use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "git")]
use git2::Repository;

use crate::paths::{self, EntryKind};

/// Git repository wrapper with the lookups the resolver needs.
#[cfg(feature = "git")]
pub struct GitRepository {
    repo: Repository,
}

#[cfg(feature = "git")]
impl GitRepository {
    /// Open a Git repository from the given path.
    ///
    /// This will search up the directory tree to find a Git repository.
    #[must_use]
    pub fn discover(path: impl AsRef<Path>) -> Option<Self> {
        Repository::discover(path.as_ref()).ok().map(|repo| Self { repo })
    }

    /// Get the working tree root path.
    #[must_use]
    pub fn root(&self) -> Option<PathBuf> {
        self.repo.workdir().map(Path::to_path_buf)
    }

    /// Get the current branch name.
    #[must_use]
    pub fn current_branch(&self) -> Option<String> {
        let head = self.repo.head().ok()?;

        if head.is_branch() {
            head.shorthand().map(String::from)
        } else {
            // Detached HEAD - return None
            None
        }
    }

    /// Check if this is a Git worktree.
    #[must_use]
    pub fn is_worktree(&self) -> bool {
        self.repo.is_worktree()
    }

    /// Working tree of the main checkout sharing this repository.
    #[must_use]
    pub fn main_workdir(&self) -> Option<PathBuf> {
        if self.repo.is_worktree() {
            self.repo.commondir().parent().map(Path::to_path_buf)
        } else {
            self.root()
        }
    }

    /// Paths of every linked worktree.
    #[must_use]
    pub fn worktree_paths(&self) -> Vec<PathBuf> {
        let Ok(names) = self.repo.worktrees() else {
            return Vec::new();
        };

        names
            .iter()
            .flatten()
            .filter_map(|name| self.repo.find_worktree(name).ok())
            .map(|wt| wt.path().to_path_buf())
            .collect()
    }
}

/// Working tree root containing `start`, as reported by version control.
#[cfg(feature = "git")]
pub fn discover_root(start: &Path) -> Option<PathBuf> {
    GitRepository::discover(start).and_then(|repo| repo.root())
}

/// Working tree root containing `start`: the nearest ancestor with a `.git` entry.
#[cfg(not(feature = "git"))]
pub fn discover_root(start: &Path) -> Option<PathBuf> {
    start.ancestors().find(|dir| paths::entry_exists(&dir.join(".git"))).map(Path::to_path_buf)
}

/// Linked worktrees registered with the repository at `root`.
#[cfg(feature = "git")]
pub fn worktree_paths(root: &Path) -> Vec<PathBuf> {
    GitRepository::discover(root).map(|repo| repo.worktree_paths()).unwrap_or_default()
}

/// Linked worktrees registered with the repository at `root`.
#[cfg(not(feature = "git"))]
pub fn worktree_paths(root: &Path) -> Vec<PathBuf> {
    let Some(git_dir) = git_dir(root) else {
        return Vec::new();
    };
    let Ok(entries) = fs::read_dir(git_dir.join("worktrees")) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| fs::read_to_string(entry.path().join("gitdir")).ok())
        .filter_map(|pointer| PathBuf::from(pointer.trim()).parent().map(Path::to_path_buf))
        .collect()
}

/// Target of a `.git` pointer file (`gitdir: <path>`), if `checkout/.git` is one.
pub fn gitdir_pointer(checkout: &Path) -> Option<PathBuf> {
    let dot_git = checkout.join(".git");
    if paths::entry_kind(&dot_git).ok()? != EntryKind::File {
        return None;
    }
    let content = fs::read_to_string(&dot_git).ok()?;
    let target = content.lines().find_map(|line| line.strip_prefix("gitdir:"))?.trim();
    let target = PathBuf::from(target);
    Some(if target.is_absolute() { target } else { checkout.join(target) })
}

/// The git directory for a checkout: `.git` itself or the pointer target.
pub fn git_dir(checkout: &Path) -> Option<PathBuf> {
    let dot_git = checkout.join(".git");
    if paths::is_live_dir(&dot_git) {
        return Some(dot_git);
    }
    gitdir_pointer(checkout)
}

/// Branch checked out in `checkout`, read from `HEAD`. `None` when detached.
pub fn head_branch(checkout: &Path) -> Option<String> {
    let head = fs::read_to_string(git_dir(checkout)?.join("HEAD")).ok()?;
    head.trim().strip_prefix("ref: refs/heads/").map(String::from)
}

/// Main checkout that owns the linked worktree containing `checkout`.
///
/// `None` for a main checkout or outside version control. The nearest
/// `.git` entry decides: a directory means a main checkout, a pointer file
/// whose target has a `commondir` means a linked worktree (submodule
/// pointers have none). With no `.git` entry on the way up, libgit2 is
/// asked when the `git` feature is enabled.
pub fn main_checkout(checkout: &Path) -> Option<PathBuf> {
    for dir in checkout.ancestors() {
        match paths::entry_kind(&dir.join(".git")) {
            Ok(EntryKind::Missing) | Err(_) => {}
            Ok(EntryKind::File) => {
                let main = main_from_pointer(dir)?;
                return Some(rebase(checkout, dir, &main));
            }
            Ok(_) => return None,
        }
    }
    main_from_libgit2(checkout)
}

/// `checkout` moved from under `from` to the same place under `to`.
fn rebase(checkout: &Path, from: &Path, to: &Path) -> PathBuf {
    checkout.strip_prefix(from).map_or_else(|_| to.to_path_buf(), |rel| to.join(rel))
}

/// A linked worktree's pointer targets `<main>/.git/worktrees/<name>`,
/// whose `commondir` names the shared git directory.
fn main_from_pointer(worktree: &Path) -> Option<PathBuf> {
    let worktree_git_dir = gitdir_pointer(worktree)?;
    let common = fs::read_to_string(worktree_git_dir.join("commondir")).ok()?;
    let common = PathBuf::from(common.trim());
    let common_dir = if common.is_absolute() { common } else { worktree_git_dir.join(common) };

    let common_dir = fs::canonicalize(&common_dir).unwrap_or(common_dir);
    common_dir.parent().map(Path::to_path_buf)
}

#[cfg(feature = "git")]
fn main_from_libgit2(checkout: &Path) -> Option<PathBuf> {
    let repo = GitRepository::discover(checkout)?;
    if !repo.is_worktree() {
        return None;
    }
    let workdir = repo.root()?;
    let main = repo.main_workdir()?;
    let checkout = fs::canonicalize(checkout).unwrap_or_else(|_| checkout.to_path_buf());
    let workdir = fs::canonicalize(&workdir).unwrap_or(workdir);
    Some(rebase(&checkout, &workdir, &main))
}

#[cfg(not(feature = "git"))]
fn main_from_libgit2(_checkout: &Path) -> Option<PathBuf> {
    None
}
