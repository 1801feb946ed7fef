//! Remove agent command directories copied into worktrees.
//!
//! Worktrees used to receive their own copies of every agent's command and
//! prompt directories. Agents read them from the main checkout now, so the
//! copies only drift. Only worktree entries are removed; the main checkout
//! is never touched.

use std::fs;
use std::path::{Path, PathBuf};

use super::{relative, Checkouts};
use crate::migration::{Applicability, Migration, MigrationResult};
use crate::paths::{self, EntryKind, Removal};

/// `0.10.0`: drop per-worktree copies of shared agent assets.
pub struct DedupeWorktreeAssets;

/// Every existing shared-asset entry inside a worktree. Entries reached
/// through a symlinked parent already belong to another checkout.
fn worktree_copies(checkouts: &Checkouts) -> Vec<(PathBuf, PathBuf)> {
    let assets = checkouts.config.shared_assets();
    checkouts
        .worktrees
        .iter()
        .flat_map(|wt| assets.iter().map(move |asset| (wt.clone(), asset.clone())))
        .filter(|(wt, asset)| paths::entry_exists(&wt.join(asset)) && stays_inside(wt, asset))
        .collect()
}

/// The main checkout holds a usable copy of `asset`.
fn main_has(main: &Path, asset: &Path) -> bool {
    let path = main.join(asset);
    paths::is_live_dir(&path) || paths::is_live_file(&path)
}

/// True when the entry's parent resolves inside the worktree, so removing
/// it cannot reach through a symlinked parent into another checkout.
fn stays_inside(worktree: &Path, asset: &Path) -> bool {
    let Some(parent) = worktree.join(asset).parent().map(Path::to_path_buf) else {
        return false;
    };
    match (fs::canonicalize(parent), fs::canonicalize(worktree)) {
        (Ok(parent), Ok(worktree)) => parent.starts_with(worktree),
        _ => false,
    }
}

impl Migration for DedupeWorktreeAssets {
    fn id(&self) -> &'static str {
        "0.10.0_dedupe_worktree_assets"
    }

    fn description(&self) -> &'static str {
        "Remove agent command directories duplicated into worktrees"
    }

    fn target_version(&self) -> &'static str {
        "0.10.0"
    }

    fn detect(&self, root: &Path) -> bool {
        !worktree_copies(&Checkouts::of(root)).is_empty()
    }

    fn can_apply(&self, root: &Path) -> Applicability {
        let checkouts = Checkouts::of(root);
        for (wt, asset) in worktree_copies(&checkouts) {
            // A link loses nothing when removed.
            let is_link = matches!(paths::entry_kind(&wt.join(&asset)), Ok(EntryKind::Symlink));
            if !is_link && !main_has(&checkouts.main, &asset) {
                return Applicability::blocked(format!(
                    "main repository has no {}; removing the copy in {} would lose it",
                    asset.display(),
                    relative(&wt, &checkouts.main)
                ));
            }
        }
        Applicability::ok()
    }

    fn apply(&self, root: &Path, dry_run: bool) -> MigrationResult {
        let check = self.can_apply(root);
        if !check.ok {
            return MigrationResult::failed(check.reason.unwrap_or_default());
        }

        let checkouts = Checkouts::of(root);
        let mut result = MigrationResult::new();

        for (wt, asset) in worktree_copies(&checkouts) {
            let path = wt.join(&asset);
            let shown = relative(&path, &checkouts.main);

            if dry_run {
                result.change(format!("Would remove {shown}"));
                continue;
            }

            match paths::remove_entry(&path) {
                Ok(Removal::Unlinked) => result.change(format!("Unlinked {shown}")),
                Ok(Removal::Directory | Removal::File) => result.change(format!("Removed {shown}")),
                Ok(Removal::Missing) => {}
                Err(e) => result.error(format!("failed to remove {shown}: {e}")),
            }
        }

        if !dry_run {
            tracing::info!(
                worktrees = checkouts.worktrees.len(),
                removed = result.changes.len(),
                "Deduplicated worktree assets"
            );
        }
        result
    }
}
