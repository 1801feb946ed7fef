//! Link-aware filesystem helpers.
//!
//! Agent-populated trees routinely contain symlinks, some of them broken.
//! Everything here inspects an entry with `symlink_metadata` before
//! following it, so a dangling link is reported as a link instead of
//! surfacing as an unexpected `NotFound` halfway through a walk.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{KittyError, Result};

/// What sits at a path, without following a final symlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Nothing there.
    Missing,
    /// A symbolic link (live or dangling).
    Symlink,
    /// A real directory.
    Dir,
    /// A regular file or any other non-directory entry.
    File,
}

/// Classify the entry at `path`.
pub fn entry_kind(path: &Path) -> io::Result<EntryKind> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Ok(EntryKind::Symlink),
        Ok(meta) if meta.is_dir() => Ok(EntryKind::Dir),
        Ok(_) => Ok(EntryKind::File),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(EntryKind::Missing),
        Err(e) => Err(e),
    }
}

/// True when `path` exists in any form, including as a dangling symlink.
pub fn entry_exists(path: &Path) -> bool {
    !matches!(entry_kind(path), Ok(EntryKind::Missing) | Err(_))
}

/// True when `path` is a directory or a symlink that resolves to one.
///
/// Broken links and unreadable entries count as absent.
pub fn is_live_dir(path: &Path) -> bool {
    match entry_kind(path) {
        Ok(EntryKind::Dir) => true,
        Ok(EntryKind::Symlink) => fs::metadata(path).map(|m| m.is_dir()).unwrap_or_else(|e| {
            tracing::debug!(path = %path.display(), error = %e, "Skipping broken symlink");
            false
        }),
        _ => false,
    }
}

/// True when `path` is a regular file or a symlink that resolves to one.
pub fn is_live_file(path: &Path) -> bool {
    match entry_kind(path) {
        Ok(EntryKind::File) => true,
        Ok(EntryKind::Symlink) => fs::metadata(path).map(|m| m.is_file()).unwrap_or(false),
        _ => false,
    }
}

/// Outcome of [`remove_entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// A symlink was unlinked; its target is untouched.
    Unlinked,
    /// A real directory was removed recursively.
    Directory,
    /// A regular file was removed.
    File,
    /// Nothing was there.
    Missing,
}

/// Remove whatever is at `path`, branching on its type.
///
/// Symlinks are unlinked and never handed to `remove_dir_all`, which
/// errors on a link to a directory.
pub fn remove_entry(path: &Path) -> Result<Removal> {
    let kind = entry_kind(path).map_err(|e| KittyError::io_at(path, e))?;
    match kind {
        EntryKind::Missing => Ok(Removal::Missing),
        EntryKind::Symlink => {
            unlink(path).map_err(|e| KittyError::io_at(path, e))?;
            Ok(Removal::Unlinked)
        }
        EntryKind::Dir => {
            fs::remove_dir_all(path).map_err(|e| KittyError::io_at(path, e))?;
            Ok(Removal::Directory)
        }
        EntryKind::File => {
            fs::remove_file(path).map_err(|e| KittyError::io_at(path, e))?;
            Ok(Removal::File)
        }
    }
}

#[cfg(not(windows))]
fn unlink(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

// Directory symlinks on Windows are removed with `remove_dir`.
#[cfg(windows)]
fn unlink(path: &Path) -> io::Result<()> {
    fs::remove_dir(path).or_else(|_| fs::remove_file(path))
}

/// Write `data` to `path` via a sibling temp file and a rename.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("file");
    let tmp = path.with_file_name(format!(".{file_name}.kittify-tmp"));

    let write = || -> io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_data()?;
        fs::rename(&tmp, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        KittyError::io_at(path, e)
    })
}

/// Move a file, creating the destination's parent directories.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| KittyError::io_at(parent, e))?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Cross-device renames fail; fall back to copy + remove.
        Err(e) if e.kind() != io::ErrorKind::PermissionDenied && is_live_file(from) => {
            tracing::debug!(from = %from.display(), error = %e, "Rename failed, copying instead");
            fs::copy(from, to).map_err(|e| KittyError::io_at(to, e))?;
            fs::remove_file(from).map_err(|e| KittyError::io_at(from, e))
        }
        Err(e) => Err(KittyError::io_at(from, e)),
    }
}

/// Remove `root` and every directory beneath it that is empty, bottom-up.
///
/// Returns the directories that were removed. Non-empty directories are
/// left in place.
pub fn prune_empty_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if entry_kind(root).map_err(|e| KittyError::io_at(root, e))? != EntryKind::Dir {
        return Ok(removed);
    }

    let dirs: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .follow_links(false)
        .contents_first(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();

    for dir in dirs {
        let is_empty = fs::read_dir(&dir)
            .map_err(|e| KittyError::io_at(&dir, e))?
            .next()
            .is_none();
        if is_empty {
            fs::remove_dir(&dir).map_err(|e| KittyError::io_at(&dir, e))?;
            removed.push(dir);
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(entry_kind(&dir.path().join("nope")).unwrap(), EntryKind::Missing);
        assert!(!entry_exists(&dir.path().join("nope")));
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("WP01.md");
        fs::write(&path, "old").unwrap();

        atomic_write(&path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert!(!dir.path().join(".WP01.md.kittify-tmp").exists());
    }

    #[test]
    fn test_remove_entry_directory_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("commands");
        fs::create_dir_all(target.join("nested")).unwrap();
        fs::write(target.join("nested/a.md"), "x").unwrap();

        assert_eq!(remove_entry(&target).unwrap(), Removal::Directory);
        assert!(!target.exists());
        assert_eq!(remove_entry(&target).unwrap(), Removal::Missing);
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_entry_unlinks_symlink_without_touching_target() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir(&real).unwrap();
        fs::write(real.join("keep.md"), "x").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert_eq!(remove_entry(&link).unwrap(), Removal::Unlinked);
        assert!(!entry_exists(&link));
        assert!(real.join("keep.md").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_is_not_a_live_dir() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("dangling");
        std::os::unix::fs::symlink(dir.path().join("gone"), &link).unwrap();

        assert!(entry_exists(&link));
        assert!(!is_live_dir(&link));
        assert_eq!(remove_entry(&link).unwrap(), Removal::Unlinked);
    }

    #[test]
    fn test_prune_empty_dirs_keeps_populated() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("planned");
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::create_dir_all(root.join("c")).unwrap();
        fs::write(root.join("c/file.txt"), "x").unwrap();

        let removed = prune_empty_dirs(&root).unwrap();

        assert_eq!(removed.len(), 2);
        assert!(root.join("c/file.txt").exists());
        assert!(!root.join("a").exists());
    }

    #[test]
    fn test_move_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("WP01.md");
        fs::write(&from, "body").unwrap();
        let to = dir.path().join("tasks/phase-1/WP01.md");

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "body");
    }
}
