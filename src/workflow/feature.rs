//! Features and work package lookup.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use super::work_package::{id_from_file_name, is_work_package_file, WorkPackage};
use crate::config::Config;
use crate::error::{KittyError, Result};
use crate::paths;

/// Name of the directory holding a feature's work packages.
pub const TASKS_DIR: &str = "tasks";

/// A feature directory such as `kitty-specs/001-user-auth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feature {
    /// Feature id, `NNN-slug`
    pub slug: String,

    /// Feature directory
    pub dir: PathBuf,
}

impl Feature {
    /// Open a feature of the checkout at `root`.
    pub fn open(root: &Path, slug: &str) -> Result<Self> {
        let config = Config::load(root)?;
        let dir = config.specs_root(root).join(slug);
        if !paths::is_live_dir(&dir) {
            return Err(KittyError::FeatureNotFound(slug.to_string()));
        }
        Ok(Self { slug: slug.to_string(), dir })
    }

    /// Wrap an existing feature directory.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let slug = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
        Self { slug, dir }
    }

    /// Every feature directory under `specs_root`, sorted by id.
    pub fn discover(specs_root: &Path) -> Vec<Self> {
        let Ok(entries) = fs::read_dir(specs_root) else {
            return Vec::new();
        };
        let mut features: Vec<Self> = entries
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| paths::is_live_dir(p))
            .map(Self::at)
            .collect();
        features.sort_by(|a, b| a.slug.cmp(&b.slug));
        features
    }

    /// The `tasks/` directory.
    pub fn tasks_dir(&self) -> PathBuf {
        self.dir.join(TASKS_DIR)
    }

    /// Every `WP*.md` file under `tasks/`, at any depth, sorted.
    ///
    /// Symlinks are not followed.
    pub fn work_package_files(&self) -> Vec<PathBuf> {
        let tasks = self.tasks_dir();
        if !paths::is_live_dir(&tasks) {
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = WalkDir::new(&tasks)
            .follow_links(false)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file() && is_work_package_file(e.path()))
            .map(walkdir::DirEntry::into_path)
            .collect();
        files.sort();
        files
    }

    /// Load every work package, rejecting duplicate ids.
    pub fn work_packages(&self) -> Result<Vec<WorkPackage>> {
        let packages = self
            .work_package_files()
            .iter()
            .map(|p| WorkPackage::load(p))
            .collect::<Result<Vec<_>>>()?;
        ensure_unique(&packages)?;
        Ok(packages)
    }

    /// Find one work package by id.
    pub fn find(&self, wp_id: &str) -> Result<WorkPackage> {
        let files = self.work_package_files();

        // Cheap pass over likely file names before loading everything.
        let mut matches = Vec::new();
        for path in files.iter().filter(|p| file_matches(p, wp_id)) {
            let wp = WorkPackage::load(path)?;
            if wp.id().eq_ignore_ascii_case(wp_id) {
                matches.push(wp);
            }
        }

        if matches.is_empty() {
            for path in files.iter().filter(|p| !file_matches(p, wp_id)) {
                let wp = WorkPackage::load(path)?;
                if wp.id().eq_ignore_ascii_case(wp_id) {
                    matches.push(wp);
                }
            }
        }

        ensure_unique(&matches)?;
        matches.pop().ok_or_else(|| KittyError::WorkPackageNotFound {
            feature: self.slug.clone(),
            wp_id: wp_id.to_string(),
        })
    }
}

fn file_matches(path: &Path, wp_id: &str) -> bool {
    id_from_file_name(path).is_some_and(|id| id.eq_ignore_ascii_case(wp_id))
}

fn ensure_unique(packages: &[WorkPackage]) -> Result<()> {
    for (i, a) in packages.iter().enumerate() {
        if let Some(b) = packages[i + 1..].iter().find(|b| b.id().eq_ignore_ascii_case(a.id())) {
            return Err(KittyError::DuplicateWorkPackage {
                wp_id: a.id().to_string(),
                first: a.path().to_path_buf(),
                second: b.path().to_path_buf(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wp(id: &str, lane: &str) -> String {
        format!("---\nwork_package_id: {id}\ntitle: {id}\nlane: {lane}\n---\n# {id}\n")
    }

    #[test]
    fn test_open_missing_feature() {
        let dir = tempfile::tempdir().unwrap();
        let err = Feature::open(dir.path(), "001-nope").unwrap_err();
        assert!(matches!(err, KittyError::FeatureNotFound(_)));
    }

    #[test]
    fn test_find_by_file_name_and_by_field() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = dir.path().join("kitty-specs/001-auth/tasks");
        fs::create_dir_all(tasks.join("phase-1")).unwrap();
        fs::write(tasks.join("WP01-setup.md"), wp("WP01", "planned")).unwrap();
        fs::write(tasks.join("phase-1/WP02.md"), wp("WP02", "doing")).unwrap();
        fs::write(tasks.join("WP9-misnamed.md"), wp("WP03", "done")).unwrap();

        let feature = Feature::open(dir.path(), "001-auth").unwrap();

        assert_eq!(feature.work_package_files().len(), 3);
        assert_eq!(feature.find("WP01").unwrap().title().as_deref(), Some("WP01"));
        assert_eq!(feature.find("wp02").unwrap().id(), "WP02");
        assert_eq!(feature.find("WP03").unwrap().id(), "WP03");
        assert!(matches!(
            feature.find("WP04").unwrap_err(),
            KittyError::WorkPackageNotFound { .. }
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let feature = Feature::at(dir.path().join("001-auth"));
        fs::create_dir_all(feature.tasks_dir().join("done")).unwrap();
        fs::write(feature.tasks_dir().join("WP01.md"), wp("WP01", "planned")).unwrap();
        fs::write(feature.tasks_dir().join("done/WP01.md"), wp("WP01", "done")).unwrap();

        assert!(matches!(
            feature.work_packages().unwrap_err(),
            KittyError::DuplicateWorkPackage { .. }
        ));
        assert!(matches!(feature.find("WP01").unwrap_err(), KittyError::DuplicateWorkPackage { .. }));
    }

    #[test]
    fn test_discover_features_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("002-b")).unwrap();
        fs::create_dir_all(dir.path().join("001-a")).unwrap();

        let features = Feature::discover(dir.path());

        assert_eq!(features.iter().map(|f| f.slug.as_str()).collect::<Vec<_>>(), ["001-a", "002-b"]);
    }
}
