//! Rewrite work package frontmatter in canonical form.

use std::path::{Path, PathBuf};

use super::{relative, Checkouts};
use crate::frontmatter;
use crate::migration::{Migration, MigrationResult};

/// `0.10.2`: canonical field order and quoting for every work package.
pub struct NormalizeFrontmatter;

fn work_package_files(checkouts: &Checkouts) -> Vec<PathBuf> {
    checkouts.features().iter().flat_map(|f| f.work_package_files()).collect()
}

impl Migration for NormalizeFrontmatter {
    fn id(&self) -> &'static str {
        "0.10.2_normalize_frontmatter"
    }

    fn description(&self) -> &'static str {
        "Rewrite work package frontmatter with canonical field order and quoting"
    }

    fn target_version(&self) -> &'static str {
        "0.10.2"
    }

    fn detect(&self, root: &Path) -> bool {
        // Undecodable files are reported by apply, not detected here.
        work_package_files(&Checkouts::of(root))
            .iter()
            .any(|path| frontmatter::needs_normalization(path).unwrap_or(false))
    }

    fn apply(&self, root: &Path, dry_run: bool) -> MigrationResult {
        let checkouts = Checkouts::of(root);
        let mut result = MigrationResult::new();

        for path in work_package_files(&checkouts) {
            let shown = relative(&path, &checkouts.main);
            let outcome = if dry_run {
                frontmatter::needs_normalization(&path)
            } else {
                frontmatter::normalize(&path)
            };
            match outcome {
                Ok(true) if dry_run => result.change(format!("Would normalize {shown}")),
                Ok(true) => result.change(format!("Normalized {shown}")),
                Ok(false) => {}
                Err(e) => result.error(format!("{shown}: {e}")),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MESSY: &str = "---\nlane: doing\nhistory: []\ncustom: 1\nwork_package_id: WP01\ntitle: 'Setup'\n---\n# Body\n\n  keep   spacing\n";

    fn project_with(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".kittify")).unwrap();
        let path = dir.path().join("kitty-specs/001-a/tasks/WP01.md");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_normalizes_and_becomes_idle() {
        let (dir, path) = project_with(MESSY);
        let migration = NormalizeFrontmatter;

        assert!(migration.detect(dir.path()));
        let result = migration.apply(dir.path(), false);

        assert!(result.success);
        assert_eq!(result.changes.len(), 1);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("---\nwork_package_id: WP01\ntitle: Setup\nlane: doing\ncustom: 1\n"));
        assert!(text.ends_with("---\n# Body\n\n  keep   spacing\n"));
        assert!(!migration.detect(dir.path()));
    }

    #[test]
    fn test_decode_failure_is_reported_per_file() {
        let (dir, path) = project_with("---\nlane: [doing\n---\nbody\n");
        let before = fs::read(&path).unwrap();

        assert!(!NormalizeFrontmatter.detect(dir.path()));
        let result = NormalizeFrontmatter.apply(dir.path(), false);

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_dry_run_reports_without_writing() {
        let (dir, path) = project_with(MESSY);

        let result = NormalizeFrontmatter.apply(dir.path(), true);

        assert_eq!(result.changes.len(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), MESSY);
    }
}
