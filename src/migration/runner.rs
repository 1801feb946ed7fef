//! Upgrade runner: applies pending migrations and records them.

use std::path::Path;

use serde::Serialize;

use super::metadata::ProjectMetadata;
use super::registry::Registry;
use super::MigrationResult;
use crate::error::Result;
use crate::frontmatter::timestamp_now;

/// Options for [`upgrade`].
#[derive(Debug, Clone)]
pub struct UpgradeOptions {
    /// Report what would change without writing
    pub dry_run: bool,

    /// Version recorded once every migration succeeds
    pub target_version: String,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self { dry_run: false, target_version: crate::VERSION.to_string() }
    }
}

/// Result of one migration inside an upgrade.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    pub id: String,
    pub description: String,
    pub result: MigrationResult,
}

/// A migration the runner did not apply.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedMigration {
    pub id: String,
    pub reason: String,
}

/// Summary of an upgrade run.
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeReport {
    pub from_version: Option<String>,
    pub to_version: Option<String>,
    pub dry_run: bool,
    pub applied: Vec<MigrationOutcome>,
    pub skipped: Vec<SkippedMigration>,
}

impl UpgradeReport {
    /// Whether every attempted migration succeeded.
    pub fn success(&self) -> bool {
        self.applied.iter().all(|m| m.result.success)
    }

    /// Ids of the migrations that failed.
    pub fn failed(&self) -> Vec<&str> {
        self.applied.iter().filter(|m| !m.result.success).map(|m| m.id.as_str()).collect()
    }
}

/// Apply every pending migration in `registry` to the project at `root`.
///
/// Migrations already recorded in the metadata are skipped, as are those
/// whose old layout is not detected. A failing migration does not stop the
/// ones after it. The project version moves to the target only when all of
/// them succeed. Metadata that exists but cannot be parsed stops the
/// upgrade before anything runs.
pub fn upgrade(root: &Path, registry: &Registry, options: &UpgradeOptions) -> Result<UpgradeReport> {
    let existing = ProjectMetadata::load(root)?;
    let from_version = existing.as_ref().map(|m| m.version.clone()).filter(|v| !v.is_empty());
    let mut metadata = existing.unwrap_or_else(|| ProjectMetadata::new(""));

    let mut applied = Vec::new();
    let mut skipped = Vec::new();

    for migration in registry.iter() {
        let id = migration.id();

        if metadata.has_applied(id) {
            skipped.push(SkippedMigration { id: id.to_string(), reason: "already applied".to_string() });
            continue;
        }
        if !migration.detect(root) {
            skipped.push(SkippedMigration { id: id.to_string(), reason: "not needed".to_string() });
            continue;
        }

        let check = migration.can_apply(root);
        let result = if check.ok {
            tracing::info!(migration = id, dry_run = options.dry_run, "Applying migration");
            migration.apply(root, options.dry_run)
        } else {
            let reason = check.reason.unwrap_or_else(|| "preconditions not met".to_string());
            tracing::warn!(migration = id, reason = %reason, "Migration blocked");
            MigrationResult::failed(
                crate::error::KittyError::MigrationPrecondition {
                    migration: id.to_string(),
                    reason,
                }
                .to_string(),
            )
        };

        if result.success && !options.dry_run {
            metadata.record_migration(id, migration.target_version());
        }
        applied.push(MigrationOutcome {
            id: id.to_string(),
            description: migration.description().to_string(),
            result,
        });
    }

    let mut report = UpgradeReport {
        from_version,
        to_version: None,
        dry_run: options.dry_run,
        applied,
        skipped,
    };

    if report.success() {
        report.to_version = Some(options.target_version.clone());
    }

    if !options.dry_run {
        if let Some(version) = &report.to_version {
            metadata.version.clone_from(version);
        }
        metadata.last_upgraded_at = Some(timestamp_now());
        metadata.save(root)?;
    }

    tracing::info!(
        applied = report.applied.len(),
        failed = report.failed().len(),
        skipped = report.skipped.len(),
        "Upgrade finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{Applicability, Migration};
    use std::fs;

    /// Creates a marker file; detected while the marker is absent.
    struct Touch {
        id: &'static str,
        version: &'static str,
        fail: bool,
    }

    impl Migration for Touch {
        fn id(&self) -> &'static str {
            self.id
        }

        fn description(&self) -> &'static str {
            "touch a marker"
        }

        fn target_version(&self) -> &'static str {
            self.version
        }

        fn detect(&self, root: &Path) -> bool {
            !root.join(self.id).exists()
        }

        fn can_apply(&self, _root: &Path) -> Applicability {
            Applicability::ok()
        }

        fn apply(&self, root: &Path, dry_run: bool) -> MigrationResult {
            if self.fail {
                return MigrationResult::failed("boom");
            }
            let mut result = MigrationResult::new();
            if !dry_run {
                fs::write(root.join(self.id), "").unwrap();
            }
            result.change(format!("touched {}", self.id));
            result
        }
    }

    fn registry(fail_first: bool) -> Registry {
        let mut registry = Registry::new();
        registry.register(Box::new(Touch { id: "a", version: "0.1.0", fail: fail_first }));
        registry.register(Box::new(Touch { id: "b", version: "0.2.0", fail: false }));
        registry
    }

    fn options(dry_run: bool) -> UpgradeOptions {
        UpgradeOptions { dry_run, target_version: "0.2.0".to_string() }
    }

    #[test]
    fn test_upgrade_records_and_sets_version() {
        let dir = tempfile::tempdir().unwrap();
        ProjectMetadata::init(dir.path(), "0.0.1").unwrap();

        let report = upgrade(dir.path(), &registry(false), &options(false)).unwrap();

        assert!(report.success());
        assert_eq!(report.applied.len(), 2);
        let metadata = ProjectMetadata::load(dir.path()).unwrap().unwrap();
        assert_eq!(metadata.version, "0.2.0");
        assert!(metadata.has_applied("a") && metadata.has_applied("b"));

        let again = upgrade(dir.path(), &registry(false), &options(false)).unwrap();
        assert!(again.applied.is_empty());
        assert_eq!(again.skipped.len(), 2);
    }

    #[test]
    fn test_failure_does_not_stop_later_migrations() {
        let dir = tempfile::tempdir().unwrap();
        ProjectMetadata::init(dir.path(), "0.0.1").unwrap();

        let report = upgrade(dir.path(), &registry(true), &options(false)).unwrap();

        assert!(!report.success());
        assert_eq!(report.failed(), ["a"]);
        assert!(dir.path().join("b").exists());
        let metadata = ProjectMetadata::load(dir.path()).unwrap().unwrap();
        assert_eq!(metadata.version, "0.0.1");
        assert!(!metadata.has_applied("a"));
        assert!(metadata.has_applied("b"));
    }

    #[test]
    fn test_dry_run_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        ProjectMetadata::init(dir.path(), "0.0.1").unwrap();
        let before = fs::read(ProjectMetadata::path(dir.path())).unwrap();

        let report = upgrade(dir.path(), &registry(false), &options(true)).unwrap();

        assert!(report.dry_run);
        assert_eq!(report.applied.len(), 2);
        assert!(!dir.path().join("a").exists());
        assert_eq!(fs::read(ProjectMetadata::path(dir.path())).unwrap(), before);
    }

    #[test]
    fn test_unreadable_metadata_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = ProjectMetadata::path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let garbled = "version: 0.8.0\nagents: [claude, codex\napplied_migrations: []\n";
        fs::write(&path, garbled).unwrap();

        let err = upgrade(dir.path(), &registry(false), &options(false)).unwrap_err();

        assert!(matches!(err, crate::error::KittyError::Metadata(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), garbled);
        assert!(!dir.path().join("a").exists());
    }
}
