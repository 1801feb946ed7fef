//! Ordered collection of migrations.

use std::path::Path;

use super::migrations::{DedupeWorktreeAssets, FlattenLaneDirectories, NormalizeFrontmatter};
use super::version::compare_versions;
use super::Migration;

/// Migrations ordered by target version, then id.
pub struct Registry {
    migrations: Vec<Box<dyn Migration>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { migrations: Vec::new() }
    }

    /// Registry holding every built-in migration.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(FlattenLaneDirectories));
        registry.register(Box::new(DedupeWorktreeAssets));
        registry.register(Box::new(NormalizeFrontmatter));
        registry
    }

    /// Add a migration, keeping the order.
    pub fn register(&mut self, migration: Box<dyn Migration>) {
        self.migrations.push(migration);
        self.migrations.sort_by(|a, b| {
            compare_versions(a.target_version(), b.target_version()).then_with(|| a.id().cmp(b.id()))
        });
    }

    /// Look up a migration by id.
    pub fn get(&self, id: &str) -> Option<&dyn Migration> {
        self.migrations.iter().find(|m| m.id() == id).map(|m| m.as_ref())
    }

    /// All migrations in order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Migration> {
        self.migrations.iter().map(|m| m.as_ref())
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Migrations that detect an old layout at `root` and can run there.
    pub fn applicable(&self, root: &Path) -> Vec<&dyn Migration> {
        self.iter()
            .filter(|m| {
                if !m.detect(root) {
                    return false;
                }
                let check = m.can_apply(root);
                if !check.ok {
                    tracing::debug!(
                        migration = m.id(),
                        reason = check.reason.as_deref().unwrap_or(""),
                        "Migration detected but blocked"
                    );
                }
                check.ok
            })
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{Applicability, MigrationResult};

    struct Fake {
        id: &'static str,
        version: &'static str,
        detected: bool,
        allowed: bool,
    }

    impl Migration for Fake {
        fn id(&self) -> &'static str {
            self.id
        }

        fn description(&self) -> &'static str {
            "fake"
        }

        fn target_version(&self) -> &'static str {
            self.version
        }

        fn detect(&self, _root: &Path) -> bool {
            self.detected
        }

        fn can_apply(&self, _root: &Path) -> Applicability {
            if self.allowed {
                Applicability::ok()
            } else {
                Applicability::blocked("nope")
            }
        }

        fn apply(&self, _root: &Path, _dry_run: bool) -> MigrationResult {
            MigrationResult::new()
        }
    }

    fn fake(id: &'static str, version: &'static str, detected: bool, allowed: bool) -> Box<Fake> {
        Box::new(Fake { id, version, detected, allowed })
    }

    #[test]
    fn test_ordered_by_version_not_text() {
        let mut registry = Registry::new();
        registry.register(fake("0.10.0_b", "0.10.0", true, true));
        registry.register(fake("0.9.0_a", "0.9.0", true, true));
        registry.register(fake("0.10.0_a", "0.10.0", true, true));

        let ids: Vec<_> = registry.iter().map(|m| m.id()).collect();
        assert_eq!(ids, ["0.9.0_a", "0.10.0_a", "0.10.0_b"]);
    }

    #[test]
    fn test_applicable_requires_detect_and_can_apply() {
        let mut registry = Registry::new();
        registry.register(fake("1_detected", "0.1.0", true, true));
        registry.register(fake("2_clean", "0.2.0", false, true));
        registry.register(fake("3_blocked", "0.3.0", true, false));

        let ids: Vec<_> =
            registry.applicable(Path::new("/nowhere")).into_iter().map(|m| m.id()).collect();
        assert_eq!(ids, ["1_detected"]);
    }

    #[test]
    fn test_builtin_registry() {
        let registry = Registry::builtin();
        assert_eq!(registry.len(), 3);
        assert!(registry.get("0.9.0_flatten_lane_directories").is_some());
        assert!(registry.get("missing").is_none());
    }
}
