//! Versioned migrations of the on-disk project layout.
//!
//! Each [`Migration`] knows how to detect an old layout, whether it can be
//! rewritten safely, and how to rewrite it. The [`Registry`] orders them by
//! target version and the [`upgrade`] runner applies them, recording what
//! ran in `.kittify/metadata.yaml`.

mod metadata;
pub mod migrations;
mod registry;
mod runner;
mod version;

pub use metadata::{AppliedMigration, ProjectMetadata, METADATA_FILE};
pub use registry::Registry;
pub use runner::{upgrade, MigrationOutcome, SkippedMigration, UpgradeOptions, UpgradeReport};
pub use version::{check_compatibility, compare_versions, parse_version, VersionCheck};

use std::path::Path;

use serde::Serialize;

/// A single layout migration.
///
/// Implementations are stateless. `detect` and `can_apply` never write.
pub trait Migration: Send + Sync {
    /// Sortable id, `<version>_<name>`.
    fn id(&self) -> &'static str;

    /// One-line description.
    fn description(&self) -> &'static str;

    /// Tool version that introduced the layout this migration produces.
    fn target_version(&self) -> &'static str;

    /// Whether the project at `root` still has the old layout.
    fn detect(&self, root: &Path) -> bool;

    /// Extra preconditions beyond `detect`.
    fn can_apply(&self, root: &Path) -> Applicability {
        let _ = root;
        Applicability::ok()
    }

    /// Rewrite the project. With `dry_run` nothing is touched and the
    /// result lists what would change.
    fn apply(&self, root: &Path, dry_run: bool) -> MigrationResult;
}

/// Answer of [`Migration::can_apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Applicability {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Applicability {
    pub fn ok() -> Self {
        Self { ok: true, reason: None }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self { ok: false, reason: Some(reason.into()) }
    }
}

/// What a migration did, or would do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    pub success: bool,
    pub changes: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl MigrationResult {
    /// An empty successful result.
    pub fn new() -> Self {
        Self { success: true, ..Self::default() }
    }

    /// A failed result carrying a single error.
    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, errors: vec![error.into()], ..Self::default() }
    }

    pub fn change(&mut self, change: impl Into<String>) {
        self.changes.push(change.into());
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn error(&mut self, error: impl Into<String>) {
        let error = error.into();
        tracing::error!("{error}");
        self.errors.push(error);
        self.success = false;
    }
}
