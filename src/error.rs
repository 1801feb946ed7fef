//! Error types for kittify operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for kittify operations.
pub type Result<T> = std::result::Result<T, KittyError>;

/// Errors raised by the work package engine and the migration framework.
///
/// Every variant is a typed value; rendering and exit codes belong to the
/// caller (the `kitty` binary or any other front end).
#[derive(Debug, Error)]
pub enum KittyError {
    /// No work package with the given id exists in the feature.
    #[error("Work package '{wp_id}' not found in feature '{feature}'")]
    WorkPackageNotFound { feature: String, wp_id: String },

    /// Two files in one feature claim the same work package id.
    #[error("Duplicate work package id '{wp_id}': {} and {}", .first.display(), .second.display())]
    DuplicateWorkPackage { wp_id: String, first: PathBuf, second: PathBuf },

    /// The feature directory does not exist.
    #[error("Feature '{0}' not found")]
    FeatureNotFound(String),

    /// A lane value that is not one of planned, doing, for_review, done.
    #[error("Invalid lane '{value}' (expected one of: planned, doing, for_review, done)")]
    InvalidLane { value: String },

    /// Approval attempted on a work package that is not awaiting review.
    #[error("Cannot approve '{wp_id}': it is in lane '{current}', expected '{expected}'")]
    WrongLaneForApproval { wp_id: String, current: String, expected: String },

    /// Rollback needs at least two history entries.
    #[error("Cannot roll back '{wp_id}': history has {entries} entr(ies), need at least 2")]
    InsufficientHistory { wp_id: String, entries: usize },

    /// The file changed between the read and the write of a transition.
    #[error("{} was modified concurrently; re-run the command", .path.display())]
    ConcurrentModification { path: PathBuf },

    /// Malformed frontmatter.
    #[error("Failed to decode {}: {message} (line {line}, column {column})", .path.display())]
    Decode { path: PathBuf, line: usize, column: usize, message: String },

    /// Two migration sources map to the same destination.
    #[error(
        "Collision: {} and {} both map to {}",
        .first.display(),
        .second.display(),
        .destination.display()
    )]
    Collision { first: PathBuf, second: PathBuf, destination: PathBuf },

    /// No `.kittify/` project could be located.
    #[error("No kittify project found from {}; run `kitty init` to create one", .start.display())]
    ProjectNotFound { start: PathBuf },

    /// A migration's extra preconditions are not met.
    #[error("Migration '{migration}' cannot run: {reason}")]
    MigrationPrecondition { migration: String, reason: String },

    /// Tool and project versions disagree.
    #[error("Version mismatch: tool {tool}, project {project}. {suggestion}")]
    IncompatibleVersion { tool: String, project: String, suggestion: String },

    /// `.kittify/metadata.yaml` could not be read or written.
    #[error("Project metadata error: {0}")]
    Metadata(String),

    /// `.kittify/config.toml` could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Permission denied while touching a path.
    #[error("Permission denied: {}", .path.display())]
    PermissionDenied { path: PathBuf, source: io::Error },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl KittyError {
    /// Wrap an IO error with the path it concerns, surfacing permission
    /// failures as their own variant.
    pub fn io_at(path: impl Into<PathBuf>, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path: path.into(), source: err }
        } else {
            Self::Io(err)
        }
    }
}
