//! # Kittify
//!
//! Work package lifecycle and project layout migrations for agent-driven
//! feature development.
//!
//! A kittify project keeps one directory per feature under `kitty-specs/`.
//! Each feature's `tasks/` directory holds work packages: Markdown files with
//! YAML frontmatter whose `lane` field tracks where the work is on the board.
//!
//! ## Features
//!
//! - **Lane workflow**: move, approve and roll back work packages with an
//!   append-only history
//! - **Frontmatter model**: lossless YAML + Markdown round trips in a
//!   canonical field order
//! - **Migrations**: versioned, idempotent rewrites of old project layouts
//! - **Context resolution**: project root, worktree and active feature
//!   detection
//!
//! ## Quick Start
//!
//! ```bash
//! # Create a project in the current repository
//! kitty init
//!
//! # Show the board for the current feature
//! kitty list
//!
//! # Move a work package
//! kitty move WP01 doing --agent claude
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]

pub mod config;
pub mod context;
pub mod error;
pub mod frontmatter;
pub mod git;
pub mod lane;
pub mod migration;
pub mod paths;
pub mod workflow;

#[cfg(feature = "git")]
pub use git::GitRepository;

// Re-export commonly used types
pub use config::Config;
pub use context::{resolve_root, RepoContext};
pub use error::{KittyError, Result};
pub use frontmatter::Document;
pub use lane::Lane;
pub use migration::{
    check_compatibility, upgrade, Migration, MigrationResult, ProjectMetadata, Registry,
    UpgradeOptions, UpgradeReport, VersionCheck,
};
pub use workflow::{
    approve, list_tasks, move_work_package, rollback, Actor, Approval, Feature, TaskBoard,
    TransitionOptions, TransitionOutcome, WorkPackage,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "kittify";

/// Binary name
pub const BIN_NAME: &str = "kitty";
