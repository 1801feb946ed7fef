//! Lane workflow for work packages.
//!
//! Work packages live under `kitty-specs/<feature>/tasks/` as Markdown files
//! with YAML frontmatter. Their `lane` field is the only record of where they
//! are on the board.
//!
//! ## Operations
//!
//! - [`move_work_package`] - move to any lane
//! - [`approve`] - review a work package that is `for_review`
//! - [`rollback`] - undo the most recent transition
//! - [`list_tasks`] - group a feature's work packages by lane

mod board;
mod feature;
mod transitions;
mod work_package;

pub use board::{list_tasks, TaskBoard, TaskSummary};
pub use feature::{Feature, TASKS_DIR};
pub use transitions::{
    approve, move_work_package, rollback, Actor, Approval, RollbackOutcome, TransitionOptions,
    TransitionOutcome,
};
pub use work_package::{
    content_hash, id_from_file_name, is_work_package_file, HistoryEntry, WorkPackage,
};
