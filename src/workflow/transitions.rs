//! Lane transitions: move, approve, rollback.
//!
//! Each transition loads the work package fresh, computes the change,
//! and either returns it (dry run) or writes it with an optimistic
//! content-hash check. Exactly one history entry is appended per
//! transition and earlier entries are never rewritten.

use std::path::PathBuf;

use serde::Serialize;

use super::feature::Feature;
use super::work_package::{HistoryEntry, WorkPackage};
use crate::error::{KittyError, Result};
use crate::lane::Lane;

/// Who is performing a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub agent: String,
    pub shell_pid: Option<String>,
}

impl Actor {
    pub fn new(agent: impl Into<String>, shell_pid: Option<String>) -> Self {
        Self { agent: agent.into(), shell_pid }
    }
}

/// Options shared by all transitions.
#[derive(Debug, Clone, Default)]
pub struct TransitionOptions {
    /// Recorded as the history entry's action instead of the default text
    pub note: Option<String>,

    /// Compute the change without writing
    pub dry_run: bool,

    /// Refuse to write unless the file still hashes to this value
    pub expected_hash: Option<String>,
}

impl TransitionOptions {
    pub fn dry_run() -> Self {
        Self { dry_run: true, ..Self::default() }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A review decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    pub reviewer: Actor,
    pub review_status: String,
    pub target_lane: Lane,
}

impl Approval {
    /// Approve into `done` with status `approved`.
    pub fn new(reviewer: Actor) -> Self {
        Self { reviewer, review_status: "approved".to_string(), target_lane: Lane::Done }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.review_status = status.into();
        self
    }

    pub fn with_target(mut self, lane: Lane) -> Self {
        self.target_lane = lane;
        self
    }
}

/// The change a transition made, or would make in a dry run.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub wp_id: String,
    pub path: PathBuf,
    pub from_lane: Option<Lane>,
    pub to_lane: Lane,
    pub agent: String,
    pub shell_pid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    pub history_entry: HistoryEntry,
    pub history_len: usize,
    pub dry_run: bool,
    /// Hash of the file before the transition
    pub content_hash: String,
}

/// Result of a rollback.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackOutcome {
    pub wp_id: String,
    pub path: PathBuf,
    pub removed: HistoryEntry,
    pub restored_lane: Lane,
    pub history_len: usize,
}

fn check_expected_hash(wp: &WorkPackage, options: &TransitionOptions) -> Result<()> {
    match &options.expected_hash {
        Some(expected) if expected != wp.content_hash() => {
            Err(KittyError::ConcurrentModification { path: wp.path().to_path_buf() })
        }
        _ => Ok(()),
    }
}

/// Move a work package to `to_lane` on behalf of `actor`.
///
/// The actor's identity is recorded verbatim. An absent `lane` is
/// accepted here so that a damaged file can be repaired by moving it.
pub fn move_work_package(
    feature: &Feature,
    wp_id: &str,
    to_lane: Lane,
    actor: &Actor,
    options: &TransitionOptions,
) -> Result<TransitionOutcome> {
    let mut wp = feature.find(wp_id)?;
    check_expected_hash(&wp, options)?;

    let from_lane = wp.lane();
    if from_lane.is_none() {
        tracing::warn!(wp = wp.id(), path = %wp.path().display(), "Work package has no lane");
    }

    let action = options.note.clone().unwrap_or_else(|| format!("Moved to {to_lane}"));
    let entry = HistoryEntry::now(to_lane, &actor.agent, &action, actor.shell_pid.as_deref());

    let outcome = TransitionOutcome {
        wp_id: wp.id().to_string(),
        path: wp.path().to_path_buf(),
        from_lane,
        to_lane,
        agent: actor.agent.clone(),
        shell_pid: actor.shell_pid.clone(),
        review_status: None,
        reviewed_by: None,
        history_entry: entry.clone(),
        history_len: wp.history().len() + 1,
        dry_run: options.dry_run,
        content_hash: wp.content_hash().to_string(),
    };

    if options.dry_run {
        return Ok(outcome);
    }

    wp.set_lane(to_lane);
    wp.set_identity(&actor.agent, actor.shell_pid.as_deref());
    wp.push_history(entry);
    wp.save()?;

    tracing::info!(
        wp = %outcome.wp_id,
        from = from_lane.map_or("none", |l| l.as_str()),
        to = %to_lane,
        agent = %actor.agent,
        "Moved work package"
    );
    Ok(outcome)
}

/// Approve a work package that is awaiting review.
///
/// The reviewer becomes the recorded `agent`; the implementer's history
/// entries stay exactly as they were.
pub fn approve(
    feature: &Feature,
    wp_id: &str,
    approval: &Approval,
    options: &TransitionOptions,
) -> Result<TransitionOutcome> {
    let mut wp = feature.find(wp_id)?;

    if wp.lane() != Some(Lane::ForReview) {
        return Err(KittyError::WrongLaneForApproval {
            wp_id: wp.id().to_string(),
            current: wp.lane().map_or_else(|| "missing".to_string(), |l| l.to_string()),
            expected: Lane::ForReview.to_string(),
        });
    }
    check_expected_hash(&wp, options)?;

    let reviewer = &approval.reviewer;
    let action = options.note.clone().unwrap_or_else(|| {
        format!("Review {} by {}", approval.review_status, reviewer.agent)
    });
    let entry = HistoryEntry::now(
        approval.target_lane,
        &reviewer.agent,
        &action,
        reviewer.shell_pid.as_deref(),
    );

    let outcome = TransitionOutcome {
        wp_id: wp.id().to_string(),
        path: wp.path().to_path_buf(),
        from_lane: wp.lane(),
        to_lane: approval.target_lane,
        agent: reviewer.agent.clone(),
        shell_pid: reviewer.shell_pid.clone(),
        review_status: Some(approval.review_status.clone()),
        reviewed_by: Some(reviewer.agent.clone()),
        history_entry: entry.clone(),
        history_len: wp.history().len() + 1,
        dry_run: options.dry_run,
        content_hash: wp.content_hash().to_string(),
    };

    if options.dry_run {
        return Ok(outcome);
    }

    wp.set_lane(approval.target_lane);
    wp.set_identity(&reviewer.agent, reviewer.shell_pid.as_deref());
    wp.set_field("review_status", approval.review_status.as_str());
    wp.set_field("reviewed_by", reviewer.agent.as_str());
    wp.push_history(entry);
    wp.save()?;

    tracing::info!(
        wp = %outcome.wp_id,
        reviewer = %reviewer.agent,
        status = %approval.review_status,
        "Approved work package"
    );
    Ok(outcome)
}

/// Undo the most recent transition.
///
/// `lane`, `agent` and `shell_pid` are restored from the entry that is now
/// last. When the removed entry was made by the recorded reviewer, the
/// review fields are cleared too.
pub fn rollback(feature: &Feature, wp_id: &str) -> Result<RollbackOutcome> {
    let mut wp = feature.find(wp_id)?;

    let entries = wp.history().len();
    if entries < 2 {
        return Err(KittyError::InsufficientHistory { wp_id: wp.id().to_string(), entries });
    }

    let Some(removed) = wp.pop_history() else {
        return Err(KittyError::InsufficientHistory { wp_id: wp.id().to_string(), entries });
    };
    let Some(last) = wp.history().last().cloned() else {
        return Err(KittyError::InsufficientHistory { wp_id: wp.id().to_string(), entries });
    };
    let restored_lane = last.lane;
    wp.set_lane(restored_lane);
    wp.set_identity(&last.agent, last.shell_pid.as_deref());
    if wp.reviewed_by().as_deref() == Some(removed.agent.as_str()) {
        wp.clear_field("review_status");
        wp.clear_field("reviewed_by");
    }
    wp.save()?;

    tracing::info!(wp = wp.id(), lane = %restored_lane, "Rolled back work package");

    Ok(RollbackOutcome {
        wp_id: wp.id().to_string(),
        path: wp.path().to_path_buf(),
        removed,
        restored_lane,
        history_len: wp.history().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup(lane: &str) -> (tempfile::TempDir, Feature) {
        let dir = tempfile::tempdir().unwrap();
        let feature = Feature::at(dir.path().join("001-auth"));
        fs::create_dir_all(feature.tasks_dir()).unwrap();
        fs::write(
            feature.tasks_dir().join("WP01-setup.md"),
            format!(
                "---\nwork_package_id: WP01\ntitle: Setup\nlane: {lane}\nhistory:\n- timestamp: 2025-01-01T10:00:00Z\n  lane: {lane}\n  agent: system\n  action: Prompt generated\n---\n# Setup\n"
            ),
        )
        .unwrap();
        (dir, feature)
    }

    fn actor(name: &str, pid: &str) -> Actor {
        Actor::new(name, Some(pid.to_string()))
    }

    #[test]
    fn test_move_sets_lane_and_appends_one_entry() {
        let (_dir, feature) = setup("planned");

        let outcome = move_work_package(
            &feature,
            "WP01",
            Lane::Doing,
            &actor("claude", "123"),
            &TransitionOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.from_lane, Some(Lane::Planned));
        let wp = feature.find("WP01").unwrap();
        assert_eq!(wp.lane(), Some(Lane::Doing));
        assert_eq!(wp.history().len(), 2);
        assert_eq!(wp.agent().as_deref(), Some("claude"));
        assert_eq!(wp.history()[1].action, "Moved to doing");
    }

    #[test]
    fn test_move_dry_run_touches_nothing() {
        let (_dir, feature) = setup("planned");
        let path = feature.tasks_dir().join("WP01-setup.md");
        let before = fs::read(&path).unwrap();

        let outcome = move_work_package(
            &feature,
            "WP01",
            Lane::Done,
            &actor("claude", "1"),
            &TransitionOptions::dry_run(),
        )
        .unwrap();

        assert!(outcome.dry_run);
        assert_eq!(outcome.to_lane, Lane::Done);
        assert_eq!(outcome.history_len, 2);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_move_with_stale_hash_is_rejected() {
        let (_dir, feature) = setup("planned");
        let options =
            TransitionOptions { expected_hash: Some("deadbeef".to_string()), ..Default::default() };

        let err = move_work_package(&feature, "WP01", Lane::Doing, &actor("a", "1"), &options)
            .unwrap_err();

        assert!(matches!(err, KittyError::ConcurrentModification { .. }));
    }

    #[test]
    fn test_approve_wrong_lane_leaves_file_identical() {
        let (_dir, feature) = setup("doing");
        let path = feature.tasks_dir().join("WP01-setup.md");
        let before = fs::read(&path).unwrap();

        let err = approve(&feature, "WP01", &Approval::new(actor("r1", "9")), &Default::default())
            .unwrap_err();

        match err {
            KittyError::WrongLaneForApproval { current, expected, .. } => {
                assert_eq!(current, "doing");
                assert_eq!(expected, "for_review");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_approve_custom_status_and_target() {
        let (_dir, feature) = setup("for_review");
        let approval =
            Approval::new(actor("r2", "7")).with_status("changes_requested").with_target(Lane::Planned);

        approve(&feature, "WP01", &approval, &TransitionOptions::default().with_note("Needs tests"))
            .unwrap();

        let wp = feature.find("WP01").unwrap();
        assert_eq!(wp.lane(), Some(Lane::Planned));
        assert_eq!(wp.review_status().as_deref(), Some("changes_requested"));
        assert_eq!(wp.reviewed_by().as_deref(), Some("r2"));
        assert_eq!(wp.history().last().unwrap().action, "Needs tests");
    }

    #[test]
    fn test_rollback_restores_previous_lane() {
        let (_dir, feature) = setup("planned");
        move_work_package(&feature, "WP01", Lane::Doing, &actor("a", "1"), &Default::default())
            .unwrap();

        let outcome = rollback(&feature, "WP01").unwrap();

        assert_eq!(outcome.restored_lane, Lane::Planned);
        assert_eq!(outcome.removed.lane, Lane::Doing);
        let wp = feature.find("WP01").unwrap();
        assert_eq!(wp.lane(), Some(Lane::Planned));
        assert_eq!(wp.history().len(), 1);
    }

    #[test]
    fn test_rollback_needs_two_entries() {
        let (_dir, feature) = setup("planned");
        let err = rollback(&feature, "WP01").unwrap_err();
        assert!(matches!(err, KittyError::InsufficientHistory { entries: 1, .. }));
    }

    #[test]
    fn test_rollback_of_approval_restores_implementer() {
        let (_dir, feature) = setup("for_review");
        move_work_package(&feature, "WP01", Lane::ForReview, &actor("impl", "100"), &Default::default())
            .unwrap();
        approve(&feature, "WP01", &Approval::new(actor("r1", "999")), &Default::default()).unwrap();

        let outcome = rollback(&feature, "WP01").unwrap();

        assert_eq!(outcome.restored_lane, Lane::ForReview);
        let wp = feature.find("WP01").unwrap();
        assert_eq!(wp.agent().as_deref(), Some("impl"));
        assert_eq!(wp.shell_pid().as_deref(), Some("100"));
        assert_eq!(wp.review_status(), None);
        assert_eq!(wp.reviewed_by(), None);
    }
}
