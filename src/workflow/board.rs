//! Task board: work packages grouped by lane.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use super::feature::Feature;
use crate::error::Result;
use crate::lane::Lane;

/// One row on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: Option<String>,
    pub lane: Lane,
    pub agent: Option<String>,
    pub assignee: Option<String>,
    pub review_status: Option<String>,
    pub path: PathBuf,

    /// The file has no `lane` and is shown as planned
    pub lane_defaulted: bool,
}

/// Work packages of a feature grouped by their `lane` field.
#[derive(Debug, Clone, Serialize)]
pub struct TaskBoard {
    pub feature: String,

    /// Every lane is present, possibly empty
    pub lanes: BTreeMap<Lane, Vec<TaskSummary>>,
    pub warnings: Vec<String>,
}

impl TaskBoard {
    /// Work packages in `lane`.
    pub fn lane(&self, lane: Lane) -> &[TaskSummary] {
        self.lanes.get(&lane).map_or(&[], Vec::as_slice)
    }

    /// Number of work packages on the board.
    pub fn total(&self) -> usize {
        self.lanes.values().map(Vec::len).sum()
    }
}

/// Group a feature's work packages by lane.
///
/// The location of a file under `tasks/` plays no part. A work package
/// without a `lane` is listed as planned with a warning; an unknown lane
/// or a malformed file fails the whole listing.
pub fn list_tasks(feature: &Feature) -> Result<TaskBoard> {
    let mut lanes: BTreeMap<Lane, Vec<TaskSummary>> =
        Lane::ALL.iter().map(|lane| (*lane, Vec::new())).collect();
    let mut warnings = Vec::new();

    for wp in feature.work_packages()? {
        let lane_defaulted = wp.lane().is_none();
        let lane = wp.lane().unwrap_or_default();
        if lane_defaulted {
            tracing::warn!(wp = wp.id(), path = %wp.path().display(), "Missing lane, showing as planned");
            warnings.push(format!("{} has no lane; shown as {}", wp.id(), Lane::default()));
        }

        lanes.entry(lane).or_default().push(TaskSummary {
            id: wp.id().to_string(),
            title: wp.title(),
            lane,
            agent: wp.agent(),
            assignee: wp.assignee(),
            review_status: wp.review_status(),
            path: wp.path().to_path_buf(),
            lane_defaulted,
        });
    }

    for tasks in lanes.values_mut() {
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
    }

    Ok(TaskBoard { feature: feature.slug.clone(), lanes, warnings })
}
