//! Move work packages out of legacy lane directories.
//!
//! Older projects kept `tasks/planned/WP01.md`, `tasks/doing/WP02.md`, ...
//! The flat layout keeps every file directly under `tasks/` and records
//! the lane in frontmatter only.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{relative, Checkouts};
use crate::error::{KittyError, Result};
use crate::frontmatter;
use crate::lane::Lane;
use crate::migration::{Migration, MigrationResult};
use crate::paths::{self, EntryKind};
use crate::workflow::{is_work_package_file, Feature};

const PLACEHOLDER: &str = ".gitkeep";

const ID: &str = "0.9.0_flatten_lane_directories";

/// `0.9.0`: flatten `tasks/<lane>/` directories.
pub struct FlattenLaneDirectories;

/// One file to move.
struct PlannedMove {
    from: PathBuf,
    to: PathBuf,
    /// Set for work package files
    lane: Option<Lane>,
}

/// Everything the migration will do to one feature, computed before any
/// file is touched.
#[derive(Default)]
struct FeaturePlan {
    /// Subdirectories to create under `tasks/`, parents first.
    dirs: Vec<PathBuf>,
    moves: Vec<PlannedMove>,
    placeholders: Vec<PathBuf>,
    lane_dirs: Vec<PathBuf>,
    warnings: Vec<String>,
}

fn lane_dirs(feature: &Feature) -> Vec<(Lane, PathBuf)> {
    let tasks = feature.tasks_dir();
    Lane::ALL
        .into_iter()
        .map(|lane| (lane, tasks.join(lane.as_str())))
        .filter(|(_, dir)| paths::entry_exists(dir))
        .collect()
}

fn collision(first: &Path, second: PathBuf, destination: &Path) -> KittyError {
    KittyError::Collision {
        first: first.to_path_buf(),
        second,
        destination: destination.to_path_buf(),
    }
}

/// Collision pre-pass: map every source to its destination and parse every
/// work package before anything moves.
///
/// Organizational subdirectories keep their structure. The same
/// subdirectory under two lanes merges into one.
fn plan_feature(feature: &Feature) -> Result<FeaturePlan> {
    let tasks = feature.tasks_dir();
    let mut plan = FeaturePlan::default();
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut planned_dirs: HashSet<PathBuf> = HashSet::new();

    for (lane, dir) in lane_dirs(feature) {
        let kind = paths::entry_kind(&dir).map_err(|e| KittyError::io_at(&dir, e))?;
        if kind != EntryKind::Dir {
            let what = if kind == EntryKind::Symlink { "a symlink" } else { "not a directory" };
            return Err(KittyError::MigrationPrecondition {
                migration: ID.to_string(),
                reason: format!(
                    "{} is {what}; replace it with a real directory and re-run",
                    relative(&dir, &feature.dir)
                ),
            });
        }

        for entry in WalkDir::new(&dir).follow_links(false).min_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&dir).to_path_buf();
                KittyError::io_at(path, e.into())
            })?;
            let is_dir = entry.file_type().is_dir();
            let from = entry.into_path();
            let Ok(rel) = from.strip_prefix(&dir) else { continue };
            let to = tasks.join(rel);

            if is_dir {
                if let Some(first) = claimed.get(&to) {
                    return Err(collision(first, from, &to));
                }
                match paths::entry_kind(&to).map_err(|e| KittyError::io_at(&to, e))? {
                    EntryKind::Dir => {}
                    EntryKind::Missing => {
                        if planned_dirs.insert(to.clone()) {
                            plan.dirs.push(to);
                        }
                    }
                    _ => return Err(collision(&to, from, &to)),
                }
                continue;
            }

            if from.file_name().is_some_and(|n| n == PLACEHOLDER) {
                // Lane-level placeholders go away with the lane directory.
                // A nested one moves unless its directory already has one.
                let taken = claimed.contains_key(&to) || paths::entry_exists(&to);
                if from.parent() == Some(dir.as_path()) || taken {
                    plan.placeholders.push(from);
                    continue;
                }
            }

            if let Some(first) = claimed.get(&to) {
                return Err(collision(first, from, &to));
            }
            if paths::entry_exists(&to) || planned_dirs.contains(&to) {
                return Err(collision(&to, from, &to));
            }

            let is_wp = is_work_package_file(&from);
            if is_wp {
                check_lane(feature, &from, lane, &mut plan.warnings)?;
            }

            claimed.insert(to.clone(), from.clone());
            plan.moves.push(PlannedMove { from, to, lane: is_wp.then_some(lane) });
        }

        plan.lane_dirs.push(dir);
    }

    Ok(plan)
}

/// Parse a work package and warn when its frontmatter disagrees with the
/// directory it sits in. The directory wins.
fn check_lane(feature: &Feature, path: &Path, dir_lane: Lane, warnings: &mut Vec<String>) -> Result<()> {
    let doc = frontmatter::read(path)?;
    match doc.get_str("lane") {
        Some(value) if value.parse::<Lane>().ok() == Some(dir_lane) => {}
        Some(value) => warnings.push(format!(
            "{}: {} says lane '{value}' but is in {dir_lane}/; using {dir_lane}",
            feature.slug,
            relative(path, &feature.dir)
        )),
        None => {}
    }
    Ok(())
}

fn flatten_feature(feature: &Feature, base: &Path, dry_run: bool, result: &mut MigrationResult) {
    let plan = match plan_feature(feature) {
        Ok(plan) => plan,
        Err(e) => {
            result.error(format!("{}: {e}; feature left unchanged", feature.slug));
            return;
        }
    };

    if dry_run {
        for warning in plan.warnings {
            result.warn(warning);
        }
        for dir in &plan.dirs {
            result.change(format!("Would create {}", relative(dir, base)));
        }
        for mv in &plan.moves {
            result.change(format!(
                "Would move {} -> {}",
                relative(&mv.from, base),
                relative(&mv.to, base)
            ));
        }
        for dir in &plan.lane_dirs {
            result.change(format!("Would remove {}", relative(dir, base)));
        }
        return;
    }

    execute_plan(feature, plan, base, result);
}

fn execute_plan(feature: &Feature, plan: FeaturePlan, base: &Path, result: &mut MigrationResult) {
    for warning in plan.warnings {
        result.warn(warning);
    }

    for dir in &plan.dirs {
        if let Err(e) = std::fs::create_dir_all(dir) {
            result.error(format!("{}: failed to create {}: {e}", feature.slug, relative(dir, base)));
            return;
        }
        result.change(format!("Created {}", relative(dir, base)));
    }

    let mut moved: Vec<String> = Vec::new();
    for mv in &plan.moves {
        if let Err(e) = move_one(mv) {
            result.error(format!(
                "{}: failed to move {}: {e}",
                feature.slug,
                relative(&mv.from, base)
            ));
            if !moved.is_empty() {
                result.error(format!("{}: already moved: {}", feature.slug, moved.join(", ")));
            }
            return;
        }
        let change = format!("Moved {} -> {}", relative(&mv.from, base), relative(&mv.to, base));
        moved.push(relative(&mv.to, base));
        result.change(change);
    }

    for placeholder in &plan.placeholders {
        if let Err(e) = paths::remove_entry(placeholder) {
            result.warn(format!("could not remove {}: {e}", relative(placeholder, base)));
        }
    }
    for dir in &plan.lane_dirs {
        match paths::prune_empty_dirs(dir) {
            Ok(_) if !paths::entry_exists(dir) => {
                result.change(format!("Removed {}", relative(dir, base)));
            }
            Ok(_) => result.warn(format!("{} is not empty, left in place", relative(dir, base))),
            Err(e) => result.warn(format!("could not remove {}: {e}", relative(dir, base))),
        }
    }

    tracing::info!(feature = %feature.slug, moved = moved.len(), "Flattened lane directories");
}

fn move_one(mv: &PlannedMove) -> Result<()> {
    paths::move_file(&mv.from, &mv.to)?;
    if let Some(lane) = mv.lane {
        let current = frontmatter::get_field(&mv.to, "lane")?;
        if current.as_ref().and_then(frontmatter::scalar_to_string).as_deref() != Some(lane.as_str()) {
            frontmatter::update_field(&mv.to, "lane", lane.as_str())?;
        }
    }
    Ok(())
}

impl Migration for FlattenLaneDirectories {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "Move work packages out of lane subdirectories into a flat tasks/ directory"
    }

    fn target_version(&self) -> &'static str {
        "0.9.0"
    }

    fn detect(&self, root: &Path) -> bool {
        Checkouts::of(root).features().iter().any(|f| !lane_dirs(f).is_empty())
    }

    fn apply(&self, root: &Path, dry_run: bool) -> MigrationResult {
        let checkouts = Checkouts::of(root);
        let mut result = MigrationResult::new();
        for feature in checkouts.features() {
            if !lane_dirs(&feature).is_empty() {
                flatten_feature(&feature, &checkouts.main, dry_run, &mut result);
            }
        }
        result
    }
}
