//! Kitty - work package workflow for kittify projects.
//!
//! A thin front end over the `kittify` library: every command resolves the
//! project context, delegates to one library operation and renders the
//! structured result as text or JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kittify::context::list_worktrees;
use kittify::migration::{Applicability, UpgradeOptions};
use kittify::workflow::RollbackOutcome;
use kittify::{
    Actor, Approval, Config, Feature, Lane, ProjectMetadata, Registry, RepoContext, TaskBoard,
    TransitionOptions, TransitionOutcome, UpgradeReport,
};

/// Work package workflow for kittify projects
#[derive(Parser)]
#[command(name = "kitty")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Show what would change without writing anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Feature to operate on (defaults to the one detected from branch or directory)
    #[arg(short, long, global = true)]
    feature: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a kittify project in the current directory
    Init {
        /// Directory to initialize
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Re-create metadata even if the project already exists
        #[arg(long)]
        force: bool,
    },

    /// Move a work package to another lane
    Move {
        /// Work package id, e.g. WP01
        wp_id: String,

        /// Target lane (planned, doing, for_review, done)
        lane: Lane,

        #[command(flatten)]
        identity: Identity,

        /// History note recorded instead of the default action text
        #[arg(short, long)]
        note: Option<String>,

        /// Refuse to write unless the file still has this content hash
        #[arg(long)]
        expected_hash: Option<String>,
    },

    /// Approve a work package that is awaiting review
    Approve {
        /// Work package id, e.g. WP01
        wp_id: String,

        #[command(flatten)]
        identity: Identity,

        /// Review status to record (defaults to the configured one)
        #[arg(long)]
        status: Option<String>,

        /// Lane to move the work package to
        #[arg(long, default_value = "done")]
        target: Lane,

        /// History note recorded instead of the default action text
        #[arg(short, long)]
        note: Option<String>,

        /// Refuse to write unless the file still has this content hash
        #[arg(long)]
        expected_hash: Option<String>,
    },

    /// Undo the most recent transition of a work package
    Rollback {
        /// Work package id, e.g. WP01
        wp_id: String,
    },

    /// Show work packages grouped by lane
    List,

    /// Apply pending layout migrations
    Upgrade,

    /// List migrations and whether they apply to this project
    Migrations,

    /// Show the resolved project context
    Context,
}

/// Who is acting.
#[derive(clap::Args)]
struct Identity {
    /// Agent name recorded in the work package
    #[arg(short, long, env = "KITTY_AGENT", default_value = "user")]
    agent: String,

    /// Shell process id recorded with the agent
    #[arg(long, env = "KITTY_SHELL_PID")]
    shell_pid: Option<String>,
}

impl Identity {
    fn actor(&self) -> Actor {
        Actor::new(&self.agent, self.shell_pid.clone())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    match &cli.command {
        Commands::Init { path, force } => cmd_init(&cli, path, *force),
        Commands::Move { wp_id, lane, identity, note, expected_hash } => {
            let options = transition_options(&cli, note, expected_hash);
            cmd_move(&cli, wp_id, *lane, &identity.actor(), &options)
        }
        Commands::Approve { wp_id, identity, status, target, note, expected_hash } => {
            let options = transition_options(&cli, note, expected_hash);
            cmd_approve(&cli, wp_id, identity.actor(), status.as_deref(), *target, &options)
        }
        Commands::Rollback { wp_id } => cmd_rollback(&cli, wp_id),
        Commands::List => cmd_list(&cli),
        Commands::Upgrade => cmd_upgrade(&cli),
        Commands::Migrations => cmd_migrations(&cli),
        Commands::Context => cmd_context(&cli),
    }
}

fn transition_options(
    cli: &Cli,
    note: &Option<String>,
    expected_hash: &Option<String>,
) -> TransitionOptions {
    TransitionOptions {
        note: note.clone(),
        dry_run: cli.dry_run,
        expected_hash: expected_hash.clone(),
    }
}

/// Resolve the project from the working directory.
fn context() -> Result<RepoContext> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(RepoContext::resolve(&cwd)?)
}

/// Resolve the project and refuse to run against a mismatched layout version.
fn gated_context() -> Result<RepoContext> {
    let ctx = context()?;
    kittify::check_compatibility(kittify::VERSION, &ctx.main_root).into_result()?;
    Ok(ctx)
}

fn open_feature(cli: &Cli, ctx: &RepoContext) -> Result<Feature> {
    let slug = ctx.feature_or(cli.feature.as_deref())?;
    Ok(Feature::open(&ctx.root, &slug)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize a project.
fn cmd_init(cli: &Cli, path: &Path, force: bool) -> Result<()> {
    let root = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    if kittify::context::has_marker(&root) && !force {
        if let Some(metadata) = ProjectMetadata::load(&root)? {
            if cli.json {
                return print_json(&metadata);
            }
            println!("Already initialized at {} (version {})", root.display(), metadata.version);
            return Ok(());
        }
    }

    if cli.dry_run {
        println!("[DRY RUN] Would initialize {}", root.display());
        return Ok(());
    }

    let metadata = ProjectMetadata::init(&root, kittify::VERSION)?;
    if !Config::path(&root).is_file() {
        Config::default().save(&root)?;
    }
    let config = Config::load(&root)?;
    let specs = config.specs_root(&root);
    std::fs::create_dir_all(&specs)
        .with_context(|| format!("Failed to create {}", specs.display()))?;

    if cli.json {
        return print_json(&metadata);
    }
    println!("Initialized kittify {} project in {}", metadata.version, root.display());
    Ok(())
}

/// Move a work package.
fn cmd_move(
    cli: &Cli,
    wp_id: &str,
    lane: Lane,
    actor: &Actor,
    options: &TransitionOptions,
) -> Result<()> {
    let ctx = gated_context()?;
    let feature = open_feature(cli, &ctx)?;
    let outcome = kittify::move_work_package(&feature, wp_id, lane, actor, options)?;
    print_transition(cli, &outcome)
}

/// Approve a work package.
fn cmd_approve(
    cli: &Cli,
    wp_id: &str,
    reviewer: Actor,
    status: Option<&str>,
    target: Lane,
    options: &TransitionOptions,
) -> Result<()> {
    let ctx = gated_context()?;
    let feature = open_feature(cli, &ctx)?;
    let status = match status {
        Some(s) => s.to_string(),
        None => ctx.config()?.workflow.default_review_status,
    };
    let approval = Approval::new(reviewer).with_status(status).with_target(target);
    let outcome = kittify::approve(&feature, wp_id, &approval, options)?;
    print_transition(cli, &outcome)
}

fn print_transition(cli: &Cli, outcome: &TransitionOutcome) -> Result<()> {
    if cli.json {
        return print_json(outcome);
    }

    let from = outcome.from_lane.map_or("(none)", |l| l.as_str());
    if outcome.dry_run {
        println!("[DRY RUN] Would move {}: {} -> {}", outcome.wp_id, from, outcome.to_lane);
        println!("  File: {}", outcome.path.display());
        println!("  Agent: {}", outcome.agent);
        if let Some(pid) = &outcome.shell_pid {
            println!("  Shell PID: {pid}");
        }
        if let Some(status) = &outcome.review_status {
            println!("  Review status: {status}");
        }
        println!("  History entry: {}", outcome.history_entry.action);
        println!("  Content hash: {}", outcome.content_hash);
        return Ok(());
    }

    println!("{}: {} -> {} ({})", outcome.wp_id, from, outcome.to_lane, outcome.agent);
    Ok(())
}

/// Roll back a work package.
fn cmd_rollback(cli: &Cli, wp_id: &str) -> Result<()> {
    let ctx = gated_context()?;
    let feature = open_feature(cli, &ctx)?;

    if cli.dry_run {
        let wp = feature.find(wp_id)?;
        println!("[DRY RUN] Would remove the last of {} history entries", wp.history().len());
        return Ok(());
    }

    let outcome: RollbackOutcome = kittify::rollback(&feature, wp_id)?;
    if cli.json {
        return print_json(&outcome);
    }
    println!(
        "{}: rolled back '{}', now {}",
        outcome.wp_id, outcome.removed.action, outcome.restored_lane
    );
    Ok(())
}

/// Show the task board.
fn cmd_list(cli: &Cli) -> Result<()> {
    let ctx = gated_context()?;
    let feature = open_feature(cli, &ctx)?;
    let board: TaskBoard = kittify::list_tasks(&feature)?;

    if cli.json {
        return print_json(&board);
    }

    println!("Feature: {}\n", board.feature);
    for lane in Lane::ALL {
        let tasks = board.lane(lane);
        println!("{} ({}):", lane.label(), tasks.len());
        for task in tasks {
            let agent = task.agent.as_deref().map(|a| format!(" [{a}]")).unwrap_or_default();
            println!("  - {} {}{}", task.id, task.title.as_deref().unwrap_or(""), agent);
        }
        println!();
    }
    for warning in &board.warnings {
        println!("warning: {warning}");
    }
    println!("Total: {} work packages", board.total());
    Ok(())
}

/// Apply pending migrations.
fn cmd_upgrade(cli: &Cli) -> Result<()> {
    let ctx = context()?;
    let options = UpgradeOptions { dry_run: cli.dry_run, ..UpgradeOptions::default() };
    let report: UpgradeReport = kittify::upgrade(&ctx.main_root, &Registry::builtin(), &options)?;

    if cli.json {
        print_json(&report)?;
    } else {
        print_upgrade(&report);
    }

    if !report.success() {
        anyhow::bail!("Migrations failed: {}", report.failed().join(", "));
    }
    Ok(())
}

fn print_upgrade(report: &UpgradeReport) {
    let prefix = if report.dry_run { "[DRY RUN] " } else { "" };
    println!(
        "{prefix}Upgrading from {}",
        report.from_version.as_deref().unwrap_or("unknown version")
    );

    for outcome in &report.applied {
        let status = if outcome.result.success { "ok" } else { "FAILED" };
        println!("\n{} [{status}]", outcome.id);
        for change in &outcome.result.changes {
            println!("  {change}");
        }
        for warning in &outcome.result.warnings {
            println!("  warning: {warning}");
        }
        for error in &outcome.result.errors {
            println!("  error: {error}");
        }
    }

    if report.applied.is_empty() {
        println!("Nothing to migrate.");
    }
    if let Some(version) = &report.to_version {
        println!("\n{prefix}Project version: {version}");
    }
}

/// List migrations and their status.
fn cmd_migrations(cli: &Cli) -> Result<()> {
    #[derive(Serialize)]
    struct Row {
        id: &'static str,
        target_version: &'static str,
        description: &'static str,
        applied: bool,
        detected: bool,
        blocked: Option<String>,
    }

    let ctx = context()?;
    let root = &ctx.main_root;
    let metadata = ProjectMetadata::load(root)?;
    let registry = Registry::builtin();

    let rows: Vec<Row> = registry
        .iter()
        .map(|m| {
            let detected = m.detect(root);
            let check = if detected { m.can_apply(root) } else { Applicability::ok() };
            Row {
                id: m.id(),
                target_version: m.target_version(),
                description: m.description(),
                applied: metadata.as_ref().is_some_and(|md| md.has_applied(m.id())),
                detected,
                blocked: check.reason,
            }
        })
        .collect();

    if cli.json {
        return print_json(&rows);
    }
    for row in &rows {
        let state = match (&row.blocked, row.detected, row.applied) {
            (Some(_), _, _) => "blocked",
            (None, true, _) => "pending",
            (None, false, true) => "applied",
            (None, false, false) => "not needed",
        };
        println!("{:<34} {:<8} {:<11} {}", row.id, row.target_version, state, row.description);
        if let Some(reason) = &row.blocked {
            println!("  {reason}");
        }
    }
    Ok(())
}

/// Show the resolved context.
fn cmd_context(cli: &Cli) -> Result<()> {
    #[derive(Serialize)]
    struct ContextView<'a> {
        #[serde(flatten)]
        context: &'a RepoContext,
        worktrees: Vec<PathBuf>,
        version: kittify::VersionCheck,
    }

    let ctx = context()?;
    let config = ctx.config()?;
    let view = ContextView {
        context: &ctx,
        worktrees: list_worktrees(&ctx.main_root, &config.layout.worktrees_dir),
        version: kittify::check_compatibility(kittify::VERSION, &ctx.main_root),
    };

    if cli.json {
        return print_json(&view);
    }

    println!("Root:      {}", ctx.root.display());
    println!("Main repo: {}", ctx.main_root.display());
    println!("Worktree:  {}", if ctx.is_worktree { "yes" } else { "no" });
    println!("Feature:   {}", ctx.feature.as_deref().unwrap_or("(none)"));
    if !view.worktrees.is_empty() {
        println!("Worktrees:");
        for wt in &view.worktrees {
            println!("  {}", wt.display());
        }
    }
    if let Some(suggestion) = view.version.suggestion() {
        println!("Version:   {suggestion}");
    }
    Ok(())
}
