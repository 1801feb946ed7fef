//! Performance benchmarks for kittify.
//!
//! This module contains benchmarks for:
//! - Frontmatter parsing and canonical rendering
//! - Work package lookup in large features
//! - Migration detection over many features
//!
//! Run with: `cargo bench`

use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kittify::migration::migrations::{FlattenLaneDirectories, NormalizeFrontmatter};
use kittify::{list_tasks, Document, Feature, Migration};

// ============================================================================
// Mock Data Fixtures
// ============================================================================

mod fixtures {
    use std::fmt::Write;
    use std::path::Path;

    const LANES: [&str; 4] = ["planned", "doing", "for_review", "done"];

    /// A work package with `entries` history entries and a few custom fields.
    pub fn work_package(id: usize, entries: usize) -> String {
        let lane = LANES[id % LANES.len()];
        let mut out = format!(
            "---\nwork_package_id: WP{id:02}\ntitle: Work package {id}\nlane: {lane}\n\
             priority: {}\nsubtasks:\n- T{id:03}1\n- T{id:03}2\nhistory:\n",
            id % 3
        );
        for i in 0..entries {
            let _ = write!(
                out,
                "- timestamp: 2025-01-{:02}T10:00:00Z\n  lane: {}\n  agent: agent-{i}\n  \
                 shell_pid: {}\n  action: Step {i}\n",
                i % 28 + 1,
                LANES[i % LANES.len()],
                1000 + i
            );
        }
        out.push_str("---\n# Objective\n\nImplement the thing.\n\n## Subtasks\n\n- [ ] T1\n- [ ] T2\n");
        out
    }

    /// A project with `features` features of `per_feature` work packages each.
    pub fn project(root: &Path, features: usize, per_feature: usize, legacy: bool) {
        std::fs::create_dir_all(root.join(".kittify")).expect("Failed to create marker");
        for f in 0..features {
            let tasks = root.join(format!("kitty-specs/{f:03}-feature/tasks"));
            for id in 1..=per_feature {
                let dir = if legacy { tasks.join(LANES[id % LANES.len()]) } else { tasks.clone() };
                std::fs::create_dir_all(&dir).expect("Failed to create tasks dir");
                std::fs::write(dir.join(format!("WP{id:02}.md")), work_package(id, 4))
                    .expect("Failed to write work package");
            }
        }
    }
}

// ============================================================================
// Frontmatter Benchmarks
// ============================================================================

fn bench_frontmatter(c: &mut Criterion) {
    let mut group = c.benchmark_group("frontmatter");

    for entries in [1, 10, 100] {
        let content = fixtures::work_package(1, entries);
        group.throughput(Throughput::Bytes(content.len() as u64));

        group.bench_with_input(BenchmarkId::new("parse", entries), &content, |b, content| {
            b.iter(|| Document::parse(black_box(content), Path::new("WP01.md")));
        });

        let doc = Document::parse(&content, Path::new("WP01.md")).expect("fixture parses");
        group.bench_with_input(BenchmarkId::new("render", entries), &doc, |b, doc| {
            b.iter(|| black_box(doc).render());
        });
    }

    group.finish();
}

// ============================================================================
// Workflow Benchmarks
// ============================================================================

fn bench_feature_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("workflow");
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    for per_feature in [10, 50] {
        let root = temp_dir.path().join(format!("project_{per_feature}"));
        fixtures::project(&root, 1, per_feature, false);
        let feature = Feature::at(root.join("kitty-specs/000-feature"));

        group.bench_with_input(BenchmarkId::new("find_last", per_feature), &feature, |b, f| {
            let id = format!("WP{per_feature:02}");
            b.iter(|| f.find(black_box(&id)));
        });
        group.bench_with_input(BenchmarkId::new("list_tasks", per_feature), &feature, |b, f| {
            b.iter(|| list_tasks(black_box(f)));
        });
    }

    group.finish();
}

// ============================================================================
// Migration Benchmarks
// ============================================================================

fn bench_migration_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("migration/detect");
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    let legacy = temp_dir.path().join("legacy");
    fixtures::project(&legacy, 20, 10, true);
    let flat = temp_dir.path().join("flat");
    fixtures::project(&flat, 20, 10, false);

    group.bench_function("flatten_legacy", |b| {
        b.iter(|| FlattenLaneDirectories.detect(black_box(&legacy)));
    });
    group.bench_function("flatten_flat", |b| {
        b.iter(|| FlattenLaneDirectories.detect(black_box(&flat)));
    });
    group.bench_function("normalize_flat", |b| {
        b.iter(|| NormalizeFrontmatter.detect(black_box(&flat)));
    });

    group.finish();
}

// ============================================================================
// Criterion Groups and Main
// ============================================================================

criterion_group!(frontmatter_benches, bench_frontmatter,);

criterion_group!(workflow_benches, bench_feature_lookup,);

criterion_group!(migration_benches, bench_migration_detect,);

criterion_main!(frontmatter_benches, workflow_benches, migration_benches,);
