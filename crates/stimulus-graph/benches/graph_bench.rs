//! Criterion benchmarks for stimulus-graph.
//!
//! ## Benchmark groups
//!
//! 1. **identifiers**: Path/identifier transforms.
//! 2. **parse**: Parsing controller sources of growing size.
//! 3. **initialize**: Cold scan of a synthetic project on disk.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/stimulus-graph/Cargo.toml
//! # Only the cold scan group:
//! cargo bench --manifest-path crates/stimulus-graph/Cargo.toml -- initialize
//! ```

use std::path::{Path, PathBuf};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use stimulus_graph::analysis::identifiers::{controller_path_for_identifier, identifier_for_path};
use stimulus_graph::indexer::parser::parse_path;
use stimulus_graph::{AnalyzerConfig, Project};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A controller declaring `members` targets, values and actions.
fn controller_source(index: usize, members: usize, base: Option<&str>) -> String {
    let mut source = String::new();
    match base {
        Some(base) => source.push_str(&format!("import Base from \"./{base}\"\n")),
        None => source.push_str("import { Controller as Base } from \"@hotwired/stimulus\"\n"),
    }
    source.push_str(&format!("export default class Controller{index} extends Base {{\n"));
    let targets: Vec<String> = (0..members).map(|i| format!("\"t{index}_{i}\"")).collect();
    source.push_str(&format!("  static targets = [{}]\n", targets.join(", ")));
    let values: Vec<String> = (0..members)
        .map(|i| format!("v{index}_{i}: {{ type: Number, default: {i} }}"))
        .collect();
    source.push_str(&format!("  static values = {{ {} }}\n", values.join(", ")));
    for i in 0..members {
        source.push_str(&format!("  action{i}(event) {{ this.v{index}_{i}Value += 1 }}\n"));
    }
    source.push_str("}\n");
    source
}

/// Lay out `count` controllers in chains of four under the default root.
fn populate_project(root: &Path, count: usize) {
    let dir = root.join("app/javascript/controllers");
    std::fs::create_dir_all(&dir).unwrap();
    let mut registrations = String::new();
    for index in 0..count {
        let base = (index % 4 != 0).then(|| format!("c{}_controller", index - 1));
        let name = format!("c{index}_controller.js");
        std::fs::write(dir.join(&name), controller_source(index, 5, base.as_deref())).unwrap();
        registrations.push_str(&format!(
            "import C{index} from \"./c{index}_controller\"\napplication.register(\"c{index}\", C{index})\n"
        ));
    }
    std::fs::write(dir.join("index.js"), registrations).unwrap();
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

fn bench_identifiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("identifiers");

    group.bench_function("identifier_for_path_nested", |b| {
        b.iter(|| identifier_for_path(black_box("admin/users/date_picker_controller.ts")));
    });

    group.bench_function("controller_path_round_trip", |b| {
        b.iter(|| {
            controller_path_for_identifier(&identifier_for_path(black_box(
                "a/bunch/of/levels/some_controller.js",
            )))
        });
    });

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    let path = PathBuf::from("/bench/app/javascript/controllers/x_controller.js");

    for &members in &[1, 10, 100] {
        let source = controller_source(0, members, Some("base_controller"));
        group.bench_with_input(BenchmarkId::new("controller", members), &source, |b, source| {
            b.iter(|| parse_path(&path, black_box(source.clone())).unwrap());
        });
    }

    group.finish();
}

fn bench_initialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("initialize");
    group.sample_size(10);

    for &count in &[10, 100] {
        let tmp = tempfile::tempdir().unwrap();
        populate_project(tmp.path(), count);
        group.bench_with_input(BenchmarkId::new("cold_scan", count), tmp.path(), |b, root| {
            b.iter(|| {
                let project = Project::with_config(root, AnalyzerConfig::default()).unwrap();
                black_box(project.initialize().unwrap());
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Register all benchmark groups
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_identifiers, bench_parse, bench_initialize);
criterion_main!(benches);
