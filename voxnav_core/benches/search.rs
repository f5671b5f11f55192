// Criterion benchmarks for layout generation and path queries.
//
// Run with: cargo bench -p voxnav_core
//
// Generation covers the full pipeline (grid sampling, grid stitching, marching
// cubes, surface graphs, graph stitching) on the procedural noise layout.
// Query benches reuse one generated `Navigator` and a fixed set of
// start/goal pairs spread across the layout diagonal.

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use glam::Vec3;
use std::hint::black_box;
use voxnav_core::Navigator;
use voxnav_core::chunk::ChunkLayout;
use voxnav_core::config::{Algorithm, NavConfig, PathfindingSettings};
use voxnav_core::field::ConfiguredField;
use voxnav_core::heuristics::Heuristic;

const SEED: i32 = 7;

fn query_pairs(nav: &Navigator, count: usize) -> Vec<(Vec3, Vec3)> {
    let bounds = nav.layout().bounds();
    let size = bounds.max - bounds.min;
    (0..count)
        .map(|i| {
            let t = (i as f32 + 0.5) / count as f32;
            let start = bounds.min + size * Vec3::new(0.1, 0.5, t * 0.8 + 0.1);
            let goal = bounds.min + size * Vec3::new(0.9, 0.5, 0.9 - t * 0.8);
            (start, goal)
        })
        .collect()
}

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    group.sample_size(10);

    for chunks in [1u32, 2, 3] {
        let config = NavConfig::procedural(SEED, [chunks, 1, chunks]);
        let field = ConfiguredField::from_settings(&config.grid.field, Vec::new());
        group.throughput(Throughput::Elements(u64::from(chunks * chunks)));
        group.bench_function(format!("procedural_{chunks}x1x{chunks}"), |b| {
            b.iter(|| {
                let mut layout = ChunkLayout::new(&config.grid, &config.layout);
                layout.generate(&field);
                black_box(layout.graph_node_count())
            })
        });
    }

    group.finish();
}

fn bench_grid_queries(c: &mut Criterion) {
    let config = NavConfig::procedural(SEED, [2, 1, 2]);
    let mut nav = Navigator::build(&config, Vec::new());
    let pairs = query_pairs(&nav, 8);

    let mut group = c.benchmark_group("grid_query");
    group.sample_size(20);
    group.throughput(Throughput::Elements(pairs.len() as u64));

    for algorithm in [Algorithm::AStar, Algorithm::ThetaStar] {
        for heuristic in [Heuristic::Euclidean, Heuristic::Octile] {
            nav.set_settings(PathfindingSettings {
                algorithm,
                heuristic,
                ..PathfindingSettings::default()
            });
            let name = format!("{}_{heuristic}", algorithm_slug(algorithm));
            group.bench_function(name, |b| {
                b.iter(|| {
                    for &(start, goal) in &pairs {
                        black_box(nav.find_grid_path(black_box(start), black_box(goal)));
                    }
                })
            });
        }
    }

    group.finish();
}

fn bench_surface_queries(c: &mut Criterion) {
    let config = NavConfig::procedural(SEED, [2, 1, 2]);
    let mut nav = Navigator::build(&config, Vec::new());
    let pairs = query_pairs(&nav, 8);

    let mut group = c.benchmark_group("surface_query");
    group.sample_size(20);
    group.throughput(Throughput::Elements(pairs.len() as u64));

    for algorithm in [Algorithm::AStar, Algorithm::ThetaStar] {
        nav.set_settings(PathfindingSettings {
            algorithm,
            ..PathfindingSettings::default()
        });
        group.bench_function(algorithm_slug(algorithm), |b| {
            b.iter(|| {
                for &(start, goal) in &pairs {
                    black_box(nav.find_graph_path(black_box(start), black_box(goal)));
                }
            })
        });
    }

    group.finish();
}

fn algorithm_slug(algorithm: Algorithm) -> &'static str {
    match algorithm {
        Algorithm::AStar => "astar",
        Algorithm::ThetaStar => "theta",
    }
}

criterion_group!(benches, bench_generation, bench_grid_queries, bench_surface_queries);
criterion_main!(benches);
