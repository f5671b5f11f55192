// voxnav query profiler — CLI entry point.
//
// Builds a chunk layout (procedural noise terrain, or whatever a JSON config
// describes), then runs the same batch of random start/goal pairs through every
// requested algorithm, heuristic and graph layer, and prints one summary row
// per combination. Set `RUST_LOG=info` with `--benchmark` to also get the
// per-search summaries from the library.
//
// Usage:
//   cargo run -p voxnav_profile --profile profile-release -- [config.json]
//     [--seed N] [--chunks N] [--queries N] [--algorithm astar|theta|all]
//     [--heuristic NAME|all] [--layer grid|surface|both] [--benchmark]
//
// Heuristics: euclidean, manhattan, chebyshev, octile

use glam::Vec3;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::process::ExitCode;
use std::time::Instant;
use voxnav_core::config::{Algorithm, NavConfig, PathfindingSettings};
use voxnav_core::heuristics::Heuristic;
use voxnav_core::search::SearchStats;
use voxnav_core::types::Aabb;
use voxnav_core::{Navigator, PathResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Layer {
    Grid,
    Surface,
}

impl Layer {
    fn name(self) -> &'static str {
        match self {
            Layer::Grid => "grid",
            Layer::Surface => "surface",
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    let config_path = args.get(1).filter(|s| !s.starts_with("--"));
    let seed: i32 = parse_flag(&args, "--seed").unwrap_or(1);
    let chunks: u32 = parse_flag(&args, "--chunks").unwrap_or(2);
    let queries: usize = parse_flag(&args, "--queries").unwrap_or(50);
    let algorithm_name: String = parse_flag(&args, "--algorithm").unwrap_or_else(|| "all".to_string());
    let heuristic_name: String = parse_flag(&args, "--heuristic").unwrap_or_else(|| "euclidean".to_string());
    let layer_name: String = parse_flag(&args, "--layer").unwrap_or_else(|| "both".to_string());
    let benchmark = args.iter().any(|a| a == "--benchmark");

    let Some(algorithms) = parse_algorithms(&algorithm_name) else {
        eprintln!("unknown algorithm '{algorithm_name}' (expected astar, theta or all)");
        return ExitCode::FAILURE;
    };
    let Some(heuristics) = parse_heuristics(&heuristic_name) else {
        eprintln!("unknown heuristic '{heuristic_name}'");
        return ExitCode::FAILURE;
    };
    let Some(layers) = parse_layers(&layer_name) else {
        eprintln!("unknown layer '{layer_name}' (expected grid, surface or both)");
        return ExitCode::FAILURE;
    };

    let config = match config_path {
        Some(path) => match NavConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => NavConfig::procedural(seed, [chunks, 1, chunks]),
    };

    println!("=== voxnav query profiler ===");
    match config_path {
        Some(path) => println!("Config: {path}"),
        None => println!("Config: procedural noise, seed {seed}"),
    }
    println!("Chunks: {:?} of {}", config.layout.chunk_count, config.grid.chunk_size);
    println!("Queries per combination: {queries}");
    println!();

    println!("[1/2] Generating layout...");
    let started = Instant::now();
    let mut nav = Navigator::build(&config, Vec::new());
    let layout = nav.layout();
    println!(
        "  {:.1} ms: {} grid nodes, {} triangles, {} surface nodes",
        started.elapsed().as_secs_f64() * 1000.0,
        layout.grid_node_count(),
        layout.triangle_count(),
        layout.graph_node_count()
    );
    info!("layout bounds {:?}", layout.bounds());

    let mut rng = StdRng::seed_from_u64(seed as u64);
    let bounds = layout.bounds();
    let pairs: Vec<(Vec3, Vec3)> = (0..queries)
        .map(|_| (random_point(&mut rng, &bounds), random_point(&mut rng, &bounds)))
        .collect();

    println!();
    println!("[2/2] Running queries...");
    println!(
        "  {:<8} {:<7} {:<10} {:>9} {:>10} {:>10} {:>10} {:>12}",
        "layer", "algo", "heuristic", "found", "avg ms", "avg pts", "avg closed", "avg checks"
    );
    for &layer in &layers {
        for &algorithm in &algorithms {
            for &heuristic in &heuristics {
                nav.set_settings(PathfindingSettings {
                    algorithm,
                    heuristic,
                    benchmark,
                    ..config.pathfinding.clone()
                });
                let row = run_batch(&mut nav, layer, &pairs);
                let n = pairs.len().max(1) as f64;
                println!(
                    "  {:<8} {:<7} {:<10} {:>4}/{:<4} {:>10.3} {:>10.1} {:>10.1} {:>12.1}",
                    layer.name(),
                    algorithm.to_string(),
                    heuristic.to_string(),
                    row.found,
                    pairs.len(),
                    row.stats.elapsed.as_secs_f64() * 1000.0 / n,
                    row.waypoints as f64 / row.found.max(1) as f64,
                    row.stats.closed as f64 / n,
                    row.stats.neighbor_checks as f64 / n
                );
            }
        }
    }
    ExitCode::SUCCESS
}

#[derive(Default)]
struct BatchResult {
    found: usize,
    waypoints: usize,
    stats: SearchStats,
}

fn run_batch(nav: &mut Navigator, layer: Layer, pairs: &[(Vec3, Vec3)]) -> BatchResult {
    let mut batch = BatchResult::default();
    for &(start, goal) in pairs {
        let started = Instant::now();
        let result: PathResult = match layer {
            Layer::Grid => nav.find_grid_path(start, goal),
            Layer::Surface => nav.find_graph_path(start, goal),
        };
        let mut stats = result.stats;
        stats.elapsed = started.elapsed();
        batch.stats.accumulate(&stats);
        if result.is_found() {
            batch.found += 1;
            batch.waypoints += result.len();
        }
    }
    batch
}

fn random_point(rng: &mut StdRng, bounds: &Aabb) -> Vec3 {
    Vec3::new(
        rng.gen_range(bounds.min.x..bounds.max.x),
        rng.gen_range(bounds.min.y..bounds.max.y),
        rng.gen_range(bounds.min.z..bounds.max.z),
    )
}

fn parse_algorithms(name: &str) -> Option<Vec<Algorithm>> {
    match name {
        "astar" => Some(vec![Algorithm::AStar]),
        "theta" => Some(vec![Algorithm::ThetaStar]),
        "all" => Some(vec![Algorithm::AStar, Algorithm::ThetaStar]),
        _ => None,
    }
}

fn parse_heuristics(name: &str) -> Option<Vec<Heuristic>> {
    if name == "all" {
        return Some(Heuristic::ALL.to_vec());
    }
    Heuristic::ALL
        .into_iter()
        .find(|h| h.to_string() == name)
        .map(|h| vec![h])
}

fn parse_layers(name: &str) -> Option<Vec<Layer>> {
    match name {
        "grid" => Some(vec![Layer::Grid]),
        "surface" => Some(vec![Layer::Surface]),
        "both" => Some(vec![Layer::Grid, Layer::Surface]),
        _ => None,
    }
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
