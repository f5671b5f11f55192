// End-to-end scenarios: grid search shapes, stitching symmetry across a real
// layout, surface extraction closure, and full `Navigator` queries built from
// configuration.

use glam::Vec3;
use proptest::prelude::*;
use voxnav_core::astar::astar;
use voxnav_core::chunk::ChunkLayout;
use voxnav_core::config::{GridSettings, LayoutSettings, NavConfig, PathfindingSettings};
use voxnav_core::field::Obstacle;
use voxnav_core::graph::NodeGraph;
use voxnav_core::grid::Grid;
use voxnav_core::heuristics::Heuristic;
use voxnav_core::marching_cubes;
use voxnav_core::mesh::TriangleMesh;
use voxnav_core::mesh_graph::MeshVertexGraph;
use voxnav_core::planner::Navigator;
use voxnav_core::search::SearchParams;
use voxnav_core::surface::SurfaceQuery;
use voxnav_core::types::{Aabb, ChunkId, GridIndex, NodeRef, PositionKey};

const ISO_LEVEL: f32 = 0.5;

fn cube_grid<F: Fn(Vec3) -> f32 + Sync>(field: F) -> Grid {
    let bounds = Aabb::from_min_size(Vec3::ZERO, Vec3::splat(10.0));
    Grid::new(ChunkId(0), bounds, Vec3::ONE, true, &field)
}

fn exact_params() -> SearchParams {
    SearchParams {
        greediness: 0.0,
        bucket_range: Some(0.01),
        walkable_above: ISO_LEVEL,
        ..SearchParams::default()
    }
}

fn at(grid: &Grid, x: u32, y: u32, z: u32) -> NodeRef {
    grid.node_ref(GridIndex::new(x, y, z)).unwrap()
}

// ---------------------------------------------------------------------------
// Grid search
// ---------------------------------------------------------------------------

#[test]
fn open_cube_diagonal_path() {
    let mut grid = cube_grid(|_| 1.0);
    let (start, goal) = (at(&grid, 0, 0, 0), at(&grid, 9, 9, 9));
    let result = astar(&mut grid, start, goal, &exact_params());

    assert_eq!(result.len(), 10);
    let expected = 9.0 * 3f32.sqrt();
    assert!((result.stats.path_length - expected).abs() < 1e-3);
    assert!((result.total_cost - expected).abs() < 1e-3);
    for (i, p) in result.positions.iter().enumerate() {
        assert_eq!(*p, Vec3::splat(i as f32));
    }
}

#[test]
fn wall_with_single_gap_forces_path_through_gap() {
    let gap = Vec3::splat(5.0);
    let mut grid = cube_grid(move |p| if p.x == 5.0 && p != gap { 0.0 } else { 1.0 });
    let (start, goal) = (at(&grid, 0, 0, 0), at(&grid, 9, 9, 9));
    let result = astar(&mut grid, start, goal, &exact_params());

    assert!(result.is_found());
    assert!(result.positions.contains(&gap));
    assert_eq!(result.positions.iter().filter(|p| p.x == 5.0).count(), 1);
}

#[test]
fn sealed_wall_is_unreachable() {
    let mut grid = cube_grid(|p| if p.x == 5.0 { 0.0 } else { 1.0 });
    let (start, goal) = (at(&grid, 0, 0, 0), at(&grid, 9, 9, 9));
    let result = astar(&mut grid, start, goal, &exact_params());

    assert!(!result.is_found());
    // Everything on the near side of the wall gets closed.
    assert_eq!(result.stats.closed, 500);
    assert!(grid.nodes().all(|(_, n)| n.search.is_cleared()));
}

#[test]
fn informed_search_matches_exhaustive_cost() {
    // Pillars every third column, leaving winding corridors.
    let field = |p: Vec3| {
        let pillar = (p.x as i32 % 3 == 1) && (p.z as i32 % 3 == 1) && p.y < 8.0;
        if pillar { 0.0_f32 } else { 1.0 }
    };
    for heuristic in [Heuristic::Euclidean, Heuristic::Octile] {
        for (goal_x, goal_y, goal_z) in [(9, 0, 9), (8, 3, 2), (2, 7, 9)] {
            let mut grid = cube_grid(field);
            let (start, goal) = (at(&grid, 0, 0, 0), at(&grid, goal_x, goal_y, goal_z));
            let exhaustive = astar(&mut grid, start, goal, &exact_params());
            let informed_params = SearchParams {
                heuristic,
                greediness: 0.5,
                ..exact_params()
            };
            let informed = astar(&mut grid, start, goal, &informed_params);

            assert!(exhaustive.is_found() && informed.is_found());
            assert!(
                informed.total_cost <= exhaustive.total_cost + 0.1,
                "{heuristic}: {} vs {}",
                informed.total_cost,
                exhaustive.total_cost
            );
        }
    }
}

#[test]
fn identical_queries_give_identical_paths() {
    let field = |p: Vec3| if p.y < 2.0 && p.x > 3.0 { 0.0_f32 } else { 1.0 };
    let mut grid = cube_grid(field);
    let (start, goal) = (at(&grid, 0, 0, 0), at(&grid, 9, 3, 4));
    let first = astar(&mut grid, start, goal, &exact_params());
    let second = astar(&mut grid, start, goal, &exact_params());
    assert!(first.is_found());
    assert_eq!(first.positions, second.positions);
    assert_eq!(first.stats.iterations, second.stats.iterations);
}

// ---------------------------------------------------------------------------
// Surface graph
// ---------------------------------------------------------------------------

#[test]
fn two_triangles_sharing_an_edge_make_four_nodes() {
    let mesh = TriangleMesh::new(
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::new(2.0, 0.0, 2.0),
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::new(2.0, 0.0, 0.0),
        ],
        vec![[0, 1, 2], [3, 4, 5]],
    );
    let graph = MeshVertexGraph::new(ChunkId(0), Aabb::from_min_size(Vec3::ZERO, Vec3::splat(4.0)), &mesh);
    assert_eq!(graph.len(), 4);

    let a = graph.find_exact(PositionKey::from_position(Vec3::new(2.0, 0.0, 0.0))).unwrap();
    let b = graph.find_exact(PositionKey::from_position(Vec3::new(0.0, 0.0, 2.0))).unwrap();
    let (ra, rb) = (NodeRef::new(ChunkId(0), a), NodeRef::new(ChunkId(0), b));
    assert!(graph.node(ra).unwrap().has_neighbor(rb));
    assert!(graph.node(rb).unwrap().has_neighbor(ra));
}

#[test]
fn uniform_cells_emit_no_triangles() {
    assert_eq!(marching_cubes::cell_type(&[0.0; 8], ISO_LEVEL), 255);
    assert!(marching_cubes::cell_triangles(&[0.0; 8], ISO_LEVEL).is_empty());
    assert_eq!(marching_cubes::cell_type(&[1.0; 8], ISO_LEVEL), 0);
    assert!(marching_cubes::cell_triangles(&[1.0; 8], ISO_LEVEL).is_empty());
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

fn hills_layout() -> ChunkLayout {
    let settings = GridSettings {
        chunk_size: Vec3::splat(6.0),
        ..GridSettings::default()
    };
    let layout = LayoutSettings {
        chunk_count: [2, 1, 2],
        origin: Vec3::new(-6.0, 0.0, -6.0),
    };
    let mut chunks = ChunkLayout::new(&settings, &layout);
    chunks.generate(&|p: Vec3| {
        let height = 2.2 + (p.x * 0.7).sin() + (p.z * 0.5).cos();
        if p.y < height { 0.0_f32 } else { 1.0_f32 }
    });
    chunks
}

fn assert_symmetric<G: NodeGraph>(layer: &G) -> usize {
    let mut cross = 0;
    for (id, node) in layer.nodes() {
        for &other in &node.neighbors {
            if other.chunk == id.chunk {
                continue;
            }
            cross += 1;
            let back = layer.node(other).expect("cross-chunk neighbor resolves");
            assert!(back.has_neighbor(id), "{other} does not link back to {id}");
        }
    }
    cross
}

#[test]
fn stitching_is_symmetric_on_both_layers() {
    let mut layout = hills_layout();
    assert!(assert_symmetric(&layout.grid_layer()) > 0);
    assert!(assert_symmetric(&layout.mesh_layer()) > 0);
}

#[test]
fn layer_search_crosses_chunks() {
    let mut layout = hills_layout();
    let mut layer = layout.grid_layer();
    let start = layer.closest_node(Vec3::new(-5.0, 5.0, -5.0)).unwrap();
    let goal = layer.closest_node(Vec3::new(5.0, 5.0, 5.0)).unwrap();
    assert_ne!(start.chunk, goal.chunk);

    let params = SearchParams {
        walkable_above: ISO_LEVEL,
        ..SearchParams::default()
    };
    let result = astar(&mut layer, start, goal, &params);
    assert!(result.is_found());
    let chunks: std::collections::BTreeSet<u32> = result.nodes.iter().map(|n| n.chunk.0).collect();
    assert!(chunks.len() >= 2);
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

#[test]
fn navigator_routes_around_an_obstacle() {
    let config = NavConfig {
        grid: GridSettings {
            chunk_size: Vec3::splat(8.0),
            ..GridSettings::default()
        },
        layout: LayoutSettings {
            chunk_count: [2, 1, 1],
            origin: Vec3::ZERO,
        },
        pathfinding: PathfindingSettings::default(),
    };
    let sphere = Obstacle::Sphere {
        center: Vec3::new(8.0, 3.5, 3.5),
        radius: 2.5,
    };
    let mut nav = Navigator::build(&config, vec![sphere]);

    let (start, goal) = (Vec3::new(1.0, 3.5, 3.5), Vec3::new(15.0, 3.5, 3.5));
    for settings in [PathfindingSettings::default(), PathfindingSettings::theta_star()] {
        nav.set_settings(settings);
        let result = nav.find_grid_path(start, goal);
        assert!(result.is_found());
        assert_eq!(result.positions[0], start);
        assert_eq!(*result.positions.last().unwrap(), goal);
        for p in &result.positions {
            assert!(sphere.distance(*p) > 0.0, "waypoint {p} inside the obstacle");
        }
        assert!(result.stats.path_length > start.distance(goal));
        assert_eq!(nav.temp_node_count(), 0);
    }
}

#[test]
fn navigator_surface_query_over_generated_terrain() {
    let mut layout = hills_layout();
    layout.reset_nodes();
    let mut nav = Navigator::new(layout, PathfindingSettings::default());
    // Both ends in open air; the line passes through the hill around x = 2.
    let (start, goal) = (Vec3::new(-4.5, 3.8, 0.3), Vec3::new(5.5, 3.8, 0.3));

    let crossings = nav.mesh_surface().intersections(start, goal);
    let result = nav.find_graph_path(start, goal);
    assert!(result.is_found());
    assert_eq!(result.positions[0], start);
    assert_eq!(*result.positions.last().unwrap(), goal);
    assert!(crossings.len() >= 2);
    assert!(!result.nodes.is_empty());
    assert!(result.stats.path_length >= start.distance(goal));
    assert_eq!(nav.temp_node_count(), 0);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn grid_nearest_node_roundtrip(
        sx in 1u32..6,
        sy in 1u32..6,
        sz in 1u32..6,
        step in prop_oneof![Just(0.5f32), Just(1.0f32), Just(1.5f32)],
        origin in (-20i32..20, -20i32..20, -20i32..20),
    ) {
        let origin = Vec3::new(origin.0 as f32, origin.1 as f32, origin.2 as f32);
        let size = Vec3::new(sx as f32, sy as f32, sz as f32) * step;
        let grid = Grid::new(
            ChunkId(3),
            Aabb::from_min_size(origin, size),
            Vec3::splat(step),
            true,
            &|_: Vec3| 1.0_f32,
        );
        prop_assert_eq!(grid.size(), [sx, sy, sz]);
        for (id, node) in grid.nodes() {
            prop_assert_eq!(grid.closest_node(node.position), Some(id));
        }
    }
}
