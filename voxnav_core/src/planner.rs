// Query front end: `Navigator` owns a generated layout and answers path
// queries between arbitrary world points.
//
// Grid queries (`find_grid_path`) put temporary nodes at the exact start and
// goal, anchored to the nearest grid nodes, and run the configured algorithm
// over the whole grid layer. Theta* checks line of sight against a
// `FieldSurface` snapshot of the grids. An endpoint that lands on its anchor
// voxel would repeat that waypoint, so repeats are collapsed.
//
// Surface queries (`find_graph_path`) are segmented. The straight line from
// start to goal is intersected with the generated meshes; crossings come back
// ordered and alternate entry, exit, entry, exit. With fewer than two
// crossings the line never runs along the surface and the path is just
// `[start, goal]`. Otherwise each (entry, exit) pair becomes a temporary node
// pair anchored to the nearest surface nodes and is searched on its own; the
// exit of one segment is linked straight to the entry of the next, standing
// for the off-surface hop between them. Theta* shortcuts inside a segment are
// checked against the mesh and against the grid field, so they cannot tunnel
// through the solid between two surface nodes. The assembled path is start,
// every segment's waypoints, goal. If any segment is unreachable the whole
// query returns an empty path.
//
// Temporary nodes are removed after every query, successful or not.
//
// See also: `temp_nodes.rs`, `surface.rs`, `search.rs`, `chunk.rs`.

use crate::astar::astar;
use crate::chunk::ChunkLayout;
use crate::config::{Algorithm, NavConfig, PathfindingSettings};
use crate::field::{ConfiguredField, Obstacle};
use crate::graph::NodeGraph;
use crate::search::{PathResult, SearchParams, SearchStats, polyline_length};
use crate::surface::{FieldSurface, MeshSurface, SolidMesh, SurfaceHit, SurfaceQuery};
use crate::temp_nodes::TempNodeDictionary;
use crate::theta_star::theta_star;
use crate::types::{NodeRef, PositionKey};
use glam::Vec3;
use log::{debug, warn};

pub struct Navigator {
    layout: ChunkLayout,
    settings: PathfindingSettings,
    iso_level: f32,
    temp: TempNodeDictionary,
    mesh_surface: MeshSurface,
    field_surface: FieldSurface,
}

impl Navigator {
    /// Wrap an already generated layout. Surfaces are snapshotted here, so
    /// the layout should be fully generated first.
    pub fn new(layout: ChunkLayout, settings: PathfindingSettings) -> Self {
        let iso_level = layout.settings().iso_level;
        let mesh_surface = MeshSurface::from_layout(&layout);
        let field_surface = FieldSurface::from_layout(&layout);
        Self {
            layout,
            settings,
            iso_level,
            temp: TempNodeDictionary::new(),
            mesh_surface,
            field_surface,
        }
    }

    /// Create the layout `config` describes, sample the configured field
    /// (with `obstacles` for the overlap mode) and run every generation phase.
    pub fn build(config: &NavConfig, obstacles: Vec<Obstacle>) -> Self {
        let mut layout = ChunkLayout::new(&config.grid, &config.layout);
        let field = ConfiguredField::from_settings(&config.grid.field, obstacles.clone());
        layout.generate(&field);
        Self::new(layout, config.pathfinding.clone()).with_obstacles(obstacles)
    }

    /// Obstacles the surface line-of-sight check keeps clear of.
    pub fn with_obstacles(mut self, obstacles: Vec<Obstacle>) -> Self {
        self.mesh_surface = std::mem::take(&mut self.mesh_surface).with_obstacles(obstacles);
        self
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    pub fn settings(&self) -> &PathfindingSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: PathfindingSettings) {
        self.settings = settings;
    }

    pub fn mesh_surface(&self) -> &MeshSurface {
        &self.mesh_surface
    }

    pub fn field_surface(&self) -> &FieldSurface {
        &self.field_surface
    }

    /// Live temporary nodes; zero between queries.
    pub fn temp_node_count(&self) -> usize {
        self.temp.len()
    }

    // -- grid queries -------------------------------------------------------

    /// Path over the dense grid between two world points.
    pub fn find_grid_path(&mut self, start: Vec3, goal: Vec3) -> PathResult {
        if !self.layout.has_grids() {
            warn!("grid query before grids were generated");
            return PathResult::default();
        }
        let params = SearchParams::from_settings(&self.settings, self.iso_level);
        let mut layer = self.layout.grid_layer();
        let (Some(start_anchor), Some(goal_anchor)) = (layer.closest_node(start), layer.closest_node(goal)) else {
            return PathResult::default();
        };

        let from = self.temp.add_temp_node(&layer, start, start_anchor);
        let to = self.temp.add_temp_node(&layer, goal, goal_anchor);
        let result = {
            let mut overlay = self.temp.overlay(&mut layer);
            match self.settings.algorithm {
                Algorithm::AStar => astar(&mut overlay, from, to, &params),
                Algorithm::ThetaStar => theta_star(
                    &mut overlay,
                    from,
                    to,
                    &params,
                    &self.field_surface,
                    self.settings.line_of_sight_radius,
                ),
            }
        };
        self.temp.cleanup();
        dedup_waypoints(result)
    }

    // -- surface queries ----------------------------------------------------

    /// Path over the surface graph between two world points, split into
    /// on-surface segments at the mesh crossings.
    pub fn find_graph_path(&mut self, start: Vec3, goal: Vec3) -> PathResult {
        if !self.layout.has_graphs() {
            warn!("surface query before surface graphs were generated");
            return PathResult::default();
        }
        let crossings = self.mesh_surface.intersections(start, goal);
        if crossings.len() < 2 {
            let positions = vec![start, goal];
            return PathResult {
                nodes: Vec::new(),
                total_cost: self.settings.cost.cost(start, goal),
                stats: SearchStats {
                    path_length: polyline_length(&positions),
                    ..SearchStats::default()
                },
                positions,
            };
        }
        if crossings.len() % 2 == 1 {
            debug!("odd crossing count {}, last crossing ignored", crossings.len());
        }

        let result = self.plan_segments(start, goal, &crossings);
        self.temp.cleanup();
        result
    }

    fn plan_segments(&mut self, start: Vec3, goal: Vec3, crossings: &[SurfaceHit]) -> PathResult {
        let params = SearchParams::from_settings(&self.settings, f32::NEG_INFINITY);
        let cost = self.settings.cost;
        let mut layer = self.layout.mesh_layer();

        // Temp node pairs, one per on-surface segment.
        let mut segments: Vec<(NodeRef, NodeRef)> = Vec::new();
        for pair in crossings.chunks_exact(2) {
            let (entry, exit) = (pair[0].position, pair[1].position);
            let (Some(entry_anchor), Some(exit_anchor)) = (layer.closest_node(entry), layer.closest_node(exit)) else {
                return PathResult::default();
            };
            let entry_id = self.temp.add_temp_node(&layer, entry, entry_anchor);
            let exit_id = self.temp.add_temp_node(&layer, exit, exit_anchor);
            if let Some(&(_, previous_exit)) = segments.last() {
                self.temp.link(previous_exit, entry_id);
            }
            segments.push((entry_id, exit_id));
        }

        let mut stats = SearchStats::default();
        let mut nodes = Vec::new();
        let mut positions = vec![start];
        let mut total_cost = 0.0;
        let solid = SolidMesh {
            mesh: &self.mesh_surface,
            field: &self.field_surface,
        };
        let mut overlay = self.temp.overlay(&mut layer);
        for &(entry, exit) in &segments {
            let segment = match self.settings.algorithm {
                Algorithm::AStar => astar(&mut overlay, entry, exit, &params),
                Algorithm::ThetaStar => theta_star(
                    &mut overlay,
                    entry,
                    exit,
                    &params,
                    &solid,
                    self.settings.line_of_sight_radius,
                ),
            };
            stats.accumulate(&segment.stats);
            if !segment.is_found() {
                debug!("surface segment {entry} -> {exit} unreachable");
                stats.path_length = 0.0;
                return PathResult::not_found(stats);
            }
            if let Some(&last) = positions.last() {
                total_cost += cost.cost(last, segment.positions[0]);
            }
            total_cost += segment.total_cost;
            nodes.extend(segment.nodes);
            positions.extend(segment.positions);
        }
        if let Some(&last) = positions.last() {
            total_cost += cost.cost(last, goal);
        }
        positions.push(goal);
        positions.dedup_by_key(|p| PositionKey::from_position(*p));

        stats.path_length = polyline_length(&positions);
        PathResult {
            nodes,
            positions,
            total_cost,
            stats,
        }
    }
}

/// Collapse consecutive waypoints at the same quantized position, keeping
/// `nodes` aligned with `positions`.
fn dedup_waypoints(mut result: PathResult) -> PathResult {
    if result.nodes.len() != result.positions.len() {
        result.positions.dedup_by_key(|p| PositionKey::from_position(*p));
        return result;
    }
    let mut nodes = Vec::with_capacity(result.nodes.len());
    let mut positions: Vec<Vec3> = Vec::with_capacity(result.positions.len());
    for (&id, &p) in result.nodes.iter().zip(&result.positions) {
        let repeat = positions
            .last()
            .is_some_and(|&last| PositionKey::from_position(last) == PositionKey::from_position(p));
        if !repeat {
            nodes.push(id);
            positions.push(p);
        }
    }
    result.nodes = nodes;
    result.positions = positions;
    result
}
