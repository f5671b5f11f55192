// voxnav_core — chunked 3D pathfinding over voxel grids and generated surfaces.
//
// A world is split into a fixed layout of equally sized chunks. Each chunk
// carries two navigation graphs: a dense voxel `Grid` sampled from a scalar
// field, and a sparse `MeshVertexGraph` built from the walkable surface that
// marching cubes extracts from the grid. Both are stitched across chunk seams
// and searched with A* or Theta* through the graph-agnostic `NodeGraph` trait.
// No rendering or engine dependencies; everything runs headless.
//
// Module overview:
// - `types.rs`:          ChunkId, NodeRef, GridIndex, PositionKey, ChunkDirection, Aabb.
// - `node.rs`:           Node, per-search SearchState, cross-chunk NeighborIdentifier.
// - `graph.rs`:          NodeGraph trait shared by every graph and view.
// - `bucket_list.rs`:    Approximate bucketed priority queue for the open set.
// - `heuristics.rs`:     Distance estimators and edge cost functions.
// - `field.rs`:          Scalar fields: obstacle clearance and procedural noise.
// - `grid.rs`:           Dense per-chunk voxel graph.
// - `mesh.rs`:           Indexed triangle mesh and welding builder.
// - `mesh_graph.rs`:     Sparse surface graph built from a mesh.
// - `marching_cubes.rs`: Iso-surface extraction, grid to mesh.
// - `stitching.rs`:      Two-phase cross-chunk linking (identify, then resolve).
// - `chunk.rs`:          Chunk, ChunkLayout, parallel generation, layer views.
// - `surface.rs`:        Segment/surface intersection and line of sight.
// - `search.rs`:         Shared best-first loop, PathResult, SearchStats.
// - `astar.rs`:          A*.
// - `theta_star.rs`:     Theta* (any-angle).
// - `temp_nodes.rs`:     Transient query nodes overlaid on a graph.
// - `planner.rs`:        Navigator: grid and multi-segment surface queries.
// - `config.rs`:         NavConfig and nested settings, JSON load/save.
//
// **Critical constraint: generation before queries.** Stitching must run after
// every chunk of a layer is built, and queries assume the layers they search
// are generated and stitched. `ChunkLayout::generate` runs the phases in order.

pub mod astar;
pub mod bucket_list;
pub mod chunk;
pub mod config;
pub mod field;
pub mod graph;
pub mod grid;
pub mod heuristics;
pub mod marching_cubes;
pub mod mesh;
pub mod mesh_graph;
pub mod node;
pub mod planner;
pub mod search;
pub mod stitching;
pub mod surface;
pub mod temp_nodes;
pub mod theta_star;
pub mod types;

pub use chunk::ChunkLayout;
pub use config::NavConfig;
pub use graph::NodeGraph;
pub use planner::Navigator;
pub use search::{PathResult, SearchParams, SearchStats};
