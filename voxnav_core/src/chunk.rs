// Chunks, the chunk layout, and the generation pipeline.
//
// A `ChunkLayout` is a fixed 3D array of equally sized chunks. Each `Chunk`
// knows its bounds and the id of its neighbor along each positive axis (set
// once when the layout is created), and owns up to three products:
//
//   grid   dense `Grid` sampled from a `ScalarField`
//   mesh   `TriangleMesh` extracted from the grid by marching cubes
//   graph  sparse `MeshVertexGraph` built from the mesh
//
// Generation runs in phases. The per-chunk phases (`generate_grids`,
// `march_cubes`, `generate_graphs`) run in parallel over chunks with rayon;
// each parallel iterator finishes before the next phase starts. The stitching
// phases (`stitch_grids`, `stitch_graphs`) link nodes across chunk seams and
// must run after the matching per-chunk phase has completed for every chunk.
//
// Chunk ids are assigned x-fastest: `x + count_x * (y + count_y * z)`.
//
// `SeamedGrid` is the `IsoLookup` marching cubes samples through: indices past
// a grid's max face are forwarded to the neighboring chunk's grid, so cells on
// the seam see real data rather than the open sentinel.
//
// `LayerView` (aliased as `GridLayer` and `MeshLayer`) is the `NodeGraph` over
// one product of every chunk at once, which is what the searches run on.
//
// See also: `stitching.rs` for the seam-linking passes, `planner.rs` for the
// `Navigator` that queries a generated layout.

use crate::config::{GridSettings, LayoutSettings};
use crate::field::ScalarField;
use crate::graph::NodeGraph;
use crate::grid::{Grid, IsoLookup, OPEN_ISO};
use crate::marching_cubes;
use crate::mesh::TriangleMesh;
use crate::mesh_graph::MeshVertexGraph;
use crate::node::Node;
use crate::stitching::{self, LayerMut, LayerRef, StitchParams, StitchReport};
use crate::types::{Aabb, ChunkDirection, ChunkId, NodeRef};
use glam::Vec3;
use log::debug;
use rayon::prelude::*;

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// One cell of the layout and the graphs generated for it.
#[derive(Clone, Debug)]
pub struct Chunk {
    pub id: ChunkId,
    /// Position in the layout, in chunks.
    pub coord: [u32; 3],
    pub bounds: Aabb,
    /// Neighbor along +x, +y, +z.
    pub neighbors: [Option<ChunkId>; 3],
    pub grid: Option<Grid>,
    pub mesh: Option<TriangleMesh>,
    pub graph: Option<MeshVertexGraph>,
}

impl Chunk {
    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    pub fn grid_mut(&mut self) -> Option<&mut Grid> {
        self.grid.as_mut()
    }

    pub fn graph(&self) -> Option<&MeshVertexGraph> {
        self.graph.as_ref()
    }

    pub fn graph_mut(&mut self) -> Option<&mut MeshVertexGraph> {
        self.graph.as_mut()
    }

    pub fn neighbor(&self, direction: ChunkDirection) -> Option<ChunkId> {
        match direction.axis() {
            Some(axis) => self.neighbors[axis],
            None => Some(self.id),
        }
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Placement of the chunk array in the world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutGeometry {
    pub origin: Vec3,
    pub chunk_size: Vec3,
    pub count: [u32; 3],
}

impl LayoutGeometry {
    pub fn chunk_id(&self, coord: [u32; 3]) -> ChunkId {
        ChunkId(coord[0] + self.count[0] * (coord[1] + self.count[1] * coord[2]))
    }

    pub fn bounds(&self) -> Aabb {
        let size = Vec3::new(self.count[0] as f32, self.count[1] as f32, self.count[2] as f32);
        Aabb::from_min_size(self.origin, size * self.chunk_size)
    }

    /// The chunk containing `point`. Points outside the layout map to the
    /// nearest border chunk.
    pub fn chunk_at(&self, point: Vec3) -> ChunkId {
        let local = ((point - self.origin) / self.chunk_size).floor();
        let clamp = |v: f32, n: u32| {
            if v.is_nan() {
                0
            } else {
                v.clamp(0.0, (n - 1) as f32) as u32
            }
        };
        self.chunk_id([
            clamp(local.x, self.count[0]),
            clamp(local.y, self.count[1]),
            clamp(local.z, self.count[2]),
        ])
    }
}

/// A fixed grid of chunks plus the settings they were generated with.
#[derive(Clone, Debug)]
pub struct ChunkLayout {
    settings: GridSettings,
    geometry: LayoutGeometry,
    chunks: Vec<Chunk>,
}

impl ChunkLayout {
    /// Create the chunks and their neighbor topology. Nothing is generated.
    pub fn new(settings: &GridSettings, layout: &LayoutSettings) -> Self {
        let count = layout.chunk_count.map(|c| c.max(1));
        let geometry = LayoutGeometry {
            origin: layout.origin,
            chunk_size: settings.chunk_size,
            count,
        };
        let id_of = |x: u32, y: u32, z: u32| geometry.chunk_id([x, y, z]);

        let mut chunks = Vec::with_capacity((count[0] * count[1] * count[2]) as usize);
        for z in 0..count[2] {
            for y in 0..count[1] {
                for x in 0..count[0] {
                    let coord = [x, y, z];
                    let min = layout.origin + Vec3::new(x as f32, y as f32, z as f32) * settings.chunk_size;
                    let next = |axis: usize| {
                        let mut c = coord;
                        c[axis] += 1;
                        (c[axis] < count[axis]).then(|| id_of(c[0], c[1], c[2]))
                    };
                    chunks.push(Chunk {
                        id: id_of(x, y, z),
                        coord,
                        bounds: Aabb::from_min_size(min, settings.chunk_size),
                        neighbors: [next(0), next(1), next(2)],
                        grid: None,
                        mesh: None,
                        graph: None,
                    });
                }
            }
        }

        Self {
            settings: settings.clone(),
            geometry,
            chunks,
        }
    }

    pub fn geometry(&self) -> LayoutGeometry {
        self.geometry
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn bounds(&self) -> Aabb {
        self.geometry.bounds()
    }

    /// The chunk containing `point`, clamped to the layout.
    pub fn chunk_at(&self, point: Vec3) -> ChunkId {
        self.geometry.chunk_at(point)
    }

    fn stitch_params(&self) -> StitchParams {
        StitchParams {
            allow_diagonal: self.settings.allow_diagonal_neighbors,
            boundary_tolerance: self.settings.boundary_tolerance,
        }
    }

    // -- generation phases --------------------------------------------------

    /// Build every chunk's grid from `field`, in parallel.
    pub fn generate_grids<F>(&mut self, field: &F)
    where
        F: ScalarField + ?Sized,
    {
        let step = self.settings.step;
        let diagonal = self.settings.allow_diagonal_neighbors;
        self.chunks.par_iter_mut().for_each(|chunk| {
            chunk.grid = Some(Grid::new(chunk.id, chunk.bounds, step, diagonal, field));
        });
        debug!(
            "generated {} grids: {} nodes, {} links",
            self.chunks.len(),
            self.grid_node_count(),
            self.chunks.iter().filter_map(Chunk::grid).map(Grid::link_count).sum::<usize>()
        );
    }

    /// Link grid nodes across chunk seams. Requires `generate_grids`.
    pub fn stitch_grids(&mut self) -> StitchReport {
        let params = self.stitch_params();
        let report = stitching::stitch_layer::<Grid>(&mut self.chunks, Chunk::grid, Chunk::grid_mut, &params);
        debug!(
            "stitched grids: {} identifiers, {} links",
            report.identifiers, report.links
        );
        report
    }

    /// Extract every chunk's surface mesh, in parallel. Chunks without a grid
    /// get no mesh.
    pub fn march_cubes(&mut self) -> usize {
        let iso_level = self.settings.iso_level;
        let meshes: Vec<Option<TriangleMesh>> = {
            let chunks: &[Chunk] = &self.chunks;
            chunks
                .par_iter()
                .map(|chunk| {
                    let grid = chunk.grid()?;
                    let lookup = SeamedGrid::new(chunks, chunk)?;
                    Some(marching_cubes::march(&lookup, grid.step(), grid.origin(), iso_level))
                })
                .collect()
        };
        for (chunk, mesh) in self.chunks.iter_mut().zip(meshes) {
            chunk.mesh = mesh;
        }
        let triangles = self.triangle_count();
        debug!("marched {} chunks: {} triangles", self.chunks.len(), triangles);
        triangles
    }

    /// Build every chunk's surface graph from its mesh, in parallel.
    pub fn generate_graphs(&mut self) {
        self.chunks.par_iter_mut().for_each(|chunk| {
            chunk.graph = chunk
                .mesh
                .as_ref()
                .map(|mesh| MeshVertexGraph::new(chunk.id, chunk.bounds, mesh));
        });
        debug!(
            "generated {} surface graphs: {} nodes",
            self.chunks.iter().filter(|c| c.graph.is_some()).count(),
            self.graph_node_count()
        );
    }

    /// Link surface-graph nodes across chunk seams. Requires `generate_graphs`.
    pub fn stitch_graphs(&mut self) -> StitchReport {
        let params = self.stitch_params();
        let report = stitching::stitch_layer::<MeshVertexGraph>(
            &mut self.chunks,
            Chunk::graph,
            Chunk::graph_mut,
            &params,
        );
        debug!(
            "stitched surface graphs: {} identifiers, {} links",
            report.identifiers, report.links
        );
        report
    }

    /// Every phase in order: grids, grid stitching, surface extraction,
    /// surface graphs, surface stitching.
    pub fn generate<F>(&mut self, field: &F)
    where
        F: ScalarField + ?Sized,
    {
        self.generate_grids(field);
        self.stitch_grids();
        self.march_cubes();
        self.generate_graphs();
        self.stitch_graphs();
    }

    // -- queries ------------------------------------------------------------

    pub fn has_grids(&self) -> bool {
        !self.chunks.is_empty() && self.chunks.iter().all(|c| c.grid.is_some())
    }

    pub fn has_graphs(&self) -> bool {
        !self.chunks.is_empty() && self.chunks.iter().all(|c| c.graph.is_some())
    }

    pub fn grid_node_count(&self) -> usize {
        self.chunks.iter().filter_map(Chunk::grid).map(Grid::len).sum()
    }

    pub fn graph_node_count(&self) -> usize {
        self.chunks.iter().filter_map(Chunk::graph).map(MeshVertexGraph::len).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.chunks
            .iter()
            .filter_map(|c| c.mesh.as_ref())
            .map(TriangleMesh::triangle_count)
            .sum()
    }

    /// The grids of every chunk as one graph.
    pub fn grid_layer(&mut self) -> GridLayer<'_> {
        LayerView::new(&mut self.chunks, Chunk::grid, Chunk::grid_mut)
    }

    /// The surface graphs of every chunk as one graph.
    pub fn mesh_layer(&mut self) -> MeshLayer<'_> {
        LayerView::new(&mut self.chunks, Chunk::graph, Chunk::graph_mut)
    }

    /// Clear search scratch on every node of both layers.
    pub fn reset_nodes(&mut self) {
        self.grid_layer().reset_nodes();
        self.mesh_layer().reset_nodes();
    }
}

// ---------------------------------------------------------------------------
// Seam-aware iso lookup
// ---------------------------------------------------------------------------

/// A chunk's grid, with out-of-range indices forwarded to neighbor chunks.
pub struct SeamedGrid<'a> {
    chunks: &'a [Chunk],
    chunk: &'a Chunk,
    grid: &'a Grid,
}

impl<'a> SeamedGrid<'a> {
    /// `None` if the chunk has no grid yet.
    pub fn new(chunks: &'a [Chunk], chunk: &'a Chunk) -> Option<Self> {
        Some(Self {
            chunks,
            chunk,
            grid: chunk.grid()?,
        })
    }

    fn forward(&self, axis: usize, x: i64, y: i64, z: i64) -> f32 {
        let Some(next) = self.chunk.neighbors[axis].and_then(|id| self.chunks.get(id.index())) else {
            return OPEN_ISO;
        };
        let Some(view) = SeamedGrid::new(self.chunks, next) else {
            return OPEN_ISO;
        };
        view.iso_at(x, y, z)
    }
}

impl IsoLookup for SeamedGrid<'_> {
    fn extents(&self) -> [u32; 3] {
        self.grid.size()
    }

    fn iso_at(&self, x: i64, y: i64, z: i64) -> f32 {
        let [sx, sy, sz] = self.grid.size().map(i64::from);
        if x >= sx {
            self.forward(0, x - sx, y, z)
        } else if y >= sy {
            self.forward(1, x, y - sy, z)
        } else if z >= sz {
            self.forward(2, x, y, z - sz)
        } else {
            self.grid.iso_at(x, y, z)
        }
    }
}

// ---------------------------------------------------------------------------
// Layer views
// ---------------------------------------------------------------------------

/// One graph product of every chunk, viewed as a single `NodeGraph`.
pub struct LayerView<'a, G> {
    chunks: &'a mut [Chunk],
    layer: LayerRef<G>,
    layer_mut: LayerMut<G>,
}

pub type GridLayer<'a> = LayerView<'a, Grid>;
pub type MeshLayer<'a> = LayerView<'a, MeshVertexGraph>;

impl<'a, G> LayerView<'a, G> {
    pub fn new(chunks: &'a mut [Chunk], layer: LayerRef<G>, layer_mut: LayerMut<G>) -> Self {
        Self {
            chunks,
            layer,
            layer_mut,
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        self.chunks
    }
}

impl<G: NodeGraph> NodeGraph for LayerView<'_, G> {
    fn node(&self, id: NodeRef) -> Option<&Node> {
        self.chunks
            .get(id.chunk.index())
            .and_then(self.layer)
            .and_then(|g| g.node(id))
    }

    fn node_mut(&mut self, id: NodeRef) -> Option<&mut Node> {
        self.chunks
            .get_mut(id.chunk.index())
            .and_then(self.layer_mut)
            .and_then(|g| g.node_mut(id))
    }

    fn neighbors(&self, id: NodeRef, out: &mut Vec<NodeRef>) {
        if let Some(node) = self.node(id) {
            out.extend(node.neighbors.iter().filter(|&&n| self.node(n).is_some()));
        }
    }

    fn nodes(&self) -> impl Iterator<Item = (NodeRef, &Node)> {
        self.chunks
            .iter()
            .filter_map(self.layer)
            .flat_map(|g| g.nodes())
    }

    /// Nearest node over every chunk's graph.
    fn closest_node(&self, point: Vec3) -> Option<NodeRef> {
        self.chunks
            .iter()
            .filter_map(self.layer)
            .filter_map(|g| {
                let id = g.closest_node(point)?;
                Some((id, g.position(id)?.distance_squared(point)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    fn reset_nodes(&mut self) {
        for chunk in self.chunks.iter_mut() {
            if let Some(g) = (self.layer_mut)(chunk) {
                g.reset_nodes();
            }
        }
    }

    fn node_count(&self) -> usize {
        self.chunks
            .iter()
            .filter_map(self.layer)
            .map(|g| g.node_count())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKey;
    use crate::types::GridIndex;

    fn settings(chunk: f32) -> GridSettings {
        GridSettings {
            chunk_size: Vec3::splat(chunk),
            ..GridSettings::default()
        }
    }

    fn layout(count: [u32; 3], chunk: f32) -> ChunkLayout {
        ChunkLayout::new(
            &settings(chunk),
            &LayoutSettings {
                chunk_count: count,
                origin: Vec3::ZERO,
            },
        )
    }

    #[test]
    fn topology_links_positive_axes() {
        let l = layout([2, 2, 1], 4.0);
        assert_eq!(l.len(), 4);
        let c0 = l.chunk(ChunkId(0)).unwrap();
        assert_eq!(c0.neighbors, [Some(ChunkId(1)), Some(ChunkId(2)), None]);
        let c3 = l.chunk(ChunkId(3)).unwrap();
        assert_eq!(c3.coord, [1, 1, 0]);
        assert_eq!(c3.neighbors, [None, None, None]);
        assert_eq!(c3.bounds.min, Vec3::new(4.0, 4.0, 0.0));
        assert_eq!(c0.neighbor(ChunkDirection::Same), Some(ChunkId(0)));
    }

    #[test]
    fn chunk_at_clamps_to_border() {
        let l = layout([3, 1, 2], 10.0);
        assert_eq!(l.chunk_at(Vec3::new(15.0, 5.0, 5.0)), ChunkId(1));
        assert_eq!(l.chunk_at(Vec3::new(25.0, 5.0, 15.0)), ChunkId(5));
        assert_eq!(l.chunk_at(Vec3::new(-100.0, 50.0, 999.0)), ChunkId(3));
        assert_eq!(l.chunk_at(Vec3::splat(f32::NAN)), ChunkId(0));
    }

    #[test]
    fn seamed_lookup_reads_neighbor_grid() {
        let mut l = layout([2, 1, 1], 4.0);
        l.generate_grids(&|p: Vec3| if p.x >= 4.0 { 0.25_f32 } else { 0.75 });
        let chunks = l.chunks();
        let view = SeamedGrid::new(chunks, &chunks[0]).unwrap();
        assert_eq!(view.iso_at(3, 0, 0), 0.75);
        assert_eq!(view.iso_at(4, 0, 0), 0.25);
        // Past the last chunk there is nothing: open.
        let view = SeamedGrid::new(chunks, &chunks[1]).unwrap();
        assert_eq!(view.iso_at(4, 0, 0), OPEN_ISO);
        assert_eq!(view.iso_at(0, 4, 0), OPEN_ISO);
    }

    #[test]
    fn grid_stitching_is_symmetric_and_idempotent() {
        let mut l = layout([2, 1, 1], 4.0);
        l.generate_grids(&|_: Vec3| 1.0_f32);
        let first = l.stitch_grids();
        assert!(first.identifiers > 0);
        assert!(first.links > 0);

        let grid0 = l.chunk(ChunkId(0)).unwrap().grid().unwrap();
        let edge = grid0.node_at(GridIndex::new(3, 1, 1)).unwrap();
        assert!(
            edge.identifiers
                .iter()
                .any(|i| i.key == NodeKey::Grid(GridIndex::new(0, 1, 1)) && i.direction == ChunkDirection::X)
        );

        let mut layer = l.grid_layer();
        let mut cross = 0;
        for (id, node) in layer.nodes() {
            for &n in &node.neighbors {
                let other = layer.node(n).unwrap();
                assert!(other.has_neighbor(id), "{id} -> {n} not mirrored");
                if n.chunk != id.chunk {
                    cross += 1;
                }
            }
        }
        // 16 seam nodes per side, 9 diagonal targets minus the clipped ones.
        assert!(cross > 32);
        layer.reset_nodes();

        let again = l.stitch_grids();
        assert_eq!(again, StitchReport::default());
    }

    #[test]
    fn seam_edge_nodes_only_reach_face_neighbors() {
        let mut l = layout([2, 2, 1], 4.0);
        l.generate_grids(&|_: Vec3| 1.0_f32);
        l.stitch_grids();
        let grid0 = l.chunk(ChunkId(0)).unwrap().grid().unwrap();

        // On the y seam only: the full 26.
        let face = grid0.node_at(GridIndex::new(2, 3, 1)).unwrap();
        assert_eq!(face.neighbors.len(), 26);

        // On the edge shared by the x and y seams: chunk 3, diagonally across
        // the edge, is not a neighbor of chunk 0.
        let edge = grid0.node_at(GridIndex::new(3, 3, 1)).unwrap();
        assert_eq!(edge.neighbors.len(), 23);
        assert!(edge.neighbors.iter().all(|n| n.chunk != ChunkId(3)));
    }

    #[test]
    fn pipeline_builds_every_product() {
        let mut l = layout([2, 1, 1], 6.0);
        // Solid floor below y = 2 across both chunks.
        l.generate(&|p: Vec3| if p.y < 2.0 { 0.0_f32 } else { 1.0 });
        assert!(l.has_grids());
        assert!(l.has_graphs());
        assert!(l.triangle_count() > 0);
        assert!(l.graph_node_count() > 0);

        // Surface nodes on the shared face link into the other chunk.
        let mut layer = l.mesh_layer();
        let crosses = layer
            .nodes()
            .filter(|(id, n)| n.neighbors.iter().any(|o| o.chunk != id.chunk))
            .count();
        assert!(crosses > 0);
        let near = layer.closest_node(Vec3::new(9.0, 2.5, 3.0)).unwrap();
        assert_eq!(near.chunk, ChunkId(1));
        layer.reset_nodes();
    }

    #[test]
    fn layer_view_skips_missing_chunks() {
        let mut l = layout([1, 1, 1], 3.0);
        l.generate_grids(&|_: Vec3| 1.0_f32);
        let layer = l.grid_layer();
        assert!(layer.node(NodeRef::new(ChunkId(7), 0)).is_none());
        assert_eq!(layer.node_count(), 27);
        let mut l2 = layout([1, 1, 1], 3.0);
        assert!(!l2.has_grids());
        assert_eq!(l2.mesh_layer().closest_node(Vec3::ZERO), None);
    }
}
