// Cross-chunk neighbor stitching.
//
// Chunks build their graphs independently, so a node on a chunk's max face
// cannot link to the node across the seam at build time: the other chunk may
// not exist yet. Stitching runs after every chunk of a layer is built, in two
// phases:
//
// 1. Identify. Each boundary node records `NeighborIdentifier`s naming the
//    nodes it should link to in the neighboring chunk (a grid index triple for
//    grids, a quantized position for surface graphs). Computed in parallel
//    from shared borrows, then written to the nodes serially.
// 2. Resolve. Every identifier is looked up in the neighboring chunk's graph
//    and turned into a link in both directions. Lookups run in parallel; the
//    links are applied serially, since each one touches two chunks.
//
// Identifiers that name a missing chunk or an unknown key are skipped, so a
// boundary node simply ends up with fewer links. Both phases are idempotent:
// identifiers dedupe and links dedupe, so re-stitching changes nothing.
//
// Chunks only know their neighbor along each positive axis; the negative side
// of every seam is covered by the neighbor's own positive-side pass plus the
// bidirectional link.
//
// Known limitation: with diagonal grid links on, a node on a chunk edge or
// corner only reaches the face-adjacent chunks. The chunk diagonally across
// the edge (or corner) is not a neighbor in this topology, so such a node has
// fewer than 26 links: 23 on an edge shared by two seams, 19 at a corner
// shared by three. Searches route through a face-adjacent chunk instead.
//
// See also: `chunk.rs` for `ChunkLayout::stitch_grids` and
// `ChunkLayout::stitch_graphs`, `node.rs` for `NeighborIdentifier`.

use crate::chunk::Chunk;
use crate::grid::Grid;
use crate::mesh_graph::MeshVertexGraph;
use crate::node::{NeighborIdentifier, Node, NodeKey};
use crate::types::{ChunkDirection, ChunkId, GridIndex, NodeRef};
use rayon::prelude::*;

/// Tuning for the identify phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StitchParams {
    /// Also link grid nodes to the diagonal cells across the seam.
    pub allow_diagonal: bool,
    /// Distance to the max face under which a surface node is on the boundary.
    pub boundary_tolerance: f32,
}

/// Counts from one stitching pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StitchReport {
    /// Identifiers newly recorded.
    pub identifiers: usize,
    /// Directed links newly added (each resolved pair adds up to two).
    pub links: usize,
}

/// A per-chunk graph that can take part in stitching.
pub trait Stitchable: Sync {
    fn chunk_id(&self) -> ChunkId;

    /// Identifiers for this graph's boundary nodes, keyed by node slot.
    /// `neighbors[axis]` is the graph of the next chunk along that axis.
    fn identify(
        &self,
        neighbors: [Option<&Self>; 3],
        params: &StitchParams,
    ) -> Vec<(u32, NeighborIdentifier)>;

    /// Slot of the node an identifier key names, if present.
    fn resolve_key(&self, key: NodeKey) -> Option<u32>;

    fn stitch_nodes(&self) -> impl Iterator<Item = (u32, &Node)>;

    fn stitch_node_mut(&mut self, slot: u32) -> Option<&mut Node>;
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

impl Stitchable for Grid {
    fn chunk_id(&self) -> ChunkId {
        self.chunk()
    }

    fn identify(
        &self,
        neighbors: [Option<&Self>; 3],
        params: &StitchParams,
    ) -> Vec<(u32, NeighborIdentifier)> {
        let size = self.size();
        let spread: &[i32] = if params.allow_diagonal { &[-1, 0, 1] } else { &[0] };
        let mut found = Vec::new();

        for direction in ChunkDirection::AXES {
            let Some(axis) = direction.axis() else { continue };
            let Some(other) = neighbors[axis] else { continue };
            let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);

            for (slot, node) in self.local_nodes() {
                let Some(index) = node.grid_index else { continue };
                let coords = [index.x, index.y, index.z];
                if coords[axis] + 1 != size[axis] {
                    continue;
                }
                for &du in spread {
                    for &dv in spread {
                        let mut target = [0i64; 3];
                        target[u] = coords[u] as i64 + du as i64;
                        target[v] = coords[v] as i64 + dv as i64;
                        if target.iter().any(|&t| t < 0) {
                            continue;
                        }
                        let key = GridIndex::new(target[0] as u32, target[1] as u32, target[2] as u32);
                        if other.in_bounds(key) {
                            found.push((slot, NeighborIdentifier::new(NodeKey::Grid(key), direction)));
                        }
                    }
                }
            }
        }
        found
    }

    fn resolve_key(&self, key: NodeKey) -> Option<u32> {
        match key {
            NodeKey::Grid(index) => self.flat_index(index).map(|i| i as u32),
            NodeKey::Position(pos) => self
                .flat_index(self.closest_index(pos.to_position()))
                .map(|i| i as u32),
        }
    }

    fn stitch_nodes(&self) -> impl Iterator<Item = (u32, &Node)> {
        self.local_nodes()
    }

    fn stitch_node_mut(&mut self, slot: u32) -> Option<&mut Node> {
        self.local_node_mut(slot)
    }
}

// ---------------------------------------------------------------------------
// Surface graph
// ---------------------------------------------------------------------------

impl Stitchable for MeshVertexGraph {
    fn chunk_id(&self) -> ChunkId {
        self.chunk()
    }

    /// A boundary node's twin is the neighbor chunk's node at the same
    /// position (or the nearest one). The boundary node links to the twin
    /// and to every same-chunk neighbor of the twin.
    fn identify(
        &self,
        neighbors: [Option<&Self>; 3],
        params: &StitchParams,
    ) -> Vec<(u32, NeighborIdentifier)> {
        let max = self.bounds().max;
        let mut found = Vec::new();

        for direction in ChunkDirection::AXES {
            let Some(axis) = direction.axis() else { continue };
            let Some(other) = neighbors[axis] else { continue };
            if other.is_empty() {
                continue;
            }

            for (slot, node) in self.local_nodes() {
                if max[axis] - node.position[axis] >= params.boundary_tolerance {
                    continue;
                }
                let Some(twin_slot) = other.find(node.key()) else { continue };
                let Some(twin) = other.local_node(twin_slot) else { continue };

                let mut push = |n: &Node| {
                    found.push((
                        slot,
                        NeighborIdentifier::new(NodeKey::Position(n.key()), direction),
                    ));
                };
                push(twin);
                for &nb in &twin.neighbors {
                    if nb.chunk != other.chunk() {
                        continue;
                    }
                    if let Some(n) = other.local_node(nb.index) {
                        push(n);
                    }
                }
            }
        }
        found
    }

    fn resolve_key(&self, key: NodeKey) -> Option<u32> {
        match key {
            NodeKey::Position(pos) => self.find(pos),
            NodeKey::Grid(_) => None,
        }
    }

    fn stitch_nodes(&self) -> impl Iterator<Item = (u32, &Node)> {
        self.local_nodes()
    }

    fn stitch_node_mut(&mut self, slot: u32) -> Option<&mut Node> {
        self.local_node_mut(slot)
    }
}

// ---------------------------------------------------------------------------
// Layer passes
// ---------------------------------------------------------------------------

/// Accessors picking one graph layer out of a chunk.
pub type LayerRef<G> = fn(&Chunk) -> Option<&G>;
pub type LayerMut<G> = fn(&mut Chunk) -> Option<&mut G>;

fn neighbor_graphs<'a, G>(chunks: &'a [Chunk], chunk: &Chunk, layer: LayerRef<G>) -> [Option<&'a G>; 3] {
    chunk
        .neighbors
        .map(|n| n.and_then(|id| chunks.get(id.index())).and_then(layer))
}

/// Phase 1: record identifiers on every boundary node of the layer.
pub fn identify_layer<G: Stitchable>(
    chunks: &mut [Chunk],
    layer: LayerRef<G>,
    layer_mut: LayerMut<G>,
    params: &StitchParams,
) -> usize {
    let found: Vec<Vec<(u32, NeighborIdentifier)>> = {
        let shared: &[Chunk] = chunks;
        shared
            .par_iter()
            .map(|chunk| match layer(chunk) {
                Some(graph) => graph.identify(neighbor_graphs(shared, chunk, layer), params),
                None => Vec::new(),
            })
            .collect()
    };

    let mut added = 0;
    for (chunk, identifiers) in chunks.iter_mut().zip(found) {
        let Some(graph) = layer_mut(chunk) else { continue };
        for (slot, identifier) in identifiers {
            if graph
                .stitch_node_mut(slot)
                .is_some_and(|node| node.add_identifier(identifier))
            {
                added += 1;
            }
        }
    }
    added
}

/// Phase 2: turn every recorded identifier into a bidirectional link.
pub fn resolve_layer<G: Stitchable>(chunks: &mut [Chunk], layer: LayerRef<G>, layer_mut: LayerMut<G>) -> usize {
    let links: Vec<(NodeRef, NodeRef)> = {
        let shared: &[Chunk] = chunks;
        shared
            .par_iter()
            .flat_map_iter(|chunk| resolve_chunk(shared, chunk, layer))
            .collect()
    };

    let mut added = 0;
    for (a, b) in links {
        added += usize::from(link_one_way(chunks, layer_mut, a, b));
        added += usize::from(link_one_way(chunks, layer_mut, b, a));
    }
    added
}

fn resolve_chunk<G: Stitchable>(chunks: &[Chunk], chunk: &Chunk, layer: LayerRef<G>) -> Vec<(NodeRef, NodeRef)> {
    let Some(graph) = layer(chunk) else {
        return Vec::new();
    };
    let targets = neighbor_graphs(chunks, chunk, layer);
    let mut links = Vec::new();
    for (slot, node) in graph.stitch_nodes() {
        for identifier in &node.identifiers {
            let Some(axis) = identifier.direction.axis() else { continue };
            let Some(target) = targets[axis] else { continue };
            let Some(other) = target.resolve_key(identifier.key) else { continue };
            links.push((
                NodeRef::new(graph.chunk_id(), slot),
                NodeRef::new(target.chunk_id(), other),
            ));
        }
    }
    links
}

fn link_one_way<G: Stitchable>(chunks: &mut [Chunk], layer_mut: LayerMut<G>, from: NodeRef, to: NodeRef) -> bool {
    chunks
        .get_mut(from.chunk.index())
        .and_then(layer_mut)
        .and_then(|g| g.stitch_node_mut(from.index))
        .is_some_and(|n| n.add_neighbor(to))
}

/// Both phases, in order.
pub fn stitch_layer<G: Stitchable>(
    chunks: &mut [Chunk],
    layer: LayerRef<G>,
    layer_mut: LayerMut<G>,
    params: &StitchParams,
) -> StitchReport {
    let identifiers = identify_layer(chunks, layer, layer_mut, params);
    let links = resolve_layer(chunks, layer, layer_mut);
    StitchReport { identifiers, links }
}
