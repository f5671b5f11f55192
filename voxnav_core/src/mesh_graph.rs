// Sparse surface graph built from a triangle mesh.
//
// One node per distinct vertex position (deduplicated through a
// `PositionKey` index, so vertices the mesh repeats collapse to one node).
// Every triangle links its three corners pairwise; linking is idempotent, so
// an edge shared by two triangles is linked once. The result follows the
// walkable surface at whatever resolution the mesh has, which lets searches
// over it take any-angle shortcuts the dense grid cannot.
//
// Nodes are stored in insertion order; a node's `NodeRef::index` is its slot.
// The chunk bounds are kept so the stitching pass can find boundary nodes.
//
// See also: `mesh.rs` for `TriangleMesh`, `marching_cubes.rs` which produces
// the input mesh, `stitching.rs` for cross-chunk links.

use crate::graph::{NodeGraph, nearest_by_scan};
use crate::grid::OPEN_ISO;
use crate::mesh::TriangleMesh;
use crate::node::Node;
use crate::types::{Aabb, ChunkId, NodeRef, PositionKey};
use glam::Vec3;
use rustc_hash::FxHashMap;

/// The surface graph of one chunk.
#[derive(Clone, Debug)]
pub struct MeshVertexGraph {
    chunk: ChunkId,
    bounds: Aabb,
    nodes: Vec<Node>,
    by_position: FxHashMap<PositionKey, u32>,
}

impl MeshVertexGraph {
    /// Build from a mesh whose positions are already in world space.
    pub fn new(chunk: ChunkId, bounds: Aabb, mesh: &TriangleMesh) -> Self {
        let mut graph = Self {
            chunk,
            bounds,
            nodes: Vec::new(),
            by_position: FxHashMap::default(),
        };

        let slots: Vec<u32> = mesh.positions.iter().map(|&p| graph.insert(p)).collect();

        for tri in &mesh.triangles {
            let Some(corners) = tri
                .iter()
                .map(|&v| slots.get(v as usize).copied())
                .collect::<Option<Vec<u32>>>()
            else {
                continue;
            };
            for (i, &a) in corners.iter().enumerate() {
                for &b in &corners[i + 1..] {
                    graph.link(a, b);
                }
            }
        }
        graph
    }

    /// Slot of the node at `position`, creating it if needed.
    fn insert(&mut self, position: Vec3) -> u32 {
        let key = PositionKey::from_position(position);
        if let Some(&slot) = self.by_position.get(&key) {
            return slot;
        }
        let slot = self.nodes.len() as u32;
        self.nodes.push(Node::new(position, OPEN_ISO));
        self.by_position.insert(key, slot);
        slot
    }

    fn link(&mut self, a: u32, b: u32) {
        if a == b {
            return;
        }
        let ra = NodeRef::new(self.chunk, a);
        let rb = NodeRef::new(self.chunk, b);
        self.nodes[a as usize].add_neighbor(rb);
        self.nodes[b as usize].add_neighbor(ra);
    }

    pub fn chunk(&self) -> ChunkId {
        self.chunk
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Slot of the node whose position quantizes to `key`.
    pub fn find_exact(&self, key: PositionKey) -> Option<u32> {
        self.by_position.get(&key).copied()
    }

    /// Slot of the node closest to `point` (linear scan).
    pub fn find_nearest(&self, point: Vec3) -> Option<u32> {
        nearest_by_scan(self.nodes(), point).map(|r| r.index)
    }

    /// Exact lookup by position, falling back to the nearest node when float
    /// seams between independently built meshes break the exact match.
    pub fn find(&self, key: PositionKey) -> Option<u32> {
        self.find_exact(key)
            .or_else(|| self.find_nearest(key.to_position()))
    }

    pub fn local_node(&self, slot: u32) -> Option<&Node> {
        self.nodes.get(slot as usize)
    }

    pub fn local_node_mut(&mut self, slot: u32) -> Option<&mut Node> {
        self.nodes.get_mut(slot as usize)
    }

    pub fn local_nodes(&self) -> impl Iterator<Item = (u32, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (i as u32, n))
    }

    pub fn link_count(&self) -> usize {
        self.nodes.iter().map(|n| n.neighbors.len()).sum()
    }
}

impl NodeGraph for MeshVertexGraph {
    fn node(&self, id: NodeRef) -> Option<&Node> {
        if id.chunk != self.chunk {
            return None;
        }
        self.nodes.get(id.index as usize)
    }

    fn node_mut(&mut self, id: NodeRef) -> Option<&mut Node> {
        if id.chunk != self.chunk {
            return None;
        }
        self.nodes.get_mut(id.index as usize)
    }

    fn neighbors(&self, id: NodeRef, out: &mut Vec<NodeRef>) {
        if let Some(node) = self.node(id) {
            out.extend(node.neighbors.iter().filter(|n| n.chunk == self.chunk));
        }
    }

    fn nodes(&self) -> impl Iterator<Item = (NodeRef, &Node)> {
        let chunk = self.chunk;
        self.nodes
            .iter()
            .enumerate()
            .map(move |(i, n)| (NodeRef::new(chunk, i as u32), n))
    }

    fn closest_node(&self, point: Vec3) -> Option<NodeRef> {
        nearest_by_scan(self.nodes(), point)
    }

    fn reset_nodes(&mut self) {
        for node in &mut self.nodes {
            node.search.clear();
        }
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Aabb {
        Aabb::from_min_size(Vec3::ZERO, Vec3::splat(10.0))
    }

    fn quad_with_repeated_vertices() -> TriangleMesh {
        // Two triangles sharing the edge (1,0,0)-(0,0,1), each with its own
        // copies of the shared vertices.
        TriangleMesh::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2], [3, 4, 5]],
        )
    }

    #[test]
    fn shared_vertices_dedupe() {
        let graph = MeshVertexGraph::new(ChunkId(0), bounds(), &quad_with_repeated_vertices());
        assert_eq!(graph.len(), 4);
        // Shared-edge nodes see both opposite corners.
        let a = graph.find_exact(PositionKey::from_position(Vec3::X)).unwrap();
        let b = graph.find_exact(PositionKey::from_position(Vec3::Z)).unwrap();
        let na = graph.local_node(a).unwrap();
        assert!(na.has_neighbor(NodeRef::new(ChunkId(0), b)));
        assert_eq!(na.neighbors.len(), 3);
        // The two far corners are not linked.
        let c = graph.find_exact(PositionKey::from_position(Vec3::ZERO)).unwrap();
        let d = graph.find_exact(PositionKey::from_position(Vec3::new(1.0, 0.0, 1.0))).unwrap();
        assert!(!graph.local_node(c).unwrap().has_neighbor(NodeRef::new(ChunkId(0), d)));
        assert_eq!(graph.link_count(), 10);
    }

    #[test]
    fn find_falls_back_to_nearest() {
        let graph = MeshVertexGraph::new(ChunkId(0), bounds(), &quad_with_repeated_vertices());
        let key = PositionKey::from_position(Vec3::new(1.01, 0.0, 0.98));
        assert_eq!(graph.find_exact(key), None);
        let slot = graph.find(key).unwrap();
        assert_eq!(graph.local_node(slot).unwrap().position, Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn closest_node_scans() {
        let graph = MeshVertexGraph::new(ChunkId(4), bounds(), &quad_with_repeated_vertices());
        let id = graph.closest_node(Vec3::new(-3.0, 0.0, -3.0)).unwrap();
        assert_eq!(id.chunk, ChunkId(4));
        assert_eq!(graph.node(id).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn empty_mesh_gives_empty_graph() {
        let graph = MeshVertexGraph::new(ChunkId(0), bounds(), &TriangleMesh::default());
        assert!(graph.is_empty());
        assert_eq!(graph.closest_node(Vec3::ZERO), None);
    }
}
