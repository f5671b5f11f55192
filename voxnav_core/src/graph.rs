// The graph abstraction the search algorithms run over.
//
// Anything that owns (or views) `Node`s and can enumerate their neighbors is a
// `NodeGraph`: a single chunk's `Grid` or `MeshVertexGraph`, a whole layout
// layer (`GridLayer`/`MeshLayer` in `chunk.rs`), or a `TempOverlay` that
// layers transient query nodes over one of those.
//
// A standalone per-chunk graph only resolves handles into its own chunk;
// links into other chunks are visible through the layer views.
//
// See also: `search.rs` for the generic best-first loop, `temp_nodes.rs` for
// the overlay.

use crate::node::Node;
use crate::types::NodeRef;
use glam::Vec3;

/// Read/write access to a set of nodes addressed by `NodeRef`.
pub trait NodeGraph {
    fn node(&self, id: NodeRef) -> Option<&Node>;

    fn node_mut(&mut self, id: NodeRef) -> Option<&mut Node>;

    /// Append the resolvable neighbors of `id` to `out`. Handles this graph
    /// cannot resolve (e.g. a chunk that does not exist) are skipped.
    fn neighbors(&self, id: NodeRef, out: &mut Vec<NodeRef>);

    /// Every node in the graph with its handle.
    fn nodes(&self) -> impl Iterator<Item = (NodeRef, &Node)>;

    /// The node closest to an arbitrary world point, or `None` if the graph
    /// has no nodes.
    fn closest_node(&self, point: Vec3) -> Option<NodeRef>;

    /// Clear the search scratch state of every node.
    fn reset_nodes(&mut self);

    fn node_count(&self) -> usize {
        self.nodes().count()
    }

    fn position(&self, id: NodeRef) -> Option<Vec3> {
        self.node(id).map(|n| n.position)
    }
}

/// Linear scan for the node nearest `point` by squared distance. Used by the
/// sparse graphs; the dense grid computes its answer analytically.
pub fn nearest_by_scan<'a>(
    nodes: impl Iterator<Item = (NodeRef, &'a Node)>,
    point: Vec3,
) -> Option<NodeRef> {
    let mut best: Option<(NodeRef, f32)> = None;
    for (id, node) in nodes {
        let d = node.position.distance_squared(point);
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((id, d));
        }
    }
    best.map(|(id, _)| id)
}
