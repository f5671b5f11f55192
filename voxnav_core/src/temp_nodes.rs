// Transient query nodes layered over a permanent graph.
//
// A query between arbitrary world points needs nodes at those exact points.
// `TempNodeDictionary` holds them in its own arena, addressed by `NodeRef`s in
// the reserved `ChunkId::TEMPORARY` chunk, so the permanent graphs are never
// written to:
//
// - A temp node is anchored to a real node. It takes the anchor's iso value
//   and links to the anchor plus the anchor's own neighbors, so it behaves
//   like a copy of the anchor sitting at the query point.
// - Links from real nodes back to a temp node live in `extra_links`, a side
//   table consulted only through `TempOverlay`. The real node's neighbor list
//   is untouched.
//
// `overlay` pairs the dictionary with a base graph as one `NodeGraph` for the
// duration of a search. `cleanup` drops every temp node and side link.
//
// See also: `planner.rs` which creates and cleans up temp nodes per query,
// `types.rs` for `ChunkId::TEMPORARY`.

use crate::graph::{NodeGraph, nearest_by_scan};
use crate::grid::OPEN_ISO;
use crate::node::Node;
use crate::types::{ChunkId, NodeRef, PositionKey};
use glam::Vec3;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

#[derive(Clone, Debug, Default)]
pub struct TempNodeDictionary {
    nodes: Vec<Node>,
    by_key: FxHashMap<PositionKey, u32>,
    extra_links: FxHashMap<NodeRef, SmallVec<[NodeRef; 2]>>,
}

impl TempNodeDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeRef) -> Option<&Node> {
        if !id.is_temporary() {
            return None;
        }
        self.nodes.get(id.index as usize)
    }

    fn get_mut(&mut self, id: NodeRef) -> Option<&mut Node> {
        if !id.is_temporary() {
            return None;
        }
        self.nodes.get_mut(id.index as usize)
    }

    /// Add a temp node at `position` anchored to the real node `anchor` of
    /// `base`. A second node at the same (quantized) position reuses the
    /// first and just gains the new anchor.
    pub fn add_temp_node<G: NodeGraph>(&mut self, base: &G, position: Vec3, anchor: NodeRef) -> NodeRef {
        let key = PositionKey::from_position(position);
        let id = match self.by_key.get(&key) {
            Some(&slot) => NodeRef::new(ChunkId::TEMPORARY, slot),
            None => {
                let slot = self.nodes.len() as u32;
                let iso = base.node(anchor).map_or(OPEN_ISO, |n| n.iso_value);
                self.nodes.push(Node::new(position, iso));
                self.by_key.insert(key, slot);
                NodeRef::new(ChunkId::TEMPORARY, slot)
            }
        };
        if base.node(anchor).is_none() {
            return id;
        }

        let mut attach = vec![anchor];
        base.neighbors(anchor, &mut attach);
        for real in attach {
            self.link(id, real);
        }
        id
    }

    /// Link two nodes in both directions. Either side may be temporary; links
    /// out of real nodes go to the side table.
    pub fn link(&mut self, a: NodeRef, b: NodeRef) {
        if a == b {
            return;
        }
        self.link_one_way(a, b);
        self.link_one_way(b, a);
    }

    fn link_one_way(&mut self, from: NodeRef, to: NodeRef) {
        if from.is_temporary() {
            if let Some(node) = self.get_mut(from) {
                node.add_neighbor(to);
            }
            return;
        }
        let links = self.extra_links.entry(from).or_default();
        if !links.contains(&to) {
            links.push(to);
        }
    }

    /// Side-table links out of a real node.
    pub fn extra_links(&self, real: NodeRef) -> &[NodeRef] {
        self.extra_links.get(&real).map(|l| l.as_slice()).unwrap_or(&[])
    }

    /// View `base` with this dictionary's nodes and links layered on top.
    pub fn overlay<'a, G: NodeGraph>(&'a mut self, base: &'a mut G) -> TempOverlay<'a, G> {
        TempOverlay { temp: self, base }
    }

    /// Remove every temp node and every side link.
    pub fn cleanup(&mut self) {
        self.nodes.clear();
        self.by_key.clear();
        self.extra_links.clear();
    }
}

/// A base graph plus temp nodes, searched as one graph.
pub struct TempOverlay<'a, G> {
    temp: &'a mut TempNodeDictionary,
    base: &'a mut G,
}

impl<G: NodeGraph> NodeGraph for TempOverlay<'_, G> {
    fn node(&self, id: NodeRef) -> Option<&Node> {
        if id.is_temporary() {
            self.temp.get(id)
        } else {
            self.base.node(id)
        }
    }

    fn node_mut(&mut self, id: NodeRef) -> Option<&mut Node> {
        if id.is_temporary() {
            self.temp.get_mut(id)
        } else {
            self.base.node_mut(id)
        }
    }

    fn neighbors(&self, id: NodeRef, out: &mut Vec<NodeRef>) {
        if id.is_temporary() {
            if let Some(node) = self.temp.get(id) {
                out.extend(node.neighbors.iter().filter(|&&n| self.node(n).is_some()));
            }
            return;
        }
        self.base.neighbors(id, out);
        out.extend_from_slice(self.temp.extra_links(id));
    }

    fn nodes(&self) -> impl Iterator<Item = (NodeRef, &Node)> {
        let temps = self
            .temp
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeRef::new(ChunkId::TEMPORARY, i as u32), n));
        self.base.nodes().chain(temps)
    }

    fn closest_node(&self, point: Vec3) -> Option<NodeRef> {
        let temps = self
            .temp
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeRef::new(ChunkId::TEMPORARY, i as u32), n));
        let candidates = [self.base.closest_node(point), nearest_by_scan(temps, point)];
        candidates
            .into_iter()
            .flatten()
            .filter_map(|id| self.position(id).map(|p| (id, p.distance_squared(point))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    fn reset_nodes(&mut self) {
        self.base.reset_nodes();
        for node in &mut self.temp.nodes {
            node.search.clear();
        }
    }

    fn node_count(&self) -> usize {
        self.base.node_count() + self.temp.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::types::{Aabb, GridIndex};

    fn grid() -> Grid {
        let bounds = Aabb::from_min_size(Vec3::ZERO, Vec3::new(4.0, 1.0, 1.0));
        Grid::new(ChunkId(0), bounds, Vec3::ONE, false, &|_: Vec3| 0.8_f32)
    }

    #[test]
    fn temp_node_copies_anchor_links() {
        let base = grid();
        let anchor = base.node_ref(GridIndex::new(1, 0, 0)).unwrap();
        let mut temp = TempNodeDictionary::new();
        let id = temp.add_temp_node(&base, Vec3::new(1.2, 0.1, 0.0), anchor);

        assert!(id.is_temporary());
        let node = temp.get(id).unwrap();
        assert_eq!(node.iso_value, 0.8);
        assert_eq!(node.neighbors.len(), 3);
        assert!(node.has_neighbor(anchor));
        assert!(temp.extra_links(anchor).contains(&id));
        // The real node's own list is untouched.
        assert_eq!(base.node(anchor).unwrap().neighbors.len(), 2);
    }

    #[test]
    fn overlay_sees_both_directions() {
        let mut base = grid();
        let anchor = base.node_ref(GridIndex::new(3, 0, 0)).unwrap();
        let mut temp = TempNodeDictionary::new();
        let id = temp.add_temp_node(&base, Vec3::new(3.4, 0.0, 0.0), anchor);

        let overlay = temp.overlay(&mut base);
        let mut out = Vec::new();
        overlay.neighbors(anchor, &mut out);
        assert!(out.contains(&id));
        out.clear();
        overlay.neighbors(id, &mut out);
        assert!(out.contains(&anchor));
        assert_eq!(overlay.node_count(), 5);
        assert_eq!(overlay.closest_node(Vec3::new(3.5, 0.0, 0.0)), Some(id));
        assert_eq!(overlay.closest_node(Vec3::new(0.2, 0.0, 0.0)), base_ref(0));
    }

    fn base_ref(x: u32) -> Option<NodeRef> {
        Some(NodeRef::new(ChunkId(0), x))
    }

    #[test]
    fn same_position_reuses_node() {
        let base = grid();
        let a = base.node_ref(GridIndex::new(0, 0, 0)).unwrap();
        let b = base.node_ref(GridIndex::new(3, 0, 0)).unwrap();
        let mut temp = TempNodeDictionary::new();
        let first = temp.add_temp_node(&base, Vec3::new(1.5, 0.0, 0.0), a);
        let second = temp.add_temp_node(&base, Vec3::new(1.5, 0.0, 0.0), b);
        assert_eq!(first, second);
        assert_eq!(temp.len(), 1);
        assert!(temp.get(first).unwrap().has_neighbor(b));
    }

    #[test]
    fn link_and_cleanup() {
        let base = grid();
        let anchor = base.node_ref(GridIndex::new(0, 0, 0)).unwrap();
        let mut temp = TempNodeDictionary::new();
        let a = temp.add_temp_node(&base, Vec3::new(0.0, 0.5, 0.0), anchor);
        let b = temp.add_temp_node(&base, Vec3::new(9.0, 9.0, 9.0), NodeRef::new(ChunkId(5), 0));
        temp.link(a, b);
        assert!(temp.get(b).unwrap().has_neighbor(a));
        // Unknown anchor: node exists but has only the explicit link.
        assert_eq!(temp.get(b).unwrap().neighbors.len(), 1);
        assert_eq!(temp.get(b).unwrap().iso_value, OPEN_ISO);

        temp.cleanup();
        assert!(temp.is_empty());
        assert!(temp.extra_links(anchor).is_empty());
        assert!(temp.get(a).is_none());
    }
}
