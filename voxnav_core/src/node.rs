// The atomic search unit shared by every graph in the crate.
//
// A `Node` carries its world position, the scalar field value sampled there
// (the "iso value"), its neighbor links as `NodeRef` handles, the pending
// cross-chunk `NeighborIdentifier`s recorded by the stitching pass, and the
// per-search scratch state written by A*/Theta*.
//
// Neighbor links are plain handles into chunk arenas, so a node can point into
// another chunk without owning it. Same-chunk links are made when a graph is
// built; cross-chunk links are recorded as identifiers first and resolved once
// every chunk exists (see `stitching.rs`).
//
// See also: `types.rs` for `NodeRef` and `PositionKey`, `grid.rs` and
// `mesh_graph.rs` for the two node arenas, `search.rs` for the code that
// reads and writes `SearchState`.
//
// **Critical constraint: identity by position.** `PartialEq` and `Hash` go
// through the node's `PositionKey`. Two nodes at the same quantized position
// are interchangeable regardless of which arena they live in.

use crate::types::{ChunkDirection, GridIndex, NodeRef, PositionKey};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};

// ---------------------------------------------------------------------------
// Cross-chunk identifiers
// ---------------------------------------------------------------------------

/// How a node in a neighboring chunk is found again during link resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKey {
    /// Index triple into a dense `Grid`.
    Grid(GridIndex),
    /// Quantized position of a `MeshVertexGraph` vertex.
    Position(PositionKey),
}

/// A deferred neighbor link: which node, in which neighboring chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NeighborIdentifier {
    pub key: NodeKey,
    pub direction: ChunkDirection,
}

impl NeighborIdentifier {
    pub fn new(key: NodeKey, direction: ChunkDirection) -> Self {
        Self { key, direction }
    }
}

// ---------------------------------------------------------------------------
// Search scratch
// ---------------------------------------------------------------------------

/// Per-search state. Cleared (cost = infinity, no parent) between queries.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchState {
    /// Accumulated cost from the search start.
    pub cost: f32,
    /// Estimated remaining cost to the goal.
    pub heuristic: f32,
    /// Weight of the heuristic in `total()`; `1 - balance` weights the cost.
    pub balance: f32,
    /// Predecessor on the best path found so far.
    pub parent: Option<NodeRef>,
}

impl SearchState {
    pub const CLEARED: SearchState = SearchState {
        cost: f32::INFINITY,
        heuristic: 0.0,
        balance: 0.5,
        parent: None,
    };

    /// Queue priority: `heuristic * balance + cost * (1 - balance)`.
    pub fn total(&self) -> f32 {
        self.heuristic * self.balance + self.cost * (1.0 - self.balance)
    }

    pub fn clear(&mut self) {
        *self = Self::CLEARED;
    }

    pub fn is_cleared(&self) -> bool {
        self.cost == f32::INFINITY && self.parent.is_none()
    }
}

impl Default for SearchState {
    fn default() -> Self {
        Self::CLEARED
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A point in a navigation graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub position: Vec3,
    /// Scalar field sample. A node is walkable when this exceeds the iso level.
    pub iso_value: f32,
    /// Unordered, duplicate-free neighbor handles (may point into other chunks).
    pub neighbors: Vec<NodeRef>,
    /// Cross-chunk links waiting for resolution. No two share a key within
    /// the same direction.
    pub identifiers: SmallVec<[NeighborIdentifier; 4]>,
    /// Index inside the owning `Grid`, for grid nodes only.
    pub grid_index: Option<GridIndex>,
    #[serde(skip)]
    pub search: SearchState,
}

impl Node {
    pub fn new(position: Vec3, iso_value: f32) -> Self {
        Self {
            position,
            iso_value,
            neighbors: Vec::new(),
            identifiers: SmallVec::new(),
            grid_index: None,
            search: SearchState::CLEARED,
        }
    }

    pub fn with_grid_index(mut self, index: GridIndex) -> Self {
        self.grid_index = Some(index);
        self
    }

    pub fn key(&self) -> PositionKey {
        PositionKey::from_position(self.position)
    }

    /// Add a neighbor link. Returns false if the link already existed.
    pub fn add_neighbor(&mut self, other: NodeRef) -> bool {
        if self.neighbors.contains(&other) {
            return false;
        }
        self.neighbors.push(other);
        true
    }

    pub fn remove_neighbor(&mut self, other: NodeRef) -> bool {
        match self.neighbors.iter().position(|&n| n == other) {
            Some(i) => {
                self.neighbors.swap_remove(i);
                true
            }
            None => false,
        }
    }

    pub fn has_neighbor(&self, other: NodeRef) -> bool {
        self.neighbors.contains(&other)
    }

    /// Record a deferred cross-chunk link. An identifier whose key is already
    /// present for the same direction is ignored; returns whether it was added.
    pub fn add_identifier(&mut self, identifier: NeighborIdentifier) -> bool {
        if self.identifiers.contains(&identifier) {
            return false;
        }
        self.identifiers.push(identifier);
        true
    }

    pub fn is_walkable(&self, iso_level: f32) -> bool {
        self.iso_value > iso_level
    }

    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.position.distance(point)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkId;

    fn r(i: u32) -> NodeRef {
        NodeRef::new(ChunkId(0), i)
    }

    #[test]
    fn add_neighbor_is_idempotent() {
        let mut n = Node::new(Vec3::ZERO, 1.0);
        assert!(n.add_neighbor(r(1)));
        assert!(!n.add_neighbor(r(1)));
        assert!(n.add_neighbor(r(2)));
        assert_eq!(n.neighbors.len(), 2);
        assert!(n.remove_neighbor(r(1)));
        assert!(!n.remove_neighbor(r(1)));
        assert!(!n.has_neighbor(r(1)));
        assert!(n.has_neighbor(r(2)));
    }

    #[test]
    fn identifiers_dedupe_by_key_per_direction() {
        let mut n = Node::new(Vec3::ZERO, 1.0);
        let key = NodeKey::Grid(GridIndex::new(0, 1, 2));
        assert!(n.add_identifier(NeighborIdentifier::new(key, ChunkDirection::X)));
        assert!(!n.add_identifier(NeighborIdentifier::new(key, ChunkDirection::X)));
        // Same index in a different neighbor chunk is a different node.
        assert!(n.add_identifier(NeighborIdentifier::new(key, ChunkDirection::Y)));
        assert_eq!(n.identifiers.len(), 2);
    }

    #[test]
    fn equality_by_position() {
        let a = Node::new(Vec3::new(1.0, 2.0, 3.0), 0.0);
        let mut b = Node::new(Vec3::new(1.0, 2.0, 3.0 + 1e-6), 1.0);
        b.add_neighbor(r(9));
        assert_eq!(a, b);
        let c = Node::new(Vec3::new(1.0, 2.0, 3.5), 0.0);
        assert_ne!(a, c);
    }

    #[test]
    fn total_blends_cost_and_heuristic() {
        let s = SearchState {
            cost: 4.0,
            heuristic: 10.0,
            balance: 0.25,
            parent: None,
        };
        assert!((s.total() - (10.0 * 0.25 + 4.0 * 0.75)).abs() < 1e-6);

        let mut s = s;
        s.clear();
        assert!(s.is_cleared());
        assert_eq!(s.cost, f32::INFINITY);
    }

    #[test]
    fn walkable_threshold_is_strict() {
        let n = Node::new(Vec3::ZERO, 0.5);
        assert!(!n.is_walkable(0.5));
        assert!(n.is_walkable(0.49));
    }
}
