// Dense per-chunk voxel grid.
//
// A `Grid` holds one `Node` per voxel of its chunk, laid out in a flat `Vec`
// with the same indexing as a voxel world: `x + z * size_x + y * size_x *
// size_z`. Node positions are `origin + index * step`; the grid spans
// `floor(chunk_size / step)` voxels per axis, with the step clamped to at least
// `MIN_STEP` on every axis.
//
// Construction samples a `ScalarField` at every voxel and then links each node
// to its face neighbors (6-connectivity), plus the edge and corner neighbors
// when diagonals are allowed (26-connectivity). Linking walks the 13
// "positive" directions and adds both halves of each link, so adjacency is
// symmetric by construction. Out-of-bounds directions are skipped; the
// cross-chunk half of the boundary is added later by `stitching.rs`.
//
// `IsoLookup` is the read-only sampling view used by marching cubes. A lone
// grid answers out-of-range indices with `OPEN_ISO`; the seam-aware view in
// `chunk.rs` forwards them to the neighboring chunk's grid instead.
//
// See also: `chunk.rs` for the layout that owns one grid per chunk,
// `marching_cubes.rs` for the surface extraction that reads the iso values,
// `node.rs` for `Node`.

use crate::field::ScalarField;
use crate::graph::NodeGraph;
use crate::node::Node;
use crate::types::{Aabb, ChunkId, GridIndex, NodeRef};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Smallest step accepted on any axis.
pub const MIN_STEP: f32 = 0.5;

/// Iso value reported for indices outside every known grid: fully open.
pub const OPEN_ISO: f32 = 1.0;

/// Read-only iso sampling by signed voxel index, used by surface extraction.
pub trait IsoLookup {
    /// Voxel count per axis of the grid the indices are relative to.
    fn extents(&self) -> [u32; 3];

    /// Iso value at a voxel index. Indices outside the grid resolve through
    /// whatever neighbor data the implementation has, or `OPEN_ISO`.
    fn iso_at(&self, x: i64, y: i64, z: i64) -> f32;
}

/// The dense voxel graph of one chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Grid {
    chunk: ChunkId,
    origin: Vec3,
    step: Vec3,
    size_x: u32,
    size_y: u32,
    size_z: u32,
    nodes: Vec<Node>,
}

impl Grid {
    /// Sample `field` over the chunk `bounds` and link same-chunk neighbors.
    pub fn new<F>(chunk: ChunkId, bounds: Aabb, step: Vec3, allow_diagonal: bool, field: &F) -> Self
    where
        F: ScalarField + ?Sized,
    {
        let step = clamp_step(step);
        let extent = bounds.size() / step;
        // A tiny epsilon keeps e.g. 20.0 / (20.0 / 3.0) from flooring to 2.
        let size = |e: f32| ((e + 1e-4).floor() as u32).max(1);
        let (size_x, size_y, size_z) = (size(extent.x), size(extent.y), size(extent.z));

        let count = size_x as usize * size_y as usize * size_z as usize;
        let mut nodes = Vec::with_capacity(count);
        for y in 0..size_y {
            for z in 0..size_z {
                for x in 0..size_x {
                    let index = GridIndex::new(x, y, z);
                    let position = bounds.min + Vec3::new(x as f32, y as f32, z as f32) * step;
                    nodes.push(Node::new(position, field.sample(position)).with_grid_index(index));
                }
            }
        }

        let mut grid = Self {
            chunk,
            origin: bounds.min,
            step,
            size_x,
            size_y,
            size_z,
            nodes,
        };
        grid.link_neighbors(allow_diagonal);
        grid
    }

    fn link_neighbors(&mut self, allow_diagonal: bool) {
        let directions: Vec<(i32, i32, i32)> = half_directions()
            .filter(|&d| allow_diagonal || is_face(d))
            .collect();
        for i in 0..self.nodes.len() {
            let index = self.index_at(i);
            for &(dx, dy, dz) in &directions {
                let Some(other) = index.offset(dx, dy, dz).and_then(|o| self.flat_index(o)) else {
                    continue;
                };
                let a = NodeRef::new(self.chunk, i as u32);
                let b = NodeRef::new(self.chunk, other as u32);
                self.nodes[i].add_neighbor(b);
                self.nodes[other].add_neighbor(a);
            }
        }
    }

    pub fn chunk(&self) -> ChunkId {
        self.chunk
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn step(&self) -> Vec3 {
        self.step
    }

    pub fn size(&self) -> [u32; 3] {
        [self.size_x, self.size_y, self.size_z]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn in_bounds(&self, index: GridIndex) -> bool {
        index.x < self.size_x && index.y < self.size_y && index.z < self.size_z
    }

    /// Flat arena slot of a grid index, or `None` if out of bounds.
    pub fn flat_index(&self, index: GridIndex) -> Option<usize> {
        if !self.in_bounds(index) {
            return None;
        }
        let (x, y, z) = (index.x as usize, index.y as usize, index.z as usize);
        let sx = self.size_x as usize;
        let sz = self.size_z as usize;
        Some(x + z * sx + y * sx * sz)
    }

    /// Inverse of `flat_index`.
    pub fn index_at(&self, flat: usize) -> GridIndex {
        let sx = self.size_x as usize;
        let sz = self.size_z as usize;
        GridIndex::new(
            (flat % sx) as u32,
            (flat / (sx * sz)) as u32,
            ((flat / sx) % sz) as u32,
        )
    }

    pub fn node_ref(&self, index: GridIndex) -> Option<NodeRef> {
        self.flat_index(index)
            .map(|i| NodeRef::new(self.chunk, i as u32))
    }

    pub fn node_at(&self, index: GridIndex) -> Option<&Node> {
        self.flat_index(index).map(|i| &self.nodes[i])
    }

    pub fn node_at_mut(&mut self, index: GridIndex) -> Option<&mut Node> {
        self.flat_index(index).map(move |i| &mut self.nodes[i])
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

    /// Iso value at an in-bounds index.
    pub fn iso(&self, index: GridIndex) -> Option<f32> {
        self.node_at(index).map(|n| n.iso_value)
    }

    /// Iso values in arena order, for snapshots that outlive a borrow.
    pub fn iso_values(&self) -> Vec<f32> {
        self.nodes.iter().map(|n| n.iso_value).collect()
    }

    /// The voxel nearest `point`: offset from the origin divided by the step,
    /// rounded, then clamped into the grid.
    pub fn closest_index(&self, point: Vec3) -> GridIndex {
        let local = ((point - self.origin) / self.step).round();
        let clamp = |v: f32, size: u32| v.clamp(0.0, (size - 1) as f32) as u32;
        GridIndex::new(
            clamp(local.x, self.size_x),
            clamp(local.y, self.size_y),
            clamp(local.z, self.size_z),
        )
    }

    pub fn bounds(&self) -> Aabb {
        let size = Vec3::new(self.size_x as f32, self.size_y as f32, self.size_z as f32);
        Aabb::from_min_size(self.origin, size * self.step)
    }

    /// Total directed neighbor links, cross-chunk links included.
    pub fn link_count(&self) -> usize {
        self.nodes.iter().map(|n| n.neighbors.len()).sum()
    }
}

/// Clamp every axis of a step vector to at least `MIN_STEP`.
pub fn clamp_step(step: Vec3) -> Vec3 {
    let step = Vec3::new(
        if step.x.is_nan() { MIN_STEP } else { step.x },
        if step.y.is_nan() { MIN_STEP } else { step.y },
        if step.z.is_nan() { MIN_STEP } else { step.z },
    );
    step.max(Vec3::splat(MIN_STEP))
}

/// The 13 offsets that are lexicographically positive: one from each
/// opposite pair of the 26 neighbor directions.
fn half_directions() -> impl Iterator<Item = (i32, i32, i32)> {
    (-1..=1)
        .flat_map(|dx| (-1..=1).flat_map(move |dy| (-1..=1).map(move |dz| (dx, dy, dz))))
        .filter(|&d| d > (0, 0, 0))
}

fn is_face((dx, dy, dz): (i32, i32, i32)) -> bool {
    dx.abs() + dy.abs() + dz.abs() == 1
}

impl IsoLookup for Grid {
    fn extents(&self) -> [u32; 3] {
        self.size()
    }

    fn iso_at(&self, x: i64, y: i64, z: i64) -> f32 {
        let (Ok(x), Ok(y), Ok(z)) = (u32::try_from(x), u32::try_from(y), u32::try_from(z)) else {
            return OPEN_ISO;
        };
        self.iso(GridIndex::new(x, y, z)).unwrap_or(OPEN_ISO)
    }
}

impl NodeGraph for Grid {
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
        if self.nodes.is_empty() {
            return None;
        }
        self.node_ref(self.closest_index(point))
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
