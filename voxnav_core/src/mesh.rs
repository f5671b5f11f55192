// Indexed triangle meshes.
//
// `TriangleMesh` is the hand-off format between surface extraction
// (`marching_cubes.rs`) and sparse graph construction (`mesh_graph.rs`): a
// vertex position list plus index triples. `MeshBuilder` accumulates
// triangles and welds vertices by `PositionKey` in a `BTreeMap`, so triangles
// that share an edge share the vertex indices along it.
//
// See also: `surface.rs`, which flattens the layout's meshes into a triangle
// soup for ray intersection.

use crate::types::{Aabb, PositionKey};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Vertex positions plus triangle index triples.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub positions: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl TriangleMesh {
    pub fn new(positions: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            positions,
            triangles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Corner positions of a triangle, or `None` if any index is out of range.
    pub fn triangle(&self, i: usize) -> Option<[Vec3; 3]> {
        let [a, b, c] = *self.triangles.get(i)?;
        Some([
            *self.positions.get(a as usize)?,
            *self.positions.get(b as usize)?,
            *self.positions.get(c as usize)?,
        ])
    }

    /// Every well-formed triangle as corner positions.
    pub fn triangle_positions(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        (0..self.triangles.len()).filter_map(|i| self.triangle(i))
    }

    /// Move every vertex by `offset`.
    pub fn translate(&mut self, offset: Vec3) {
        for p in &mut self.positions {
            *p += offset;
        }
    }

    pub fn bounds(&self) -> Option<Aabb> {
        let first = *self.positions.first()?;
        let (min, max) = self
            .positions
            .iter()
            .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        Some(Aabb::new(min, max))
    }
}

/// Accumulates triangles, welding vertices that share a `PositionKey`.
#[derive(Debug, Default)]
pub struct MeshBuilder {
    positions: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    weld_map: BTreeMap<PositionKey, u32>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the welded vertex at `pos`, inserting it if new.
    pub fn vertex(&mut self, pos: Vec3) -> u32 {
        let key = PositionKey::from_position(pos);
        if let Some(&idx) = self.weld_map.get(&key) {
            return idx;
        }
        let idx = self.positions.len() as u32;
        self.positions.push(pos);
        self.weld_map.insert(key, idx);
        idx
    }

    /// Add a triangle. Triangles that collapse to fewer than three distinct
    /// welded vertices are dropped.
    pub fn triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) -> bool {
        let (ia, ib, ic) = (self.vertex(a), self.vertex(b), self.vertex(c));
        if ia == ib || ib == ic || ia == ic {
            return false;
        }
        self.triangles.push([ia, ib, ic]);
        true
    }

    pub fn finish(self) -> TriangleMesh {
        TriangleMesh {
            positions: self.positions,
            triangles: self.triangles,
        }
    }
}
