// Core types shared across the navigation crate.
//
// Defines chunk and node identifiers (compact integer handles into per-chunk
// arenas), grid indices, the quantized position key used wherever a float
// position has to act as a dictionary key, chunk directions for cross-chunk
// links, and axis-aligned bounds. All types derive `Serialize` and
// `Deserialize` so a generated layout can be persisted by the caller.
//
// See also: `node.rs` for the `Node` that these handles point at, `chunk.rs`
// for the `ChunkLayout` that owns the arenas, `stitching.rs` for how
// `ChunkDirection` and `PositionKey` drive cross-chunk link resolution.
//
// **Critical constraint: position identity.** Two nodes are the same node when
// their `PositionKey`s match. Never hash or compare raw `f32` coordinates.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Arena handles
// ---------------------------------------------------------------------------

/// Index of a chunk inside its `ChunkLayout`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(pub u32);

impl ChunkId {
    /// Pseudo-chunk that owns the transient nodes of a `TempNodeDictionary`.
    pub const TEMPORARY: ChunkId = ChunkId(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::TEMPORARY {
            write!(f, "chunk(temp)")
        } else {
            write!(f, "chunk({})", self.0)
        }
    }
}

/// Handle to a node: the owning chunk plus the node's slot in that chunk's
/// arena (flat grid index for a `Grid`, insertion order for a
/// `MeshVertexGraph`, dictionary slot for temporary nodes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    pub chunk: ChunkId,
    pub index: u32,
}

impl NodeRef {
    pub const fn new(chunk: ChunkId, index: u32) -> Self {
        Self { chunk, index }
    }

    pub fn is_temporary(self) -> bool {
        self.chunk == ChunkId::TEMPORARY
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.chunk, self.index)
    }
}

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// Integer (x, y, z) index of a voxel inside its chunk's grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridIndex {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl GridIndex {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Offset by a signed direction. Returns `None` on underflow; the caller
    /// bounds-checks the upper side against its own extents.
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
            z: self.z.checked_add_signed(dz)?,
        })
    }
}

impl fmt::Display for GridIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

/// Resolution of `PositionKey` quantization in world units.
pub const POSITION_QUANTUM: f32 = 1e-4;

/// Hashable stand-in for a world position: each coordinate divided by
/// `POSITION_QUANTUM` and rounded. Points closer than half a quantum on every
/// axis map to the same key (up to rounding at cell borders, which the
/// stitching pass covers with a nearest-node fallback).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl PositionKey {
    pub fn from_position(pos: Vec3) -> Self {
        let q = 1.0 / POSITION_QUANTUM as f64;
        Self {
            x: (pos.x as f64 * q).round() as i64,
            y: (pos.y as f64 * q).round() as i64,
            z: (pos.z as f64 * q).round() as i64,
        }
    }

    /// The position at the center of this key's quantization cell.
    pub fn to_position(self) -> Vec3 {
        let q = POSITION_QUANTUM as f64;
        Vec3::new(
            (self.x as f64 * q) as f32,
            (self.y as f64 * q) as f32,
            (self.z as f64 * q) as f32,
        )
    }
}

/// Which chunk a neighbor lives in, relative to the chunk holding the link.
/// Chunks only know their neighbor along each positive axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkDirection {
    Same,
    X,
    Y,
    Z,
}

impl ChunkDirection {
    /// The three cross-chunk directions, in axis order.
    pub const AXES: [ChunkDirection; 3] = [ChunkDirection::X, ChunkDirection::Y, ChunkDirection::Z];

    /// Axis number (0 = x, 1 = y, 2 = z), or `None` for `Same`.
    pub fn axis(self) -> Option<usize> {
        match self {
            ChunkDirection::Same => None,
            ChunkDirection::X => Some(0),
            ChunkDirection::Y => Some(1),
            ChunkDirection::Z => Some(2),
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_min_size(min: Vec3, size: Vec3) -> Self {
        Self {
            min,
            max: min + size,
        }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Closest point inside the box.
    pub fn clamp(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_key_absorbs_float_noise() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(1.0 + 1e-6, 2.0 - 1e-6, 3.0 + 2e-6);
        assert_eq!(PositionKey::from_position(a), PositionKey::from_position(b));
    }

    #[test]
    fn position_key_separates_distinct_points() {
        let a = PositionKey::from_position(Vec3::new(0.0, 0.0, 0.0));
        let b = PositionKey::from_position(Vec3::new(0.001, 0.0, 0.0));
        assert_ne!(a, b);
    }

    #[test]
    fn position_key_negative_coordinates() {
        let k = PositionKey::from_position(Vec3::new(-2.5, -0.00004, 7.25));
        assert_eq!(k.x, -25_000);
        assert_eq!(k.y, 0);
        assert_eq!(k.z, 72_500);
        assert!((k.to_position() - Vec3::new(-2.5, 0.0, 7.25)).length() < 1e-4);
    }

    #[test]
    fn grid_index_offset_underflow() {
        let i = GridIndex::new(0, 3, 5);
        assert_eq!(i.offset(-1, 0, 0), None);
        assert_eq!(i.offset(1, -1, 1), Some(GridIndex::new(1, 2, 6)));
    }

    #[test]
    fn chunk_direction_axes() {
        assert_eq!(ChunkDirection::Same.axis(), None);
        let axes: Vec<_> = ChunkDirection::AXES.iter().map(|d| d.axis()).collect();
        assert_eq!(axes, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn aabb_contains_and_clamp() {
        let b = Aabb::from_min_size(Vec3::ZERO, Vec3::splat(10.0));
        assert!(b.contains(Vec3::splat(5.0)));
        assert!(b.contains(Vec3::splat(10.0)));
        assert!(!b.contains(Vec3::new(11.0, 5.0, 5.0)));
        assert_eq!(b.clamp(Vec3::new(-3.0, 4.0, 12.0)), Vec3::new(0.0, 4.0, 10.0));
        assert_eq!(b.center(), Vec3::splat(5.0));
    }

    #[test]
    fn node_ref_serialization_roundtrip() {
        let r = NodeRef::new(ChunkId(3), 42);
        let json = serde_json::to_string(&r).unwrap();
        let restored: NodeRef = serde_json::from_str(&json).unwrap();
        assert_eq!(r, restored);
        assert!(!r.is_temporary());
        assert!(NodeRef::new(ChunkId::TEMPORARY, 0).is_temporary());
    }
}
