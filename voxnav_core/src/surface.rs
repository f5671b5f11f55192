// Segment/surface intersection, the collaborator behind line of sight and
// multi-segment planning.
//
// A `SurfaceQuery` answers two questions about a straight segment: where does
// it cross a surface (ordered from the start), and is there an obstacle near
// a point. Three backends:
//
//   MeshSurface   every triangle of the layout's generated meshes, both faces.
//                 Used by the surface-graph planner to find where the query
//                 line enters and leaves the walkable surface, and by Theta*
//                 over the surface graph.
//   FieldSurface  the layout's grids, sampled voxel by voxel. A crossing is
//                 recorded wherever the segment moves between walkable and
//                 blocked voxels. Used by Theta* over the dense grid.
//   SolidMesh     a `MeshSurface` paired with a `FieldSurface`. Crossings come
//                 from the mesh, and the field answers whether a segment runs
//                 through the solid. Used by Theta* over the surface graph.
//   OpenSpace     nothing to hit.
//
// Both real backends are snapshots: they copy what they need out of the
// layout, so a search can hold `&mut` on the layout's nodes while querying.
//
// `line_of_sight` is the blocking rule Theta* uses: any obstacle-tagged hit
// strictly between the endpoints, a segment interior that runs through the
// solid, or (with a radius) any obstacle near the segment midpoint.
//
// **Critical constraint:** surface-graph nodes sit on the mesh, so a segment
// between two of them has no crossing strictly inside it even when it tunnels
// through the solid underneath. Mesh crossings alone are not enough for
// surface-graph line of sight; the solid test has to run too.
//
// See also: `theta_star.rs`, `planner.rs`, `chunk.rs` for `LayoutGeometry`.

use crate::chunk::{ChunkLayout, LayoutGeometry};
use crate::field::Obstacle;
use crate::grid::{Grid, OPEN_ISO, clamp_step};
use crate::types::Aabb;
use glam::Vec3;

/// Crossings closer to a segment endpoint than this do not block it.
pub const ENDPOINT_EPSILON: f32 = 1e-3;

/// Upper bound on crossings reported for one segment.
pub const MAX_CROSSINGS: usize = 100;

/// Hits closer together than this (along the segment) are one hit.
const DEDUP_DISTANCE: f32 = 1e-4;

/// Bisection steps used to place a crossing between two march samples.
const REFINE_STEPS: u32 = 8;

/// A point where a segment crosses a surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceHit {
    pub position: Vec3,
    /// Distance from the segment start.
    pub distance: f32,
    /// Entering something that blocks movement (as opposed to leaving it).
    pub is_obstacle: bool,
}

pub trait SurfaceQuery {
    /// Every crossing of the segment `from -> to`, ordered by distance from
    /// `from`.
    fn intersections(&self, from: Vec3, to: Vec3) -> Vec<SurfaceHit>;

    /// Whether any obstacle lies within `radius` of `point`.
    fn obstacle_within(&self, point: Vec3, radius: f32) -> bool;

    /// Whether the interior of `from -> to` passes through solid volume.
    /// Backends without a notion of volume report false.
    fn passes_through_solid(&self, _from: Vec3, _to: Vec3) -> bool {
        false
    }
}

/// Whether the straight segment between two points is unobstructed.
pub fn line_of_sight(surface: &dyn SurfaceQuery, from: Vec3, to: Vec3, radius: f32) -> bool {
    let length = from.distance(to);
    let blocked = surface.intersections(from, to).iter().any(|hit| {
        hit.is_obstacle && hit.distance > ENDPOINT_EPSILON && length - hit.distance > ENDPOINT_EPSILON
    });
    if blocked || surface.passes_through_solid(from, to) {
        return false;
    }
    radius <= 0.0 || !surface.obstacle_within(from.lerp(to, 0.5), radius)
}

/// Sort by distance, merge coincident hits and cap the count.
fn finish_hits(mut hits: Vec<SurfaceHit>) -> Vec<SurfaceHit> {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits.dedup_by(|later, earlier| later.distance - earlier.distance < DEDUP_DISTANCE);
    hits.truncate(MAX_CROSSINGS);
    hits
}

// ---------------------------------------------------------------------------
// Open space
// ---------------------------------------------------------------------------

/// A surface with nothing in it.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenSpace;

impl SurfaceQuery for OpenSpace {
    fn intersections(&self, _from: Vec3, _to: Vec3) -> Vec<SurfaceHit> {
        Vec::new()
    }

    fn obstacle_within(&self, _point: Vec3, _radius: f32) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Triangle mesh
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
struct Triangle {
    corners: [Vec3; 3],
    bounds: Aabb,
}

/// Every triangle of a layout's surface meshes, plus optional obstacles for
/// the clearance check.
#[derive(Clone, Debug, Default)]
pub struct MeshSurface {
    triangles: Vec<Triangle>,
    obstacles: Vec<Obstacle>,
}

impl MeshSurface {
    pub fn new(triangles: impl IntoIterator<Item = [Vec3; 3]>) -> Self {
        let triangles = triangles
            .into_iter()
            .map(|corners| {
                let [a, b, c] = corners;
                Triangle {
                    corners,
                    bounds: Aabb::new(a.min(b).min(c), a.max(b).max(c)),
                }
            })
            .collect();
        Self {
            triangles,
            obstacles: Vec::new(),
        }
    }

    /// Snapshot of every chunk's mesh. Chunks that were never marched add
    /// nothing.
    pub fn from_layout(layout: &ChunkLayout) -> Self {
        Self::new(
            layout
                .chunks()
                .iter()
                .filter_map(|c| c.mesh.as_ref())
                .flat_map(|m| m.triangle_positions()),
        )
    }

    pub fn with_obstacles(mut self, obstacles: Vec<Obstacle>) -> Self {
        self.obstacles = obstacles;
        self
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

impl SurfaceQuery for MeshSurface {
    fn intersections(&self, from: Vec3, to: Vec3) -> Vec<SurfaceHit> {
        let length = from.distance(to);
        if length <= 0.0 {
            return Vec::new();
        }
        let segment = Aabb::new(from.min(to), from.max(to));
        let hits = self
            .triangles
            .iter()
            .filter(|tri| overlaps(&segment, &tri.bounds))
            .filter_map(|tri| segment_triangle(from, to, tri.corners))
            .map(|t| SurfaceHit {
                position: from.lerp(to, t),
                distance: t * length,
                is_obstacle: true,
            })
            .collect();
        finish_hits(hits)
    }

    fn obstacle_within(&self, point: Vec3, radius: f32) -> bool {
        self.obstacles.iter().any(|o| o.distance(point) <= radius)
    }
}

fn overlaps(a: &Aabb, b: &Aabb) -> bool {
    a.min.cmple(b.max).all() && b.min.cmple(a.max).all()
}

/// Möller–Trumbore against the segment `from -> to`, either face. Returns the
/// segment parameter in [0, 1] of the hit.
fn segment_triangle(from: Vec3, to: Vec3, [a, b, c]: [Vec3; 3]) -> Option<f32> {
    let dir = to - from;
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < 1e-8 {
        // Parallel, including segments lying in the triangle's plane.
        return None;
    }
    let inv = 1.0 / det;
    let s = from - a;
    let u = s.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv;
    (0.0..=1.0).contains(&t).then_some(t)
}

// ---------------------------------------------------------------------------
// Iso field
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct GridSnapshot {
    origin: Vec3,
    step: Vec3,
    size: [u32; 3],
    values: Vec<f32>,
}

impl GridSnapshot {
    fn of(grid: &Grid) -> Self {
        Self {
            origin: grid.origin(),
            step: grid.step(),
            size: grid.size(),
            values: grid.iso_values(),
        }
    }

    /// Iso value of the voxel nearest `point`, same flat order as `Grid`.
    fn nearest(&self, point: Vec3) -> f32 {
        let local = ((point - self.origin) / self.step).round();
        let [sx, sy, sz] = self.size;
        let clamp = |v: f32, size: u32| v.clamp(0.0, (size - 1) as f32) as usize;
        let (x, y, z) = (clamp(local.x, sx), clamp(local.y, sy), clamp(local.z, sz));
        let (sx, sz) = (sx as usize, sz as usize);
        self.values
            .get(x + z * sx + y * sx * sz)
            .copied()
            .unwrap_or(OPEN_ISO)
    }
}

/// The layout's grids as a solid/open volume.
#[derive(Clone, Debug)]
pub struct FieldSurface {
    geometry: LayoutGeometry,
    bounds: Aabb,
    grids: Vec<Option<GridSnapshot>>,
    iso_level: f32,
    march_step: f32,
}

impl FieldSurface {
    pub fn from_layout(layout: &ChunkLayout) -> Self {
        let grids: Vec<Option<GridSnapshot>> = layout
            .chunks()
            .iter()
            .map(|c| c.grid().map(GridSnapshot::of))
            .collect();
        let march_step = grids
            .iter()
            .flatten()
            .map(|g| g.step.min_element())
            .fold(clamp_step(layout.settings().step).min_element(), f32::min)
            * 0.5;
        Self {
            geometry: layout.geometry(),
            bounds: layout.bounds(),
            grids,
            iso_level: layout.settings().iso_level,
            march_step,
        }
    }

    /// Iso value at `point`, `OPEN_ISO` outside the layout or in a chunk
    /// without a grid.
    pub fn sample(&self, point: Vec3) -> f32 {
        if !self.bounds.contains(point) {
            return OPEN_ISO;
        }
        let chunk = self.geometry.chunk_at(point);
        match self.grids.get(chunk.index()) {
            Some(Some(grid)) => grid.nearest(point),
            _ => OPEN_ISO,
        }
    }

    pub fn is_blocked(&self, point: Vec3) -> bool {
        self.sample(point) <= self.iso_level
    }

    /// Blocked at `point` and a quarter voxel away along every axis. Points
    /// on the iso-surface itself always have an open voxel that close.
    pub fn is_deep_solid(&self, point: Vec3) -> bool {
        let reach = self.march_step * 0.5;
        self.is_blocked(point)
            && [Vec3::X, Vec3::Y, Vec3::Z].iter().all(|&axis| {
                self.is_blocked(point + axis * reach) && self.is_blocked(point - axis * reach)
            })
    }

    /// Whether any interior sample of `from -> to`, half a voxel apart, is
    /// deep inside the solid. The endpoints themselves are not sampled.
    pub fn solid_between(&self, from: Vec3, to: Vec3) -> bool {
        let length = from.distance(to);
        if length <= 0.0 || !length.is_finite() {
            return false;
        }
        let samples = (length / self.march_step).ceil().max(2.0) as u32;
        (1..samples).any(|i| self.is_deep_solid(from.lerp(to, i as f32 / samples as f32)))
    }

    /// Parameter in (lo, hi] where blockage first equals `blocked_at_hi`.
    fn refine(&self, from: Vec3, to: Vec3, mut lo: f32, mut hi: f32, blocked_at_hi: bool) -> f32 {
        for _ in 0..REFINE_STEPS {
            let mid = (lo + hi) * 0.5;
            if self.is_blocked(from.lerp(to, mid)) == blocked_at_hi {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        hi
    }
}

impl SurfaceQuery for FieldSurface {
    fn intersections(&self, from: Vec3, to: Vec3) -> Vec<SurfaceHit> {
        let length = from.distance(to);
        if length <= 0.0 || !length.is_finite() {
            return Vec::new();
        }
        let samples = (length / self.march_step).ceil().max(1.0) as u32;
        let mut hits = Vec::new();
        let mut prev_t = 0.0;
        let mut prev_blocked = self.is_blocked(from);
        for i in 1..=samples {
            let t = i as f32 / samples as f32;
            let blocked = self.is_blocked(from.lerp(to, t));
            if blocked != prev_blocked {
                let t = self.refine(from, to, prev_t, t, blocked);
                hits.push(SurfaceHit {
                    position: from.lerp(to, t),
                    distance: t * length,
                    is_obstacle: blocked,
                });
                if hits.len() >= MAX_CROSSINGS {
                    break;
                }
            }
            prev_t = t;
            prev_blocked = blocked;
        }
        finish_hits(hits)
    }

    fn obstacle_within(&self, point: Vec3, radius: f32) -> bool {
        if self.is_blocked(point) {
            return true;
        }
        [Vec3::X, Vec3::Y, Vec3::Z].iter().any(|&axis| {
            self.is_blocked(point + axis * radius) || self.is_blocked(point - axis * radius)
        })
    }
}

// ---------------------------------------------------------------------------
// Mesh plus solid
// ---------------------------------------------------------------------------

/// Mesh crossings with the grid field standing in for the solid under the
/// mesh.
#[derive(Clone, Copy, Debug)]
pub struct SolidMesh<'a> {
    pub mesh: &'a MeshSurface,
    pub field: &'a FieldSurface,
}

impl SurfaceQuery for SolidMesh<'_> {
    fn intersections(&self, from: Vec3, to: Vec3) -> Vec<SurfaceHit> {
        self.mesh.intersections(from, to)
    }

    fn obstacle_within(&self, point: Vec3, radius: f32) -> bool {
        self.mesh.obstacle_within(point, radius)
    }

    fn passes_through_solid(&self, from: Vec3, to: Vec3) -> bool {
        self.field.solid_between(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GridSettings, LayoutSettings};

    fn floor_surface() -> MeshSurface {
        // Unit square at y = 0 spanning x, z in [0, 4].
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(4.0, 0.0, 0.0);
        let c = Vec3::new(4.0, 0.0, 4.0);
        let d = Vec3::new(0.0, 0.0, 4.0);
        MeshSurface::new([[a, b, c], [a, c, d]])
    }

    #[test]
    fn segment_hits_both_faces() {
        let surface = floor_surface();
        let down = surface.intersections(Vec3::new(1.0, 2.0, 1.0), Vec3::new(1.0, -2.0, 1.0));
        assert_eq!(down.len(), 1);
        assert!((down[0].distance - 2.0).abs() < 1e-5);
        assert!(down[0].position.abs_diff_eq(Vec3::new(1.0, 0.0, 1.0), 1e-5));

        let up = surface.intersections(Vec3::new(1.0, -2.0, 1.0), Vec3::new(1.0, 2.0, 1.0));
        assert_eq!(up.len(), 1);
    }

    #[test]
    fn shared_edge_hit_is_deduplicated() {
        // Crosses the diagonal edge shared by both triangles.
        let hits = floor_surface().intersections(Vec3::new(2.0, 1.0, 2.0), Vec3::new(2.0, -1.0, 2.0));
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn segment_short_of_surface_misses() {
        let hits = floor_surface().intersections(Vec3::new(1.0, 2.0, 1.0), Vec3::new(1.0, 0.5, 1.0));
        assert!(hits.is_empty());
        let beside = floor_surface().intersections(Vec3::new(6.0, 2.0, 1.0), Vec3::new(6.0, -2.0, 1.0));
        assert!(beside.is_empty());
    }

    #[test]
    fn hits_are_ordered_from_start() {
        let mut tris: Vec<[Vec3; 3]> = Vec::new();
        for y in [3.0, 1.0, 2.0] {
            tris.push([Vec3::new(-1.0, y, -1.0), Vec3::new(1.0, y, -1.0), Vec3::new(0.0, y, 1.0)]);
        }
        let surface = MeshSurface::new(tris);
        let hits = surface.intersections(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 4.0, 0.0));
        let ys: Vec<f32> = hits.iter().map(|h| h.position.y).collect();
        assert_eq!(ys.len(), 3);
        assert!((ys[0] - 1.0).abs() < 1e-5 && (ys[1] - 2.0).abs() < 1e-5 && (ys[2] - 3.0).abs() < 1e-5);
    }

    #[test]
    fn line_of_sight_ignores_endpoint_hits() {
        let surface = floor_surface();
        // Along the surface, both endpoints on it.
        assert!(line_of_sight(&surface, Vec3::new(1.0, 0.0, 1.0), Vec3::new(3.0, 0.0, 3.0), 0.0));
        // Ending on the surface from above.
        assert!(line_of_sight(&surface, Vec3::new(1.0, 2.0, 1.0), Vec3::new(1.0, 0.0, 1.0), 0.0));
        // Through it.
        assert!(!line_of_sight(&surface, Vec3::new(1.0, 2.0, 1.0), Vec3::new(1.0, -2.0, 1.0), 0.0));
    }

    #[test]
    fn line_of_sight_radius_uses_obstacles() {
        let surface = MeshSurface::default().with_obstacles(vec![Obstacle::Sphere {
            center: Vec3::new(5.0, 1.5, 0.0),
            radius: 1.0,
        }]);
        let (a, b) = (Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        assert!(line_of_sight(&surface, a, b, 0.0));
        assert!(!line_of_sight(&surface, a, b, 1.0));
        assert!(line_of_sight(&OpenSpace, a, b, 5.0));
    }

    fn walled_layout() -> ChunkLayout {
        let settings = GridSettings {
            chunk_size: Vec3::splat(10.0),
            ..GridSettings::default()
        };
        let layout = LayoutSettings {
            chunk_count: [2, 1, 1],
            origin: Vec3::ZERO,
        };
        let mut chunks = ChunkLayout::new(&settings, &layout);
        // Solid slab for x in [11.5, 13.5).
        chunks.generate_grids(&|p: Vec3| if p.x > 11.5 && p.x < 13.5 { 0.0_f32 } else { 1.0_f32 });
        chunks
    }

    #[test]
    fn field_surface_reports_entry_and_exit() {
        let surface = FieldSurface::from_layout(&walled_layout());
        assert!(surface.is_blocked(Vec3::new(12.0, 5.0, 5.0)));
        assert!(!surface.is_blocked(Vec3::new(3.0, 5.0, 5.0)));
        assert!(!surface.is_blocked(Vec3::new(-50.0, 5.0, 5.0)));

        let hits = surface.intersections(Vec3::new(5.0, 5.0, 5.0), Vec3::new(18.0, 5.0, 5.0));
        assert_eq!(hits.len(), 2);
        assert!(hits[0].is_obstacle);
        assert!(!hits[1].is_obstacle);
        // Voxels 12 and 13 are solid; their cells span x in [11.5, 13.5).
        assert!((hits[0].position.x - 11.5).abs() < 0.05);
        assert!((hits[1].position.x - 13.5).abs() < 0.05);
    }

    #[test]
    fn field_surface_line_of_sight() {
        let surface = FieldSurface::from_layout(&walled_layout());
        let y = Vec3::new(0.0, 5.0, 5.0);
        assert!(!line_of_sight(&surface, Vec3::X * 5.0 + y, Vec3::X * 18.0 + y, 0.0));
        assert!(line_of_sight(&surface, Vec3::X * 1.0 + y, Vec3::X * 9.0 + y, 0.0));
        assert!(!line_of_sight(&surface, Vec3::X * 9.0 + y, Vec3::X * 10.0 + y, 2.5));
    }

    #[test]
    fn solid_mesh_blocks_segments_through_the_volume() {
        let field = FieldSurface::from_layout(&walled_layout());
        let mesh = MeshSurface::default();
        let solid = SolidMesh {
            mesh: &mesh,
            field: &field,
        };
        // Both ends on the slab faces, nothing crossed strictly inside.
        let (a, b) = (Vec3::new(11.5, 5.0, 5.0), Vec3::new(13.5, 5.0, 5.0));
        assert!(line_of_sight(&mesh, a, b, 0.0));
        assert!(!line_of_sight(&solid, a, b, 0.0));
        assert!(field.solid_between(a, b));

        // Running along a face stays clear.
        let (c, d) = (Vec3::new(11.5, 2.0, 5.0), Vec3::new(11.5, 8.0, 5.0));
        assert!(field.is_blocked(c.lerp(d, 0.5)));
        assert!(!field.is_deep_solid(c.lerp(d, 0.5)));
        assert!(line_of_sight(&solid, c, d, 0.0));
        // So does open air on either side.
        assert!(line_of_sight(&solid, Vec3::new(2.0, 5.0, 5.0), Vec3::new(10.0, 5.0, 5.0), 0.0));
    }
}
