// Data-driven navigation configuration.
//
// Every tunable of grid generation, chunk layout and search lives in
// `NavConfig`, loaded from JSON. Settings are grouped into `GridSettings`
// (voxel resolution, iso level, connectivity, which scalar field to sample),
// `LayoutSettings` (how many chunks and where) and `PathfindingSettings`
// (algorithm, heuristic, edge cost, queue tuning). Every struct has a
// `Default` with the stock tuning and is `#[serde(default)]`, so a JSON file
// only needs the fields it changes.
//
// See also: `chunk.rs` which reads `GridSettings`/`LayoutSettings` during
// generation, `search.rs` which turns `PathfindingSettings` into
// `SearchParams`, `field.rs` for the samplers behind `FieldSettings`.

use crate::heuristics::{CostFunction, Heuristic};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to load or accept a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Where grid iso values come from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldSettings {
    /// Clearance around obstacles: 1 beyond `nav_mesh_offset`, ramping to 0
    /// at the obstacle surface.
    Overlap { nav_mesh_offset: f32 },
    /// 3D noise remapped to [0, 1].
    Noise { scale: f32, seed: i32 },
}

impl Default for FieldSettings {
    fn default() -> Self {
        FieldSettings::Overlap { nav_mesh_offset: 1.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// World-space size of one chunk.
    pub chunk_size: Vec3,
    /// Voxel spacing. Axes below `grid::MIN_STEP` are clamped up.
    pub step: Vec3,
    /// Nodes with iso value above this are walkable; also the surface level
    /// for marching cubes.
    pub iso_level: f32,
    /// 26-connectivity instead of 6.
    pub allow_diagonal_neighbors: bool,
    /// Distance to a chunk max face under which a surface-graph node is
    /// stitched to the neighboring chunk.
    pub boundary_tolerance: f32,
    pub field: FieldSettings,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            chunk_size: Vec3::splat(20.0),
            step: Vec3::ONE,
            iso_level: 0.5,
            allow_diagonal_neighbors: true,
            boundary_tolerance: 0.5,
            field: FieldSettings::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Chunks along x, y and z.
    pub chunk_count: [u32; 3],
    /// Min corner of chunk (0, 0, 0).
    pub origin: Vec3,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            chunk_count: [1, 1, 1],
            origin: Vec3::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Pathfinding
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    AStar,
    ThetaStar,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::AStar => f.write_str("A*"),
            Algorithm::ThetaStar => f.write_str("Theta*"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingSettings {
    pub algorithm: Algorithm,
    pub heuristic: Heuristic,
    pub cost: CostFunction,
    /// Weight of the heuristic against the accumulated cost, in [0, 1].
    /// 0 is breadth-first, 1 is purely greedy.
    pub greediness: f32,
    /// Expansion cap; a search that hits it reports no path.
    pub max_iterations: u32,
    /// Open-set bucket width. `None` sizes it from the query distance.
    pub bucket_range: Option<f32>,
    /// Theta* treats any obstacle this close to a shortcut's midpoint as
    /// blocking the shortcut.
    pub line_of_sight_radius: f32,
    /// Log a timing and efficiency summary after every search.
    pub benchmark: bool,
}

impl Default for PathfindingSettings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::AStar,
            heuristic: Heuristic::Euclidean,
            cost: CostFunction::Euclidean,
            greediness: 0.5,
            max_iterations: 50_000,
            bucket_range: None,
            line_of_sight_radius: 2.0,
            benchmark: false,
        }
    }
}

impl PathfindingSettings {
    /// Any-angle search over the surface graph.
    pub fn theta_star() -> Self {
        Self {
            algorithm: Algorithm::ThetaStar,
            ..Self::default()
        }
    }

    /// Cost-ordered A* with exact-width buckets, for reproducible optimal
    /// paths on small grids.
    pub fn exhaustive() -> Self {
        Self {
            algorithm: Algorithm::AStar,
            heuristic: Heuristic::Euclidean,
            greediness: 0.0,
            bucket_range: Some(0.01),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub grid: GridSettings,
    pub layout: LayoutSettings,
    pub pathfinding: PathfindingSettings,
}

impl NavConfig {
    /// A layout of noise terrain, as used by the profiler.
    pub fn procedural(seed: i32, chunk_count: [u32; 3]) -> Self {
        Self {
            grid: GridSettings {
                field: FieldSettings::Noise { scale: 0.05, seed },
                ..GridSettings::default()
            },
            layout: LayoutSettings {
                chunk_count,
                ..LayoutSettings::default()
            },
            pathfinding: PathfindingSettings::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: NavConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Reject settings generation or search cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let grid = &self.grid;

        if !grid.chunk_size.is_finite() || grid.chunk_size.min_element() <= 0.0 {
            return invalid(format!("chunk_size must be positive, got {}", grid.chunk_size));
        }
        if !grid.step.is_finite() {
            return invalid(format!("step must be finite, got {}", grid.step));
        }
        if !grid.iso_level.is_finite() {
            return invalid("iso_level must be finite".into());
        }
        if !non_negative(grid.boundary_tolerance) {
            return invalid("boundary_tolerance must be non-negative".into());
        }
        match grid.field {
            FieldSettings::Overlap { nav_mesh_offset } if !non_negative(nav_mesh_offset) => {
                return invalid("nav_mesh_offset must be non-negative".into());
            }
            FieldSettings::Noise { scale, .. } if !positive(scale) => {
                return invalid("noise scale must be positive".into());
            }
            _ => {}
        }

        if self.layout.chunk_count.contains(&0) {
            return invalid(format!("chunk_count must be non-zero, got {:?}", self.layout.chunk_count));
        }
        if !self.layout.origin.is_finite() {
            return invalid("layout origin must be finite".into());
        }

        let search = &self.pathfinding;
        if !(0.0..=1.0).contains(&search.greediness) {
            return invalid(format!("greediness must be in [0, 1], got {}", search.greediness));
        }
        if search.max_iterations == 0 {
            return invalid("max_iterations must be non-zero".into());
        }
        if let Some(range) = search.bucket_range.filter(|&r| !positive(r)) {
            return invalid(format!("bucket_range must be positive, got {range}"));
        }
        if !non_negative(search.line_of_sight_radius) {
            return invalid("line_of_sight_radius must be non-negative".into());
        }
        Ok(())
    }
}

/// False for NaN.
fn non_negative(v: f32) -> bool {
    v >= 0.0
}

fn positive(v: f32) -> bool {
    v > 0.0 && v.is_finite()
}
