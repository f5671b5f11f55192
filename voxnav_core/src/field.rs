// Scalar fields sampled by grid construction.
//
// A `ScalarField` maps a world position to the iso value stored on the grid
// node there. Values above the configured iso level are walkable. Two
// concrete fields are provided:
//
// - `ObstacleField`: distance-based clearance around a list of sphere and box
//   obstacles. 1 where no obstacle lies within `nav_mesh_offset`, falling
//   linearly to 0 at an obstacle surface (and staying 0 inside).
// - `NoiseField`: 3D OpenSimplex2 noise remapped from [-1, 1] to [0, 1].
//
// Any `Fn(Vec3) -> f32 + Sync` closure is also a field, which is what tests use.
//
// See also: `config.rs` for `FieldSettings`, `chunk.rs` for the parallel
// generation pass that samples these from many threads at once (hence the
// `Sync` bound).

use crate::config::FieldSettings;
use crate::types::Aabb;
use fastnoise_lite::{FastNoiseLite, NoiseType};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// World position to iso value.
pub trait ScalarField: Sync {
    fn sample(&self, position: Vec3) -> f32;
}

impl<F> ScalarField for F
where
    F: Fn(Vec3) -> f32 + Sync,
{
    fn sample(&self, position: Vec3) -> f32 {
        self(position)
    }
}

// ---------------------------------------------------------------------------
// Obstacles
// ---------------------------------------------------------------------------

/// A solid shape agents must keep clear of.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Obstacle {
    Sphere { center: Vec3, radius: f32 },
    Box { bounds: Aabb },
}

impl Obstacle {
    /// Distance from `point` to the obstacle surface; 0 inside.
    pub fn distance(&self, point: Vec3) -> f32 {
        match *self {
            Obstacle::Sphere { center, radius } => (point.distance(center) - radius).max(0.0),
            Obstacle::Box { bounds } => {
                let outside = (bounds.min - point).max(point - bounds.max).max(Vec3::ZERO);
                outside.length()
            }
        }
    }
}

/// Clearance field around a set of obstacles.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ObstacleField {
    pub obstacles: Vec<Obstacle>,
    pub nav_mesh_offset: f32,
}

impl ObstacleField {
    pub fn new(obstacles: Vec<Obstacle>, nav_mesh_offset: f32) -> Self {
        Self {
            obstacles,
            nav_mesh_offset,
        }
    }

    /// Distance to the closest obstacle surface, or infinity with no obstacles.
    pub fn nearest_distance(&self, point: Vec3) -> f32 {
        self.obstacles
            .iter()
            .map(|o| o.distance(point))
            .fold(f32::INFINITY, f32::min)
    }

    /// Whether any obstacle lies within `radius` of `point`.
    pub fn overlaps(&self, point: Vec3, radius: f32) -> bool {
        self.obstacles.iter().any(|o| o.distance(point) <= radius)
    }
}

impl ScalarField for ObstacleField {
    fn sample(&self, position: Vec3) -> f32 {
        let d = self.nearest_distance(position);
        if self.nav_mesh_offset <= 0.0 {
            return if d > 0.0 { 1.0 } else { 0.0 };
        }
        if d >= self.nav_mesh_offset {
            1.0
        } else {
            d / self.nav_mesh_offset
        }
    }
}

// ---------------------------------------------------------------------------
// Noise
// ---------------------------------------------------------------------------

/// Procedural field: OpenSimplex2 noise scaled into [0, 1].
pub struct NoiseField {
    noise: FastNoiseLite,
}

impl NoiseField {
    pub fn new(seed: i32, scale: f32) -> Self {
        let mut noise = FastNoiseLite::with_seed(seed);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_frequency(Some(scale));
        Self { noise }
    }
}

impl ScalarField for NoiseField {
    fn sample(&self, position: Vec3) -> f32 {
        let n = self.noise.get_noise_3d(position.x, position.y, position.z);
        ((n + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

/// A field built from settings, so callers can hold either kind behind one type.
pub enum ConfiguredField {
    Obstacles(ObstacleField),
    Noise(NoiseField),
}

impl ConfiguredField {
    /// Build the field the settings describe. `obstacles` is only used by the
    /// overlap mode.
    pub fn from_settings(settings: &FieldSettings, obstacles: Vec<Obstacle>) -> Self {
        match *settings {
            FieldSettings::Overlap { nav_mesh_offset } => {
                ConfiguredField::Obstacles(ObstacleField::new(obstacles, nav_mesh_offset))
            }
            FieldSettings::Noise { scale, seed } => ConfiguredField::Noise(NoiseField::new(seed, scale)),
        }
    }
}

impl ScalarField for ConfiguredField {
    fn sample(&self, position: Vec3) -> f32 {
        match self {
            ConfiguredField::Obstacles(f) => f.sample(position),
            ConfiguredField::Noise(f) => f.sample(position),
        }
    }
}
