// Distance estimators and edge-cost functions.
//
// Pure functions over pairs of positions. `Heuristic` picks the goal estimate
// a search uses; `CostFunction` picks the cost of moving along one edge. Both
// are plain `Copy` enums so they can sit in the serialized config.
//
// Octile is the estimate for 26-connected grids: sum of the per-axis deltas,
// minus `(3 - sqrt 3)` per step of the smallest delta and `(2 - sqrt 2)` per
// step of the middle one.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

pub fn euclidean(a: Vec3, b: Vec3) -> f32 {
    a.distance(b)
}

pub fn manhattan(a: Vec3, b: Vec3) -> f32 {
    let d = (a - b).abs();
    d.x + d.y + d.z
}

pub fn chebyshev(a: Vec3, b: Vec3) -> f32 {
    (a - b).abs().max_element()
}

pub fn octile(a: Vec3, b: Vec3) -> f32 {
    let d = (a - b).abs();
    let mut sorted = [d.x, d.y, d.z];
    sorted.sort_by(f32::total_cmp);
    let [min1, min2, _] = sorted;
    d.x + d.y + d.z - min1 * (3.0 - 3f32.sqrt()) - min2 * (2.0 - std::f32::consts::SQRT_2)
}

/// Goal-distance estimate used by a search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Heuristic {
    #[default]
    Euclidean,
    Manhattan,
    Chebyshev,
    Octile,
}

impl Heuristic {
    pub const ALL: [Heuristic; 4] = [
        Heuristic::Euclidean,
        Heuristic::Manhattan,
        Heuristic::Chebyshev,
        Heuristic::Octile,
    ];

    pub fn estimate(self, from: Vec3, to: Vec3) -> f32 {
        match self {
            Heuristic::Euclidean => euclidean(from, to),
            Heuristic::Manhattan => manhattan(from, to),
            Heuristic::Chebyshev => chebyshev(from, to),
            Heuristic::Octile => octile(from, to),
        }
    }
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Heuristic::Euclidean => "euclidean",
            Heuristic::Manhattan => "manhattan",
            Heuristic::Chebyshev => "chebyshev",
            Heuristic::Octile => "octile",
        };
        f.write_str(name)
    }
}

/// Cost of traversing one edge between adjacent nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CostFunction {
    /// Every edge costs 1 regardless of length.
    One,
    #[default]
    Euclidean,
    Manhattan,
}

impl CostFunction {
    pub fn cost(self, from: Vec3, to: Vec3) -> f32 {
        match self {
            CostFunction::One => 1.0,
            CostFunction::Euclidean => euclidean(from, to),
            CostFunction::Manhattan => manhattan(from, to),
        }
    }
}

impl fmt::Display for CostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CostFunction::One => "one",
            CostFunction::Euclidean => "euclidean",
            CostFunction::Manhattan => "manhattan",
        };
        f.write_str(name)
    }
}
