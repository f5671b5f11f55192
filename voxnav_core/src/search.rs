// Shared best-first search loop for A* and Theta*.
//
// Both algorithms keep the same bookkeeping: an approximate-priority open set
// (`BucketList`), a closed set, per-node scratch state stored on the nodes
// themselves (`Node::search`), and a back-pointer walk at the end. They only
// differ in how a neighbor's candidate cost and parent are computed, which
// each algorithm passes in as a `relax` closure.
//
// Queue priority is `heuristic * greediness + cost * (1 - greediness)`.
// Greediness 0 is cost-ordered (Dijkstra-like with a heuristic tiebreak of
// zero), 1 is purely greedy.
//
// A search that never closes the goal (unreachable, or `max_iterations`
// exhausted) returns an empty path with its statistics; it is never an
// error. Every node the search wrote scratch state to is reset before
// returning, so back-to-back queries start clean.
//
// **Critical constraint:** scratch state lives on the nodes, so a graph must
// not be searched by two queries at once. The `&mut` graph borrow enforces it.
//
// See also: `astar.rs`, `theta_star.rs`, `bucket_list.rs`, `node.rs` for
// `SearchState`.

use crate::bucket_list::BucketList;
use crate::config::{Algorithm, PathfindingSettings};
use crate::graph::NodeGraph;
use crate::heuristics::{CostFunction, Heuristic};
use crate::node::SearchState;
use crate::types::NodeRef;
use glam::Vec3;
use log::{debug, info, warn};
use rustc_hash::FxHashSet;
use std::time::{Duration, Instant};

/// Smallest automatically sized bucket width.
pub const MIN_AUTO_BUCKET_RANGE: f32 = 0.01;

/// Per-query search tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchParams {
    pub heuristic: Heuristic,
    pub cost: CostFunction,
    pub greediness: f32,
    pub max_iterations: u32,
    /// `None` sizes buckets from the start-goal distance.
    pub bucket_range: Option<f32>,
    /// Neighbors with iso value at or below this are skipped.
    pub walkable_above: f32,
    /// Log a timing summary when the search finishes.
    pub benchmark: bool,
}

impl SearchParams {
    pub fn from_settings(settings: &PathfindingSettings, walkable_above: f32) -> Self {
        Self {
            heuristic: settings.heuristic,
            cost: settings.cost,
            greediness: settings.greediness.clamp(0.0, 1.0),
            max_iterations: settings.max_iterations,
            bucket_range: settings.bucket_range,
            walkable_above,
            benchmark: settings.benchmark,
        }
    }

    fn bucket_range_for(&self, start: Vec3, goal: Vec3) -> f32 {
        self.bucket_range
            .unwrap_or_else(|| (start.distance(goal) / 100.0).max(MIN_AUTO_BUCKET_RANGE))
    }
}

impl Default for SearchParams {
    /// Stock tuning with every node walkable.
    fn default() -> Self {
        Self::from_settings(&PathfindingSettings::default(), f32::NEG_INFINITY)
    }
}

/// Counters from one search.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SearchStats {
    pub iterations: u32,
    pub closed: usize,
    pub open: usize,
    pub neighbor_checks: u64,
    /// Summed segment length of the returned path (0 if none).
    pub path_length: f32,
    pub elapsed: Duration,
}

impl SearchStats {
    /// Fold another search's counters into this one.
    pub fn accumulate(&mut self, other: &SearchStats) {
        self.iterations += other.iterations;
        self.closed += other.closed;
        self.open += other.open;
        self.neighbor_checks += other.neighbor_checks;
        self.path_length += other.path_length;
        self.elapsed += other.elapsed;
    }
}

/// Result of a search or a planned query: waypoints start to goal
/// (inclusive), or empty when no path was found.
#[derive(Clone, Debug, Default)]
pub struct PathResult {
    /// Graph nodes along the path. A single search returns one per waypoint;
    /// planned surface queries leave the off-graph start and goal out.
    pub nodes: Vec<NodeRef>,
    pub positions: Vec<Vec3>,
    /// Accumulated edge cost at the goal.
    pub total_cost: f32,
    pub stats: SearchStats,
}

impl PathResult {
    pub fn not_found(stats: SearchStats) -> Self {
        Self {
            stats,
            ..Self::default()
        }
    }

    pub fn is_found(&self) -> bool {
        !self.positions.is_empty()
    }

    /// Waypoint count.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Summed distance between consecutive points.
pub fn polyline_length(points: &[Vec3]) -> f32 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// A neighbor's tentative cost and the node it would be reached from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub cost: f32,
    pub parent: NodeRef,
}

/// Cost of reaching `neighbor` through `current`.
pub fn through<G: NodeGraph>(graph: &G, params: &SearchParams, current: NodeRef, neighbor: NodeRef) -> Option<Candidate> {
    let from = graph.node(current)?;
    let to = graph.node(neighbor)?;
    Some(Candidate {
        cost: from.search.cost + params.cost.cost(from.position, to.position),
        parent: current,
    })
}

/// The best-first loop. `relax(graph, current, neighbor)` proposes the
/// neighbor's candidate cost and parent.
pub fn best_first<G, R>(
    graph: &mut G,
    start: NodeRef,
    goal: NodeRef,
    params: &SearchParams,
    algorithm: Algorithm,
    mut relax: R,
) -> PathResult
where
    G: NodeGraph,
    R: FnMut(&G, NodeRef, NodeRef) -> Option<Candidate>,
{
    let started = Instant::now();
    let mut stats = SearchStats::default();

    let (Some(start_pos), Some(goal_pos)) = (graph.position(start), graph.position(goal)) else {
        debug!("{algorithm}: start {start} or goal {goal} not in graph");
        return PathResult::not_found(stats);
    };
    if start == goal {
        stats.elapsed = started.elapsed();
        return PathResult {
            nodes: vec![start],
            positions: vec![start_pos],
            total_cost: 0.0,
            stats,
        };
    }

    let mut open = BucketList::new(params.bucket_range_for(start_pos, goal_pos), 0.0);
    let mut closed: FxHashSet<NodeRef> = FxHashSet::default();
    let mut touched = vec![start];
    let mut neighbors = Vec::new();

    if let Some(node) = graph.node_mut(start) {
        node.search = SearchState {
            cost: 0.0,
            heuristic: params.heuristic.estimate(start_pos, goal_pos),
            balance: params.greediness,
            parent: None,
        };
        open.push(start, node.search.total());
    }

    let mut capped = false;
    while let Some(current) = open.extract_min() {
        if stats.iterations >= params.max_iterations {
            capped = true;
            break;
        }
        stats.iterations += 1;
        closed.insert(current);
        if current == goal {
            break;
        }

        neighbors.clear();
        graph.neighbors(current, &mut neighbors);
        for &neighbor in &neighbors {
            stats.neighbor_checks += 1;
            if closed.contains(&neighbor) {
                continue;
            }
            let Some(node) = graph.node(neighbor) else { continue };
            if !node.is_walkable(params.walkable_above) {
                continue;
            }
            let (position, known_cost) = (node.position, node.search.cost);
            let Some(candidate) = relax(&*graph, current, neighbor) else { continue };
            if open.contains(&neighbor) && candidate.cost >= known_cost {
                continue;
            }

            let heuristic = params.heuristic.estimate(position, goal_pos);
            let Some(node) = graph.node_mut(neighbor) else { continue };
            if node.search.is_cleared() {
                touched.push(neighbor);
            }
            node.search = SearchState {
                cost: candidate.cost,
                heuristic,
                balance: params.greediness,
                parent: Some(candidate.parent),
            };
            open.push(neighbor, node.search.total());
        }
    }

    stats.closed = closed.len();
    stats.open = open.len();

    let result = if closed.contains(&goal) {
        reconstruct(graph, start, goal, touched.len())
    } else {
        None
    };

    for &id in &touched {
        if let Some(node) = graph.node_mut(id) {
            node.search.clear();
        }
    }
    stats.elapsed = started.elapsed();

    let Some((nodes, positions, total_cost)) = result else {
        if capped {
            warn!(
                "{algorithm}: no path from {start} to {goal} within {} iterations ({} closed, {} open)",
                stats.iterations, stats.closed, stats.open
            );
        } else {
            debug!(
                "{algorithm}: no path from {start} to {goal} after {} iterations ({} closed, {} open)",
                stats.iterations, stats.closed, stats.open
            );
        }
        return PathResult::not_found(stats);
    };

    stats.path_length = polyline_length(&positions);
    if params.benchmark {
        let straight = start_pos.distance(goal_pos);
        let ratio = if straight > 0.0 { stats.path_length / straight * 100.0 } else { 100.0 };
        info!(
            "{algorithm} [{}/{}]: {} waypoints, path {ratio:.1}% of straight line, {:?}, {} closed, {} open, {} neighbor checks",
            params.heuristic,
            params.cost,
            nodes.len(),
            stats.elapsed,
            stats.closed,
            stats.open,
            stats.neighbor_checks
        );
    }

    PathResult {
        nodes,
        positions,
        total_cost,
        stats,
    }
}

/// Walk back-pointers from the goal. `limit` bounds the walk so a corrupt
/// parent cycle cannot loop forever.
fn reconstruct<G: NodeGraph>(
    graph: &G,
    start: NodeRef,
    goal: NodeRef,
    limit: usize,
) -> Option<(Vec<NodeRef>, Vec<Vec3>, f32)> {
    let total_cost = graph.node(goal)?.search.cost;
    let mut nodes = vec![goal];
    let mut current = goal;
    while current != start {
        if nodes.len() > limit {
            return None;
        }
        current = graph.node(current)?.search.parent?;
        nodes.push(current);
    }
    nodes.reverse();
    let positions = nodes
        .iter()
        .map(|&id| graph.position(id))
        .collect::<Option<Vec<Vec3>>>()?;
    Some((nodes, positions, total_cost))
}
