// Theta*: A* with any-angle shortcuts.
//
// When relaxing a neighbor, first try to reach it straight from the current
// node's parent. If the surface reports line of sight between the two (no
// obstacle-tagged crossing strictly between them, and no obstacle within
// `los_radius` of the midpoint), the neighbor's parent becomes the
// grandparent and its cost is the grandparent's cost plus the direct edge.
// Otherwise fall back to the A* relaxation through the current node.
//
// Paths come out with far fewer waypoints than A* on the same graph, at the
// price of one surface query per relaxation.
//
// See also: `astar.rs`, `surface.rs` for `line_of_sight`.

use crate::config::Algorithm;
use crate::graph::NodeGraph;
use crate::search::{self, Candidate, PathResult, SearchParams};
use crate::surface::{SurfaceQuery, line_of_sight};
use crate::types::NodeRef;

pub fn theta_star<G: NodeGraph>(
    graph: &mut G,
    start: NodeRef,
    goal: NodeRef,
    params: &SearchParams,
    surface: &dyn SurfaceQuery,
    los_radius: f32,
) -> PathResult {
    search::best_first(graph, start, goal, params, Algorithm::ThetaStar, |g, current, neighbor| {
        if let Some(shortcut) = from_parent(g, params, surface, los_radius, current, neighbor) {
            return Some(shortcut);
        }
        search::through(g, params, current, neighbor)
    })
}

fn from_parent<G: NodeGraph>(
    graph: &G,
    params: &SearchParams,
    surface: &dyn SurfaceQuery,
    los_radius: f32,
    current: NodeRef,
    neighbor: NodeRef,
) -> Option<Candidate> {
    let parent_id = graph.node(current)?.search.parent?;
    let parent = graph.node(parent_id)?;
    let target = graph.position(neighbor)?;
    if !line_of_sight(surface, parent.position, target, los_radius) {
        return None;
    }
    Some(Candidate {
        cost: parent.search.cost + params.cost.cost(parent.position, target),
        parent: parent_id,
    })
}
