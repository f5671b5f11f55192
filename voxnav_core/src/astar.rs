// A* over any `NodeGraph`.
//
// Neighbors are relaxed through the node being expanded: tentative cost is
// the current node's cost plus the edge cost between the two positions. On a
// grid this yields paths made of grid-aligned (or diagonal) moves; see
// `theta_star.rs` for the any-angle variant.
//
// See also: `search.rs` for the shared loop and `PathResult`.

use crate::config::Algorithm;
use crate::graph::NodeGraph;
use crate::search::{self, PathResult, SearchParams};
use crate::types::NodeRef;

/// Search from `start` to `goal`. Returns an empty path if the goal is
/// unreachable or the iteration cap is hit.
pub fn astar<G: NodeGraph>(graph: &mut G, start: NodeRef, goal: NodeRef, params: &SearchParams) -> PathResult {
    search::best_first(graph, start, goal, params, Algorithm::AStar, |g, current, neighbor| {
        search::through(g, params, current, neighbor)
    })
}
