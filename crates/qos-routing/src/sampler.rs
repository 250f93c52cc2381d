//! Bandwidth-constrained random path sampler
//!
//! Randomized depth-first walks produce diverse feasible paths (the genetic
//! solver's raw material). When every walk dead-ends, the sampler degrades to
//! the fewest-hop path over the links that carry the demand, trading
//! diversity for a feasibility guarantee.

use crate::graph::QosGraph;
use crate::{NodeId, Path};
use petgraph::graph::NodeIndex;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Random walks tried before falling back to the constrained shortest path
pub const DEFAULT_MAX_ATTEMPTS: usize = 200;

/// Sample a simple path from `source` to `dest` whose links all carry
/// `min_bandwidth`.
///
/// Returns `None` when an endpoint is unknown or no feasible path exists.
/// `source == dest` yields the single-node path `[source]`.
pub fn random_path<R: Rng + ?Sized>(
    graph: &QosGraph,
    source: NodeId,
    dest: NodeId,
    min_bandwidth: f64,
    max_attempts: usize,
    rng: &mut R,
) -> Option<Path> {
    let start = graph.index_of(source)?;
    let goal = graph.index_of(dest)?;

    for _ in 0..max_attempts {
        if let Some(walk) = random_walk(graph, start, goal, min_bandwidth, rng) {
            return Some(walk.into_iter().map(|idx| graph.id_of(idx)).collect());
        }
    }

    debug!(
        source,
        dest,
        min_bandwidth,
        max_attempts,
        "random walks exhausted, falling back to constrained shortest path"
    );
    graph
        .bandwidth_subgraph(min_bandwidth)
        .shortest_hop_path(source, dest)
}

/// One randomized walk; `None` on a dead end or step exhaustion
fn random_walk<R: Rng + ?Sized>(
    graph: &QosGraph,
    start: NodeIndex,
    goal: NodeIndex,
    min_bandwidth: f64,
    rng: &mut R,
) -> Option<Vec<NodeIndex>> {
    let mut visited = vec![false; graph.node_count()];
    let mut walk = vec![start];
    let mut current = start;
    visited[start.index()] = true;

    for _ in 0..graph.node_count() {
        if current == goal {
            break;
        }

        let mut neighbors: Vec<_> = graph.neighbors(current).collect();
        neighbors.shuffle(rng);

        let next = neighbors
            .into_iter()
            .find(|(n, link)| (*n == goal || !visited[n.index()]) && link.carries(min_bandwidth))
            .map(|(n, _)| n)?;

        visited[next.index()] = true;
        walk.push(next);
        current = next;
    }

    (current == goal).then_some(walk)
}
