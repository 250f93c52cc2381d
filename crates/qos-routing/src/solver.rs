//! Shared solver contract
//!
//! Both solvers take the same [`RouteRequest`], may provision one link for
//! disconnected endpoints, and answer with a [`Solution`].

use crate::graph::{LinkQos, QosGraph};
use crate::metrics::{path_metrics, PathMetrics, Weights};
use crate::{NodeId, Path};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One routing query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub source: NodeId,
    pub destination: NodeId,
    /// Minimum bandwidth every link of the path must carry (Mbps)
    pub demand: f64,
    pub weights: Weights,
}

impl RouteRequest {
    pub fn new(source: NodeId, destination: NodeId, demand: f64, weights: Weights) -> Self {
        Self {
            source,
            destination,
            demand,
            weights,
        }
    }

    /// Whether the request can be routed at all on `graph`; logs why not
    pub(crate) fn is_routable(&self, graph: &QosGraph) -> bool {
        if self.source == self.destination {
            warn!(node = self.source, "source equals destination, nothing to route");
            return false;
        }
        for id in [self.source, self.destination] {
            if !graph.contains(id) {
                warn!(node = id, "endpoint not in graph");
                return false;
            }
        }
        true
    }
}

/// Solver answer: a path and its cost model total, or no solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub path: Option<Path>,
    /// Total cost of `path`; `+∞` when there is none
    pub cost: f64,
}

impl Solution {
    pub fn found(path: Path, cost: f64) -> Self {
        Self {
            path: Some(path),
            cost,
        }
    }

    /// The "no feasible route" answer
    pub fn none() -> Self {
        Self {
            path: None,
            cost: f64::INFINITY,
        }
    }

    pub fn is_found(&self) -> bool {
        self.path.is_some() && self.cost.is_finite()
    }

    /// Metrics of the returned path on `graph`
    pub fn metrics(&self, graph: &QosGraph) -> Option<PathMetrics> {
        self.path.as_deref().and_then(|p| path_metrics(graph, p))
    }
}

/// Common interface of the genetic and Q-learning solvers.
///
/// `graph` is mutable only for disconnection handling ([`ensure_connected`]).
/// Callers running solvers side by side should hand each one its own clone.
pub trait RouteSolver {
    fn name(&self) -> &'static str;

    fn solve(&self, graph: &mut QosGraph, request: &RouteRequest, rng: &mut dyn RngCore) -> Solution;
}

/// Provision a direct link between two existing, distinct, disconnected
/// nodes, with attributes from [`LinkQos::random`].
///
/// Returns `true` when a link was added.
pub fn ensure_connected<R: Rng + ?Sized>(
    graph: &mut QosGraph,
    source: NodeId,
    dest: NodeId,
    rng: &mut R,
) -> bool {
    if source == dest || !graph.contains(source) || !graph.contains(dest) {
        return false;
    }
    if graph.is_connected(source, dest) {
        return false;
    }

    let link = LinkQos::random(rng);
    match graph.add_link(source, dest, link) {
        Ok(()) => {
            info!(
                source,
                dest,
                bandwidth_mbps = link.bandwidth_mbps,
                delay_ms = link.delay_ms,
                reliability = link.reliability,
                "endpoints disconnected, provisioned direct link"
            );
            true
        }
        Err(e) => {
            warn!(source, dest, error = %e, "could not provision direct link");
            false
        }
    }
}
