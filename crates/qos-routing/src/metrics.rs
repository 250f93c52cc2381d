//! Path cost model
//!
//! ```text
//! total_delay       = Σ link.delay + Σ interior node.processing_delay
//! total_reliability = Π link.reliability · Π node.reliability   (endpoints included)
//! reliability_cost  = -ln(total_reliability) = Σ -ln(factor)
//! resource_cost     = Σ RESOURCE_SCALE / link.bandwidth
//!
//! cost = w_delay · total_delay + w_rel · reliability_cost + w_res · resource_cost
//! ```
//!
//! The blend is strictly linear; weights are never normalized here.

use crate::graph::QosGraph;
use crate::NodeId;
use serde::{Deserialize, Serialize};

/// Numerator of the per-link resource cost (`RESOURCE_SCALE / bandwidth`)
pub const RESOURCE_SCALE: f64 = 1000.0;

/// Reliability floor applied before taking a logarithm
pub const MIN_RELIABILITY: f64 = 0.01;

/// Clamp a reliability into `[MIN_RELIABILITY, 1.0]`
#[inline]
pub fn clamp_reliability(reliability: f64) -> f64 {
    if reliability.is_nan() {
        return MIN_RELIABILITY;
    }
    reliability.clamp(MIN_RELIABILITY, 1.0)
}

/// `-ln` of a clamped reliability, always finite and non-negative
#[inline]
pub fn reliability_penalty(reliability: f64) -> f64 {
    -clamp_reliability(reliability).ln()
}

/// Relative importance of the three QoS objectives
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub delay: f64,
    pub reliability: f64,
    pub resource: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self::balanced()
    }
}

impl Weights {
    pub fn new(delay: f64, reliability: f64, resource: f64) -> Self {
        Self {
            delay,
            reliability,
            resource,
        }
    }

    pub fn balanced() -> Self {
        Self::new(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)
    }

    /// Scale so the three weights sum to 1; an all-zero triple becomes
    /// [`Weights::balanced`].
    pub fn normalized(&self) -> Self {
        let total = self.delay + self.reliability + self.resource;
        if total <= 0.0 || !total.is_finite() {
            return Self::balanced();
        }
        Self::new(
            self.delay / total,
            self.reliability / total,
            self.resource / total,
        )
    }

    /// Dominant objective. Ties resolve delay, then reliability, then resource.
    pub fn priority_mode(&self) -> PriorityMode {
        let (d, r, s) = (self.delay, self.reliability, self.resource);
        if d >= r && d >= s {
            PriorityMode::Delay
        } else if r >= d && r >= s {
            PriorityMode::Reliability
        } else {
            PriorityMode::Resource
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.delay, self.reliability, self.resource]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
    }
}

/// Objective with the largest weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityMode {
    Delay,
    Reliability,
    Resource,
}

impl PriorityMode {
    /// The cost component this mode emphasizes
    #[inline]
    pub fn select(&self, components: &CostComponents) -> f64 {
        match self {
            PriorityMode::Delay => components.delay,
            PriorityMode::Reliability => components.reliability,
            PriorityMode::Resource => components.resource,
        }
    }
}

/// Delay / reliability / resource costs of a single hop or a whole path
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostComponents {
    pub delay: f64,
    pub reliability: f64,
    pub resource: f64,
}

impl CostComponents {
    /// Linear blend of the components
    #[inline]
    pub fn weighted(&self, weights: &Weights) -> f64 {
        weights.delay * self.delay
            + weights.reliability * self.reliability
            + weights.resource * self.resource
    }
}

/// QoS metrics of a complete path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathMetrics {
    /// Link delays plus processing delay of interior nodes (ms)
    pub total_delay: f64,
    /// Product of every link and node reliability on the path
    pub total_reliability: f64,
    /// `-ln(total_reliability)`
    pub reliability_cost: f64,
    /// Σ `RESOURCE_SCALE / bandwidth`
    pub resource_cost: f64,
    /// Number of links on the path
    pub hop_count: usize,
    /// Smallest link bandwidth on the path (Mbps)
    pub bottleneck_bandwidth: f64,
}

impl PathMetrics {
    pub fn components(&self) -> CostComponents {
        CostComponents {
            delay: self.total_delay,
            reliability: self.reliability_cost,
            resource: self.resource_cost,
        }
    }
}

/// Compute the metrics of `path`.
///
/// Returns `None` for paths with fewer than two nodes, unknown nodes, or a
/// consecutive pair without a link.
pub fn path_metrics(graph: &QosGraph, path: &[NodeId]) -> Option<PathMetrics> {
    if path.len() < 2 {
        return None;
    }

    let mut total_delay = 0.0;
    let mut total_reliability = 1.0;
    let mut reliability_cost = 0.0;
    let mut resource_cost = 0.0;
    let mut bottleneck = f64::INFINITY;

    for pair in path.windows(2) {
        let link = graph.link(pair[0], pair[1])?;
        let rel = clamp_reliability(link.reliability);

        total_delay += link.delay_ms;
        total_reliability *= rel;
        reliability_cost += -rel.ln();
        resource_cost += RESOURCE_SCALE / link.bandwidth_mbps;
        bottleneck = bottleneck.min(link.bandwidth_mbps);
    }

    for (i, id) in path.iter().enumerate() {
        let node = graph.node(*id)?;
        let rel = clamp_reliability(node.reliability);

        if i > 0 && i < path.len() - 1 {
            total_delay += node.processing_delay_ms;
        }
        total_reliability *= rel;
        reliability_cost += -rel.ln();
    }

    Some(PathMetrics {
        total_delay,
        total_reliability,
        reliability_cost,
        resource_cost,
        hop_count: path.len() - 1,
        bottleneck_bandwidth: bottleneck,
    })
}

/// Weighted linear cost of a path's metrics
#[inline]
pub fn total_cost(metrics: &PathMetrics, weights: &Weights) -> f64 {
    metrics.components().weighted(weights)
}

/// Cost of `path`, or `+∞` when it has no valid metrics
pub fn path_cost(graph: &QosGraph, path: &[NodeId], weights: &Weights) -> f64 {
    path_metrics(graph, path)
        .map(|m| total_cost(&m, weights))
        .unwrap_or(f64::INFINITY)
}
