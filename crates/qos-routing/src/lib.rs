//! QoS Routing - bandwidth-constrained multi-objective path search
//!
//! Finds a path between two nodes of a weighted network that keeps every
//! link at or above a bandwidth demand while minimizing a weighted blend of:
//!
//! - Delay (link propagation + node processing)
//! - Unreliability (negative log of the reliability product)
//! - Resource consumption (inverse link bandwidth)
//!
//! Two interchangeable solvers share one cost model and one path sampler:
//!
//! - [`genetic`] - population of paths evolved by tournament selection,
//!   splice crossover, suffix mutation and elitism
//! - [`qlearning`] - tabular Q-learning over simulated traversals, followed
//!   by greedy policy extraction
//!
//! Both return a [`Solution`]; `Solution::none()` (no path, infinite cost)
//! is the well-defined "no feasible route" answer.

use thiserror::Error;

pub mod genetic;
pub mod graph;
pub mod metrics;
pub mod qlearning;
pub mod sampler;
pub mod solver;

pub use genetic::{run_genetic, GenerationTrace, GeneticConfig, GeneticSolver};
pub use graph::{LinkQos, NodeQos, QosGraph};
pub use metrics::{path_metrics, total_cost, PathMetrics, PriorityMode, Weights};
pub use qlearning::{run_qlearning, QLearningConfig, QLearningSolver, QTable};
pub use sampler::{random_path, DEFAULT_MAX_ATTEMPTS};
pub use solver::{ensure_connected, RouteRequest, RouteSolver, Solution};

/// External node identifier (as found in the ingested network data)
pub type NodeId = usize;

/// Ordered node sequence from source to destination
pub type Path = Vec<NodeId>;

/// Graph construction errors
///
/// Algorithmic outcomes (infeasible demand, invalid paths) are never errors;
/// they surface as [`Solution::none`] or `None` metrics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),
    #[error("Self-loop on node {0} is not allowed")]
    SelfLoop(NodeId),
    #[error("Invalid {field}: {value}")]
    InvalidAttribute { field: &'static str, value: f64 },
}

pub type Result<T> = std::result::Result<T, RoutingError>;
