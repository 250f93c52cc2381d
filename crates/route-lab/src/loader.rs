//! Network loading from JSON files
//!
//! ```json
//! {
//!   "nodes":   [{"id": 0, "processing_delay_ms": 1.2, "reliability": 0.99}],
//!   "edges":   [{"src": 0, "dst": 1, "capacity_mbps": 400, "delay_ms": 6, "reliability": 0.98}],
//!   "demands": [{"src": 0, "dst": 1, "demand_mbps": 80}]
//! }
//! ```
//!
//! Records with missing or out-of-range fields are skipped and counted.

use crate::{LabError, Result};
use qos_routing::{LinkQos, NodeId, NodeQos, QosGraph};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Raw node record
#[derive(Debug, Deserialize)]
struct RawNode {
    id: Option<NodeId>,
    processing_delay_ms: Option<f64>,
    reliability: Option<f64>,
}

/// Raw edge record
#[derive(Debug, Deserialize)]
struct RawEdge {
    src: Option<NodeId>,
    dst: Option<NodeId>,
    capacity_mbps: Option<f64>,
    delay_ms: Option<f64>,
    reliability: Option<f64>,
}

/// Raw demand record
#[derive(Debug, Deserialize)]
struct RawDemand {
    src: Option<NodeId>,
    dst: Option<NodeId>,
    demand_mbps: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NetworkFile {
    #[serde(default)]
    nodes: Vec<RawNode>,
    #[serde(default)]
    edges: Vec<RawEdge>,
    #[serde(default)]
    demands: Vec<RawDemand>,
}

/// Traffic demand between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    pub source: NodeId,
    pub destination: NodeId,
    pub demand_mbps: f64,
}

/// A loaded network and the demands that came with it
#[derive(Debug, Clone)]
pub struct Network {
    pub graph: QosGraph,
    pub demands: Vec<Demand>,
}

/// Load a network from a JSON file
pub fn load_network(path: impl AsRef<Path>) -> Result<Network> {
    let path = path.as_ref();
    info!("Loading network from {:?}", path);

    let file = File::open(path)?;
    read_network(BufReader::new(file))
}

/// Parse a network document from any reader
pub fn read_network<R: Read>(reader: R) -> Result<Network> {
    let raw: NetworkFile = serde_json::from_reader(reader)?;

    let mut graph = QosGraph::new();
    let mut skipped_nodes = 0;
    for node in raw.nodes {
        let (Some(id), Some(delay), Some(rel)) = (node.id, node.processing_delay_ms, node.reliability)
        else {
            skipped_nodes += 1;
            continue;
        };
        if let Err(e) = graph.add_node(id, NodeQos::new(delay, rel)) {
            debug!(node = id, error = %e, "skipping node");
            skipped_nodes += 1;
        }
    }

    if graph.node_count() == 0 {
        return Err(LabError::EmptyNetwork);
    }

    let mut skipped_edges = 0;
    for edge in raw.edges {
        let (Some(src), Some(dst), Some(bw), Some(delay), Some(rel)) = (
            edge.src,
            edge.dst,
            edge.capacity_mbps,
            edge.delay_ms,
            edge.reliability,
        ) else {
            skipped_edges += 1;
            continue;
        };
        if let Err(e) = graph.add_link(src, dst, LinkQos::new(bw, delay, rel)) {
            debug!(src, dst, error = %e, "skipping edge");
            skipped_edges += 1;
        }
    }

    let mut demands = Vec::new();
    let mut skipped_demands = 0;
    for demand in raw.demands {
        match (demand.src, demand.dst, demand.demand_mbps) {
            (Some(source), Some(destination), Some(demand_mbps))
                if source != destination
                    && graph.contains(source)
                    && graph.contains(destination)
                    && demand_mbps.is_finite()
                    && demand_mbps >= 0.0 =>
            {
                demands.push(Demand {
                    source,
                    destination,
                    demand_mbps,
                });
            }
            _ => skipped_demands += 1,
        }
    }

    info!(
        "Loaded {} nodes, {} links, {} demands ({} nodes, {} edges, {} demands skipped)",
        graph.node_count(),
        graph.link_count(),
        demands.len(),
        skipped_nodes,
        skipped_edges,
        skipped_demands
    );

    Ok(Network { graph, demands })
}
