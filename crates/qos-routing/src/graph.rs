//! Network graph with QoS attributes on nodes and links
//!
//! `QosGraph` wraps an undirected petgraph graph and interns external
//! [`NodeId`]s to `NodeIndex` values. Everything the solvers read from
//! the network goes through this type.

use crate::{NodeId, Path, Result, RoutingError};
use petgraph::algo::{astar, connected_components, has_path_connecting, kosaraju_scc};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Node processing delay range (ms) for randomly provisioned nodes
pub const NODE_PROCESSING_DELAY_MS: (f64, f64) = (0.5, 2.0);
/// Node reliability range for randomly provisioned nodes
pub const NODE_RELIABILITY: (f64, f64) = (0.95, 0.999);
/// Link bandwidth range (Mbps) for randomly provisioned links
pub const LINK_BANDWIDTH_MBPS: (f64, f64) = (100.0, 1000.0);
/// Link delay range (ms) for randomly provisioned links
pub const LINK_DELAY_MS: (f64, f64) = (3.0, 15.0);
/// Link reliability range for randomly provisioned links
pub const LINK_RELIABILITY: (f64, f64) = (0.95, 0.999);

fn check_positive(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RoutingError::InvalidAttribute { field, value })
    }
}

fn check_reliability(field: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(RoutingError::InvalidAttribute { field, value })
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, (lo, hi): (f64, f64)) -> f64 {
    rng.gen_range(lo..hi)
}

/// Per-node QoS attributes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeQos {
    /// Processing delay in milliseconds (> 0)
    pub processing_delay_ms: f64,
    /// Node reliability in (0, 1]
    pub reliability: f64,
}

impl NodeQos {
    pub fn new(processing_delay_ms: f64, reliability: f64) -> Self {
        Self {
            processing_delay_ms,
            reliability,
        }
    }

    /// Draw attributes from the provisioning ranges
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            processing_delay_ms: uniform(rng, NODE_PROCESSING_DELAY_MS),
            reliability: uniform(rng, NODE_RELIABILITY),
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("processing_delay_ms", self.processing_delay_ms)?;
        check_reliability("node reliability", self.reliability)
    }
}

/// Per-link QoS attributes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkQos {
    /// Capacity in Mbps (> 0)
    pub bandwidth_mbps: f64,
    /// Propagation delay in milliseconds (> 0)
    pub delay_ms: f64,
    /// Link reliability in (0, 1]
    pub reliability: f64,
}

impl LinkQos {
    pub fn new(bandwidth_mbps: f64, delay_ms: f64, reliability: f64) -> Self {
        Self {
            bandwidth_mbps,
            delay_ms,
            reliability,
        }
    }

    /// Draw attributes from the provisioning ranges.
    ///
    /// Used both by the random generator and by disconnection handling, so a
    /// synthesized link is indistinguishable from a generated one.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            bandwidth_mbps: uniform(rng, LINK_BANDWIDTH_MBPS),
            delay_ms: uniform(rng, LINK_DELAY_MS),
            reliability: uniform(rng, LINK_RELIABILITY),
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("bandwidth_mbps", self.bandwidth_mbps)?;
        check_positive("delay_ms", self.delay_ms)?;
        check_reliability("link reliability", self.reliability)
    }

    /// Whether this link can carry `demand` Mbps
    #[inline]
    pub fn carries(&self, demand: f64) -> bool {
        self.bandwidth_mbps >= demand
    }
}

/// Node weight stored in the petgraph graph
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NetworkNode {
    id: NodeId,
    qos: NodeQos,
}

/// Undirected simple network graph
#[derive(Debug, Clone, Default)]
pub struct QosGraph {
    graph: UnGraph<NetworkNode, LinkQos>,
    node_index: HashMap<NodeId, NodeIndex>,
}

impl QosGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Erdős–Rényi G(n, p) graph with random QoS attributes.
    ///
    /// Node ids are `0..node_count`. A non-finite probability yields no links.
    pub fn random<R: Rng + ?Sized>(node_count: usize, edge_probability: f64, rng: &mut R) -> Self {
        let p = if edge_probability.is_finite() {
            edge_probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let mut graph = Self::new();

        for id in 0..node_count {
            let idx = graph.graph.add_node(NetworkNode {
                id,
                qos: NodeQos::random(rng),
            });
            graph.node_index.insert(id, idx);
        }

        for a in 0..node_count {
            for b in (a + 1)..node_count {
                if rng.gen_bool(p) {
                    graph.graph.add_edge(
                        NodeIndex::new(a),
                        NodeIndex::new(b),
                        LinkQos::random(rng),
                    );
                }
            }
        }

        graph
    }

    /// Like [`QosGraph::random`], then chains the connected components
    /// together with random links so the result is connected.
    pub fn random_connected<R: Rng + ?Sized>(
        node_count: usize,
        edge_probability: f64,
        rng: &mut R,
    ) -> Self {
        let mut graph = Self::random(node_count, edge_probability, rng);
        let components = kosaraju_scc(&graph.graph);

        for pair in components.windows(2) {
            if let (Some(&a), Some(&b)) = (pair[0].choose(rng), pair[1].choose(rng)) {
                graph.graph.update_edge(a, b, LinkQos::random(rng));
            }
        }

        graph
    }

    /// Add a node; ids must be unique
    pub fn add_node(&mut self, id: NodeId, qos: NodeQos) -> Result<NodeIndex> {
        qos.validate()?;
        if self.node_index.contains_key(&id) {
            return Err(RoutingError::DuplicateNode(id));
        }
        let idx = self.graph.add_node(NetworkNode { id, qos });
        self.node_index.insert(id, idx);
        Ok(idx)
    }

    /// Add an undirected link. An existing link between the same pair is
    /// overwritten (the graph stays simple).
    pub fn add_link(&mut self, from: NodeId, to: NodeId, link: LinkQos) -> Result<()> {
        link.validate()?;
        if from == to {
            return Err(RoutingError::SelfLoop(from));
        }
        let a = self.require(from)?;
        let b = self.require(to)?;
        self.graph.update_edge(a, b, link);
        Ok(())
    }

    fn require(&self, id: NodeId) -> Result<NodeIndex> {
        self.node_index
            .get(&id)
            .copied()
            .ok_or(RoutingError::NodeNotFound(id))
    }

    #[inline]
    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.node_index.get(&id).copied()
    }

    #[inline]
    pub fn id_of(&self, idx: NodeIndex) -> NodeId {
        self.graph[idx].id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeQos> {
        self.index_of(id).map(|idx| &self.graph[idx].qos)
    }

    #[inline]
    pub fn node_at(&self, idx: NodeIndex) -> &NodeQos {
        &self.graph[idx].qos
    }

    /// Link between two node ids, in either direction
    pub fn link(&self, a: NodeId, b: NodeId) -> Option<&LinkQos> {
        let (a, b) = (self.index_of(a)?, self.index_of(b)?);
        self.link_at(a, b)
    }

    #[inline]
    pub fn link_at(&self, a: NodeIndex, b: NodeIndex) -> Option<&LinkQos> {
        self.graph.find_edge(a, b).map(|e| &self.graph[e])
    }

    pub fn has_link(&self, a: NodeId, b: NodeId) -> bool {
        self.link(a, b).is_some()
    }

    /// Neighbors of `idx` with the connecting link
    pub fn neighbors(&self, idx: NodeIndex) -> impl Iterator<Item = (NodeIndex, &LinkQos)> + '_ {
        self.graph.edges(idx).map(move |e| {
            let other = if e.source() == idx { e.target() } else { e.source() };
            (other, e.weight())
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_weights().map(|n| n.id)
    }

    /// All links as `(a, b, attributes)`
    pub fn links(&self) -> impl Iterator<Item = (NodeId, NodeId, &LinkQos)> + '_ {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].id,
                self.graph[e.target()].id,
                e.weight(),
            )
        })
    }

    /// Whether any path (ignoring bandwidth) joins the two nodes
    pub fn is_connected(&self, a: NodeId, b: NodeId) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(a), Some(b)) => has_path_connecting(&self.graph, a, b, None),
            _ => false,
        }
    }

    /// Copy of the graph keeping every node but only links that carry
    /// `min_bandwidth`. Node indices are preserved.
    pub fn bandwidth_subgraph(&self, min_bandwidth: f64) -> Self {
        let graph = self.graph.filter_map(
            |_, node| Some(node.clone()),
            |_, link| link.carries(min_bandwidth).then_some(*link),
        );
        Self {
            graph,
            node_index: self.node_index.clone(),
        }
    }

    /// Fewest-hop path between two nodes
    pub fn shortest_hop_path(&self, from: NodeId, to: NodeId) -> Option<Path> {
        let start = self.index_of(from)?;
        let goal = self.index_of(to)?;

        let (_, nodes) = astar(&self.graph, start, |n| n == goal, |_| 1u32, |_| 0)?;
        Some(nodes.into_iter().map(|idx| self.id_of(idx)).collect())
    }

    /// Get graph statistics
    pub fn stats(&self) -> GraphStats {
        let (mut min_bw, mut max_bw) = (f64::INFINITY, 0.0_f64);
        for link in self.graph.edge_weights() {
            min_bw = min_bw.min(link.bandwidth_mbps);
            max_bw = max_bw.max(link.bandwidth_mbps);
        }
        if self.graph.edge_count() == 0 {
            min_bw = 0.0;
        }

        let nodes = self.graph.node_count();
        let links = self.graph.edge_count();
        GraphStats {
            total_nodes: nodes,
            total_links: links,
            components: connected_components(&self.graph),
            mean_degree: if nodes == 0 {
                0.0
            } else {
                2.0 * links as f64 / nodes as f64
            },
            min_bandwidth_mbps: min_bw,
            max_bandwidth_mbps: max_bw,
        }
    }
}

/// Graph statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_links: usize,
    pub components: usize,
    pub mean_degree: f64,
    pub min_bandwidth_mbps: f64,
    pub max_bandwidth_mbps: f64,
}
