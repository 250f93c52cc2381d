//! Routing scenario generation

use crate::loader::Demand;
use crate::{LabError, Result};
use qos_routing::{NodeId, QosGraph, RouteRequest, Weights};
use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::debug;

/// Demand range (Mbps) of generated scenarios
pub const DEMAND_RANGE_MBPS: RangeInclusive<u32> = 10..=150;

/// Demand given to the trailing infeasible scenarios
pub const INFEASIBLE_DEMAND_MBPS: f64 = 999_999.0;

/// Trailing scenarios made infeasible by default
pub const DEFAULT_INFEASIBLE_TAIL: usize = 2;

/// Named weight presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightProfile {
    Delay,
    Reliability,
    Balanced,
}

impl WeightProfile {
    pub const ALL: [WeightProfile; 3] = [
        WeightProfile::Delay,
        WeightProfile::Reliability,
        WeightProfile::Balanced,
    ];

    pub fn weights(&self) -> Weights {
        match self {
            WeightProfile::Delay => Weights::new(1.0, 0.1, 0.1),
            WeightProfile::Reliability => Weights::new(0.1, 1.0, 0.1),
            WeightProfile::Balanced => Weights::new(0.5, 0.5, 0.5),
        }
    }
}

/// One routing query of an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: usize,
    pub profile: WeightProfile,
    pub request: RouteRequest,
}

impl Scenario {
    pub fn new(id: usize, source: NodeId, destination: NodeId, demand: f64, profile: WeightProfile) -> Self {
        Self {
            id,
            profile,
            request: RouteRequest::new(source, destination, demand, profile.weights()),
        }
    }

    /// Whether the demand is the unsatisfiable marker value
    pub fn has_infeasible_demand(&self) -> bool {
        self.request.demand >= INFEASIBLE_DEMAND_MBPS
    }
}

/// Generate `count` scenarios with the default infeasible tail
pub fn generate<R: Rng + ?Sized>(graph: &QosGraph, count: usize, rng: &mut R) -> Result<Vec<Scenario>> {
    generate_with_tail(graph, count, DEFAULT_INFEASIBLE_TAIL, rng)
}

/// Generate `count` scenarios with random distinct endpoints, demand drawn
/// from [`DEMAND_RANGE_MBPS`] and a random [`WeightProfile`]. The last
/// `infeasible_tail` scenarios get [`INFEASIBLE_DEMAND_MBPS`].
pub fn generate_with_tail<R: Rng + ?Sized>(
    graph: &QosGraph,
    count: usize,
    infeasible_tail: usize,
    rng: &mut R,
) -> Result<Vec<Scenario>> {
    let mut ids: Vec<NodeId> = graph.node_ids().collect();
    if ids.len() < 2 {
        return Err(LabError::InvalidScenario(format!(
            "need at least 2 nodes, network has {}",
            ids.len()
        )));
    }
    ids.sort_unstable();

    let feasible = count.saturating_sub(infeasible_tail);
    let scenarios: Vec<Scenario> = (0..count)
        .map(|id| {
            let picks = index::sample(rng, ids.len(), 2);
            let (source, destination) = (ids[picks.index(0)], ids[picks.index(1)]);

            let demand = if id < feasible {
                f64::from(rng.gen_range(DEMAND_RANGE_MBPS))
            } else {
                INFEASIBLE_DEMAND_MBPS
            };
            let profile = *WeightProfile::ALL.choose(rng).unwrap_or(&WeightProfile::Balanced);

            Scenario::new(id, source, destination, demand, profile)
        })
        .collect();

    debug!(count, infeasible = count - feasible, "generated scenarios");
    Ok(scenarios)
}

/// Turn loaded demands into scenarios, numbered from `first_id`
pub fn from_demands<R: Rng + ?Sized>(demands: &[Demand], first_id: usize, rng: &mut R) -> Vec<Scenario> {
    demands
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let profile = *WeightProfile::ALL.choose(rng).unwrap_or(&WeightProfile::Balanced);
            Scenario::new(first_id + i, d.source, d.destination, d.demand_mbps, profile)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn create_test_graph() -> QosGraph {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        QosGraph::random_connected(12, 0.3, &mut rng)
    }

    #[test]
    fn test_generate_scenarios() {
        let graph = create_test_graph();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let scenarios = generate(&graph, 10, &mut rng).unwrap();
        assert_eq!(scenarios.len(), 10);

        for (i, s) in scenarios.iter().enumerate() {
            assert_eq!(s.id, i);
            assert_ne!(s.request.source, s.request.destination);
            assert!(graph.contains(s.request.source) && graph.contains(s.request.destination));
            assert_eq!(s.request.weights, s.profile.weights());

            if i < 8 {
                assert!((10.0..=150.0).contains(&s.request.demand));
                assert_eq!(s.request.demand.fract(), 0.0);
                assert!(!s.has_infeasible_demand());
            } else {
                assert_eq!(s.request.demand, INFEASIBLE_DEMAND_MBPS);
                assert!(s.has_infeasible_demand());
            }
        }
    }

    #[test]
    fn test_tail_larger_than_count() {
        let graph = create_test_graph();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let scenarios = generate_with_tail(&graph, 3, 5, &mut rng).unwrap();
        assert!(scenarios.iter().all(Scenario::has_infeasible_demand));
    }

    #[test]
    fn test_too_small_network() {
        let mut graph = QosGraph::new();
        graph.add_node(0, qos_routing::NodeQos::new(1.0, 0.99)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        assert!(matches!(
            generate(&graph, 4, &mut rng),
            Err(LabError::InvalidScenario(_))
        ));
    }

    #[test]
    fn test_from_demands() {
        let demands = vec![
            Demand {
                source: 1,
                destination: 4,
                demand_mbps: 60.0,
            },
            Demand {
                source: 2,
                destination: 0,
                demand_mbps: 20.0,
            },
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let scenarios = from_demands(&demands, 10, &mut rng);
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].id, 10);
        assert_eq!(scenarios[1].request.source, 2);
        assert_eq!(scenarios[1].request.demand, 20.0);
    }

    #[test]
    fn test_profiles() {
        assert_eq!(WeightProfile::Delay.weights().priority_mode(), qos_routing::PriorityMode::Delay);
        assert_eq!(
            WeightProfile::Reliability.weights().priority_mode(),
            qos_routing::PriorityMode::Reliability
        );
    }
}
