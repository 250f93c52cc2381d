//! Property tests over random G(n, p) networks

use proptest::prelude::*;
use qos_routing::metrics::path_cost;
use qos_routing::{
    path_metrics, random_path, run_qlearning, GeneticConfig, GeneticSolver, NodeId, QLearningConfig,
    QosGraph, RouteRequest, Weights, DEFAULT_MAX_ATTEMPTS,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

fn network() -> impl Strategy<Value = (QosGraph, u64)> {
    (4usize..12, 0.15f64..0.6, any::<u64>()).prop_map(|(n, p, seed)| {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (QosGraph::random(n, p, &mut rng), seed)
    })
}

fn weights() -> impl Strategy<Value = Weights> {
    (0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0).prop_map(|(d, r, s)| Weights::new(d, r, s))
}

fn small_ga() -> GeneticConfig {
    GeneticConfig::new().pop_size(12).generations(15)
}

fn small_ql() -> QLearningConfig {
    QLearningConfig::new().episodes(150).max_steps(30)
}

fn assert_feasible(graph: &QosGraph, path: &[NodeId], source: NodeId, dest: NodeId, demand: f64) {
    assert_eq!(path.first(), Some(&source));
    assert_eq!(path.last(), Some(&dest));
    let mut seen = HashSet::new();
    assert!(path.iter().all(|n| seen.insert(*n)), "path revisits a node: {path:?}");
    for pair in path.windows(2) {
        let link = graph.link(pair[0], pair[1]).expect("consecutive nodes must be linked");
        assert!(
            link.carries(demand),
            "link {}-{} has {} Mbps < {demand}",
            pair[0],
            pair[1],
            link.bandwidth_mbps
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sampled_paths_are_feasible((graph, seed) in network(), demand in 0.0f64..1200.0) {
        let dest = graph.node_count() - 1;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        if let Some(path) = random_path(&graph, 0, dest, demand, DEFAULT_MAX_ATTEMPTS, &mut rng) {
            assert_feasible(&graph, &path, 0, dest, demand);
        } else {
            // No walk and no fallback means no feasible path at all
            prop_assert!(graph.bandwidth_subgraph(demand).shortest_hop_path(0, dest).is_none());
        }
    }

    #[test]
    fn reliability_cost_is_negative_log((graph, seed) in network()) {
        let dest = graph.node_count() - 1;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        if let Some(path) = random_path(&graph, 0, dest, 0.0, DEFAULT_MAX_ATTEMPTS, &mut rng) {
            let first = path_metrics(&graph, &path).unwrap();
            let second = path_metrics(&graph, &path).unwrap();
            prop_assert_eq!(first, second);
            prop_assert!((first.reliability_cost + first.total_reliability.ln()).abs() < 1e-9);
            prop_assert!(first.total_reliability > 0.0 && first.total_reliability <= 1.0);
        }
    }

    #[test]
    fn genetic_solutions_are_feasible_and_monotone(
        (graph, seed) in network(),
        demand in 10.0f64..600.0,
        weights in weights(),
    ) {
        let dest = graph.node_count() - 1;
        let request = RouteRequest::new(0, dest, demand, weights);
        let solver = GeneticSolver::new(small_ga());

        let mut g = graph.clone();
        let (solution, trace) =
            solver.solve_traced(&mut g, &request, &mut ChaCha8Rng::seed_from_u64(seed));

        if let Some(path) = &solution.path {
            assert_feasible(&g, path, 0, dest, demand);
            prop_assert!((solution.cost - path_cost(&g, path, &weights)).abs() < 1e-9);
        } else {
            prop_assert!(solution.cost.is_infinite());
        }
        for pair in trace.best_cost.windows(2) {
            prop_assert!(pair[1] <= pair[0]);
        }

        let mut again = graph.clone();
        let (replay, _) =
            solver.solve_traced(&mut again, &request, &mut ChaCha8Rng::seed_from_u64(seed));
        prop_assert_eq!(solution, replay);
    }

    #[test]
    fn qlearning_solutions_are_feasible_and_deterministic(
        (graph, seed) in network(),
        demand in 10.0f64..600.0,
        weights in weights(),
    ) {
        let dest = graph.node_count() - 1;
        let request = RouteRequest::new(0, dest, demand, weights);

        let mut g = graph.clone();
        let solution =
            run_qlearning(&mut g, &request, &small_ql(), &mut ChaCha8Rng::seed_from_u64(seed));

        if let Some(path) = &solution.path {
            assert_feasible(&g, path, 0, dest, demand);
            prop_assert!((solution.cost - path_cost(&g, path, &weights)).abs() < 1e-9);
        } else {
            prop_assert!(solution.cost.is_infinite());
        }

        let mut again = graph.clone();
        let replay =
            run_qlearning(&mut again, &request, &small_ql(), &mut ChaCha8Rng::seed_from_u64(seed));
        prop_assert_eq!(solution, replay);
    }
}
