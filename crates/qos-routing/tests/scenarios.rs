//! End-to-end routing scenarios for both solvers

use qos_routing::{
    ensure_connected, path_metrics, run_genetic, run_qlearning, total_cost, GeneticConfig,
    GeneticSolver, LinkQos, NodeQos, QLearningConfig, QLearningSolver, QosGraph, RouteRequest,
    RouteSolver, Solution, Weights,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// 0-1-2-3-4-0, every link 500 Mbps / 5 ms / 0.99, every node 1 ms / 0.99
fn create_ring() -> QosGraph {
    let mut graph = QosGraph::new();
    for id in 0..5 {
        graph.add_node(id, NodeQos::new(1.0, 0.99)).unwrap();
    }
    for id in 0..5 {
        graph
            .add_link(id, (id + 1) % 5, LinkQos::new(500.0, 5.0, 0.99))
            .unwrap();
    }
    graph
}

fn delay_only() -> Weights {
    Weights::new(1.0, 0.0, 0.0)
}

fn solvers() -> Vec<Box<dyn RouteSolver>> {
    vec![
        Box::new(GeneticSolver::new(GeneticConfig::new().generations(40))),
        Box::new(QLearningSolver::new(QLearningConfig::new().episodes(800))),
    ]
}

#[test]
fn ring_adjacent_nodes_use_direct_link() {
    let request = RouteRequest::new(0, 1, 100.0, delay_only());

    let mut graph = create_ring();
    let direct = total_cost(&path_metrics(&graph, &[0, 1]).unwrap(), &delay_only());
    assert_eq!(direct, 5.0);

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let (solution, trace) =
        GeneticSolver::new(GeneticConfig::default()).solve_traced(&mut graph, &request, &mut rng);

    assert_eq!(solution.path, Some(vec![0, 1]));
    assert!(trace.best_cost.iter().all(|c| *c <= direct + 1e-12));
    assert!(!trace.provisioned_link);
}

#[test]
fn ring_both_solvers_find_shorter_arc() {
    // 0-1-2 costs 5 + 1 + 5, the other way round 0-4-3-2 costs 17
    let request = RouteRequest::new(0, 2, 100.0, delay_only());

    for solver in solvers() {
        let mut graph = create_ring();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let solution = solver.solve(&mut graph, &request, &mut rng);

        assert_eq!(solution.path, Some(vec![0, 1, 2]), "{}", solver.name());
        assert!((solution.cost - 11.0).abs() < 1e-9, "{}", solver.name());
        assert_eq!(graph.link_count(), 5);
    }
}

#[test]
fn infeasible_demand_yields_no_solution() {
    let request = RouteRequest::new(0, 3, 999_999.0, Weights::balanced());

    for solver in solvers() {
        let mut graph = create_ring();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let solution = solver.solve(&mut graph, &request, &mut rng);

        assert_eq!(solution, Solution::none(), "{}", solver.name());
        assert!(solution.cost.is_infinite());
    }
}

#[test]
fn source_equals_destination_is_handled() {
    let graph = create_ring();
    assert!(path_metrics(&graph, &[2]).is_none());

    let request = RouteRequest::new(2, 2, 50.0, Weights::balanced());
    for solver in solvers() {
        let mut g = graph.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(solver.solve(&mut g, &request, &mut rng), Solution::none());
    }
}

#[test]
fn unknown_endpoints_are_handled() {
    let request = RouteRequest::new(0, 42, 50.0, Weights::balanced());
    for solver in solvers() {
        let mut graph = create_ring();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(!solver.solve(&mut graph, &request, &mut rng).is_found());
    }
}

#[test]
fn empty_graph_is_handled() {
    let request = RouteRequest::new(0, 1, 50.0, Weights::balanced());
    for solver in solvers() {
        let mut graph = QosGraph::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(solver.solve(&mut graph, &request, &mut rng), Solution::none());
    }
}

/// Two islands: 0-1 and 2-3
fn create_islands() -> QosGraph {
    let mut graph = QosGraph::new();
    for id in 0..4 {
        graph.add_node(id, NodeQos::new(1.0, 0.99)).unwrap();
    }
    graph.add_link(0, 1, LinkQos::new(500.0, 5.0, 0.99)).unwrap();
    graph.add_link(2, 3, LinkQos::new(500.0, 5.0, 0.99)).unwrap();
    graph
}

#[test]
fn disconnected_endpoints_get_synthesized_link() {
    let weights = Weights::new(0.4, 0.3, 0.3);
    // Every synthesized link carries at least 100 Mbps
    let request = RouteRequest::new(1, 2, 50.0, weights);

    let mut graph = create_islands();
    let solution = run_genetic(
        &mut graph,
        &request,
        &GeneticConfig::new().generations(10),
        &mut ChaCha8Rng::seed_from_u64(21),
    );
    let link = *graph.link(1, 2).expect("link provisioned");
    assert_eq!(solution.path, Some(vec![1, 2]));

    // The cost reflects the drawn attributes
    let rel = -(link.reliability * 0.99 * 0.99).ln();
    let expected = 0.4 * link.delay_ms + 0.3 * rel + 0.3 * 1000.0 / link.bandwidth_mbps;
    assert!((solution.cost - expected).abs() < 1e-9);

    let mut graph = create_islands();
    let solution = run_qlearning(
        &mut graph,
        &request,
        &QLearningConfig::new().episodes(200),
        &mut ChaCha8Rng::seed_from_u64(21),
    );
    let link = *graph.link(1, 2).expect("link provisioned");
    assert_eq!(solution.path, Some(vec![1, 2]));
    let rel = -(link.reliability * 0.99 * 0.99).ln();
    let expected = 0.4 * link.delay_ms + 0.3 * rel + 0.3 * 1000.0 / link.bandwidth_mbps;
    assert!((solution.cost - expected).abs() < 1e-9);
}

#[test]
fn connected_endpoints_leave_graph_untouched() {
    let mut graph = create_islands();
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    assert!(!ensure_connected(&mut graph, 0, 1, &mut rng));
    assert_eq!(graph.link_count(), 2);
}

#[test]
fn fixed_seed_is_deterministic() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let base = QosGraph::random_connected(15, 0.25, &mut rng);
    let request = RouteRequest::new(0, 14, 80.0, Weights::new(0.5, 0.5, 0.5));

    for solver in solvers() {
        let first = solver.solve(&mut base.clone(), &request, &mut ChaCha8Rng::seed_from_u64(5));
        let second = solver.solve(&mut base.clone(), &request, &mut ChaCha8Rng::seed_from_u64(5));
        assert_eq!(first, second, "{}", solver.name());
    }
}
