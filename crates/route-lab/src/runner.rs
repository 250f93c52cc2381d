//! Experiment runner
//!
//! Every (scenario, solver, repeat) triple runs on its own clone of the base
//! network with an RNG seeded from the base seed and the triple, so runs are
//! independent and a report can be reproduced from its seed.

use crate::scenario::Scenario;
use crate::LabConfig;
use qos_routing::{GeneticSolver, Path, QLearningSolver, QosGraph, RouteSolver};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

// ============================================================================
// Results
// ============================================================================

/// Aggregated runs of one solver on one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverStats {
    pub solver: String,
    pub runs: usize,
    pub successes: usize,
    /// Runs where disconnection handling added a link
    pub provisioned_links: usize,
    /// Statistics over successful runs only; `None` without any
    pub mean_cost: Option<f64>,
    pub std_cost: Option<f64>,
    pub best_cost: Option<f64>,
    pub worst_cost: Option<f64>,
    /// Path of the cheapest successful run
    pub best_path: Option<Path>,
    pub mean_time_ms: f64,
    #[serde(skip)]
    costs: Vec<f64>,
    #[serde(skip)]
    elapsed: Duration,
}

impl SolverStats {
    pub fn new(solver: &str) -> Self {
        Self {
            solver: solver.to_string(),
            runs: 0,
            successes: 0,
            provisioned_links: 0,
            mean_cost: None,
            std_cost: None,
            best_cost: None,
            worst_cost: None,
            best_path: None,
            mean_time_ms: 0.0,
            costs: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn record_success(&mut self, path: Path, cost: f64, elapsed: Duration) {
        self.runs += 1;
        self.successes += 1;
        self.elapsed += elapsed;
        if self.best_cost.map_or(true, |best| cost < best) {
            self.best_cost = Some(cost);
            self.best_path = Some(path);
        }
        self.costs.push(cost);
    }

    pub fn record_failure(&mut self, elapsed: Duration) {
        self.runs += 1;
        self.elapsed += elapsed;
    }

    pub fn finalize(&mut self) {
        if self.runs > 0 {
            self.mean_time_ms = self.elapsed.as_secs_f64() * 1000.0 / self.runs as f64;
        }
        if self.costs.is_empty() {
            return;
        }

        let n = self.costs.len() as f64;
        let mean = self.costs.iter().sum::<f64>() / n;
        let variance = self.costs.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;

        self.mean_cost = Some(mean);
        self.std_cost = Some(variance.sqrt());
        self.worst_cost = self.costs.iter().copied().reduce(f64::max);
    }

    pub fn success_rate(&self) -> f64 {
        if self.runs == 0 {
            0.0
        } else {
            self.successes as f64 / self.runs as f64
        }
    }
}

/// All solver results for one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRow {
    pub scenario: Scenario,
    pub results: Vec<SolverStats>,
}

// ============================================================================
// Runner
// ============================================================================

/// Solvers configured by `config`, in report order
pub fn solvers(config: &LabConfig) -> Vec<Box<dyn RouteSolver>> {
    vec![
        Box::new(GeneticSolver::new(config.genetic.clone())),
        Box::new(QLearningSolver::new(config.qlearning.clone())),
    ]
}

/// Seed of one run, mixed from the base seed and the run coordinates
pub fn derive_seed(base: u64, scenario: usize, solver: usize, repeat: usize) -> u64 {
    let mut z = base
        ^ (scenario as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (solver as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
        ^ (repeat as u64).wrapping_mul(0x1656_67B1_9E37_79F9);
    // splitmix64 finalizer
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Runs every solver `repeats` times per scenario against a base network
pub struct Runner<'a> {
    graph: &'a QosGraph,
    solvers: Vec<Box<dyn RouteSolver>>,
    repeats: usize,
    seed: u64,
}

impl<'a> Runner<'a> {
    pub fn new(graph: &'a QosGraph, config: &LabConfig) -> Self {
        Self {
            graph,
            solvers: solvers(config),
            repeats: config.repeats.max(1),
            seed: config.seed,
        }
    }

    pub fn solver_names(&self) -> Vec<&'static str> {
        self.solvers.iter().map(|s| s.name()).collect()
    }

    pub fn run_scenario(&self, scenario: &Scenario) -> ScenarioRow {
        let results = self
            .solvers
            .iter()
            .enumerate()
            .map(|(solver_idx, solver)| {
                let mut stats = SolverStats::new(solver.name());

                for repeat in 0..self.repeats {
                    let mut graph = self.graph.clone();
                    let mut rng =
                        ChaCha8Rng::seed_from_u64(derive_seed(self.seed, scenario.id, solver_idx, repeat));

                    let start = Instant::now();
                    let solution = solver.solve(&mut graph, &scenario.request, &mut rng);
                    let elapsed = start.elapsed();

                    if graph.link_count() > self.graph.link_count() {
                        stats.provisioned_links += 1;
                    }
                    match solution.path {
                        Some(path) if solution.cost.is_finite() => {
                            stats.record_success(path, solution.cost, elapsed)
                        }
                        _ => stats.record_failure(elapsed),
                    }
                }

                stats.finalize();
                debug!(
                    scenario = scenario.id,
                    solver = solver.name(),
                    successes = stats.successes,
                    mean_cost = ?stats.mean_cost,
                    "scenario runs complete"
                );
                stats
            })
            .collect();

        ScenarioRow {
            scenario: scenario.clone(),
            results,
        }
    }

    pub fn run_all(&self, scenarios: &[Scenario]) -> Vec<ScenarioRow> {
        info!(
            "Running {} scenarios x {} solvers x {} repeats",
            scenarios.len(),
            self.solvers.len(),
            self.repeats
        );
        scenarios.iter().map(|s| self.run_scenario(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qos_routing::{GeneticConfig, LinkQos, NodeQos, QLearningConfig};
    use crate::scenario::WeightProfile;

    fn create_test_graph() -> QosGraph {
        // Square 0-1-2-3-0 plus an island node 4
        let mut graph = QosGraph::new();
        for id in 0..5 {
            graph.add_node(id, NodeQos::new(1.0, 0.99)).unwrap();
        }
        for (a, b) in [(0, 1), (1, 2), (2, 3), (3, 0)] {
            graph.add_link(a, b, LinkQos::new(400.0, 5.0, 0.99)).unwrap();
        }
        graph
    }

    fn fast_config() -> LabConfig {
        LabConfig::new()
            .repeats(3)
            .genetic(GeneticConfig::new().pop_size(10).generations(10))
            .qlearning(QLearningConfig::new().episodes(300))
    }

    #[test]
    fn test_run_feasible_scenario() {
        let graph = create_test_graph();
        let runner = Runner::new(&graph, &fast_config());
        let scenario = Scenario::new(0, 0, 2, 100.0, WeightProfile::Delay);

        let row = runner.run_scenario(&scenario);
        assert_eq!(row.results.len(), 2);
        assert_eq!(runner.solver_names(), vec!["Genetic", "Q-Learning"]);

        for stats in &row.results {
            assert_eq!(stats.runs, 3);
            assert_eq!(stats.successes, 3, "{}", stats.solver);
            assert_eq!(stats.provisioned_links, 0);
            let best = stats.best_cost.unwrap();
            assert!(best <= stats.mean_cost.unwrap() + 1e-12);
            assert!(stats.mean_cost.unwrap() <= stats.worst_cost.unwrap() + 1e-12);
            assert_eq!(stats.best_path.as_ref().map(|p| p.len()), Some(3));
        }
        // The base network is never touched
        assert_eq!(graph.link_count(), 4);
    }

    #[test]
    fn test_run_infeasible_scenario() {
        let graph = create_test_graph();
        let runner = Runner::new(&graph, &fast_config());
        let scenario = Scenario::new(1, 0, 2, 999_999.0, WeightProfile::Balanced);

        let row = runner.run_scenario(&scenario);
        for stats in &row.results {
            assert_eq!(stats.successes, 0);
            assert_eq!(stats.success_rate(), 0.0);
            assert!(stats.mean_cost.is_none() && stats.best_path.is_none());
        }
    }

    #[test]
    fn test_disconnected_scenario_is_counted() {
        let graph = create_test_graph();
        let runner = Runner::new(&graph, &fast_config());
        let scenario = Scenario::new(2, 0, 4, 50.0, WeightProfile::Balanced);

        let row = runner.run_scenario(&scenario);
        for stats in &row.results {
            assert_eq!(stats.provisioned_links, 3);
            assert_eq!(stats.successes, 3);
        }
        assert!(!graph.is_connected(0, 4));
    }

    #[test]
    fn test_runs_are_reproducible() {
        let graph = create_test_graph();
        let scenario = Scenario::new(0, 1, 3, 80.0, WeightProfile::Reliability);

        let a = Runner::new(&graph, &fast_config()).run_scenario(&scenario);
        let b = Runner::new(&graph, &fast_config()).run_scenario(&scenario);
        for (x, y) in a.results.iter().zip(&b.results) {
            assert_eq!(x.best_cost, y.best_cost);
            assert_eq!(x.best_path, y.best_path);
        }
    }

    #[test]
    fn test_stats_aggregation() {
        let mut stats = SolverStats::new("test");
        stats.record_success(vec![0, 1], 2.0, Duration::from_millis(2));
        stats.record_success(vec![0, 2, 1], 4.0, Duration::from_millis(4));
        stats.record_failure(Duration::from_millis(6));
        stats.finalize();

        assert_eq!(stats.runs, 3);
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.mean_cost, Some(3.0));
        assert_eq!(stats.std_cost, Some(1.0));
        assert_eq!(stats.best_cost, Some(2.0));
        assert_eq!(stats.worst_cost, Some(4.0));
        assert_eq!(stats.best_path, Some(vec![0, 1]));
        assert!((stats.mean_time_ms - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_derive_seed_separates_runs() {
        let a = derive_seed(42, 0, 0, 0);
        assert_eq!(a, derive_seed(42, 0, 0, 0));
        assert_ne!(a, derive_seed(42, 0, 0, 1));
        assert_ne!(a, derive_seed(42, 0, 1, 0));
        assert_ne!(a, derive_seed(42, 1, 0, 0));
        assert_ne!(a, derive_seed(43, 0, 0, 0));
    }
}
