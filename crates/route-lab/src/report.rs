//! Experiment reporting and export

use crate::runner::ScenarioRow;
use crate::Result;
use qos_routing::graph::GraphStats;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Full experiment report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// RFC 3339 timestamp
    pub generated_at: String,
    pub seed: u64,
    pub graph: GraphStats,
    pub rows: Vec<ScenarioRow>,
    pub summary: Vec<SolverSummary>,
}

/// Totals of one solver across all scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSummary {
    pub solver: String,
    pub scenarios: usize,
    /// Scenarios with at least one successful run
    pub solved_scenarios: usize,
    pub total_runs: usize,
    pub successful_runs: usize,
    pub success_rate: f64,
    /// Mean of the per-scenario mean costs, over solved scenarios
    pub mean_cost: Option<f64>,
    pub mean_time_ms: f64,
    /// Scenarios where this solver's best cost was the lowest (ties count for all)
    pub wins: usize,
}

impl ExperimentReport {
    pub fn new(seed: u64, graph: GraphStats, rows: Vec<ScenarioRow>) -> Self {
        let summary = summarize(&rows);
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            seed,
            graph,
            rows,
            summary,
        }
    }

    /// Export as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write pretty JSON to `path`
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Writing report to {:?}", path);

        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Log the per-solver summary table
    pub fn log_summary(&self) {
        info!("{}", "=".repeat(60));
        info!("SUMMARY ({} scenarios, seed {})", self.rows.len(), self.seed);
        info!("{}", "=".repeat(60));
        for s in &self.summary {
            info!(
                "  {:<12} | solved {:>3}/{:<3} | runs {:>5.1}% | mean cost {:>10} | {:>8.2} ms | wins {}",
                s.solver,
                s.solved_scenarios,
                s.scenarios,
                s.success_rate * 100.0,
                s.mean_cost.map_or_else(|| "-".to_string(), |c| format!("{c:.4}")),
                s.mean_time_ms,
                s.wins
            );
        }
    }
}

fn summarize(rows: &[ScenarioRow]) -> Vec<SolverSummary> {
    let mut summary: Vec<SolverSummary> = Vec::new();

    for row in rows {
        let best_overall = row
            .results
            .iter()
            .filter_map(|r| r.best_cost)
            .reduce(f64::min);

        for stats in &row.results {
            let entry = match summary.iter().position(|s| s.solver == stats.solver) {
                Some(i) => &mut summary[i],
                None => {
                    summary.push(SolverSummary {
                        solver: stats.solver.clone(),
                        scenarios: 0,
                        solved_scenarios: 0,
                        total_runs: 0,
                        successful_runs: 0,
                        success_rate: 0.0,
                        mean_cost: None,
                        mean_time_ms: 0.0,
                        wins: 0,
                    });
                    let last = summary.len() - 1;
                    &mut summary[last]
                }
            };

            entry.scenarios += 1;
            entry.total_runs += stats.runs;
            entry.successful_runs += stats.successes;
            // Accumulated as sums, divided below
            entry.mean_time_ms += stats.mean_time_ms;
            if let Some(mean) = stats.mean_cost {
                entry.solved_scenarios += 1;
                entry.mean_cost = Some(entry.mean_cost.unwrap_or(0.0) + mean);
            }
            if let (Some(best), Some(overall)) = (stats.best_cost, best_overall) {
                if best <= overall {
                    entry.wins += 1;
                }
            }
        }
    }

    for s in &mut summary {
        if s.total_runs > 0 {
            s.success_rate = s.successful_runs as f64 / s.total_runs as f64;
        }
        if s.scenarios > 0 {
            s.mean_time_ms /= s.scenarios as f64;
        }
        if s.solved_scenarios > 0 {
            s.mean_cost = s.mean_cost.map(|sum| sum / s.solved_scenarios as f64);
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::SolverStats;
    use crate::scenario::{Scenario, WeightProfile};
    use qos_routing::{LinkQos, NodeQos, QosGraph};
    use std::time::Duration;

    fn stats(solver: &str, costs: &[Option<f64>]) -> SolverStats {
        let mut s = SolverStats::new(solver);
        for cost in costs {
            match cost {
                Some(c) => s.record_success(vec![0, 1], *c, Duration::from_millis(1)),
                None => s.record_failure(Duration::from_millis(1)),
            }
        }
        s.finalize();
        s
    }

    fn create_rows() -> Vec<ScenarioRow> {
        vec![
            ScenarioRow {
                scenario: Scenario::new(0, 0, 1, 50.0, WeightProfile::Delay),
                results: vec![
                    stats("Genetic", &[Some(2.0), Some(4.0)]),
                    stats("Q-Learning", &[Some(5.0), None]),
                ],
            },
            ScenarioRow {
                scenario: Scenario::new(1, 1, 0, 999_999.0, WeightProfile::Balanced),
                results: vec![stats("Genetic", &[None, None]), stats("Q-Learning", &[None, None])],
            },
        ]
    }

    fn create_graph_stats() -> GraphStats {
        let mut graph = QosGraph::new();
        graph.add_node(0, NodeQos::new(1.0, 0.99)).unwrap();
        graph.add_node(1, NodeQos::new(1.0, 0.99)).unwrap();
        graph.add_link(0, 1, LinkQos::new(100.0, 5.0, 0.99)).unwrap();
        graph.stats()
    }

    #[test]
    fn test_summary() {
        let report = ExperimentReport::new(42, create_graph_stats(), create_rows());
        assert_eq!(report.summary.len(), 2);

        let ga = &report.summary[0];
        assert_eq!(ga.solver, "Genetic");
        assert_eq!((ga.scenarios, ga.solved_scenarios), (2, 1));
        assert_eq!((ga.total_runs, ga.successful_runs), (4, 2));
        assert!((ga.success_rate - 0.5).abs() < 1e-12);
        assert_eq!(ga.mean_cost, Some(3.0));
        assert_eq!(ga.wins, 1);

        let ql = &report.summary[1];
        assert_eq!(ql.successful_runs, 1);
        assert_eq!(ql.mean_cost, Some(5.0));
        assert_eq!(ql.wins, 0);
    }

    #[test]
    fn test_write_json() {
        let report = ExperimentReport::new(7, create_graph_stats(), create_rows());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        report.write(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(value["seed"], 7);
        assert_eq!(value["rows"].as_array().unwrap().len(), 2);
        assert!(value["rows"][1]["results"][0]["best_cost"].is_null());
        assert!(chrono::DateTime::parse_from_rfc3339(value["generated_at"].as_str().unwrap()).is_ok());
        assert!(report.to_json().unwrap().contains("\"Q-Learning\""));
    }
}
