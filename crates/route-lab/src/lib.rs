//! Route Lab - experiment harness for the QoS routers
//!
//! Loads or generates a network, derives routing scenarios, runs every
//! solver several times per scenario on private copies of the network and
//! writes an aggregated JSON report.
//!
//! # Pipeline
//!
//! ```text
//! network JSON ──┐
//!                ├─> QosGraph ─> scenarios ─> runner (repeats × solvers) ─> report
//! G(n, p) ───────┘
//! ```

use qos_routing::{GeneticConfig, QLearningConfig, RoutingError, Weights};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub mod loader;
pub mod report;
pub mod runner;
pub mod scenario;

pub use loader::{Demand, Network};
pub use report::ExperimentReport;
pub use runner::{Runner, ScenarioRow, SolverStats};
pub use scenario::{Scenario, WeightProfile};

#[derive(Error, Debug)]
pub enum LabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),
    #[error("Network has no usable nodes")]
    EmptyNetwork,
    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, LabError>;

/// Experiment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Base seed; every run derives its own seed from it
    pub seed: u64,
    /// Node count of the generated network
    pub nodes: usize,
    /// Link probability of the generated network
    pub edge_probability: f64,
    /// Generated scenarios
    pub scenarios: usize,
    /// Trailing scenarios given an unsatisfiable demand
    pub infeasible_tail: usize,
    /// Runs per solver per scenario
    pub repeats: usize,
    pub genetic: GeneticConfig,
    pub qlearning: QLearningConfig,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            nodes: 30,
            edge_probability: 0.15,
            scenarios: 20,
            infeasible_tail: scenario::DEFAULT_INFEASIBLE_TAIL,
            repeats: 5,
            genetic: GeneticConfig::default(),
            qlearning: QLearningConfig::default(),
        }
    }
}

impl LabConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn nodes(mut self, n: usize) -> Self {
        self.nodes = n;
        self
    }

    pub fn edge_probability(mut self, p: f64) -> Self {
        self.edge_probability = p;
        self
    }

    pub fn scenarios(mut self, n: usize) -> Self {
        self.scenarios = n;
        self
    }

    pub fn repeats(mut self, n: usize) -> Self {
        self.repeats = n;
        self
    }

    pub fn genetic(mut self, config: GeneticConfig) -> Self {
        self.genetic = config;
        self
    }

    pub fn qlearning(mut self, config: QLearningConfig) -> Self {
        self.qlearning = config;
        self
    }

    /// Read a config from JSON; absent fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading config from {:?}", path);

        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Rates must lie in `[0, 1]`, counts must be at least 1
    pub fn validate(&self) -> Result<()> {
        let ga = &self.genetic;
        let ql = &self.qlearning;

        let rates = [
            ("edge_probability", self.edge_probability),
            ("genetic.mutation_rate", ga.mutation_rate),
            ("genetic.crossover_rate", ga.crossover_rate),
            ("genetic.shorter_parent_bias", ga.shorter_parent_bias),
            ("qlearning.alpha", ql.alpha),
            ("qlearning.gamma", ql.gamma),
            ("qlearning.epsilon", ql.epsilon),
            ("qlearning.epsilon_decay", ql.epsilon_decay),
            ("qlearning.epsilon_min", ql.epsilon_min),
        ];
        for (name, value) in rates {
            if !(0.0..=1.0).contains(&value) {
                return Err(LabError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }

        let sizes = [
            ("nodes", self.nodes),
            ("scenarios", self.scenarios),
            ("repeats", self.repeats),
            ("genetic.pop_size", ga.pop_size),
            ("genetic.tournament_size", ga.tournament_size),
            ("qlearning.episodes", ql.episodes),
            ("qlearning.max_steps", ql.max_steps),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(LabError::InvalidConfig(format!("{name} must be at least 1")));
            }
        }

        if self.nodes < 2 {
            return Err(LabError::InvalidConfig(
                "nodes must be at least 2 to route anything".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse `"delay,reliability,resource"` into [`Weights`]
pub fn parse_weights(s: &str) -> Result<Weights> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [delay, reliability, resource] = parts.as_slice() else {
        return Err(LabError::InvalidConfig(format!(
            "weights need three comma-separated values, got {s:?}"
        )));
    };

    let parse = |v: &str| {
        v.parse::<f64>()
            .map_err(|e| LabError::InvalidConfig(format!("bad weight {v:?}: {e}")))
    };
    let weights = Weights::new(parse(*delay)?, parse(*reliability)?, parse(*resource)?);
    if !weights.is_valid() {
        return Err(LabError::InvalidConfig(format!(
            "weights must be finite and non-negative: {weights:?}"
        )));
    }
    Ok(weights)
}
