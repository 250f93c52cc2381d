//! Route Lab CLI
//!
//! Compares the genetic and Q-learning routers over many scenarios, or
//! answers a single routing query.
//!
//! Usage:
//!   route-lab --nodes 40 --edge-probability 0.12 --scenarios 30 --output report.json
//!   route-lab --network data/network.json --repeats 3
//!   route-lab --nodes 20 solve --source 0 --dest 7 --demand 120 --weights 1,0.1,0.1

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use qos_routing::{QosGraph, RouteRequest, Weights};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use route_lab::runner::{self, Runner};
use route_lab::{loader, parse_weights, scenario, ExperimentReport, LabConfig, LabError};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "route-lab",
    about = "Compare genetic and Q-learning QoS routing on generated or loaded networks"
)]
struct Args {
    /// Network JSON file (nodes, edges, optional demands)
    #[arg(short, long)]
    network: Option<PathBuf>,

    /// Node count of a generated network
    #[arg(long)]
    nodes: Option<usize>,

    /// Link probability of a generated network
    #[arg(long)]
    edge_probability: Option<f64>,

    /// Number of generated scenarios
    #[arg(short, long)]
    scenarios: Option<usize>,

    /// Runs per solver per scenario
    #[arg(short, long)]
    repeats: Option<usize>,

    /// Base random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Lab config JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output report JSON file
    #[arg(short, long, default_value = "route-lab-report.json")]
    output: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Route a single request with both solvers
    Solve {
        #[arg(long)]
        source: usize,

        #[arg(long)]
        dest: usize,

        /// Bandwidth demand in Mbps
        #[arg(long, default_value_t = 100.0)]
        demand: f64,

        /// Weights as delay,reliability,resource
        #[arg(long, default_value = "0.5,0.5,0.5", value_parser = parse_weights)]
        weights: Weights,
    },
}

impl Args {
    fn lab_config(&self) -> route_lab::Result<LabConfig> {
        let mut config = match &self.config {
            Some(path) => LabConfig::from_file(path)?,
            None => LabConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(n) = self.nodes {
            config.nodes = n;
        }
        if let Some(p) = self.edge_probability {
            config.edge_probability = p;
        }
        if let Some(n) = self.scenarios {
            config.scenarios = n;
        }
        if let Some(n) = self.repeats {
            config.repeats = n;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = args.lab_config()?;

    info!("{}", "=".repeat(60));
    info!("Route Lab - QoS routing comparison");
    info!("{}", "=".repeat(60));

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let (graph, demands) = match &args.network {
        Some(path) => {
            let network = loader::load_network(path)?;
            (network.graph, network.demands)
        }
        None => {
            info!(
                "Generating G({}, {}) network with seed {}",
                config.nodes, config.edge_probability, config.seed
            );
            (
                QosGraph::random_connected(config.nodes, config.edge_probability, &mut rng),
                Vec::new(),
            )
        }
    };

    let stats = graph.stats();
    info!(
        "Network: {} nodes, {} links, {} components, mean degree {:.2}",
        stats.total_nodes, stats.total_links, stats.components, stats.mean_degree
    );

    match args.command {
        Some(Command::Solve {
            source,
            dest,
            demand,
            weights,
        }) => {
            solve(&graph, &config, RouteRequest::new(source, dest, demand, weights))?;
        }
        None => {
            let mut scenarios = scenario::generate_with_tail(
                &graph,
                config.scenarios,
                config.infeasible_tail,
                &mut rng,
            )?;
            if !demands.is_empty() {
                info!("Adding {} scenarios from network demands", demands.len());
                let extra = scenario::from_demands(&demands, scenarios.len(), &mut rng);
                scenarios.extend(extra);
            }

            let rows = Runner::new(&graph, &config).run_all(&scenarios);
            let report = ExperimentReport::new(config.seed, stats, rows);
            report.log_summary();
            report.write(&args.output)?;
        }
    }

    Ok(())
}

fn solve(graph: &QosGraph, config: &LabConfig, request: RouteRequest) -> Result<()> {
    for id in [request.source, request.destination] {
        if !graph.contains(id) {
            return Err(LabError::InvalidScenario(format!("node {id} is not in the network")).into());
        }
    }
    if request.source == request.destination {
        bail!("source and destination must differ");
    }

    info!(
        "Routing {} -> {} at {} Mbps, weights {:?}",
        request.source, request.destination, request.demand, request.weights
    );

    for (i, solver) in runner::solvers(config).iter().enumerate() {
        let mut graph = graph.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(runner::derive_seed(config.seed, 0, i, 0));
        let solution = solver.solve(&mut graph, &request, &mut rng);

        match (&solution.path, solution.metrics(&graph)) {
            (Some(path), Some(m)) => {
                info!("{}: {:?}", solver.name(), path);
                info!(
                    "  cost {:.4} | delay {:.2} ms | reliability {:.4} | resource {:.3} | {} hops | bottleneck {:.1} Mbps",
                    solution.cost,
                    m.total_delay,
                    m.total_reliability,
                    m.resource_cost,
                    m.hop_count,
                    m.bottleneck_bandwidth
                );
            }
            _ => warn!("{}: no feasible path", solver.name()),
        }
    }
    Ok(())
}
