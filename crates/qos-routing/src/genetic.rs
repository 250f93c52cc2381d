//! Genetic path search
//!
//! Individuals are complete feasible paths. Each generation:
//!
//! 1. Evaluate `cost = total_cost(metrics)` and `fitness = 1 / (1 + cost)`
//! 2. Track the best-ever individual across the whole run
//! 3. Breed the next generation: one elite copy of the best-ever, the rest
//!    from tournament-selected parents via splice crossover and two
//!    independent suffix mutations
//!
//! The run always lasts `generations` iterations; there is no convergence
//! stop.

use crate::graph::QosGraph;
use crate::metrics::path_cost;
use crate::sampler::{random_path, DEFAULT_MAX_ATTEMPTS};
use crate::solver::{ensure_connected, RouteRequest, RouteSolver, Solution};
use crate::{NodeId, Path};
use rand::seq::{index, SliceRandom};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Genetic solver parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    /// Individuals per generation
    pub pop_size: usize,
    /// Fixed number of generations
    pub generations: usize,
    /// Probability that one mutation pass rewrites a path suffix
    pub mutation_rate: f64,
    /// Probability that a child is produced by crossover instead of copying
    pub crossover_rate: f64,
    /// Individuals drawn per tournament
    pub tournament_size: usize,
    /// Seeding draws up to `pop_size * seed_attempt_factor` sampled paths
    pub seed_attempt_factor: usize,
    /// Probability that a failed crossover falls back to the shorter parent
    pub shorter_parent_bias: f64,
    /// Random walks per sampler call
    pub sample_attempts: usize,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            pop_size: 50,
            generations: 100,
            mutation_rate: 0.3,
            crossover_rate: 0.7,
            tournament_size: 3,
            seed_attempt_factor: 5,
            shorter_parent_bias: 0.3,
            sample_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl GeneticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop_size(mut self, n: usize) -> Self {
        self.pop_size = n;
        self
    }

    pub fn generations(mut self, n: usize) -> Self {
        self.generations = n;
        self
    }

    pub fn mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    pub fn tournament_size(mut self, k: usize) -> Self {
        self.tournament_size = k;
        self
    }
}

/// Per-run diagnostics of the genetic solver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationTrace {
    /// Best-ever cost after each evaluated generation
    pub best_cost: Vec<f64>,
    /// Individuals obtained during seeding
    pub seeded: usize,
    /// Whether a direct link was provisioned for disconnected endpoints
    pub provisioned_link: bool,
}

/// Genetic algorithm over feasible paths
#[derive(Debug, Clone, Default)]
pub struct GeneticSolver {
    config: GeneticConfig,
}

impl GeneticSolver {
    pub fn new(config: GeneticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    /// Run the search and also return the per-generation trace
    pub fn solve_traced<R: Rng + ?Sized>(
        &self,
        graph: &mut QosGraph,
        request: &RouteRequest,
        rng: &mut R,
    ) -> (Solution, GenerationTrace) {
        let mut trace = GenerationTrace::default();
        if !request.is_routable(graph) {
            return (Solution::none(), trace);
        }

        trace.provisioned_link =
            ensure_connected(graph, request.source, request.destination, rng);
        let graph: &QosGraph = graph;

        let breeder = Breeder {
            graph,
            source: request.source,
            dest: request.destination,
            demand: request.demand,
            config: &self.config,
        };
        let pop_size = self.config.pop_size.max(1);

        let mut population = breeder.seed(pop_size, rng);
        trace.seeded = population.len();
        if population.is_empty() {
            info!(
                source = request.source,
                dest = request.destination,
                demand = request.demand,
                "no feasible path to seed the population"
            );
            return (Solution::none(), trace);
        }

        let mut best: Option<(Path, f64)> = None;

        for generation in 0..self.config.generations {
            let costs: Vec<f64> = population
                .iter()
                .map(|p| path_cost(graph, p, &request.weights))
                .collect();
            let fitness: Vec<f64> = costs.iter().map(|c| fitness_of(*c)).collect();

            for (path, cost) in population.iter().zip(&costs) {
                let improves = match &best {
                    Some((_, best_cost)) => cost < best_cost,
                    None => cost.is_finite(),
                };
                if improves {
                    best = Some((path.clone(), *cost));
                }
            }

            let best_cost = best.as_ref().map_or(f64::INFINITY, |(_, c)| *c);
            trace.best_cost.push(best_cost);
            debug!(generation, best_cost, "generation evaluated");

            let mut next = Vec::with_capacity(pop_size);
            if let Some((elite, _)) = &best {
                next.push(elite.clone());
            }
            while next.len() < pop_size {
                next.push(breeder.child(&population, &fitness, rng));
            }
            population = next;
        }

        let solution = match best {
            Some((path, cost)) => {
                info!(
                    generations = self.config.generations,
                    cost,
                    hops = path.len() - 1,
                    "genetic search finished"
                );
                Solution::found(path, cost)
            }
            None => Solution::none(),
        };
        (solution, trace)
    }
}

impl RouteSolver for GeneticSolver {
    fn name(&self) -> &'static str {
        "Genetic"
    }

    fn solve(&self, graph: &mut QosGraph, request: &RouteRequest, rng: &mut dyn RngCore) -> Solution {
        self.solve_traced(graph, request, rng).0
    }
}

/// Run the genetic solver once
pub fn run_genetic<R: Rng + ?Sized>(
    graph: &mut QosGraph,
    request: &RouteRequest,
    config: &GeneticConfig,
    rng: &mut R,
) -> Solution {
    GeneticSolver::new(config.clone())
        .solve_traced(graph, request, rng)
        .0
}

#[inline]
fn fitness_of(cost: f64) -> f64 {
    if cost.is_finite() {
        1.0 / (1.0 + cost)
    } else {
        0.0
    }
}

fn interior(path: &[NodeId]) -> &[NodeId] {
    path.get(1..path.len().saturating_sub(1)).unwrap_or(&[])
}

/// Genetic operators bound to one request
struct Breeder<'a> {
    graph: &'a QosGraph,
    source: NodeId,
    dest: NodeId,
    demand: f64,
    config: &'a GeneticConfig,
}

impl Breeder<'_> {
    fn sample<R: Rng + ?Sized>(&self, from: NodeId, rng: &mut R) -> Option<Path> {
        random_path(
            self.graph,
            from,
            self.dest,
            self.demand,
            self.config.sample_attempts,
            rng,
        )
    }

    fn seed<R: Rng + ?Sized>(&self, pop_size: usize, rng: &mut R) -> Vec<Path> {
        let mut population = Vec::with_capacity(pop_size);
        let attempts = pop_size * self.config.seed_attempt_factor.max(1);

        for _ in 0..attempts {
            if let Some(path) = self.sample(self.source, rng) {
                population.push(path);
            }
            if population.len() >= pop_size {
                break;
            }
        }

        debug!(seeded = population.len(), attempts, "population seeded");
        population
    }

    fn child<R: Rng + ?Sized>(&self, population: &[Path], fitness: &[f64], rng: &mut R) -> Path {
        let parent1 = self.tournament(population, fitness, rng);
        let parent2 = self.tournament(population, fitness, rng);

        let child = if rng.gen::<f64>() < self.config.crossover_rate {
            self.crossover(parent1, parent2, rng)
        } else {
            parent1.clone()
        };

        let child = self.mutate(child, rng);
        self.mutate(child, rng)
    }

    /// Fittest of `tournament_size` distinct individuals; ties keep the
    /// first drawn
    fn tournament<'p, R: Rng + ?Sized>(
        &self,
        population: &'p [Path],
        fitness: &[f64],
        rng: &mut R,
    ) -> &'p Path {
        let k = self.config.tournament_size.clamp(1, population.len());
        let mut winner: Option<usize> = None;

        for i in index::sample(rng, population.len(), k).iter() {
            if winner.map_or(true, |w| fitness[i] > fitness[w]) {
                winner = Some(i);
            }
        }
        &population[winner.unwrap_or(0)]
    }

    /// Splice at a shared interior node
    fn crossover<R: Rng + ?Sized>(&self, parent1: &Path, parent2: &Path, rng: &mut R) -> Path {
        let shared: HashSet<NodeId> = interior(parent2).iter().copied().collect();
        let common: Vec<NodeId> = interior(parent1)
            .iter()
            .copied()
            .filter(|n| shared.contains(n))
            .collect();

        let Some(&pivot) = common.choose(rng) else {
            return parent1.clone();
        };
        let (Some(i), Some(j)) = (
            parent1.iter().position(|n| *n == pivot),
            parent2.iter().position(|n| *n == pivot),
        ) else {
            return parent1.clone();
        };

        let mut seen = HashSet::new();
        let child: Path = parent1[..=i]
            .iter()
            .chain(&parent2[j + 1..])
            .copied()
            .filter(|n| seen.insert(*n))
            .collect();

        if self.is_feasible(&child) {
            child
        } else {
            self.fallback_parent(parent1, parent2, rng)
        }
    }

    fn fallback_parent<R: Rng + ?Sized>(&self, parent1: &Path, parent2: &Path, rng: &mut R) -> Path {
        if rng.gen::<f64>() < self.config.shorter_parent_bias {
            if parent1.len() <= parent2.len() {
                parent1.clone()
            } else {
                parent2.clone()
            }
        } else if rng.gen_bool(0.5) {
            parent1.clone()
        } else {
            parent2.clone()
        }
    }

    /// Resample the suffix after a random cut point
    fn mutate<R: Rng + ?Sized>(&self, path: Path, rng: &mut R) -> Path {
        if path.len() <= 2 || rng.gen::<f64>() >= self.config.mutation_rate {
            return path;
        }

        let cut = rng.gen_range(0..=path.len() - 2);
        let prefix = &path[..=cut];

        match self.sample(path[cut], rng) {
            Some(suffix)
                if suffix.len() >= 2 && !suffix[1..].iter().any(|n| prefix.contains(n)) =>
            {
                let mut mutated = prefix.to_vec();
                mutated.extend_from_slice(&suffix[1..]);
                mutated
            }
            _ => path,
        }
    }

    /// Starts at the source, ends at the destination, and every hop is a
    /// link carrying the demand
    fn is_feasible(&self, path: &[NodeId]) -> bool {
        path.first() == Some(&self.source)
            && path.last() == Some(&self.dest)
            && path.windows(2).all(|pair| {
                self.graph
                    .link(pair[0], pair[1])
                    .is_some_and(|link| link.carries(self.demand))
            })
    }
}
