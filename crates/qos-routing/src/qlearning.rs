//! Tabular Q-learning router
//!
//! The agent walks the graph from the source, one link per step, and learns
//! `Q[(node, next)]` with the one-step update
//!
//! ```text
//! Q[s,a] += alpha * (reward + gamma * max_a' Q[s',a'] - Q[s,a])
//! ```
//!
//! Only links carrying the demand are actions. The reward is the negative
//! hop cost (normalized weights, scaled by `cost_booster`) with shaping:
//! the source node's reliability cost on the first hop of an episode, an
//! extra penalty on the dominant objective, a bonus on reaching the
//! destination and a penalty when the step budget runs out.
//!
//! After training, the path is read greedily from the table; extraction
//! fails as soon as the greedy choice is a node already on the path. The returned cost is the cost model total, not the
//! shaped reward.

use crate::graph::{LinkQos, QosGraph};
use crate::metrics::{
    path_metrics, reliability_penalty, total_cost, CostComponents, PriorityMode, Weights,
    RESOURCE_SCALE,
};
use crate::solver::{ensure_connected, RouteRequest, RouteSolver, Solution};
use crate::Path;
use petgraph::graph::NodeIndex;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Q-learning hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QLearningConfig {
    /// Training episodes
    pub episodes: usize,
    /// Step budget per episode and for policy extraction
    pub max_steps: usize,
    /// Learning rate
    pub alpha: f64,
    /// Discount factor
    pub gamma: f64,
    /// Initial exploration probability
    pub epsilon: f64,
    /// Multiplicative epsilon decay applied after every episode
    pub epsilon_decay: f64,
    /// Exploration floor
    pub epsilon_min: f64,
    /// Extra penalty per unit of the dominant objective's hop cost
    pub priority_penalty: f64,
    /// Scale applied to the weighted hop cost
    pub cost_booster: f64,
    /// Bonus for reaching the destination
    pub goal_reward: f64,
    /// Penalty when an episode exhausts `max_steps`
    pub timeout_penalty: f64,
}

impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            episodes: 2500,
            max_steps: 70,
            alpha: 0.12,
            gamma: 0.95,
            epsilon: 1.0,
            epsilon_decay: 0.995,
            epsilon_min: 0.05,
            priority_penalty: 1.0,
            cost_booster: 1.0,
            goal_reward: 5.0,
            timeout_penalty: 5.0,
        }
    }
}

impl QLearningConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn episodes(mut self, n: usize) -> Self {
        self.episodes = n;
        self
    }

    pub fn max_steps(mut self, n: usize) -> Self {
        self.max_steps = n;
        self
    }

    pub fn cost_booster(mut self, booster: f64) -> Self {
        self.cost_booster = booster;
        self
    }

    pub fn priority_penalty(mut self, penalty: f64) -> Self {
        self.priority_penalty = penalty;
        self
    }

    /// Exploration rate of each episode: `epsilon`, then multiplied by
    /// `epsilon_decay` after every episode, floored at `epsilon_min`
    pub fn epsilon_schedule(&self) -> impl Iterator<Item = f64> {
        let (decay, min) = (self.epsilon_decay, self.epsilon_min);
        std::iter::successors(Some(self.epsilon), move |e| Some((e * decay).max(min)))
    }
}

/// Action values keyed by `(state node, next node)`; absent pairs are 0
#[derive(Debug, Clone, Default)]
pub struct QTable {
    values: HashMap<(NodeIndex, NodeIndex), f64>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, state: NodeIndex, action: NodeIndex) -> f64 {
        self.values.get(&(state, action)).copied().unwrap_or(0.0)
    }

    /// Move `Q[state, action]` toward `target` by `alpha`
    pub fn update(&mut self, state: NodeIndex, action: NodeIndex, target: f64, alpha: f64) {
        let q = self.values.entry((state, action)).or_insert(0.0);
        *q += alpha * (target - *q);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Highest value over `actions`, 0 when there are none
    fn max_value<'a>(&self, state: NodeIndex, actions: impl IntoIterator<Item = &'a Action>) -> f64 {
        actions
            .into_iter()
            .map(|a| self.get(state, a.to))
            .fold(None, |best: Option<f64>, q| Some(best.map_or(q, |b| b.max(q))))
            .unwrap_or(0.0)
    }

    /// Greedy action. `actions` are ordered by node id, so keeping the first
    /// maximum breaks ties toward the lowest id.
    fn greedy<'a>(
        &self,
        state: NodeIndex,
        actions: impl IntoIterator<Item = &'a Action>,
    ) -> Option<&'a Action> {
        let mut best: Option<(&Action, f64)> = None;
        for action in actions {
            let q = self.get(state, action.to);
            if best.map_or(true, |(_, b)| q > b) {
                best = Some((action, q));
            }
        }
        best.map(|(a, _)| a)
    }
}

/// A bandwidth-feasible move out of a node
#[derive(Debug, Clone, Copy)]
struct Action {
    to: NodeIndex,
    link: LinkQos,
}

/// Hop cost broken down by objective, plus the weighted total
#[derive(Debug, Clone, Copy)]
struct HopCost {
    components: CostComponents,
    combined: f64,
}

/// Routing environment for one request
struct RoutingEnv<'a> {
    graph: &'a QosGraph,
    start: NodeIndex,
    goal: NodeIndex,
    /// Feasible actions per node index, ordered by node id
    actions: Vec<Vec<Action>>,
    weights: Weights,
    priority: PriorityMode,
    source_reliability_cost: f64,
    config: &'a QLearningConfig,
}

impl<'a> RoutingEnv<'a> {
    fn new(
        graph: &'a QosGraph,
        start: NodeIndex,
        goal: NodeIndex,
        request: &RouteRequest,
        config: &'a QLearningConfig,
    ) -> Self {
        let actions = (0..graph.node_count())
            .map(|i| {
                let mut acts: Vec<Action> = graph
                    .neighbors(NodeIndex::new(i))
                    .filter(|(_, link)| link.carries(request.demand))
                    .map(|(to, link)| Action { to, link: *link })
                    .collect();
                acts.sort_by_key(|a| graph.id_of(a.to));
                acts
            })
            .collect();

        Self {
            graph,
            start,
            goal,
            actions,
            weights: request.weights.normalized(),
            priority: request.weights.priority_mode(),
            source_reliability_cost: reliability_penalty(graph.node_at(start).reliability),
            config,
        }
    }

    #[inline]
    fn actions(&self, node: NodeIndex) -> &[Action] {
        &self.actions[node.index()]
    }

    fn hop_cost(&self, action: &Action) -> HopCost {
        let node = self.graph.node_at(action.to);
        let link = &action.link;

        let mut delay = link.delay_ms;
        if action.to != self.start && action.to != self.goal {
            delay += node.processing_delay_ms;
        }
        let components = CostComponents {
            delay,
            reliability: reliability_penalty(link.reliability) + reliability_penalty(node.reliability),
            resource: RESOURCE_SCALE / link.bandwidth_mbps.max(1.0),
        };

        HopCost {
            components,
            combined: components.weighted(&self.weights) * self.config.cost_booster,
        }
    }

    /// Exploration with probability `epsilon`, otherwise greedy
    fn select<R: Rng + ?Sized>(
        &self,
        table: &QTable,
        state: NodeIndex,
        epsilon: f64,
        rng: &mut R,
    ) -> Option<Action> {
        let actions = self.actions(state);
        if rng.gen::<f64>() < epsilon {
            actions.choose(rng).copied()
        } else {
            table.greedy(state, actions).copied()
        }
    }

    /// Shaped reward of taking `action` as the `step`-th move (1-based) of an
    /// episode, and whether the episode ends there
    fn step_reward(&self, step: usize, action: &Action) -> (f64, bool) {
        let config = self.config;
        let hop = self.hop_cost(action);

        let mut reward = -hop.combined;
        if step == 1 {
            reward -= self.source_reliability_cost;
        }
        reward -= config.priority_penalty * self.priority.select(&hop.components);

        if action.to == self.goal {
            (reward + config.goal_reward, true)
        } else if step >= config.max_steps {
            (reward - config.timeout_penalty, true)
        } else {
            (reward, false)
        }
    }

    /// One episode from the source; returns the accumulated reward
    fn run_episode<R: Rng + ?Sized>(&self, table: &mut QTable, epsilon: f64, rng: &mut R) -> f64 {
        let config = self.config;
        let mut current = self.start;
        let mut total_reward = 0.0;

        for step in 1..=config.max_steps {
            let Some(action) = self.select(table, current, epsilon, rng) else {
                break;
            };

            let (reward, done) = self.step_reward(step, &action);

            let future = if done {
                0.0
            } else {
                table.max_value(action.to, self.actions(action.to))
            };
            table.update(current, action.to, reward + config.gamma * future, config.alpha);

            total_reward += reward;
            current = action.to;
            if done {
                break;
            }
        }

        total_reward
    }

    fn train<R: Rng + ?Sized>(&self, rng: &mut R) -> QTable {
        let config = self.config;
        let mut table = QTable::new();
        let mut epsilon = config.epsilon;

        for (episode, eps) in config.epsilon_schedule().take(config.episodes).enumerate() {
            let reward = self.run_episode(&mut table, eps, rng);
            epsilon = eps;

            if episode % 500 == 0 {
                debug!(episode, reward, epsilon, "q-learning episode");
            }
        }

        debug!(entries = table.len(), epsilon, "q-table trained");
        table
    }

    /// Greedy walk from the source. Fails when the greedy choice is a node
    /// already on the path or the walk does not reach the goal.
    fn extract(&self, table: &QTable) -> Option<Path> {
        let mut visited = HashSet::from([self.start]);
        let mut path = vec![self.graph.id_of(self.start)];
        let mut current = self.start;

        for _ in 0..self.config.max_steps {
            if current == self.goal {
                break;
            }
            let next = table.greedy(current, self.actions(current))?.to;
            if !visited.insert(next) {
                debug!(
                    node = self.graph.id_of(next),
                    "greedy policy revisits a node, extraction stopped"
                );
                return None;
            }

            path.push(self.graph.id_of(next));
            current = next;
        }

        (current == self.goal).then_some(path)
    }
}

/// Tabular Q-learning solver
#[derive(Debug, Clone, Default)]
pub struct QLearningSolver {
    config: QLearningConfig,
}

impl QLearningSolver {
    pub fn new(config: QLearningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QLearningConfig {
        &self.config
    }

    pub fn run<R: Rng + ?Sized>(
        &self,
        graph: &mut QosGraph,
        request: &RouteRequest,
        rng: &mut R,
    ) -> Solution {
        if !request.is_routable(graph) {
            return Solution::none();
        }
        ensure_connected(graph, request.source, request.destination, rng);
        let graph: &QosGraph = graph;

        let (Some(start), Some(goal)) = (
            graph.index_of(request.source),
            graph.index_of(request.destination),
        ) else {
            return Solution::none();
        };

        let env = RoutingEnv::new(graph, start, goal, request, &self.config);
        let table = env.train(rng);

        let Some(path) = env.extract(&table) else {
            info!(
                source = request.source,
                dest = request.destination,
                demand = request.demand,
                "greedy policy did not reach the destination"
            );
            return Solution::none();
        };

        match path_metrics(graph, &path) {
            Some(metrics) => {
                let cost = total_cost(&metrics, &request.weights);
                info!(
                    episodes = self.config.episodes,
                    cost,
                    hops = metrics.hop_count,
                    priority = ?env.priority,
                    "q-learning finished"
                );
                Solution::found(path, cost)
            }
            None => Solution::none(),
        }
    }
}

impl RouteSolver for QLearningSolver {
    fn name(&self) -> &'static str {
        "Q-Learning"
    }

    fn solve(&self, graph: &mut QosGraph, request: &RouteRequest, rng: &mut dyn RngCore) -> Solution {
        self.run(graph, request, rng)
    }
}

/// Run the Q-learning solver once
pub fn run_qlearning<R: Rng + ?Sized>(
    graph: &mut QosGraph,
    request: &RouteRequest,
    config: &QLearningConfig,
    rng: &mut R,
) -> Solution {
    QLearningSolver::new(config.clone()).run(graph, request, rng)
}
