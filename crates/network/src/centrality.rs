use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};
use tracing::{info, warn};

use crate::graph::CoOccurrenceGraph;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralityWeights {
    pub degree: f64,
    pub betweenness: f64,
    pub eigenvector: f64,
}

impl Default for CentralityWeights {
    fn default() -> Self {
        Self {
            degree: 0.4,
            betweenness: 0.3,
            eigenvector: 0.3,
        }
    }
}

impl CentralityWeights {
    pub fn sum(&self) -> f64 {
        self.degree + self.betweenness + self.eigenvector
    }
}

/// Edge length used by shortest-path measures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathMetric {
    /// Connection strength is the edge length.
    #[default]
    Strength,
    /// Every connection is one hop.
    Hops,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralityConfig {
    pub weights: CentralityWeights,
    pub path_metric: PathMetric,
    /// Power iteration cap for eigenvector centrality.
    pub max_iterations: usize,
    /// Convergence threshold, scaled by component size.
    pub tolerance: f64,
}

impl Default for CentralityConfig {
    fn default() -> Self {
        Self {
            weights: CentralityWeights::default(),
            path_metric: PathMetric::default(),
            max_iterations: 1000,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CentralityScores {
    pub degree: f64,
    pub betweenness: f64,
    pub eigenvector: f64,
    /// Weighted blend of the three measures on a 0-100 scale.
    pub social_network_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CentralityReport {
    pub scores: BTreeMap<String, CentralityScores>,
    /// Components whose eigenvector iteration did not converge and were zeroed.
    pub nonconverged_components: usize,
}

impl CentralityReport {
    pub fn get(&self, entity: &str) -> CentralityScores {
        self.scores.get(entity).copied().unwrap_or_default()
    }
}

pub struct CentralityScorer {
    config: CentralityConfig,
}

impl CentralityScorer {
    pub fn new(config: CentralityConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, graph: &CoOccurrenceGraph) -> CentralityReport {
        let adjacency = graph.adjacency();
        let degree = degree_centrality(&adjacency);
        let betweenness = betweenness_centrality(&adjacency, self.config.path_metric);
        let (eigenvector, nonconverged_components) = eigenvector_centrality(
            &adjacency,
            &graph.components(),
            self.config.max_iterations,
            self.config.tolerance,
        );

        let w = self.config.weights;
        let scores = graph
            .entities()
            .enumerate()
            .map(|(i, name)| {
                let social = 100.0
                    * (w.degree * degree[i] + w.betweenness * betweenness[i] + w.eigenvector * eigenvector[i]);
                (
                    name.to_string(),
                    CentralityScores {
                        degree: degree[i],
                        betweenness: betweenness[i],
                        eigenvector: eigenvector[i],
                        social_network_score: social,
                    },
                )
            })
            .collect();

        info!(
            entities = graph.node_count(),
            nonconverged_components, "Computed centrality scores"
        );

        CentralityReport {
            scores,
            nonconverged_components,
        }
    }
}

/// Neighbor count over `N - 1`; all zeros when `N <= 1`.
pub fn degree_centrality(adjacency: &[Vec<(usize, f64)>]) -> Vec<f64> {
    let n = adjacency.len();
    if n <= 1 {
        return vec![0.0; n];
    }
    let scale = 1.0 / (n - 1) as f64;
    adjacency.iter().map(|ns| ns.len() as f64 * scale).collect()
}

/// Brandes' algorithm, normalized by the number of node pairs not involving
/// the node itself. Shortest paths follow `metric`.
pub fn betweenness_centrality(adjacency: &[Vec<(usize, f64)>], metric: PathMetric) -> Vec<f64> {
    let n = adjacency.len();
    let mut centrality = vec![0.0; n];
    if n <= 2 {
        return centrality;
    }

    let mut paths = ShortestPaths::new(n);
    let mut delta = vec![0.0f64; n];

    for source in 0..n {
        match metric {
            PathMetric::Hops => paths.breadth_first(adjacency, source),
            PathMetric::Strength => paths.dijkstra(adjacency, source),
        }

        delta.fill(0.0);
        while let Some(w) = paths.stack.pop() {
            for &v in &paths.predecessors[w] {
                delta[v] += paths.sigma[v] / paths.sigma[w] * (1.0 + delta[w]);
            }
            if w != source {
                centrality[w] += delta[w];
            }
        }
    }

    // each unordered pair was counted from both ends
    let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
    for value in &mut centrality {
        *value *= scale;
    }
    centrality
}

/// Single-source shortest path state for Brandes, reused across sources.
/// `stack` holds nodes in non-decreasing distance order.
struct ShortestPaths {
    stack: Vec<usize>,
    predecessors: Vec<Vec<usize>>,
    sigma: Vec<f64>,
    distance: Vec<f64>,
}

impl ShortestPaths {
    fn new(n: usize) -> Self {
        Self {
            stack: Vec::with_capacity(n),
            predecessors: vec![Vec::new(); n],
            sigma: vec![0.0; n],
            distance: vec![f64::INFINITY; n],
        }
    }

    fn reset(&mut self, source: usize) {
        self.stack.clear();
        for preds in &mut self.predecessors {
            preds.clear();
        }
        self.sigma.fill(0.0);
        self.distance.fill(f64::INFINITY);
        self.sigma[source] = 1.0;
        self.distance[source] = 0.0;
    }

    fn breadth_first(&mut self, adjacency: &[Vec<(usize, f64)>], source: usize) {
        self.reset(source);
        let mut queue = VecDeque::from([source]);
        while let Some(v) = queue.pop_front() {
            self.stack.push(v);
            let next = self.distance[v] + 1.0;
            for &(w, _) in &adjacency[v] {
                if self.distance[w].is_infinite() {
                    self.distance[w] = next;
                    queue.push_back(w);
                }
                if self.distance[w] == next {
                    self.sigma[w] += self.sigma[v];
                    self.predecessors[w].push(v);
                }
            }
        }
    }

    /// Edge weights are positive claim counts, so path lengths are exact sums.
    fn dijkstra(&mut self, adjacency: &[Vec<(usize, f64)>], source: usize) {
        self.reset(source);
        let mut settled = vec![false; adjacency.len()];
        let mut heap = BinaryHeap::from([Frontier {
            distance: 0.0,
            node: source,
        }]);

        while let Some(Frontier { distance, node: v }) = heap.pop() {
            if settled[v] || distance > self.distance[v] {
                continue;
            }
            settled[v] = true;
            self.stack.push(v);

            for &(w, weight) in &adjacency[v] {
                if settled[w] {
                    continue;
                }
                let candidate = distance + weight;
                if candidate < self.distance[w] {
                    self.distance[w] = candidate;
                    self.sigma[w] = self.sigma[v];
                    self.predecessors[w].clear();
                    self.predecessors[w].push(v);
                    heap.push(Frontier {
                        distance: candidate,
                        node: w,
                    });
                } else if candidate == self.distance[w] {
                    self.sigma[w] += self.sigma[v];
                    self.predecessors[w].push(v);
                }
            }
        }
    }
}

/// Min-heap entry ordered by distance, then node index.
#[derive(Debug, PartialEq)]
struct Frontier {
    distance: f64,
    node: usize,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shifted power iteration `x <- (A + I) x` run separately on each connected
/// component, L2-normalized within the component. Isolated nodes score 0.
/// A component that does not converge within `max_iterations` is zeroed.
/// Returns the scores and the number of non-converged components.
pub fn eigenvector_centrality(
    adjacency: &[Vec<(usize, f64)>],
    components: &[Vec<usize>],
    max_iterations: usize,
    tolerance: f64,
) -> (Vec<f64>, usize) {
    let mut centrality = vec![0.0; adjacency.len()];
    let mut nonconverged = 0;

    for component in components {
        if component.len() < 2 {
            continue;
        }
        match power_iterate(adjacency, component, max_iterations, tolerance) {
            Some(values) => {
                for (&node, value) in component.iter().zip(values) {
                    centrality[node] = value;
                }
            }
            None => {
                warn!(
                    size = component.len(),
                    first = component[0],
                    max_iterations,
                    "Eigenvector centrality did not converge, scoring component as 0"
                );
                nonconverged += 1;
            }
        }
    }

    (centrality, nonconverged)
}

fn power_iterate(
    adjacency: &[Vec<(usize, f64)>],
    component: &[usize],
    max_iterations: usize,
    tolerance: f64,
) -> Option<Vec<f64>> {
    let size = component.len();
    let local: BTreeMap<usize, usize> = component.iter().enumerate().map(|(i, &node)| (node, i)).collect();
    let mut x = vec![1.0 / size as f64; size];

    for _ in 0..max_iterations {
        let last = x.clone();
        for (i, &node) in component.iter().enumerate() {
            for &(neighbor, weight) in &adjacency[node] {
                if let Some(&j) = local.get(&neighbor) {
                    x[j] += last[i] * weight;
                }
            }
        }

        let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        let norm = if norm == 0.0 { 1.0 } else { norm };
        for value in &mut x {
            *value /= norm;
        }

        let change: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if change < size as f64 * tolerance {
            return Some(x);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    const EPS: f64 = 1e-6;

    fn graph_from(nodes: &[&str], edges: &[(&str, &str)]) -> CoOccurrenceGraph {
        let mut graph = CoOccurrenceGraph::new();
        for n in nodes {
            graph.add_entity(n);
        }
        for (i, (a, b)) in edges.iter().enumerate() {
            let pair: BTreeSet<String> = [a.to_string(), b.to_string()].into_iter().collect();
            graph.record_claim(&format!("C-{}", i), &pair);
        }
        graph
    }

    fn star() -> CoOccurrenceGraph {
        graph_from(
            &["Hub", "L1", "L2", "L3", "Alone"],
            &[("Hub", "L1"), ("Hub", "L2"), ("Hub", "L3")],
        )
    }

    #[test]
    fn test_star_betweenness_and_degree() {
        let report = CentralityScorer::new(CentralityConfig::default()).score(&star());

        let hub = report.get("Hub");
        // hub sits on all 3 leaf pairs out of 6 pairs among the other 4 nodes
        assert!((hub.betweenness - 0.5).abs() < EPS);
        assert!((hub.degree - 0.75).abs() < EPS);
        for leaf in ["L1", "L2", "L3"] {
            let scores = report.get(leaf);
            assert!(scores.betweenness.abs() < EPS);
            assert!((scores.degree - 0.25).abs() < EPS);
            assert!(scores.eigenvector < hub.eigenvector);
        }
        assert_eq!(report.nonconverged_components, 0);
    }

    #[test]
    fn test_pure_star_hub_has_full_betweenness() {
        let graph = graph_from(&["Hub", "A", "B", "C"], &[("Hub", "A"), ("Hub", "B"), ("Hub", "C")]);
        for metric in [PathMetric::Strength, PathMetric::Hops] {
            let betweenness = betweenness_centrality(&graph.adjacency(), metric);
            assert!((betweenness[0] - 1.0).abs() < EPS);
            assert!(betweenness[1..].iter().all(|b| b.abs() < EPS));
        }
    }

    #[test]
    fn test_strong_connection_is_a_long_path() {
        // A and B share three claims; each shares one with C
        let mut edges = vec![("A", "B"); 3];
        edges.extend([("A", "C"), ("C", "B")]);
        let graph = graph_from(&["A", "B", "C"], &edges);
        let adjacency = graph.adjacency();

        let by_strength = betweenness_centrality(&adjacency, PathMetric::Strength);
        assert!((by_strength[2] - 1.0).abs() < EPS);
        assert!(by_strength[0].abs() < EPS);

        let by_hops = betweenness_centrality(&adjacency, PathMetric::Hops);
        assert!(by_hops.iter().all(|b| b.abs() < EPS));

        let report = CentralityScorer::new(CentralityConfig::default()).score(&graph);
        assert!((report.get("C").betweenness - 1.0).abs() < EPS);
    }

    #[test]
    fn test_equal_length_paths_share_credit() {
        // A-B strength 2 ties with A-C-B
        let graph = graph_from(&["A", "B", "C"], &[("A", "B"), ("A", "B"), ("A", "C"), ("C", "B")]);
        let betweenness = betweenness_centrality(&graph.adjacency(), PathMetric::Strength);
        assert!((betweenness[2] - 0.5).abs() < EPS);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: CentralityConfig = serde_json::from_str(r#"{"path_metric": "hops"}"#).unwrap();
        assert_eq!(config.path_metric, PathMetric::Hops);
        assert_eq!(config.max_iterations, 1000);
        assert_eq!(config.weights, CentralityWeights::default());
    }

    #[test]
    fn test_isolated_entity_scores_zero() {
        let report = CentralityScorer::new(CentralityConfig::default()).score(&star());
        assert_eq!(report.get("Alone"), CentralityScores::default());
    }

    #[test]
    fn test_tiny_graphs() {
        assert!(degree_centrality(&[]).is_empty());
        assert_eq!(degree_centrality(&[vec![]]), vec![0.0]);

        let pair = graph_from(&["A", "B"], &[("A", "B")]);
        let report = CentralityScorer::new(CentralityConfig::default()).score(&pair);
        let a = report.get("A");
        assert!((a.degree - 1.0).abs() < EPS);
        assert_eq!(a.betweenness, 0.0);
        assert!((a.eigenvector - std::f64::consts::FRAC_1_SQRT_2).abs() < EPS);
    }

    #[test]
    fn test_eigenvector_is_normalized_per_component() {
        let graph = graph_from(
            &["A", "B", "C", "X", "Y"],
            &[("A", "B"), ("B", "C"), ("A", "C"), ("X", "Y")],
        );
        let (values, nonconverged) = eigenvector_centrality(&graph.adjacency(), &graph.components(), 1000, 1e-6);
        assert_eq!(nonconverged, 0);

        let triangle: f64 = values[..3].iter().map(|v| v * v).sum();
        let pair: f64 = values[3..].iter().map(|v| v * v).sum();
        assert!((triangle - 1.0).abs() < EPS);
        assert!((pair - 1.0).abs() < EPS);
        assert!((values[0] - values[1]).abs() < EPS);
    }

    #[test]
    fn test_nonconvergence_falls_back_to_zero() {
        let graph = star();
        for max_iterations in [0, 1] {
            let config = CentralityConfig {
                max_iterations,
                ..CentralityConfig::default()
            };
            let report = CentralityScorer::new(config).score(&graph);
            assert_eq!(report.nonconverged_components, 1);
            assert!(report.scores.values().all(|s| s.eigenvector == 0.0));
            // the other measures are unaffected
            assert!((report.get("Hub").degree - 0.75).abs() < EPS);
        }
    }

    #[test]
    fn test_social_score_weights() {
        let config = CentralityConfig {
            weights: CentralityWeights {
                degree: 1.0,
                betweenness: 0.0,
                eigenvector: 0.0,
            },
            ..CentralityConfig::default()
        };
        let report = CentralityScorer::new(config).score(&star());
        assert!((report.get("Hub").social_network_score - 75.0).abs() < EPS);
        assert_eq!(report.get("Alone").social_network_score, 0.0);
    }

    #[test]
    fn test_scores_are_deterministic() {
        let graph = graph_from(
            &["A", "B", "C", "D", "E"],
            &[("A", "B"), ("B", "C"), ("C", "D"), ("D", "E"), ("A", "C"), ("B", "D")],
        );
        let scorer = CentralityScorer::new(CentralityConfig::default());
        let first = scorer.score(&graph);
        let second = scorer.score(&graph);
        for (name, a) in &first.scores {
            let b = second.get(name);
            assert!((a.eigenvector - b.eigenvector).abs() < EPS);
            assert!((a.betweenness - b.betweenness).abs() < EPS);
            assert!(a.social_network_score >= 0.0 && a.social_network_score <= 100.0 + EPS);
        }
    }
}
