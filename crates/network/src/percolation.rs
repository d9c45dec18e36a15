use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{info, warn};

use crate::graph::CoOccurrenceGraph;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliqueConfig {
    /// Minimum clique size; two cliques percolate when they share `k - 1` entities.
    pub k: usize,
    /// Upper bound on maximal cliques enumerated per run. Reaching it stops
    /// enumeration and marks the detection as truncated.
    pub max_cliques: usize,
}

impl Default for CliqueConfig {
    fn default() -> Self {
        Self {
            k: 3,
            max_cliques: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub id: usize,
    pub members: BTreeSet<String>,
}

/// One row of the entity <-> community join table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Membership {
    pub entity: String,
    pub community_id: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunityDetection {
    pub communities: Vec<Community>,
    pub memberships: Vec<Membership>,
    pub cliques_found: usize,
    /// The clique cap was reached; communities cover only the cliques found so far.
    pub truncated: bool,
}

impl CommunityDetection {
    pub fn communities_of(&self, entity: &str) -> Vec<usize> {
        self.memberships
            .iter()
            .filter(|m| m.entity == entity)
            .map(|m| m.community_id)
            .collect()
    }

    pub fn community(&self, id: usize) -> Option<&Community> {
        self.communities.iter().find(|c| c.id == id)
    }
}

/// Overlapping community detection by k-clique percolation.
pub struct CliquePercolation {
    config: CliqueConfig,
}

impl CliquePercolation {
    pub fn new(config: CliqueConfig) -> Self {
        Self { config }
    }

    /// Communities are numbered in discovery order: components by their
    /// smallest node, then by the first clique of each percolation cluster.
    pub fn detect(&self, graph: &CoOccurrenceGraph) -> CommunityDetection {
        let k = self.config.k.max(2);
        let adjacency: Vec<BTreeSet<usize>> = graph
            .adjacency()
            .into_iter()
            .map(|neighbors| neighbors.into_iter().map(|(n, _)| n).collect())
            .collect();

        let mut detection = CommunityDetection::default();
        let mut budget = self.config.max_cliques;

        for component in graph.components() {
            if component.len() < k {
                continue;
            }

            let mut enumerator = CliqueEnumerator {
                adjacency: &adjacency,
                k,
                budget,
                cliques: Vec::new(),
                truncated: false,
            };
            enumerator.run(&component);
            budget -= enumerator.cliques.len();
            detection.cliques_found += enumerator.cliques.len();

            for members in percolate(&enumerator.cliques, k) {
                let id = detection.communities.len();
                let members: BTreeSet<String> = members
                    .into_iter()
                    .map(|idx| graph.entity_name(idx).to_string())
                    .collect();
                detection.memberships.extend(members.iter().map(|entity| Membership {
                    entity: entity.clone(),
                    community_id: id,
                }));
                detection.communities.push(Community { id, members });
            }

            if enumerator.truncated {
                warn!(
                    max_cliques = self.config.max_cliques,
                    "Clique enumeration cap reached, community detection is partial"
                );
                detection.truncated = true;
                break;
            }
        }

        info!(
            k,
            cliques = detection.cliques_found,
            communities = detection.communities.len(),
            memberships = detection.memberships.len(),
            "Detected overlapping communities"
        );
        detection
    }
}

/// Bron-Kerbosch with Tomita pivoting, restricted to cliques of size >= k.
struct CliqueEnumerator<'a> {
    adjacency: &'a [BTreeSet<usize>],
    k: usize,
    budget: usize,
    cliques: Vec<Vec<usize>>,
    truncated: bool,
}

impl CliqueEnumerator<'_> {
    fn run(&mut self, component: &[usize]) {
        let candidates: BTreeSet<usize> = component.iter().copied().collect();
        self.expand(&mut Vec::new(), candidates, BTreeSet::new());
    }

    fn expand(&mut self, clique: &mut Vec<usize>, mut candidates: BTreeSet<usize>, mut excluded: BTreeSet<usize>) {
        if self.truncated {
            return;
        }
        if candidates.is_empty() {
            if excluded.is_empty() && clique.len() >= self.k {
                if self.cliques.len() >= self.budget {
                    self.truncated = true;
                    return;
                }
                let mut found = clique.clone();
                found.sort_unstable();
                self.cliques.push(found);
            }
            return;
        }
        if clique.len() + candidates.len() < self.k {
            return;
        }

        let pivot = candidates
            .iter()
            .chain(excluded.iter())
            .copied()
            .max_by_key(|&u| {
                let shared = candidates.intersection(&self.adjacency[u]).count();
                // ties go to the smallest index
                (shared, std::cmp::Reverse(u))
            });
        let branch: Vec<usize> = match pivot {
            Some(u) => candidates.difference(&self.adjacency[u]).copied().collect(),
            None => candidates.iter().copied().collect(),
        };

        for v in branch {
            let neighbors = &self.adjacency[v];
            let next_candidates = candidates.intersection(neighbors).copied().collect();
            let next_excluded = excluded.intersection(neighbors).copied().collect();

            clique.push(v);
            self.expand(clique, next_candidates, next_excluded);
            clique.pop();

            candidates.remove(&v);
            excluded.insert(v);
            if self.truncated {
                return;
            }
        }
    }
}

/// Union cliques sharing at least `k - 1` members; returns each cluster's
/// member set, ordered by the cluster's first clique.
fn percolate(cliques: &[Vec<usize>], k: usize) -> Vec<BTreeSet<usize>> {
    let mut sets = UnionFind::new(cliques.len());
    let mut cliques_of: HashMap<usize, Vec<usize>> = HashMap::new();
    for (ci, clique) in cliques.iter().enumerate() {
        for &node in clique {
            cliques_of.entry(node).or_default().push(ci);
        }
    }

    for (ci, clique) in cliques.iter().enumerate() {
        let mut shared: BTreeMap<usize, usize> = BTreeMap::new();
        for node in clique {
            for &other in &cliques_of[node] {
                if other > ci {
                    *shared.entry(other).or_default() += 1;
                }
            }
        }
        for (other, count) in shared {
            if count + 1 >= k {
                sets.union(ci, other);
            }
        }
    }

    let mut clusters: Vec<(usize, BTreeSet<usize>)> = Vec::new();
    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    for (ci, clique) in cliques.iter().enumerate() {
        let root = sets.find(ci);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            clusters.push((ci, BTreeSet::new()));
            clusters.len() - 1
        });
        clusters[slot].1.extend(clique.iter().copied());
    }

    clusters.into_iter().map(|(_, members)| members).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

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

    fn member_sets(detection: &CommunityDetection) -> BTreeSet<BTreeSet<String>> {
        detection.communities.iter().map(|c| c.members.clone()).collect()
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Reference: every k-subset that is a clique, joined when two share k-1 nodes.
    fn brute_force(graph: &CoOccurrenceGraph, k: usize) -> BTreeSet<BTreeSet<String>> {
        let n = graph.node_count();
        let adjacency: Vec<BTreeSet<usize>> = graph
            .adjacency()
            .into_iter()
            .map(|ns| ns.into_iter().map(|(x, _)| x).collect())
            .collect();

        fn subsets(n: usize, k: usize, start: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
            if current.len() == k {
                out.push(current.clone());
                return;
            }
            for i in start..n {
                current.push(i);
                subsets(n, k, i + 1, current, out);
                current.pop();
            }
        }
        let mut all = Vec::new();
        subsets(n, k, 0, &mut Vec::new(), &mut all);
        let k_cliques: Vec<Vec<usize>> = all
            .into_iter()
            .filter(|s| {
                s.iter()
                    .enumerate()
                    .all(|(i, a)| s[i + 1..].iter().all(|b| adjacency[*a].contains(b)))
            })
            .collect();

        let mut label: Vec<usize> = (0..k_cliques.len()).collect();
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..k_cliques.len() {
                for j in 0..k_cliques.len() {
                    let shared = k_cliques[i].iter().filter(|x| k_cliques[j].contains(x)).count();
                    if shared + 1 >= k && label[j] > label[i] {
                        label[j] = label[i];
                        changed = true;
                    }
                }
            }
        }

        let mut groups: Map<usize, BTreeSet<String>> = Map::new();
        for (i, clique) in k_cliques.iter().enumerate() {
            groups
                .entry(label[i])
                .or_default()
                .extend(clique.iter().map(|&x| graph.entity_name(x).to_string()));
        }
        groups.into_values().collect()
    }

    #[test]
    fn test_overlapping_triangles_merge() {
        // ABC and BCD share B,C; EFG is separate; G-H is a bare edge
        let graph = graph_from(
            &["A", "B", "C", "D", "E", "F", "G", "H"],
            &[
                ("A", "B"), ("A", "C"), ("B", "C"), ("B", "D"), ("C", "D"),
                ("E", "F"), ("E", "G"), ("F", "G"), ("G", "H"),
            ],
        );
        let detection = CliquePercolation::new(CliqueConfig::default()).detect(&graph);

        let expected: BTreeSet<_> = [names(&["A", "B", "C", "D"]), names(&["E", "F", "G"])].into_iter().collect();
        assert_eq!(member_sets(&detection), expected);
        assert_eq!(member_sets(&detection), brute_force(&graph, 3));
        assert!(detection.communities_of("H").is_empty());
        assert!(!detection.truncated);
    }

    #[test]
    fn test_entity_in_two_communities() {
        // triangles ABC and CDE share only C: two communities, C in both
        let graph = graph_from(
            &["A", "B", "C", "D", "E"],
            &[("A", "B"), ("A", "C"), ("B", "C"), ("C", "D"), ("C", "E"), ("D", "E")],
        );
        let detection = CliquePercolation::new(CliqueConfig::default()).detect(&graph);

        assert_eq!(detection.communities.len(), 2);
        assert_eq!(detection.communities_of("C"), vec![0, 1]);
        assert_eq!(detection.communities_of("A"), vec![0]);
        assert_eq!(member_sets(&detection), brute_force(&graph, 3));
    }

    #[test]
    fn test_matches_brute_force_on_dense_graph() {
        let nodes = ["A", "B", "C", "D", "E", "F", "G"];
        let edges = [
            ("A", "B"), ("A", "C"), ("A", "D"), ("B", "C"), ("B", "D"), ("C", "D"),
            ("D", "E"), ("E", "F"), ("D", "F"), ("F", "G"), ("E", "G"), ("C", "E"),
        ];
        let graph = graph_from(&nodes, &edges);
        for k in [3, 4] {
            let detection = CliquePercolation::new(CliqueConfig { k, max_cliques: 1000 }).detect(&graph);
            assert_eq!(member_sets(&detection), brute_force(&graph, k), "k = {}", k);
            for community in &detection.communities {
                assert!(community.members.len() >= k);
            }
        }
    }

    #[test]
    fn test_no_cliques_no_communities() {
        let graph = graph_from(&["A", "B", "C", "D"], &[("A", "B"), ("B", "C"), ("C", "D")]);
        let detection = CliquePercolation::new(CliqueConfig::default()).detect(&graph);
        assert!(detection.communities.is_empty());
        assert!(detection.memberships.is_empty());
    }

    #[test]
    fn test_clique_cap_is_reported() {
        let graph = graph_from(
            &["A", "B", "C", "D", "E", "F"],
            &[("A", "B"), ("A", "C"), ("B", "C"), ("D", "E"), ("D", "F"), ("E", "F")],
        );
        let detection = CliquePercolation::new(CliqueConfig { k: 3, max_cliques: 1 }).detect(&graph);
        assert!(detection.truncated);
        assert_eq!(detection.cliques_found, 1);
        assert_eq!(detection.communities.len(), 1);
    }

    #[test]
    fn test_larger_maximal_clique_counts_once() {
        let graph = graph_from(
            &["A", "B", "C", "D"],
            &[("A", "B"), ("A", "C"), ("A", "D"), ("B", "C"), ("B", "D"), ("C", "D")],
        );
        let detection = CliquePercolation::new(CliqueConfig::default()).detect(&graph);
        assert_eq!(detection.cliques_found, 1);
        assert_eq!(member_sets(&detection), brute_force(&graph, 3));
    }
}
