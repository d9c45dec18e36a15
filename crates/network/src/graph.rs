use extract::ClaimMentions;
use ingest::Corpus;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{info, warn};

/// Per-edge payload: how many distinct claims the pair shares, and which.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeData {
    pub weight: u32,
    pub shared_claims: BTreeSet<String>,
}

/// One undirected entity pair, canonicalized so `source < target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source: String,
    pub target: String,
    pub strength: u32,
    pub shared_claims: Vec<String>,
}

impl Connection {
    pub fn involves(&self, entity: &str) -> bool {
        self.source == entity || self.target == entity
    }

    pub fn other(&self, entity: &str) -> Option<&str> {
        if self.source == entity {
            Some(&self.target)
        } else if self.target == entity {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Merge each claim's recorded entities with the entities extracted from its notes.
pub fn merge_claim_entities(
    corpus: &Corpus,
    mentions: &[ClaimMentions],
) -> BTreeMap<String, BTreeSet<String>> {
    let mut merged: BTreeMap<String, BTreeSet<String>> = corpus
        .claims
        .iter()
        .map(|c| (c.claim_number.clone(), c.entities.clone()))
        .collect();

    for extracted in mentions {
        merged
            .entry(extracted.claim_number.clone())
            .or_default()
            .extend(extracted.mentioned.iter().cloned());
    }

    merged
}

/// Undirected weighted co-occurrence graph over the entity roster.
/// Every roster entity is a node, including entities on no claim.
#[derive(Debug, Clone)]
pub struct CoOccurrenceGraph {
    graph: UnGraph<String, EdgeData>,
    entity_to_idx: HashMap<String, NodeIndex>,
}

impl CoOccurrenceGraph {
    pub fn new() -> Self {
        Self {
            graph: UnGraph::new_undirected(),
            entity_to_idx: HashMap::new(),
        }
    }

    /// Build from the roster and per-claim entity sets.
    pub fn build<'a, E>(entities: E, claims: &BTreeMap<String, BTreeSet<String>>) -> Self
    where
        E: IntoIterator<Item = &'a str>,
    {
        let mut graph = Self::new();
        for entity in entities {
            graph.add_entity(entity);
        }
        for (claim_number, on_claim) in claims {
            graph.record_claim(claim_number, on_claim);
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            claims = claims.len(),
            "Built co-occurrence graph"
        );
        graph
    }

    pub fn add_entity(&mut self, entity: &str) -> NodeIndex {
        if let Some(&idx) = self.entity_to_idx.get(entity) {
            return idx;
        }

        let idx = self.graph.add_node(entity.to_string());
        self.entity_to_idx.insert(entity.to_string(), idx);
        idx
    }

    /// Add one claim's co-occurrences. Every unordered pair of distinct
    /// entities gains at most one unit of weight per claim number, however
    /// often the claim is recorded. Returns the number of pairs that changed.
    pub fn record_claim(&mut self, claim_number: &str, entities: &BTreeSet<String>) -> usize {
        let mut known = Vec::with_capacity(entities.len());
        for name in entities {
            match self.entity_to_idx.get(name) {
                Some(&idx) => known.push(idx),
                None => warn!(
                    claim = claim_number,
                    entity = %name,
                    "Entity on claim is not in the roster, ignoring"
                ),
            }
        }

        let mut changed = 0;
        for (i, &a) in known.iter().enumerate() {
            for &b in &known[i + 1..] {
                if a == b {
                    continue;
                }
                match self.graph.find_edge(a, b) {
                    Some(edge) => {
                        let data = &mut self.graph[edge];
                        if data.shared_claims.insert(claim_number.to_string()) {
                            data.weight += 1;
                            changed += 1;
                        }
                    }
                    None => {
                        let mut shared_claims = BTreeSet::new();
                        shared_claims.insert(claim_number.to_string());
                        self.graph.add_edge(
                            a,
                            b,
                            EdgeData {
                                weight: 1,
                                shared_claims,
                            },
                        );
                        changed += 1;
                    }
                }
            }
        }
        changed
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Entity names in node index order.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.graph
            .node_indices()
            .map(move |idx| self.graph[idx].as_str())
    }

    pub fn entity_name(&self, idx: usize) -> &str {
        &self.graph[NodeIndex::new(idx)]
    }

    pub fn neighbors(&self, entity: &str) -> Vec<&str> {
        let Some(&idx) = self.entity_to_idx.get(entity) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .neighbors(idx)
            .map(|n| self.graph[n].as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn connection(&self, a: &str, b: &str) -> Option<Connection> {
        let ia = *self.entity_to_idx.get(a)?;
        let ib = *self.entity_to_idx.get(b)?;
        let edge = self.graph.find_edge(ia, ib)?;
        Some(self.to_connection(ia, ib, &self.graph[edge]))
    }

    /// All connections, one per unordered pair, sorted by (source, target).
    pub fn connections(&self) -> Vec<Connection> {
        let mut connections: Vec<Connection> = self
            .graph
            .edge_references()
            .filter(|e| e.source() != e.target())
            .map(|e| self.to_connection(e.source(), e.target(), e.weight()))
            .collect();
        connections.sort_by(|x, y| (&x.source, &x.target).cmp(&(&y.source, &y.target)));
        connections
    }

    fn to_connection(&self, a: NodeIndex, b: NodeIndex, data: &EdgeData) -> Connection {
        let (source, target) = {
            let (na, nb) = (&self.graph[a], &self.graph[b]);
            if na <= nb { (na, nb) } else { (nb, na) }
        };
        Connection {
            source: source.clone(),
            target: target.clone(),
            strength: data.weight,
            shared_claims: data.shared_claims.iter().cloned().collect(),
        }
    }

    /// Weighted adjacency lists by node index, neighbors ascending.
    pub fn adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        let mut adjacency = vec![Vec::new(); self.graph.node_count()];
        for edge in self.graph.edge_references() {
            let (a, b) = (edge.source().index(), edge.target().index());
            if a == b {
                continue;
            }
            let weight = f64::from(edge.weight().weight);
            adjacency[a].push((b, weight));
            adjacency[b].push((a, weight));
        }
        for neighbors in &mut adjacency {
            neighbors.sort_by_key(|&(n, _)| n);
        }
        adjacency
    }

    /// Connected components as ascending node index lists, ordered by their
    /// smallest node.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let n = self.graph.node_count();
        let mut sets = UnionFind::new(n);
        for edge in self.graph.edge_references() {
            sets.union(edge.source().index(), edge.target().index());
        }

        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for node in 0..n {
            by_root.entry(sets.find(node)).or_default().push(node);
        }

        let mut components: Vec<Vec<usize>> = by_root.into_values().collect();
        components.sort_by_key(|c| c[0]);
        components
    }
}

impl Default for CoOccurrenceGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest::{Claim, Entity, EntityType};

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn scenario() -> Corpus {
        Corpus::new(
            vec![
                Entity::new("Dr. A", EntityType::Doctor),
                Entity::new("Lawyer B", EntityType::Lawyer),
                Entity::new("Business C", EntityType::Business),
                Entity::new("Loner D", EntityType::Driver),
            ],
            vec![
                Claim::new("WC-2024-001", 50_000.0).with_entities(["Dr. A", "Lawyer B"]),
                Claim::new("WC-2024-002", 30_000.0).with_entities(["Dr. A", "Lawyer B", "Business C"]),
            ],
        )
    }

    #[test]
    fn test_claim_scenario_weights() {
        let corpus = scenario();
        let claims = merge_claim_entities(&corpus, &[]);
        let graph = CoOccurrenceGraph::build(corpus.entity_names(), &claims);

        let connections = graph.connections();
        assert_eq!(connections.len(), 3);

        let ab = graph.connection("Lawyer B", "Dr. A").unwrap();
        assert_eq!((ab.source.as_str(), ab.target.as_str()), ("Dr. A", "Lawyer B"));
        assert_eq!(ab.strength, 2);
        assert_eq!(ab.shared_claims, vec!["WC-2024-001", "WC-2024-002"]);

        assert_eq!(graph.connection("Dr. A", "Business C").unwrap().strength, 1);
        assert_eq!(graph.connection("Lawyer B", "Business C").unwrap().strength, 1);
        assert!(graph.neighbors("Loner D").is_empty());
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn test_no_duplicate_or_self_connections() {
        let mut graph = CoOccurrenceGraph::new();
        for name in ["A", "B", "C"] {
            graph.add_entity(name);
        }
        graph.record_claim("X-1", &set(&["A", "B", "C"]));
        graph.record_claim("X-1", &set(&["B", "A"]));
        graph.record_claim("X-2", &set(&["C", "A"]));

        let connections = graph.connections();
        let mut pairs = BTreeSet::new();
        for c in &connections {
            assert_ne!(c.source, c.target);
            assert!(c.source < c.target);
            assert!(pairs.insert((c.source.clone(), c.target.clone())));
        }
        assert_eq!(graph.connection("A", "B").unwrap().strength, 1);
        assert_eq!(graph.connection("A", "C").unwrap().strength, 2);
    }

    #[test]
    fn test_single_and_empty_claims_add_nothing() {
        let mut graph = CoOccurrenceGraph::new();
        graph.add_entity("A");
        assert_eq!(graph.record_claim("X-1", &set(&["A"])), 0);
        assert_eq!(graph.record_claim("X-2", &BTreeSet::new()), 0);
        assert_eq!(graph.record_claim("X-3", &set(&["A", "Stranger"])), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_mentions_merge_with_recorded_entities() {
        let corpus = scenario();
        let mentions = vec![ClaimMentions {
            claim_number: "WC-2024-001".to_string(),
            mentioned: set(&["Loner D", "Dr. A"]),
        }];
        let merged = merge_claim_entities(&corpus, &mentions);
        assert_eq!(merged["WC-2024-001"], set(&["Dr. A", "Lawyer B", "Loner D"]));
        assert_eq!(merged["WC-2024-002"].len(), 3);
    }

    #[test]
    fn test_components() {
        let corpus = scenario();
        let graph = CoOccurrenceGraph::build(corpus.entity_names(), &merge_claim_entities(&corpus, &[]));
        assert_eq!(graph.components(), vec![vec![0, 1, 2], vec![3]]);
    }
}
