use ingest::{Corpus, EntityType};
use network::{CentralityReport, CommunityDetection, Connection};
use serde::{Deserialize, Serialize};
use signals::ExternalSignals;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::info;

use crate::config::EnsembleWeights;

/// Aggregated risk profile of one entity for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRiskRecord {
    pub entity_name: String,
    pub entity_type: EntityType,
    pub is_confirmed_fraud: bool,
    pub degree_centrality: f64,
    pub betweenness_centrality: f64,
    pub eigenvector_centrality: f64,
    pub social_network_score: f64,
    pub max_external_fraud_score: f64,
    pub avg_external_fraud_score: f64,
    /// `avg × ln(1 + claims)`, uncapped.
    pub composite_external_score: f64,
    pub connected_claims_count: usize,
    pub total_exposure: f64,
    pub ensemble_score: f64,
    pub community_ids: Vec<usize>,
}

impl EntityRiskRecord {
    /// Composite score as it enters the ensemble, capped at 1.
    pub fn capped_composite(&self) -> f64 {
        self.composite_external_score.min(1.0)
    }
}

/// A [`Connection`] joined with the external scores of its shared claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedConnection {
    pub source: String,
    pub target: String,
    pub strength: u32,
    pub shared_claims: Vec<String>,
    pub max_shared_claim_fraud_score: f64,
    pub avg_shared_claim_fraud_score: f64,
    pub target_is_confirmed_fraud: bool,
}

impl EnrichedConnection {
    pub fn involves(&self, entity: &str) -> bool {
        self.source == entity || self.target == entity
    }
}

/// One claim with its merged entity set (recorded ∪ extracted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub claim_number: String,
    pub total_incurred: f64,
    pub external_fraud_score: Option<f64>,
    pub entities: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_fraud_ratio(ratio: f64) -> Self {
        if ratio > 0.4 {
            RiskLevel::High
        } else if ratio > 0.2 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityStats {
    pub community_id: usize,
    pub members: Vec<String>,
    pub member_count: usize,
    pub fraud_count: usize,
    pub fraud_ratio: f64,
    pub risk_level: RiskLevel,
}

/// `100 × (w_social · social/100 + w_ext · min(composite, 1))`. Not clamped.
pub fn ensemble_score(weights: &EnsembleWeights, social_network_score: f64, composite: f64) -> f64 {
    100.0 * (weights.social * social_network_score / 100.0 + weights.external * composite.min(1.0))
}

/// `(avg, max, composite)` over the scores of an entity's claims; claims
/// without a score count as 0.
pub fn external_scores(claim_scores: &[Option<f64>]) -> (f64, f64, f64) {
    if claim_scores.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let values: Vec<f64> = claim_scores.iter().map(|s| s.unwrap_or(0.0)).collect();
    let count = values.len() as f64;
    let avg = values.iter().sum::<f64>() / count;
    let max = values.iter().copied().fold(0.0, f64::max);
    (avg, max, avg * count.ln_1p())
}

pub struct EntityAggregator<'a> {
    pub corpus: &'a Corpus,
    pub claims: &'a [ClaimRecord],
    pub centrality: &'a CentralityReport,
    pub communities: &'a CommunityDetection,
    pub weights: EnsembleWeights,
}

impl EntityAggregator<'_> {
    /// One record per corpus entity, ordered by ensemble score descending,
    /// then by name.
    pub fn aggregate(&self) -> Vec<EntityRiskRecord> {
        let mut claims_of: HashMap<&str, Vec<&ClaimRecord>> = HashMap::new();
        for claim in self.claims {
            for entity in &claim.entities {
                claims_of.entry(entity.as_str()).or_default().push(claim);
            }
        }
        let mut communities_of: HashMap<&str, Vec<usize>> = HashMap::new();
        for membership in &self.communities.memberships {
            communities_of
                .entry(membership.entity.as_str())
                .or_default()
                .push(membership.community_id);
        }

        let mut records: Vec<EntityRiskRecord> = self
            .corpus
            .entities
            .iter()
            .map(|entity| {
                let claims = claims_of.get(entity.name.as_str()).map(Vec::as_slice).unwrap_or_default();
                let scores: Vec<Option<f64>> = claims.iter().map(|c| c.external_fraud_score).collect();
                let (avg, max, composite) = external_scores(&scores);
                let centrality = self.centrality.get(&entity.name);
                let mut community_ids = communities_of.get(entity.name.as_str()).cloned().unwrap_or_default();
                community_ids.sort_unstable();

                EntityRiskRecord {
                    entity_name: entity.name.clone(),
                    entity_type: entity.entity_type,
                    is_confirmed_fraud: entity.confirmed_fraud,
                    degree_centrality: centrality.degree,
                    betweenness_centrality: centrality.betweenness,
                    eigenvector_centrality: centrality.eigenvector,
                    social_network_score: centrality.social_network_score,
                    max_external_fraud_score: max,
                    avg_external_fraud_score: avg,
                    composite_external_score: composite,
                    connected_claims_count: claims.len(),
                    total_exposure: claims.iter().map(|c| c.total_incurred).sum(),
                    ensemble_score: ensemble_score(&self.weights, centrality.social_network_score, composite),
                    community_ids,
                }
            })
            .collect();

        records.sort_by(|a, b| {
            b.ensemble_score
                .total_cmp(&a.ensemble_score)
                .then_with(|| a.entity_name.cmp(&b.entity_name))
        });

        info!(entities = records.len(), "Aggregated entity risk records");
        records
    }
}

/// Attach shared-claim external scores and the fraud flag of the target.
pub fn enrich_connections(
    connections: Vec<Connection>,
    scores: &ExternalSignals,
    corpus: &Corpus,
) -> Vec<EnrichedConnection> {
    let fraud: BTreeSet<&str> = corpus
        .entities
        .iter()
        .filter(|e| e.confirmed_fraud)
        .map(|e| e.name.as_str())
        .collect();

    connections
        .into_iter()
        .map(|c| {
            let shared: Vec<Option<f64>> = c.shared_claims.iter().map(|n| scores.score(n)).collect();
            let (avg, max, _) = external_scores(&shared);
            EnrichedConnection {
                target_is_confirmed_fraud: fraud.contains(c.target.as_str()),
                max_shared_claim_fraud_score: max,
                avg_shared_claim_fraud_score: avg,
                source: c.source,
                target: c.target,
                strength: c.strength,
                shared_claims: c.shared_claims,
            }
        })
        .collect()
}

pub fn community_stats(detection: &CommunityDetection, corpus: &Corpus) -> Vec<CommunityStats> {
    let fraud: BTreeMap<&str, bool> = corpus
        .entities
        .iter()
        .map(|e| (e.name.as_str(), e.confirmed_fraud))
        .collect();

    detection
        .communities
        .iter()
        .map(|community| {
            let member_count = community.members.len();
            let fraud_count = community
                .members
                .iter()
                .filter(|m| fraud.get(m.as_str()).copied().unwrap_or(false))
                .count();
            let fraud_ratio = if member_count == 0 {
                0.0
            } else {
                fraud_count as f64 / member_count as f64
            };
            CommunityStats {
                community_id: community.id,
                members: community.members.iter().cloned().collect(),
                member_count,
                fraud_count,
                fraud_ratio,
                risk_level: RiskLevel::from_fraud_ratio(fraud_ratio),
            }
        })
        .collect()
}
