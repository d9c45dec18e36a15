use ingest::EntityType;
use serde::{Deserialize, Serialize};
use signals::Priority;
use std::collections::{BTreeMap, HashMap};

use crate::aggregate::{CommunityStats, EnrichedConnection, EntityRiskRecord};
use crate::error::{EngineError, Result};
use crate::pipeline::Snapshot;
use crate::status::InvestigationStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    EnsembleScore,
    TotalExposure,
    ConnectedClaimsCount,
}

impl SortKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ensemble_score" => Some(SortKey::EnsembleScore),
            "total_exposure" => Some(SortKey::TotalExposure),
            "connected_claims_count" => Some(SortKey::ConnectedClaimsCount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RankingQuery {
    pub sort_by: SortKey,
    pub status: Option<InvestigationStatus>,
    pub min_risk_score: Option<f64>,
    pub entity_type: Option<EntityType>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    /// 1-based position after filtering and sorting.
    pub priority_rank: usize,
    #[serde(flatten)]
    pub record: EntityRiskRecord,
    pub investigation_status: InvestigationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityClaimRow {
    pub claim_number: String,
    pub external_fraud_score: f64,
    pub total_incurred: f64,
    pub other_entities_on_claim: Vec<String>,
}

/// A rule fired on one or more of an entity's claims.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRuleRow {
    pub rule_no: u32,
    pub rule_desc: String,
    pub priority: Priority,
    pub value: f64,
    pub claim_numbers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDetail {
    pub entity: EntityRiskRecord,
    pub investigation_status: InvestigationStatus,
    pub connections: Vec<EnrichedConnection>,
    pub claims: Vec<EntityClaimRow>,
    pub fraud_rules: Vec<EntityRuleRow>,
    pub communities: Vec<CommunityStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkNode {
    pub id: String,
    pub entity_type: EntityType,
    pub is_confirmed_fraud: bool,
    pub communities: Vec<usize>,
    pub risk_score: f64,
    pub total_exposure: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkEdge {
    pub source: String,
    pub target: String,
    pub strength: u32,
    pub shared_claims: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkExport {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
}

impl Snapshot {
    /// Ranked entity table joined with current investigation statuses;
    /// entities without history are `Not Reviewed`.
    pub fn ranking(
        &self,
        query: &RankingQuery,
        statuses: &HashMap<String, InvestigationStatus>,
    ) -> Vec<RankingRow> {
        let mut rows: Vec<RankingRow> = self
            .entities
            .iter()
            .map(|record| RankingRow {
                priority_rank: 0,
                investigation_status: statuses.get(&record.entity_name).copied().unwrap_or_default(),
                record: record.clone(),
            })
            .filter(|row| query.status.is_none_or(|s| row.investigation_status == s))
            .filter(|row| query.min_risk_score.is_none_or(|min| row.record.ensemble_score >= min))
            .filter(|row| query.entity_type.is_none_or(|t| row.record.entity_type == t))
            .collect();

        rows.sort_by(|a, b| {
            let (a, b) = (&a.record, &b.record);
            let primary = match query.sort_by {
                SortKey::EnsembleScore => b.ensemble_score.total_cmp(&a.ensemble_score),
                SortKey::TotalExposure => b.total_exposure.total_cmp(&a.total_exposure),
                SortKey::ConnectedClaimsCount => b.connected_claims_count.cmp(&a.connected_claims_count),
            };
            primary.then_with(|| a.entity_name.cmp(&b.entity_name))
        });
        for (i, row) in rows.iter_mut().enumerate() {
            row.priority_rank = i + 1;
        }
        rows
    }

    pub fn entity_detail(&self, name: &str, status: Option<InvestigationStatus>) -> Result<EntityDetail> {
        let entity = self
            .entity(name)
            .ok_or_else(|| EngineError::EntityNotFound(name.to_string()))?
            .clone();

        let connections = self
            .connections
            .iter()
            .filter(|c| c.involves(name))
            .cloned()
            .collect();

        let entity_claims: Vec<_> = self.claims.iter().filter(|c| c.entities.contains(name)).collect();
        let claims = entity_claims
            .iter()
            .map(|c| EntityClaimRow {
                claim_number: c.claim_number.clone(),
                external_fraud_score: c.external_fraud_score.unwrap_or(0.0),
                total_incurred: c.total_incurred,
                other_entities_on_claim: c.entities.iter().filter(|e| e.as_str() != name).cloned().collect(),
            })
            .collect();

        let mut by_rule: BTreeMap<u32, EntityRuleRow> = BTreeMap::new();
        for claim in &entity_claims {
            for rule in self.rules.iter().filter(|r| r.claim_number == claim.claim_number) {
                let row = by_rule.entry(rule.rule_no).or_insert_with(|| EntityRuleRow {
                    rule_no: rule.rule_no,
                    rule_desc: rule.rule_desc.clone(),
                    priority: rule.priority,
                    value: rule.value,
                    claim_numbers: Vec::new(),
                });
                if !row.claim_numbers.contains(&rule.claim_number) {
                    row.claim_numbers.push(rule.claim_number.clone());
                }
            }
        }

        let communities = self
            .communities
            .iter()
            .filter(|c| entity.community_ids.contains(&c.community_id))
            .cloned()
            .collect();

        Ok(EntityDetail {
            entity,
            investigation_status: status.unwrap_or_default(),
            connections,
            claims,
            fraud_rules: by_rule.into_values().collect(),
            communities,
        })
    }

    pub fn community_table(&self) -> &[CommunityStats] {
        &self.communities
    }

    pub fn network(&self) -> NetworkExport {
        let mut nodes: Vec<NetworkNode> = self
            .entities
            .iter()
            .map(|e| NetworkNode {
                id: e.entity_name.clone(),
                entity_type: e.entity_type,
                is_confirmed_fraud: e.is_confirmed_fraud,
                communities: e.community_ids.clone(),
                risk_score: e.ensemble_score,
                total_exposure: e.total_exposure,
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let edges = self
            .connections
            .iter()
            .map(|c| NetworkEdge {
                source: c.source.clone(),
                target: c.target.clone(),
                strength: c.strength,
                shared_claims: c.shared_claims.clone(),
            })
            .collect();

        NetworkExport { nodes, edges }
    }
}
