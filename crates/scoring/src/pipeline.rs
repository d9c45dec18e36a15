use chrono::{DateTime, Utc};
use extract::MentionExtractor;
use ingest::{Corpus, LoadedCorpus, SkippedRecord};
use network::{
    merge_claim_entities, CentralityReport, CentralityScorer, CliquePercolation, CoOccurrenceGraph,
    CommunityDetection, Membership,
};
use serde::{Deserialize, Serialize};
use signals::{ExternalSignals, RuleTrigger, SignalProvenance};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::aggregate::{
    community_stats, enrich_connections, ClaimRecord, CommunityStats, EnrichedConnection, EntityAggregator,
    EntityRiskRecord,
};
use crate::config::PipelineConfig;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub corpus_fingerprint: String,
    pub mention_strategy: String,
    pub signals: SignalProvenance,
    /// Clique enumeration hit `max_cliques`.
    pub cliques_truncated: bool,
    pub nonconverged_components: usize,
    pub skipped_records: usize,
    pub entity_count: usize,
    pub claim_count: usize,
    pub connection_count: usize,
    pub community_count: usize,
}

/// Immutable output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: RunMetadata,
    /// Ordered by ensemble score descending.
    pub entities: Vec<EntityRiskRecord>,
    pub connections: Vec<EnrichedConnection>,
    pub communities: Vec<CommunityStats>,
    pub memberships: Vec<Membership>,
    pub claims: Vec<ClaimRecord>,
    pub rules: Vec<RuleTrigger>,
    pub skipped: Vec<SkippedRecord>,
    #[serde(skip)]
    position: HashMap<String, usize>,
}

impl Snapshot {
    pub fn entity(&self, name: &str) -> Option<&EntityRiskRecord> {
        if self.position.is_empty() {
            return self.entities.iter().find(|e| e.entity_name == name);
        }
        self.position.get(name).map(|&i| &self.entities[i])
    }
}

/// Graph stage output, before external signals are joined in.
pub struct NetworkAnalysis {
    started: Instant,
    corpus: Corpus,
    skipped: Vec<SkippedRecord>,
    mention_strategy: String,
    claim_entities: BTreeMap<String, BTreeSet<String>>,
    graph: CoOccurrenceGraph,
    detection: CommunityDetection,
    centrality: CentralityReport,
}

impl NetworkAnalysis {
    /// Claim number -> whether a confirmed-fraud entity is on the claim.
    pub fn claim_fraud_flags(&self) -> BTreeMap<String, bool> {
        let fraud: BTreeSet<&str> = self
            .corpus
            .entities
            .iter()
            .filter(|e| e.confirmed_fraud)
            .map(|e| e.name.as_str())
            .collect();
        self.claim_entities
            .iter()
            .map(|(claim, entities)| (claim.clone(), entities.iter().any(|e| fraud.contains(e.as_str()))))
            .collect()
    }

    pub fn graph(&self) -> &CoOccurrenceGraph {
        &self.graph
    }

    pub fn detection(&self) -> &CommunityDetection {
        &self.detection
    }

    pub fn centrality(&self) -> &CentralityReport {
        &self.centrality
    }
}

/// Deterministic batch computation from corpus and signals to a [`Snapshot`].
///
/// Split in two so external signals, whose simulation depends on the merged
/// claim entities, can be loaded between the stages.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extraction, graph construction, community detection and centrality.
    pub fn analyze(&self, loaded: LoadedCorpus) -> Result<NetworkAnalysis> {
        let started = Instant::now();
        let LoadedCorpus { corpus, skipped } = loaded;
        if corpus.entities.is_empty() || corpus.claims.is_empty() {
            return Err(EngineError::CorpusMissing(format!(
                "corpus has {} entities and {} claims",
                corpus.entities.len(),
                corpus.claims.len()
            )));
        }

        let extractor = MentionExtractor::for_corpus(&corpus);
        let mentions = extractor.extract_corpus(&corpus);
        let claim_entities = merge_claim_entities(&corpus, &mentions);

        let graph = CoOccurrenceGraph::build(corpus.entity_names(), &claim_entities);
        let detection = CliquePercolation::new(self.config.clique.clone()).detect(&graph);
        let centrality = CentralityScorer::new(self.config.centrality.clone()).score(&graph);

        Ok(NetworkAnalysis {
            started,
            mention_strategy: extractor.strategy_name().to_string(),
            corpus,
            skipped,
            claim_entities,
            graph,
            detection,
            centrality,
        })
    }

    /// Join signals, aggregate entities and assemble the snapshot.
    pub fn score(&self, analysis: NetworkAnalysis, signals: ExternalSignals) -> Snapshot {
        let NetworkAnalysis {
            started,
            corpus,
            skipped,
            mention_strategy,
            claim_entities,
            graph,
            detection,
            centrality,
        } = analysis;

        let claims: Vec<ClaimRecord> = corpus
            .claims
            .iter()
            .map(|claim| ClaimRecord {
                claim_number: claim.claim_number.clone(),
                total_incurred: claim.total_incurred,
                external_fraud_score: signals.score(&claim.claim_number),
                entities: claim_entities.get(&claim.claim_number).cloned().unwrap_or_default(),
            })
            .collect();

        let entities = EntityAggregator {
            corpus: &corpus,
            claims: &claims,
            centrality: &centrality,
            communities: &detection,
            weights: self.config.ensemble,
        }
        .aggregate();
        let connections = enrich_connections(graph.connections(), &signals, &corpus);
        let communities = community_stats(&detection, &corpus);

        let metadata = RunMetadata {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            corpus_fingerprint: corpus.fingerprint(),
            mention_strategy,
            signals: signals.provenance,
            cliques_truncated: detection.truncated,
            nonconverged_components: centrality.nonconverged_components,
            skipped_records: skipped.len() + signals.provenance.skipped_rows,
            entity_count: entities.len(),
            claim_count: claims.len(),
            connection_count: connections.len(),
            community_count: communities.len(),
        };
        info!(
            run_id = %metadata.run_id,
            entities = metadata.entity_count,
            connections = metadata.connection_count,
            communities = metadata.community_count,
            simulated = metadata.signals.any_simulated(),
            duration_ms = metadata.duration_ms,
            "Pipeline run complete"
        );

        let position = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.entity_name.clone(), i))
            .collect();

        Snapshot {
            metadata,
            entities,
            connections,
            communities,
            memberships: detection.memberships,
            claims,
            rules: signals.rules,
            skipped,
            position,
        }
    }
}
