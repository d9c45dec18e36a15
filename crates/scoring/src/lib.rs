pub mod aggregate;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod snapshot;
pub mod status;
pub mod tables;

pub use aggregate::{
    ensemble_score, external_scores, ClaimRecord, CommunityStats, EnrichedConnection, EntityAggregator,
    EntityRiskRecord, RiskLevel,
};
pub use config::{EnsembleWeights, PipelineConfig};
pub use error::{EngineError, Result};
pub use pipeline::{NetworkAnalysis, Pipeline, RunMetadata, Snapshot};
pub use snapshot::{DataSources, SnapshotStore};
pub use status::{InMemoryStatusStore, InvestigationStatus, StatusRecord, StatusStore};
pub use tables::{
    EntityClaimRow, EntityDetail, EntityRuleRow, NetworkEdge, NetworkExport, NetworkNode, RankingQuery,
    RankingRow, SortKey,
};
