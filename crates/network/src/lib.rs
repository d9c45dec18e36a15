pub mod centrality;
pub mod graph;
pub mod percolation;

pub use centrality::{
    CentralityConfig, CentralityReport, CentralityScorer, CentralityScores, CentralityWeights,
    PathMetric,
};
pub use graph::{merge_claim_entities, CoOccurrenceGraph, Connection, EdgeData};
pub use percolation::{CliqueConfig, CliquePercolation, Community, CommunityDetection, Membership};
