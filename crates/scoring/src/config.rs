use network::{CentralityConfig, CliqueConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleWeights {
    pub social: f64,
    pub external: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            social: 0.6,
            external: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub clique: CliqueConfig,
    pub centrality: CentralityConfig,
    pub ensemble: EnsembleWeights,
    /// Seed for simulated external signals.
    pub simulation_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            clique: CliqueConfig::default(),
            centrality: CentralityConfig::default(),
            ensemble: EnsembleWeights::default(),
            simulation_seed: 42,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.clique.k < 2 {
            return Err(EngineError::InvalidConfig(format!("clique.k must be at least 2, got {}", self.clique.k)));
        }
        if self.clique.max_cliques == 0 {
            return Err(EngineError::InvalidConfig("clique.max_cliques must be positive".to_string()));
        }
        if self.centrality.max_iterations == 0 {
            return Err(EngineError::InvalidConfig("centrality.max_iterations must be positive".to_string()));
        }
        let tolerance = self.centrality.tolerance;
        if tolerance.is_nan() || tolerance <= 0.0 {
            return Err(EngineError::InvalidConfig("centrality.tolerance must be positive".to_string()));
        }

        let w = self.centrality.weights;
        let e = self.ensemble;
        let all = [w.degree, w.betweenness, w.eigenvector, e.social, e.external];
        if all.iter().any(|x| !x.is_finite() || *x < 0.0) {
            return Err(EngineError::InvalidConfig("weights must be finite and non-negative".to_string()));
        }

        if (w.sum() - 1.0).abs() > 1e-9 {
            warn!(sum = w.sum(), "Centrality weights do not sum to 1, social scores may exceed 100");
        }
        if (e.social + e.external - 1.0).abs() > 1e-9 {
            warn!(
                sum = e.social + e.external,
                "Ensemble weights do not sum to 1, ensemble scores may leave [0, 100]"
            );
        }
        Ok(())
    }
}
