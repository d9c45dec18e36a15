use ingest::{DatasetPreset, LoadedCorpus};
use serde::{Deserialize, Serialize};
use signals::{SignalLoader, SignalSources};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{EngineError, Result};
use crate::pipeline::{Pipeline, Snapshot};
use crate::status::StatusStore;

/// Where a run reads its inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSources {
    /// Corpus directory or `.json` file. When unset a synthetic corpus is
    /// generated from `preset`.
    pub corpus: Option<PathBuf>,
    pub preset: DatasetPreset,
    pub preset_seed: u64,
    pub signals: SignalSources,
}

impl Default for DataSources {
    fn default() -> Self {
        Self {
            corpus: None,
            preset: DatasetPreset::Demo,
            preset_seed: 42,
            signals: SignalSources::default(),
        }
    }
}

impl DataSources {
    pub async fn load_corpus(&self) -> Result<LoadedCorpus> {
        match &self.corpus {
            Some(path) => Ok(ingest::load_corpus(path).await?),
            None => {
                info!(preset = ?self.preset, description = self.preset.description(), "Generating synthetic corpus");
                let (preset, seed) = (self.preset, self.preset_seed);
                Ok(tokio::task::spawn_blocking(move || ingest::generate_corpus(preset, seed)).await?)
            }
        }
    }
}

/// Holds the live snapshot and runs reloads.
///
/// Readers clone the current `Arc` under a short read lock and keep using it
/// for as long as they like; a reload computes a complete new snapshot off
/// the lock and swaps the pointer only on success.
pub struct SnapshotStore {
    current: RwLock<Option<Arc<Snapshot>>>,
    reload_guard: Mutex<()>,
    pipeline: Arc<Pipeline>,
    sources: DataSources,
    statuses: Arc<dyn StatusStore>,
}

impl SnapshotStore {
    pub fn new(config: PipelineConfig, sources: DataSources, statuses: Arc<dyn StatusStore>) -> Result<Self> {
        Ok(Self {
            current: RwLock::new(None),
            reload_guard: Mutex::new(()),
            pipeline: Arc::new(Pipeline::new(config)?),
            sources,
            statuses,
        })
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn require(&self) -> Result<Arc<Snapshot>> {
        self.current().ok_or(EngineError::NoSnapshot)
    }

    pub fn statuses(&self) -> &Arc<dyn StatusStore> {
        &self.statuses
    }

    pub fn is_reloading(&self) -> bool {
        self.reload_guard.try_lock().is_err()
    }

    /// Run the pipeline and publish the result. A second call while one is
    /// in flight fails with `ConcurrentRunConflict`; a failed run leaves the
    /// previous snapshot in place.
    pub async fn reload(&self) -> Result<Arc<Snapshot>> {
        let Ok(_guard) = self.reload_guard.try_lock() else {
            warn!("Reload requested while another is running, rejecting");
            return Err(EngineError::ConcurrentRunConflict);
        };

        match self.run().await {
            Ok(snapshot) => {
                // statuses exist before any reader can see the new entities
                let initialized = self
                    .statuses
                    .initialize(&mut snapshot.entities.iter().map(|e| e.entity_name.as_str()));

                let snapshot = Arc::new(snapshot);
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));
                info!(
                    run_id = %snapshot.metadata.run_id,
                    initialized_statuses = initialized,
                    "Published new snapshot"
                );
                Ok(snapshot)
            }
            Err(e) => {
                error!(error = %e, kept_previous = self.current().is_some(), "Reload failed");
                Err(e)
            }
        }
    }

    async fn run(&self) -> Result<Snapshot> {
        let loaded = self.sources.load_corpus().await?;

        let pipeline = Arc::clone(&self.pipeline);
        let analysis = tokio::task::spawn_blocking(move || pipeline.analyze(loaded)).await??;

        let loader = SignalLoader::new(self.sources.signals.clone(), self.pipeline.config().simulation_seed);
        let signals = loader.load(&analysis.claim_fraud_flags()).await;

        let pipeline = Arc::clone(&self.pipeline);
        Ok(tokio::task::spawn_blocking(move || pipeline.score(analysis, signals)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{InMemoryStatusStore, InvestigationStatus};

    fn store(sources: DataSources) -> SnapshotStore {
        SnapshotStore::new(PipelineConfig::default(), sources, Arc::new(InMemoryStatusStore::new())).unwrap()
    }

    #[tokio::test]
    async fn test_reload_publishes_snapshot_and_statuses() {
        let store = store(DataSources::default());
        assert!(store.current().is_none());
        assert!(matches!(store.require(), Err(EngineError::NoSnapshot)));

        let snapshot = store.reload().await.unwrap();
        assert_eq!(snapshot.metadata.entity_count, 40);
        assert!(snapshot.metadata.signals.scores_simulated);
        assert!(Arc::ptr_eq(&snapshot, &store.current().unwrap()));

        let name = &snapshot.entities[0].entity_name;
        assert_eq!(store.statuses().latest(name), Some(InvestigationStatus::NotReviewed));
    }

    #[tokio::test]
    async fn test_reload_keeps_recorded_statuses() {
        let store = store(DataSources::default());
        let first = store.reload().await.unwrap();
        let name = first.entities[0].entity_name.clone();
        store.statuses().append(&name, InvestigationStatus::BadActor);

        let second = store.reload().await.unwrap();
        assert!(second.entity(&name).is_some());
        assert_eq!(store.statuses().latest(&name), Some(InvestigationStatus::BadActor));
        assert_eq!(store.statuses().history(&name).len(), 2);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let good = store(DataSources::default());
        let first = good.reload().await.unwrap();

        // same store contents, broken source
        let broken = SnapshotStore {
            current: RwLock::new(Some(Arc::clone(&first))),
            reload_guard: Mutex::new(()),
            pipeline: Arc::clone(&good.pipeline),
            sources: DataSources {
                corpus: Some(dir.path().join("missing.json")),
                ..DataSources::default()
            },
            statuses: Arc::new(InMemoryStatusStore::new()),
        };

        let err = broken.reload().await.unwrap_err();
        assert!(matches!(err, EngineError::CorpusMissing(_)));
        assert!(Arc::ptr_eq(&first, &broken.current().unwrap()));
    }

    #[tokio::test]
    async fn test_concurrent_reload_is_rejected() {
        let store = store(DataSources::default());
        let _held = store.reload_guard.lock().await;
        assert!(store.is_reloading());
        assert!(matches!(store.reload().await, Err(EngineError::ConcurrentRunConflict)));
    }

    #[tokio::test]
    async fn test_readers_keep_their_snapshot_across_reloads() {
        let store = store(DataSources::default());
        let before = store.reload().await.unwrap();
        let after = store.reload().await.unwrap();

        assert_ne!(before.metadata.run_id, after.metadata.run_id);
        assert_eq!(before.metadata.corpus_fingerprint, after.metadata.corpus_fingerprint);
        assert_eq!(before.entities.len(), after.entities.len());
        assert!(Arc::ptr_eq(&after, &store.current().unwrap()));
    }
}
