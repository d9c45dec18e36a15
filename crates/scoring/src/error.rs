use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// No entity or claim data at all. The previous snapshot stays live.
    #[error("corpus missing: {0}")]
    CorpusMissing(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("a reload is already running")]
    ConcurrentRunConflict,

    #[error("no snapshot has been published yet")]
    NoSnapshot,

    #[error("invalid status '{0}', expected one of: Not Reviewed, Under Investigation, Bad Actor, Cleared")]
    InvalidStatus(String),

    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Ingest(ingest::IngestError),

    #[error("pipeline task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl From<ingest::IngestError> for EngineError {
    fn from(e: ingest::IngestError) -> Self {
        match e {
            ingest::IngestError::CorpusMissing(path) => EngineError::CorpusMissing(path.display().to_string()),
            other => EngineError::Ingest(other),
        }
    }
}
