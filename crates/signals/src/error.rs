use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SignalError>;

/// Failure to read an external signal source. The loader never surfaces
/// these to a run; it substitutes simulated data instead.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unreadable CSV header in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
