pub mod corpus;
pub mod error;
pub mod generator;
pub mod reader;

pub use corpus::{Claim, ClaimNote, Corpus, Entity, EntityType};
pub use error::{IngestError, Result};
pub use generator::{CorpusGenerator, DatasetPreset, GeneratorConfig};
pub use reader::{CorpusReader, LoadedCorpus, SkippedRecord};

use std::path::Path;

/// Load a corpus from a directory of CSV files or a single JSON file.
pub async fn load_corpus(path: &Path) -> Result<LoadedCorpus> {
    if path.is_dir() {
        return CorpusReader::read_directory(path).await;
    }

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match extension {
        "json" => CorpusReader::read_json(path).await,
        _ if !path.exists() => Err(IngestError::CorpusMissing(path.to_path_buf())),
        _ => Err(IngestError::UnsupportedFormat(extension.to_string())),
    }
}

/// Build a synthetic corpus from a preset.
pub fn generate_corpus(preset: DatasetPreset, seed: u64) -> LoadedCorpus {
    let corpus = CorpusGenerator::new(preset.config(seed)).generate();
    LoadedCorpus {
        corpus,
        skipped: Vec::new(),
    }
}
