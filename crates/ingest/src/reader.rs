use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::corpus::{Claim, ClaimNote, Corpus, Entity, EntityType};
use crate::error::{IngestError, Result};

pub const ENTITIES_FILE: &str = "entities.csv";
pub const CLAIMS_FILE: &str = "claims.csv";
pub const NOTES_FILE: &str = "notes.csv";

/// A corpus record that was dropped while loading.
#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
pub struct SkippedRecord {
    pub source: String,
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct LoadedCorpus {
    pub corpus: Corpus,
    pub skipped: Vec<SkippedRecord>,
}

#[derive(Deserialize)]
struct EntityRow {
    name: String,
    #[serde(rename = "type")]
    entity_type: String,
    #[serde(default)]
    confirmed_fraud: Option<String>,
}

#[derive(Deserialize)]
struct ClaimRow {
    claim_number: String,
    total_incurred: String,
    #[serde(default)]
    entities: Option<String>,
}

/// JSON corpus records are read one at a time so a bad record only costs itself.
#[derive(Deserialize)]
struct JsonCorpus {
    entities: Vec<serde_json::Value>,
    claims: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct JsonEntity {
    name: String,
    #[serde(rename = "type")]
    entity_type: String,
    #[serde(default)]
    confirmed_fraud: bool,
}

#[derive(Deserialize)]
struct JsonClaim {
    claim_number: String,
    total_incurred: serde_json::Value,
    #[serde(default)]
    entities: Vec<String>,
    #[serde(default)]
    notes: Vec<ClaimNote>,
}

#[derive(Deserialize)]
struct NoteRow {
    claim_number: String,
    note_id: String,
    note: String,
}

pub struct CorpusReader;

impl CorpusReader {
    /// Read `entities.csv`, `claims.csv` and the optional `notes.csv` from a directory.
    pub async fn read_directory(dir: &Path) -> Result<LoadedCorpus> {
        let mut skipped = Vec::new();

        let entities_path = dir.join(ENTITIES_FILE);
        let claims_path = dir.join(CLAIMS_FILE);
        let notes_path = dir.join(NOTES_FILE);

        let entities = Self::read_entities(&entities_path, &mut skipped).await?;
        let mut claims = Self::read_claims(&claims_path, &mut skipped).await?;

        if fs::try_exists(&notes_path).await.unwrap_or(false) {
            Self::read_notes(&notes_path, &mut claims, &mut skipped).await?;
        } else {
            info!(path = %notes_path.display(), "No notes file, extraction will see empty notes");
        }

        let corpus = sanitize(entities, claims, &mut skipped);
        info!(
            entities = corpus.entities.len(),
            claims = corpus.claims.len(),
            skipped = skipped.len(),
            "Loaded corpus from {}",
            dir.display()
        );

        Ok(LoadedCorpus { corpus, skipped })
    }

    /// Read a whole corpus from one JSON document.
    pub async fn read_json(path: &Path) -> Result<LoadedCorpus> {
        let bytes = read_bytes(path).await?;
        let raw: JsonCorpus = serde_json::from_slice(&bytes).map_err(|source| IngestError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let mut skipped = Vec::new();
        let entities = json_entities(raw.entities, &mut skipped);
        let claims = json_claims(raw.claims, &mut skipped);
        let corpus = sanitize(entities, claims, &mut skipped);
        info!(
            entities = corpus.entities.len(),
            claims = corpus.claims.len(),
            skipped = skipped.len(),
            "Loaded corpus from {}",
            path.display()
        );

        Ok(LoadedCorpus { corpus, skipped })
    }

    async fn read_entities(path: &Path, skipped: &mut Vec<SkippedRecord>) -> Result<Vec<Entity>> {
        let bytes = read_bytes(path).await?;
        let mut reader = csv_reader(&bytes);
        check_headers(&mut reader, path)?;

        let mut entities = Vec::new();
        for (idx, row) in reader.deserialize::<EntityRow>().enumerate() {
            let line = idx + 2;
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    skip(skipped, ENTITIES_FILE, line, e.to_string());
                    continue;
                }
            };

            let Some(entity_type) = EntityType::parse(&row.entity_type) else {
                skip(skipped, ENTITIES_FILE, line, format!("unknown entity type '{}'", row.entity_type));
                continue;
            };
            let Some(confirmed_fraud) = parse_flag(row.confirmed_fraud.as_deref()) else {
                skip(skipped, ENTITIES_FILE, line, "confirmed_fraud must be 0/1 or true/false".to_string());
                continue;
            };

            entities.push(Entity {
                name: row.name,
                entity_type,
                confirmed_fraud,
            });
        }

        Ok(entities)
    }

    async fn read_claims(path: &Path, skipped: &mut Vec<SkippedRecord>) -> Result<Vec<Claim>> {
        let bytes = read_bytes(path).await?;
        let mut reader = csv_reader(&bytes);
        check_headers(&mut reader, path)?;

        let mut claims = Vec::new();
        for (idx, row) in reader.deserialize::<ClaimRow>().enumerate() {
            let line = idx + 2;
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    skip(skipped, CLAIMS_FILE, line, e.to_string());
                    continue;
                }
            };

            let total_incurred = match parse_amount(&row.total_incurred) {
                Some(amount) => amount,
                None => {
                    skip(skipped, CLAIMS_FILE, line, format!("invalid total_incurred '{}'", row.total_incurred));
                    continue;
                }
            };

            let entities = row
                .entities
                .as_deref()
                .unwrap_or_default()
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);

            claims.push(Claim::new(row.claim_number, total_incurred).with_entities(entities));
        }

        Ok(claims)
    }

    async fn read_notes(
        path: &Path,
        claims: &mut [Claim],
        skipped: &mut Vec<SkippedRecord>,
    ) -> Result<()> {
        let bytes = read_bytes(path).await?;
        let mut reader = csv_reader(&bytes);
        check_headers(&mut reader, path)?;

        // first copy of a claim number wins, matching `sanitize`
        let mut by_number: HashMap<String, usize> = HashMap::new();
        for (i, claim) in claims.iter().enumerate() {
            by_number.entry(claim.claim_number.clone()).or_insert(i);
        }

        for (idx, row) in reader.deserialize::<NoteRow>().enumerate() {
            let line = idx + 2;
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    skip(skipped, NOTES_FILE, line, e.to_string());
                    continue;
                }
            };

            match by_number.get(&row.claim_number) {
                Some(&i) => claims[i].notes.push(ClaimNote {
                    note_id: row.note_id,
                    text: row.note,
                }),
                None => skip(
                    skipped,
                    NOTES_FILE,
                    line,
                    format!("note for unknown claim '{}'", row.claim_number),
                ),
            }
        }

        Ok(())
    }
}

fn json_entities(values: Vec<serde_json::Value>, skipped: &mut Vec<SkippedRecord>) -> Vec<Entity> {
    let mut entities = Vec::with_capacity(values.len());
    for (idx, value) in values.into_iter().enumerate() {
        let row: JsonEntity = match serde_json::from_value(value) {
            Ok(row) => row,
            Err(e) => {
                skip(skipped, "entities", idx + 1, e.to_string());
                continue;
            }
        };
        let Some(entity_type) = EntityType::parse(&row.entity_type) else {
            skip(skipped, "entities", idx + 1, format!("unknown entity type '{}'", row.entity_type));
            continue;
        };
        entities.push(Entity::new(row.name, entity_type).with_fraud(row.confirmed_fraud));
    }
    entities
}

fn json_claims(values: Vec<serde_json::Value>, skipped: &mut Vec<SkippedRecord>) -> Vec<Claim> {
    let mut claims = Vec::with_capacity(values.len());
    for (idx, value) in values.into_iter().enumerate() {
        let row: JsonClaim = match serde_json::from_value(value) {
            Ok(row) => row,
            Err(e) => {
                skip(skipped, "claims", idx + 1, e.to_string());
                continue;
            }
        };
        let amount = match &row.total_incurred {
            serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite() && *v >= 0.0),
            serde_json::Value::String(s) => parse_amount(s),
            _ => None,
        };
        let Some(total_incurred) = amount else {
            skip(
                skipped,
                "claims",
                idx + 1,
                format!("invalid total_incurred '{}'", row.total_incurred),
            );
            continue;
        };

        let mut claim = Claim::new(row.claim_number, total_incurred).with_entities(
            row.entities
                .into_iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        );
        claim.notes = row.notes;
        claims.push(claim);
    }
    claims
}

/// Drop records that would break corpus invariants: empty or duplicate
/// identifiers, unusable amounts, associations to entities not in the roster.
pub fn sanitize(
    entities: Vec<Entity>,
    claims: Vec<Claim>,
    skipped: &mut Vec<SkippedRecord>,
) -> Corpus {
    let mut names = HashSet::new();
    let mut kept_entities = Vec::with_capacity(entities.len());
    for (idx, mut entity) in entities.into_iter().enumerate() {
        entity.name = entity.name.trim().to_string();
        if entity.name.is_empty() {
            skip(skipped, "entities", idx + 1, "empty entity name".to_string());
            continue;
        }
        if !names.insert(entity.name.clone()) {
            skip(skipped, "entities", idx + 1, format!("duplicate entity '{}'", entity.name));
            continue;
        }
        kept_entities.push(entity);
    }

    let mut numbers = HashSet::new();
    let mut kept_claims = Vec::with_capacity(claims.len());
    for (idx, mut claim) in claims.into_iter().enumerate() {
        claim.claim_number = claim.claim_number.trim().to_string();
        if claim.claim_number.is_empty() {
            skip(skipped, "claims", idx + 1, "empty claim number".to_string());
            continue;
        }
        if !claim.total_incurred.is_finite() || claim.total_incurred < 0.0 {
            skip(
                skipped,
                "claims",
                idx + 1,
                format!("claim '{}' has invalid incurred amount", claim.claim_number),
            );
            continue;
        }
        if !numbers.insert(claim.claim_number.clone()) {
            skip(skipped, "claims", idx + 1, format!("duplicate claim '{}'", claim.claim_number));
            continue;
        }

        let unknown: Vec<String> = claim
            .entities
            .iter()
            .filter(|name| !names.contains(*name))
            .cloned()
            .collect();
        for name in unknown {
            claim.entities.remove(&name);
            skip(
                skipped,
                "claims",
                idx + 1,
                format!("claim '{}' references unknown entity '{}'", claim.claim_number, name),
            );
        }

        kept_claims.push(claim);
    }

    Corpus::new(kept_entities, kept_claims)
}

async fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            IngestError::CorpusMissing(path.to_path_buf())
        } else {
            IngestError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn csv_reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes)
}

fn check_headers(reader: &mut csv::Reader<&[u8]>, path: &Path) -> Result<()> {
    reader.headers().map(|_| ()).map_err(|source| IngestError::Csv {
        path: PathBuf::from(path),
        source,
    })
}

fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("0") | Some("false") | Some("no") => Some(false),
        Some("1") | Some("true") | Some("yes") => Some(true),
        _ => None,
    }
}

fn parse_amount(value: &str) -> Option<f64> {
    let cleaned: String = value.chars().filter(|c| *c != '$' && *c != ',').collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn skip(skipped: &mut Vec<SkippedRecord>, source: &str, row: usize, reason: String) {
    warn!(source, row, reason = %reason, "Skipping malformed corpus record");
    skipped.push(SkippedRecord {
        source: source.to_string(),
        row,
        reason,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ENTITIES_FILE,
            "name,type,confirmed_fraud\nDr. A,Doctor,1\nLawyer B,Lawyer,0\nBusiness C,Business,\n",
        )
        .await;
        write(
            dir.path(),
            CLAIMS_FILE,
            "claim_number,total_incurred,entities\nWC-2024-001,50000,Dr. A;Lawyer B\nWC-2024-002,\"$30,000\",Dr. A; Lawyer B; Business C\n",
        )
        .await;
        write(
            dir.path(),
            NOTES_FILE,
            "claim_number,note_id,note\nWC-2024-001,N1,Seen by Dr. A\nWC-2024-001,N2,Lawyer B retained\n",
        )
        .await;

        let loaded = CorpusReader::read_directory(dir.path()).await.unwrap();

        assert!(loaded.skipped.is_empty());
        assert_eq!(loaded.corpus.entities.len(), 3);
        assert!(loaded.corpus.entities[0].confirmed_fraud);
        assert!(!loaded.corpus.entities[2].confirmed_fraud);
        assert_eq!(loaded.corpus.claims[1].total_incurred, 30_000.0);
        assert_eq!(loaded.corpus.claims[1].entities.len(), 3);
        assert_eq!(loaded.corpus.claims[0].notes.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ENTITIES_FILE,
            "name,type,confirmed_fraud\nDr. A,Doctor,1\nGhost,Astronaut,0\nDr. A,Doctor,0\nLawyer B,Lawyer,maybe\n",
        )
        .await;
        write(
            dir.path(),
            CLAIMS_FILE,
            "claim_number,total_incurred,entities\nWC-1,abc,Dr. A\nWC-2,-5,Dr. A\nWC-3,100,Dr. A;Nobody\n",
        )
        .await;

        let loaded = CorpusReader::read_directory(dir.path()).await.unwrap();

        assert_eq!(loaded.corpus.entities.len(), 1);
        assert_eq!(loaded.corpus.claims.len(), 1);
        assert_eq!(loaded.corpus.claims[0].claim_number, "WC-3");
        assert_eq!(loaded.corpus.claims[0].entities.len(), 1);
        // astronaut, duplicate, bad flag, bad amount, negative amount, unknown entity
        assert_eq!(loaded.skipped.len(), 6);
    }

    #[tokio::test]
    async fn test_missing_entities_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = CorpusReader::read_directory(dir.path()).await.unwrap_err();
        assert!(matches!(err, IngestError::CorpusMissing(_)));
    }

    #[tokio::test]
    async fn test_read_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        fs::write(
            &path,
            r#"{
                "entities": [{"name": "Dr. A", "type": "Doctor", "confirmed_fraud": true},
                             {"name": "Sam Lee", "type": "Regular Person"}],
                "claims": [{"claim_number": "WC-1", "total_incurred": 1200.0,
                            "entities": ["Dr. A", "Sam Lee"],
                            "notes": [{"note_id": "N1", "text": "Sam Lee seen by Dr. A"}]}]
            }"#,
        )
        .await
        .unwrap();

        let loaded = CorpusReader::read_json(&path).await.unwrap();
        assert_eq!(loaded.corpus.entities[1].entity_type, EntityType::RegularPerson);
        assert_eq!(loaded.corpus.claims[0].note_text(), "Sam Lee seen by Dr. A");
    }

    #[tokio::test]
    async fn test_json_bad_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        fs::write(
            &path,
            r#"{
                "entities": [{"name": "Dr. A", "type": "Doctor"},
                             {"name": "Lawyer B", "type": "lawyer"},
                             {"name": "Ghost", "type": "Astronaut"},
                             {"name": "Sam Lee", "type": "regular_person"},
                             {"name": 7, "type": "Driver"}],
                "claims": [{"claim_number": "WC-1", "total_incurred": "$1,200", "entities": ["Dr. A", "Lawyer B"]},
                           {"claim_number": "WC-2", "total_incurred": "lots"},
                           {"claim_number": "WC-3", "total_incurred": 10.0, "entities": "Dr. A"},
                           {"claim_number": "WC-4", "total_incurred": 500}]
            }"#,
        )
        .await
        .unwrap();

        let loaded = CorpusReader::read_json(&path).await.unwrap();

        let names: Vec<&str> = loaded.corpus.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Dr. A", "Lawyer B", "Sam Lee"]);
        assert_eq!(loaded.corpus.entities[2].entity_type, EntityType::RegularPerson);

        let claims: Vec<&str> = loaded.corpus.claims.iter().map(|c| c.claim_number.as_str()).collect();
        assert_eq!(claims, vec!["WC-1", "WC-4"]);
        assert_eq!(loaded.corpus.claims[0].total_incurred, 1_200.0);
        assert_eq!(loaded.corpus.claims[0].entities.len(), 2);

        // astronaut, numeric name, bad amount, entities not a list
        assert_eq!(loaded.skipped.len(), 4);
    }

    #[tokio::test]
    async fn test_notes_follow_first_duplicate_claim() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ENTITIES_FILE, "name,type\nDr. A,Doctor\n").await;
        write(
            dir.path(),
            CLAIMS_FILE,
            "claim_number,total_incurred,entities\nWC-1,100,Dr. A\nWC-1,200,Dr. A\n",
        )
        .await;
        write(dir.path(), NOTES_FILE, "claim_number,note_id,note\nWC-1,N1,Seen by Dr. A\n").await;

        let loaded = CorpusReader::read_directory(dir.path()).await.unwrap();

        assert_eq!(loaded.corpus.claims.len(), 1);
        let claim = &loaded.corpus.claims[0];
        assert_eq!(claim.total_incurred, 100.0);
        assert_eq!(claim.notes.len(), 1);
        assert_eq!(loaded.skipped.len(), 1);
    }
}
