use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::error::{Result, SignalError};
use crate::model::{ExternalSignals, Priority, RuleTrigger, SignalProvenance};
use crate::simulate::SignalSimulator;

/// Optional locations of the external score and rule files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalSources {
    /// CSV with `claim_number,external_fraud_score`.
    pub scores: Option<PathBuf>,
    /// CSV with `claim_number,rule_no,rule_desc,priority,value`.
    pub rules: Option<PathBuf>,
}

#[derive(Deserialize)]
struct ScoreRow {
    claim_number: String,
    external_fraud_score: String,
}

#[derive(Deserialize)]
struct RuleRow {
    claim_number: String,
    rule_no: String,
    #[serde(default)]
    rule_desc: String,
    priority: String,
    value: String,
}

pub struct SignalLoader {
    sources: SignalSources,
    simulator: SignalSimulator,
}

impl SignalLoader {
    pub fn new(sources: SignalSources, seed: u64) -> Self {
        Self {
            sources,
            simulator: SignalSimulator::new(seed),
        }
    }

    /// Load both tables. Each table that is absent or unreadable is replaced
    /// by simulated data and flagged in the provenance; this never fails.
    ///
    /// `claims` maps every corpus claim number to whether a confirmed-fraud
    /// entity is on it, which drives the simulation.
    pub async fn load(&self, claims: &BTreeMap<String, bool>) -> ExternalSignals {
        let mut provenance = SignalProvenance::default();

        let scores = match self.read_optional(self.sources.scores.as_deref(), "scores").await {
            Some((path, bytes)) => match parse_scores(&bytes, &path) {
                Ok((scores, skipped)) => {
                    provenance.skipped_rows += skipped;
                    info!(rows = scores.len(), skipped, "Loaded external fraud scores from {}", path.display());
                    Some(scores)
                }
                Err(e) => {
                    warn!(error = %e, "External score file unusable");
                    None
                }
            },
            None => None,
        };
        let scores = scores.unwrap_or_else(|| {
            warn!(claims = claims.len(), "Using simulated external fraud scores");
            provenance.scores_simulated = true;
            self.simulator.scores(claims)
        });

        let rules = match self.read_optional(self.sources.rules.as_deref(), "rules").await {
            Some((path, bytes)) => match parse_rules(&bytes, &path) {
                Ok((rules, skipped)) => {
                    provenance.skipped_rows += skipped;
                    info!(rows = rules.len(), skipped, "Loaded fraud rule triggers from {}", path.display());
                    Some(rules)
                }
                Err(e) => {
                    warn!(error = %e, "Fraud rule file unusable");
                    None
                }
            },
            None => None,
        };
        let rules = rules.unwrap_or_else(|| {
            warn!(claims = claims.len(), "Using simulated fraud rule triggers");
            provenance.rules_simulated = true;
            self.simulator.rules(claims)
        });

        ExternalSignals {
            scores,
            rules,
            provenance,
        }
    }

    async fn read_optional(&self, path: Option<&Path>, table: &str) -> Option<(PathBuf, Vec<u8>)> {
        let Some(path) = path else {
            warn!(table, "No external source configured");
            return None;
        };
        match fs::read(path).await {
            Ok(bytes) => Some((path.to_path_buf(), bytes)),
            Err(source) => {
                let e = SignalError::Io {
                    path: path.to_path_buf(),
                    source,
                };
                warn!(table, error = %e, "External source missing or unreadable");
                None
            }
        }
    }
}

/// Parse a score table. Rows with a score outside `[0, 1]` or an
/// unparseable value are skipped; for duplicate claim numbers the first row
/// wins. Returns the scores and the number of skipped rows.
pub fn parse_scores(bytes: &[u8], path: &Path) -> Result<(BTreeMap<String, f64>, usize)> {
    let mut reader = csv_reader(bytes);
    check_headers(&mut reader, path)?;

    let mut scores = BTreeMap::new();
    let mut skipped = 0;
    for (idx, row) in reader.deserialize::<ScoreRow>().enumerate() {
        let line = idx + 2;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                skip(&mut skipped, "scores", line, &e.to_string());
                continue;
            }
        };

        let claim_number = row.claim_number.trim().to_string();
        if claim_number.is_empty() {
            skip(&mut skipped, "scores", line, "empty claim number");
            continue;
        }
        let Some(score) = row
            .external_fraud_score
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|s| (0.0..=1.0).contains(s))
        else {
            skip(
                &mut skipped,
                "scores",
                line,
                &format!("score '{}' is not a number in [0, 1]", row.external_fraud_score),
            );
            continue;
        };
        if scores.contains_key(&claim_number) {
            skip(&mut skipped, "scores", line, &format!("duplicate score for '{}'", claim_number));
            continue;
        }
        scores.insert(claim_number, score);
    }

    Ok((scores, skipped))
}

/// Parse a rule trigger table, skipping rows with an unknown priority or a
/// non-numeric rule number or value.
pub fn parse_rules(bytes: &[u8], path: &Path) -> Result<(Vec<RuleTrigger>, usize)> {
    let mut reader = csv_reader(bytes);
    check_headers(&mut reader, path)?;

    let mut rules = Vec::new();
    let mut skipped = 0;
    for (idx, row) in reader.deserialize::<RuleRow>().enumerate() {
        let line = idx + 2;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                skip(&mut skipped, "rules", line, &e.to_string());
                continue;
            }
        };

        let Ok(rule_no) = row.rule_no.trim().parse::<u32>() else {
            skip(&mut skipped, "rules", line, &format!("invalid rule_no '{}'", row.rule_no));
            continue;
        };
        let Some(priority) = Priority::parse(&row.priority) else {
            skip(&mut skipped, "rules", line, &format!("unknown priority '{}'", row.priority));
            continue;
        };
        let Some(value) = row.value.trim().parse::<f64>().ok().filter(|v| v.is_finite()) else {
            skip(&mut skipped, "rules", line, &format!("invalid value '{}'", row.value));
            continue;
        };
        if row.claim_number.trim().is_empty() {
            skip(&mut skipped, "rules", line, "empty claim number");
            continue;
        }

        rules.push(RuleTrigger {
            claim_number: row.claim_number.trim().to_string(),
            rule_no,
            rule_desc: row.rule_desc,
            priority,
            value,
        });
    }

    Ok((rules, skipped))
}

fn csv_reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes)
}

fn check_headers(reader: &mut csv::Reader<&[u8]>, path: &Path) -> Result<()> {
    reader.headers().map(|_| ()).map_err(|source| SignalError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

fn skip(skipped: &mut usize, table: &str, row: usize, reason: &str) {
    warn!(table, row, reason, "Skipping malformed signal row");
    *skipped += 1;
}
