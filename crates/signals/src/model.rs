use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" | "med" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fraud rule that fired on a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTrigger {
    pub claim_number: String,
    pub rule_no: u32,
    pub rule_desc: String,
    pub priority: Priority,
    pub value: f64,
}

/// Where each signal table came from. Simulated tables are never silent:
/// these flags travel into the run metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalProvenance {
    pub scores_simulated: bool,
    pub rules_simulated: bool,
    /// Malformed rows dropped from the external files.
    pub skipped_rows: usize,
}

impl SignalProvenance {
    pub fn any_simulated(&self) -> bool {
        self.scores_simulated || self.rules_simulated
    }
}

/// Per-claim external fraud scores (each in `[0, 1]`) and rule triggers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalSignals {
    pub scores: BTreeMap<String, f64>,
    pub rules: Vec<RuleTrigger>,
    pub provenance: SignalProvenance,
}

impl ExternalSignals {
    pub fn score(&self, claim_number: &str) -> Option<f64> {
        self.scores.get(claim_number).copied()
    }
}
