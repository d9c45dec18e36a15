use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A (claim, entity) pair produced by extraction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MentionEdge {
    pub claim_number: String,
    pub entity: String,
}

/// Entities resolved from the notes of one claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimMentions {
    pub claim_number: String,
    pub mentioned: BTreeSet<String>,
}

impl ClaimMentions {
    pub fn edges(&self) -> impl Iterator<Item = MentionEdge> + '_ {
        self.mentioned.iter().map(|entity| MentionEdge {
            claim_number: self.claim_number.clone(),
            entity: entity.clone(),
        })
    }
}
