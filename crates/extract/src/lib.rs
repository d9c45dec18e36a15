pub mod matcher;
pub mod normalizer;
pub mod schema;

pub use matcher::{MentionStrategy, RosterMatcher};
pub use normalizer::{EntityNormalizer, NameVariant, VariantKind};
pub use schema::{ClaimMentions, MentionEdge};

use ingest::{Claim, Corpus};
use tracing::info;

/// Runs a mention strategy over every note of every claim.
pub struct MentionExtractor {
    strategy: Box<dyn MentionStrategy>,
}

impl MentionExtractor {
    pub fn new(strategy: Box<dyn MentionStrategy>) -> Self {
        Self { strategy }
    }

    /// Extractor backed by a [`RosterMatcher`] over the corpus entities.
    pub fn for_corpus(corpus: &Corpus) -> Self {
        Self::new(Box::new(RosterMatcher::new(corpus.entity_names())))
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Mentioned entities across all notes of one claim.
    pub fn extract_claim(&self, claim: &Claim) -> ClaimMentions {
        let mut mentioned = std::collections::BTreeSet::new();
        for note in &claim.notes {
            mentioned.extend(self.strategy.mentions(&note.text));
        }
        ClaimMentions {
            claim_number: claim.claim_number.clone(),
            mentioned,
        }
    }

    pub fn extract_corpus(&self, corpus: &Corpus) -> Vec<ClaimMentions> {
        let extracted: Vec<ClaimMentions> = corpus
            .claims
            .iter()
            .map(|claim| self.extract_claim(claim))
            .collect();

        let mention_count: usize = extracted.iter().map(|m| m.mentioned.len()).sum();
        info!(
            strategy = self.strategy_name(),
            claims = extracted.len(),
            mentions = mention_count,
            "Extracted entity mentions"
        );

        extracted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest::{Entity, EntityType};

    struct FixedStrategy;

    impl MentionStrategy for FixedStrategy {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn mentions(&self, text: &str) -> std::collections::BTreeSet<String> {
            text.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
        }
    }

    #[test]
    fn test_notes_are_unioned_per_claim() {
        let corpus = Corpus::new(
            vec![
                Entity::new("Dr. A", EntityType::Doctor),
                Entity::new("Lawyer B", EntityType::Lawyer),
            ],
            vec![
                Claim::new("WC-1", 100.0)
                    .with_note("N1", "Dr. A saw the claimant")
                    .with_note("N2", "Dr. A referred to Lawyer B"),
                Claim::new("WC-2", 50.0),
            ],
        );

        let extracted = MentionExtractor::for_corpus(&corpus).extract_corpus(&corpus);

        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].mentioned.len(), 2);
        assert_eq!(extracted[0].edges().count(), 2);
        assert!(extracted[1].mentioned.is_empty());
    }

    #[test]
    fn test_strategy_is_pluggable() {
        let extractor = MentionExtractor::new(Box::new(FixedStrategy));
        let claim = Claim::new("WC-9", 1.0).with_note("N1", "x, y, x");
        let mentions = extractor.extract_claim(&claim);
        assert_eq!(extractor.strategy_name(), "fixed");
        assert_eq!(mentions.mentioned.len(), 2);
    }
}
