use std::collections::BTreeSet;
use tracing::debug;

use crate::normalizer::EntityNormalizer;

/// Resolves entity mentions in free text against a fixed roster.
///
/// Implementations must be pure: the same text always yields the same set,
/// and repeated mentions of one entity count once.
pub trait MentionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn mentions(&self, text: &str) -> BTreeSet<String>;
}

/// Word-bounded, case- and punctuation-insensitive lookup of roster names and
/// their title/suffix-stripped variants.
///
/// When one match lies strictly inside a longer match of a different entity,
/// only the longer one is kept, so "Sarah Thompson" inside
/// "Sarah Thompson 2" or "Lisa Patel" inside "Dr. Lisa Patel" does not
/// produce a second entity. Spans that resolve to several entities with
/// equal standing are ambiguous and dropped.
pub struct RosterMatcher {
    normalizer: EntityNormalizer,
    max_words: usize,
}

#[derive(Debug, Clone)]
struct Candidate<'a> {
    start: usize,
    len: usize,
    names: &'a BTreeSet<String>,
}

impl<'a> Candidate<'a> {
    fn end(&self) -> usize {
        self.start + self.len
    }

    fn strictly_inside(&self, other: &Candidate<'_>) -> bool {
        other.len > self.len && other.start <= self.start && self.end() <= other.end()
    }
}

impl RosterMatcher {
    pub fn new<'a, I>(roster: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut normalizer = EntityNormalizer::new();
        let mut max_words = 0;
        for name in roster {
            for variant in normalizer.register(name) {
                max_words = max_words.max(variant.words.len());
            }
        }
        Self {
            normalizer,
            max_words,
        }
    }

    fn tokenize(text: &str) -> Vec<String> {
        let text = text.replace('\u{2019}', "'");
        EntityNormalizer::normalize(&text)
            .split(' ')
            .filter(|w| !w.is_empty())
            .map(|w| w.strip_suffix("'s").unwrap_or(w).to_string())
            .collect()
    }
}

impl MentionStrategy for RosterMatcher {
    fn name(&self) -> &'static str {
        "roster"
    }

    fn mentions(&self, text: &str) -> BTreeSet<String> {
        let tokens = Self::tokenize(text);
        let mut candidates = Vec::new();

        for start in 0..tokens.len() {
            let longest = self.max_words.min(tokens.len() - start);
            for len in (1..=longest).rev() {
                let key = tokens[start..start + len].join(" ");
                if let Some(names) = self.normalizer.resolve(&key) {
                    candidates.push(Candidate { start, len, names });
                }
            }
        }

        let mut found = BTreeSet::new();
        for candidate in &candidates {
            let shadowed = candidates.iter().any(|other| {
                candidate.strictly_inside(other) && other.names != candidate.names
            });
            if shadowed {
                continue;
            }
            if candidate.names.len() > 1 {
                debug!(
                    names = ?candidate.names,
                    "Ambiguous mention resolves to several entities, ignoring"
                );
                continue;
            }
            found.extend(candidate.names.iter().cloned());
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> RosterMatcher {
        RosterMatcher::new([
            "Dr. Lisa Patel",
            "Sarah Thompson",
            "Sarah Thompson 2",
            "Summit Construction LLC",
            "Thompson & Associates Law",
            "Kevin O'Brien",
            "Mark Johnson",
        ])
    }

    #[test]
    fn test_titles_and_suffixes_are_optional() {
        let found = matcher().mentions("Seen by Lisa Patel; employer Summit Construction confirmed.");
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec!["Dr. Lisa Patel", "Summit Construction LLC"]
        );
    }

    #[test]
    fn test_case_and_punctuation_tolerance() {
        let found = matcher().mentions("DR LISA PATEL examined Kevin O'Brien's shoulder.");
        assert!(found.contains("Dr. Lisa Patel"));
        assert!(found.contains("Kevin O'Brien"));
    }

    #[test]
    fn test_duplicate_mentions_count_once() {
        let found = matcher().mentions("Mark Johnson called. Mark Johnson called again.");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_no_substring_false_positives() {
        let m = matcher();
        assert!(m.mentions("Mark Johnsonville filed").is_empty());
        assert!(m.mentions("Thompson & Associates Law represents the claimant").len() == 1);
        assert!(!m
            .mentions("Thompson & Associates Law represents the claimant")
            .contains("Sarah Thompson"));

        let numbered = m.mentions("Witness Sarah Thompson 2 confirmed");
        assert_eq!(numbered.into_iter().collect::<Vec<_>>(), vec!["Sarah Thompson 2"]);
    }

    #[test]
    fn test_empty_text() {
        assert!(matcher().mentions("").is_empty());
        assert!(RosterMatcher::new(Vec::<&str>::new()).mentions("Dr. Lisa Patel").is_empty());
    }
}
