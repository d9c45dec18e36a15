use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.,!?;:]").expect("punctuation pattern is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

const TITLES: &[&str] = &["dr", "doctor", "attorney", "atty", "mr", "mrs", "ms"];
const SUFFIXES: &[&str] = &["llc", "inc", "corp", "co", "ltd", "pc", "pllc", "md", "esq", "jr", "sr"];

/// How a name variant was derived from the roster name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VariantKind {
    /// The roster name itself.
    Full,
    /// Roster name with a leading title or trailing corporate/person suffix removed.
    Stripped,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameVariant {
    /// Normalized words of the variant.
    pub words: Vec<String>,
    pub kind: VariantKind,
}

/// Maps normalized name variants back to roster entities.
pub struct EntityNormalizer {
    /// normalized variant -> (kind, canonical names)
    aliases: HashMap<String, (VariantKind, BTreeSet<String>)>,
}

impl EntityNormalizer {
    pub fn new() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Normalize a name: lowercase, drop punctuation, collapse whitespace.
    pub fn normalize(name: &str) -> String {
        let lowered = name.to_lowercase();
        let stripped = PUNCTUATION.replace_all(&lowered, " ");
        WHITESPACE.replace_all(stripped.trim(), " ").to_string()
    }

    /// Variants a note might use for `name`. Derived variants shorter than
    /// two words are dropped; a bare surname or "Atlantic" matches too much.
    pub fn variants(name: &str) -> Vec<NameVariant> {
        let words: Vec<String> = Self::normalize(name)
            .split(' ')
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut variants = vec![NameVariant {
            words: words.clone(),
            kind: VariantKind::Full,
        }];

        let mut core: &[String] = &words;
        if core.len() > 1 && TITLES.contains(&core[0].as_str()) {
            core = &core[1..];
        }
        if core.len() > 1 && SUFFIXES.contains(&core[core.len() - 1].as_str()) {
            core = &core[..core.len() - 1];
        }

        if core.len() != words.len() && core.len() >= 2 {
            variants.push(NameVariant {
                words: core.to_vec(),
                kind: VariantKind::Stripped,
            });
        }

        variants
    }

    /// Register a roster name and all of its variants.
    pub fn register(&mut self, canonical: &str) -> Vec<NameVariant> {
        let variants = Self::variants(canonical);
        for variant in &variants {
            let key = variant.words.join(" ");
            let entry = self
                .aliases
                .entry(key)
                .or_insert_with(|| (variant.kind, BTreeSet::new()));
            // A full name outranks the same text derived from another entity.
            if variant.kind < entry.0 {
                *entry = (variant.kind, BTreeSet::new());
            }
            if variant.kind == entry.0 {
                entry.1.insert(canonical.to_string());
            }
        }
        variants
    }

    /// Canonical entities a normalized variant resolves to.
    pub fn resolve(&self, normalized: &str) -> Option<&BTreeSet<String>> {
        self.aliases.get(normalized).map(|(_, names)| names)
    }
}

impl Default for EntityNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
