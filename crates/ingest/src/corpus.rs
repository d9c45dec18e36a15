use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Doctor,
    Lawyer,
    Business,
    #[serde(rename = "Regular Person")]
    RegularPerson,
    Driver,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Doctor,
        EntityType::Lawyer,
        EntityType::Business,
        EntityType::RegularPerson,
        EntityType::Driver,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Doctor => "Doctor",
            EntityType::Lawyer => "Lawyer",
            EntityType::Business => "Business",
            EntityType::RegularPerson => "Regular Person",
            EntityType::Driver => "Driver",
        }
    }

    /// Lenient parse: "Regular Person", "regular_person" and "RegularPerson" are all accepted.
    pub fn parse(value: &str) -> Option<Self> {
        let key: String = value
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "doctor" => Some(EntityType::Doctor),
            "lawyer" | "attorney" => Some(EntityType::Lawyer),
            "business" => Some(EntityType::Business),
            "regularperson" | "person" => Some(EntityType::RegularPerson),
            "driver" => Some(EntityType::Driver),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique display name, also the entity identifier.
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Member of the corpus fraud list.
    #[serde(default)]
    pub confirmed_fraud: bool,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
            confirmed_fraud: false,
        }
    }

    pub fn with_fraud(mut self, confirmed_fraud: bool) -> Self {
        self.confirmed_fraud = confirmed_fraud;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimNote {
    pub note_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_number: String,
    pub total_incurred: f64,
    #[serde(default)]
    pub notes: Vec<ClaimNote>,
    /// Entities recorded against the claim in the corpus, independent of extraction.
    #[serde(default)]
    pub entities: BTreeSet<String>,
}

impl Claim {
    pub fn new(claim_number: impl Into<String>, total_incurred: f64) -> Self {
        Self {
            claim_number: claim_number.into(),
            total_incurred,
            notes: Vec::new(),
            entities: BTreeSet::new(),
        }
    }

    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities.extend(entities.into_iter().map(Into::into));
        self
    }

    pub fn with_note(mut self, note_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.notes.push(ClaimNote {
            note_id: note_id.into(),
            text: text.into(),
        });
        self
    }

    /// All note text of the claim, one note per line.
    pub fn note_text(&self) -> String {
        self.notes
            .iter()
            .map(|n| n.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    pub entities: Vec<Entity>,
    pub claims: Vec<Claim>,
}

impl Corpus {
    pub fn new(entities: Vec<Entity>, claims: Vec<Claim>) -> Self {
        Self { entities, claims }
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }

    /// Stable content hash, independent of record order.
    pub fn fingerprint(&self) -> String {
        let mut entities: Vec<&Entity> = self.entities.iter().collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        let mut claims: Vec<&Claim> = self.claims.iter().collect();
        claims.sort_by(|a, b| a.claim_number.cmp(&b.claim_number));

        let mut hasher = Sha256::new();
        for entity in entities {
            hasher.update(entity.name.as_bytes());
            hasher.update([0x1f]);
            hasher.update(entity.entity_type.as_str().as_bytes());
            hasher.update([entity.confirmed_fraud as u8, 0x1e]);
        }
        for claim in claims {
            hasher.update(claim.claim_number.as_bytes());
            hasher.update([0x1f]);
            hasher.update(claim.total_incurred.to_bits().to_le_bytes());
            for name in &claim.entities {
                hasher.update(name.as_bytes());
                hasher.update([0x1f]);
            }
            for note in &claim.notes {
                hasher.update(note.note_id.as_bytes());
                hasher.update(note.text.as_bytes());
                hasher.update([0x1f]);
            }
            hasher.update([0x1e]);
        }
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }
}
