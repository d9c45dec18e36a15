use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use crate::corpus::{Claim, Corpus, Entity, EntityType};

const DOCTOR_FIRST: &[&str] = &[
    "Michael", "Jennifer", "Amanda", "Steven", "Carlos", "Lisa", "Thomas", "Nicole", "David",
    "Sarah", "Robert", "Patricia", "James", "Maria", "Kevin", "Daniel", "Angela", "Christopher",
    "Elizabeth", "Matthew", "Jessica", "Andrew", "Michelle", "Joshua", "Rachel",
];
const DOCTOR_LAST: &[&str] = &[
    "Rodriguez", "Walsh", "Foster", "Kim", "Mendez", "Patel", "Burke", "Zhang", "Smith", "Johnson",
    "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Martinez", "Hernandez", "Lopez",
    "Gonzalez", "Wilson", "Anderson",
];
const PERSON_FIRST: &[&str] = &[
    "Sarah", "David", "Lisa", "Robert", "Maria", "Kevin", "Patricia", "Frank", "Janet", "Brandon",
    "Emma", "Angela", "Mark", "Chris", "Samantha", "Daniel", "Michelle", "Steven", "Rachel",
    "Tony", "Jessica", "Andrew", "Nicole", "Brian",
];
const PERSON_LAST: &[&str] = &[
    "Thompson", "Park", "Chen", "Davis", "Gonzalez", "O'Brien", "Williams", "Harrison", "Murphy",
    "Taylor", "Watson", "Scott", "Johnson", "Adams", "Lee", "Cooper", "Mitchell", "Green",
    "Ricci", "Martinez", "Brown", "Moore", "Jackson",
];
const BUSINESS_PREFIX: &[&str] = &[
    "Atlantic", "Quick Heal", "Summit", "Elite", "Northside", "Harbor", "Keystone", "City",
    "Valley", "Metro", "Precision", "Global", "Progressive", "Premier", "United", "National",
    "Regional", "Central", "Coastal", "Mountain",
];
const BUSINESS_SUFFIX: &[&str] = &[
    "Medical Group", "Physical Therapy", "Construction LLC", "Diagnostics Center", "Medical Plaza",
    "Orthopedic Clinic", "Logistics Inc", "Shipping Services", "Wellness Center", "Care Center",
    "Health Services", "Solutions LLC",
];
const INJURIES: &[&str] = &[
    "back strain", "shoulder injury", "knee injury", "repetitive stress injury", "slip and fall",
    "lifting injury", "carpal tunnel syndrome", "neck strain", "ankle sprain", "wrist fracture",
    "chemical exposure", "hearing loss", "rotator cuff tear", "herniated disc",
];
const NOTE_TEMPLATES: &[&str] = &[
    "{claimant} reported {injury} at {business}. Treated by {doctor}. Counsel: {lawyer}.",
    "Incident at {business} involving {claimant}. {doctor} completed the medical evaluation; attorney {lawyer} is reviewing.",
    "{doctor} treated {claimant} for {injury} sustained at {business}. {lawyer} handles the legal side.",
    "Claim opened: {claimant} injured at {business}. {doctor} ordered imaging. {lawyer} represents the claimant.",
    "{claimant} sustained {injury}. First treatment at the {business} site by {doctor}. {lawyer} filed proceedings.",
    "Comp case for {claimant} at {business}. Provider: {doctor}. Legal counsel: {lawyer}.",
];

const FRAUD_INCURRED: (u32, u32) = (25_000, 75_000);
const NORMAL_INCURRED: (u32, u32) = (2_000, 18_000);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DatasetPreset {
    #[default]
    Demo,
    ClientPresentation,
    Production,
    StressTest,
}

impl DatasetPreset {
    pub fn config(&self, seed: u64) -> GeneratorConfig {
        let (doctors, lawyers, businesses, claimants, claims) = match self {
            DatasetPreset::Demo => (10, 6, 12, 12, 25),
            DatasetPreset::ClientPresentation => (25, 18, 35, 70, 200),
            DatasetPreset::Production => (50, 40, 80, 200, 500),
            DatasetPreset::StressTest => (100, 80, 150, 400, 1000),
        };
        GeneratorConfig {
            doctors,
            lawyers,
            businesses,
            claimants,
            claims,
            fraud_ratio: 0.35,
            seed,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DatasetPreset::Demo => "Small demo network (40 entities, 25 claims)",
            DatasetPreset::ClientPresentation => "Presentation network (148 entities, 200 claims)",
            DatasetPreset::Production => "Production-scale network (370 entities, 500 claims)",
            DatasetPreset::StressTest => "Stress test (730 entities, 1000 claims)",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub doctors: usize,
    pub lawyers: usize,
    pub businesses: usize,
    pub claimants: usize,
    pub claims: usize,
    /// Share of entities placed on the fraud list.
    pub fraud_ratio: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        DatasetPreset::Demo.config(42)
    }
}

/// Builds a workers-compensation style corpus from name pools and note
/// templates. Same config and seed always produce the same corpus.
pub struct CorpusGenerator {
    config: GeneratorConfig,
}

impl CorpusGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn generate(&self) -> Corpus {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let fraud_ratio = self.config.fraud_ratio.clamp(0.0, 1.0);
        let mut used = HashSet::new();
        let mut entities = Vec::new();

        for i in 0..self.config.doctors {
            let base = format!(
                "Dr. {} {}",
                DOCTOR_FIRST[i % DOCTOR_FIRST.len()],
                DOCTOR_LAST[i % DOCTOR_LAST.len()]
            );
            entities.push(
                Entity::new(unique_name(base, &mut used), EntityType::Doctor)
                    .with_fraud(rng.gen_bool(fraud_ratio)),
            );
        }
        for i in 0..self.config.lawyers {
            let base = person_name(i);
            entities.push(
                Entity::new(unique_name(base, &mut used), EntityType::Lawyer)
                    .with_fraud(rng.gen_bool(fraud_ratio)),
            );
        }
        for i in 0..self.config.businesses {
            let base = format!(
                "{} {}",
                BUSINESS_PREFIX[i % BUSINESS_PREFIX.len()],
                BUSINESS_SUFFIX[i % BUSINESS_SUFFIX.len()]
            );
            entities.push(
                Entity::new(unique_name(base, &mut used), EntityType::Business)
                    .with_fraud(rng.gen_bool(fraud_ratio)),
            );
        }
        for i in 0..self.config.claimants {
            // Offset so claimants do not start on the same names as lawyers.
            let base = person_name(i + self.config.lawyers);
            let entity_type = if i % 3 == 0 {
                EntityType::Driver
            } else {
                EntityType::RegularPerson
            };
            entities.push(
                Entity::new(unique_name(base, &mut used), entity_type)
                    .with_fraud(rng.gen_bool(fraud_ratio)),
            );
        }

        let by_type = |wanted: &[EntityType]| -> Vec<&Entity> {
            entities
                .iter()
                .filter(|e| wanted.contains(&e.entity_type))
                .collect()
        };
        let doctors = by_type(&[EntityType::Doctor]);
        let lawyers = by_type(&[EntityType::Lawyer]);
        let businesses = by_type(&[EntityType::Business]);
        let claimants = by_type(&[EntityType::RegularPerson, EntityType::Driver]);

        let mut claims = Vec::with_capacity(self.config.claims);
        let mut note_counter = 1;
        for idx in 0..self.config.claims {
            let mut claim = Claim::new(format!("WC-2024-{:04}", idx + 1), 0.0);
            let note_count = rng.gen_range(1..=3);

            for _ in 0..note_count {
                let picks = [
                    ("{claimant}", claimants.choose(&mut rng)),
                    ("{doctor}", doctors.choose(&mut rng)),
                    ("{lawyer}", lawyers.choose(&mut rng)),
                    ("{business}", businesses.choose(&mut rng)),
                ];
                let injury = INJURIES.choose(&mut rng).copied().unwrap_or("injury");
                let template = NOTE_TEMPLATES.choose(&mut rng).copied().unwrap_or(NOTE_TEMPLATES[0]);

                let mut text = template.replace("{injury}", injury);
                for (placeholder, pick) in picks {
                    let name = match pick {
                        Some(entity) => {
                            claim.entities.insert(entity.name.clone());
                            entity.name.as_str()
                        }
                        None => "an unnamed party",
                    };
                    text = text.replace(placeholder, name);
                }

                claim = claim.with_note(format!("N{:05}", note_counter), text);
                note_counter += 1;
            }

            let has_fraud = claim
                .entities
                .iter()
                .any(|name| entities.iter().any(|e| &e.name == name && e.confirmed_fraud));
            let (low, high) = if has_fraud { FRAUD_INCURRED } else { NORMAL_INCURRED };
            claim.total_incurred = f64::from(rng.gen_range(low..high));

            claims.push(claim);
        }

        info!(
            entities = entities.len(),
            claims = claims.len(),
            seed = self.config.seed,
            "Generated synthetic corpus"
        );

        Corpus::new(entities, claims)
    }
}

fn person_name(i: usize) -> String {
    format!(
        "{} {}",
        PERSON_FIRST[i % PERSON_FIRST.len()],
        PERSON_LAST[(i / PERSON_FIRST.len() + i) % PERSON_LAST.len()]
    )
}

fn unique_name(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{} {}", base, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
