use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

use crate::model::{Priority, RuleTrigger};

struct RuleTemplate {
    rule_no: u32,
    rule_desc: &'static str,
    priority: Priority,
    value: f64,
}

const RULE_TEMPLATES: &[RuleTemplate] = &[
    RuleTemplate {
        rule_no: 5,
        rule_desc: "Any law enforcement inquiry regarding the validity of any part of the claim",
        priority: Priority::High,
        value: 9.0,
    },
    RuleTemplate {
        rule_no: 7,
        rule_desc: "A surveillance or tip reveals the totally disabled worker is currently employed elsewhere",
        priority: Priority::High,
        value: 10.0,
    },
    RuleTemplate {
        rule_no: 10,
        rule_desc: "Any false statement, willfully made with the intent to deceive",
        priority: Priority::High,
        value: 8.0,
    },
    RuleTemplate {
        rule_no: 26,
        rule_desc: "Multiple providers billing for same service on same date",
        priority: Priority::Medium,
        value: 6.0,
    },
    RuleTemplate {
        rule_no: 37,
        rule_desc: "Claimant history shows pattern of similar claims across multiple employers",
        priority: Priority::Medium,
        value: 7.0,
    },
    RuleTemplate {
        rule_no: 75,
        rule_desc: "Medical treatment inconsistent with documented injury severity",
        priority: Priority::Low,
        value: 4.0,
    },
];

const FRAUD_SCORE: (f64, f64) = (0.7, 0.95);
const NORMAL_SCORE: (f64, f64) = (0.1, 0.5);

/// Plausible stand-in signals for runs without external files.
///
/// Claims carrying a confirmed-fraud entity draw high scores and two to four
/// rules; the rest draw low scores and at most one rule. Output depends only
/// on the seed and the claim table.
pub struct SignalSimulator {
    seed: u64,
}

impl SignalSimulator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// `claims` maps claim number to whether a confirmed-fraud entity is on it.
    pub fn scores(&self, claims: &BTreeMap<String, bool>) -> BTreeMap<String, f64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        claims
            .iter()
            .map(|(claim_number, &has_fraud)| {
                let (low, high) = if has_fraud { FRAUD_SCORE } else { NORMAL_SCORE };
                (claim_number.clone(), rng.gen_range(low..high))
            })
            .collect()
    }

    pub fn rules(&self, claims: &BTreeMap<String, bool>) -> Vec<RuleTrigger> {
        // separate stream so the rule draw does not depend on whether scores were simulated
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));
        let mut triggers = Vec::new();

        for (claim_number, &has_fraud) in claims {
            let count = if has_fraud {
                rng.gen_range(2..5)
            } else {
                rng.gen_range(0..2)
            };
            let mut picked: Vec<&RuleTemplate> = RULE_TEMPLATES
                .choose_multiple(&mut rng, count.min(RULE_TEMPLATES.len()))
                .collect();
            picked.sort_by_key(|t| t.rule_no);

            triggers.extend(picked.into_iter().map(|t| RuleTrigger {
                claim_number: claim_number.clone(),
                rule_no: t.rule_no,
                rule_desc: t.rule_desc.to_string(),
                priority: t.priority,
                value: t.value,
            }));
        }

        triggers
    }
}
