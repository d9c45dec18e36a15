use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InvestigationStatus {
    #[default]
    #[serde(rename = "Not Reviewed")]
    NotReviewed,
    #[serde(rename = "Under Investigation")]
    UnderInvestigation,
    #[serde(rename = "Bad Actor")]
    BadActor,
    Cleared,
}

impl InvestigationStatus {
    pub const ALL: [InvestigationStatus; 4] = [
        InvestigationStatus::NotReviewed,
        InvestigationStatus::UnderInvestigation,
        InvestigationStatus::BadActor,
        InvestigationStatus::Cleared,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvestigationStatus::NotReviewed => "Not Reviewed",
            InvestigationStatus::UnderInvestigation => "Under Investigation",
            InvestigationStatus::BadActor => "Bad Actor",
            InvestigationStatus::Cleared => "Cleared",
        }
    }
}

impl fmt::Display for InvestigationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvestigationStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| EngineError::InvalidStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub entity: String,
    pub status: InvestigationStatus,
    pub recorded_at: DateTime<Utc>,
}

/// Investigation status history, owned outside the pipeline.
pub trait StatusStore: Send + Sync {
    fn latest(&self, entity: &str) -> Option<InvestigationStatus>;

    fn all_latest(&self) -> HashMap<String, InvestigationStatus>;

    /// Newest first.
    fn history(&self, entity: &str) -> Vec<StatusRecord>;

    fn append(&self, entity: &str, status: InvestigationStatus) -> StatusRecord;

    /// Give every entity without history a `Not Reviewed` record, atomically
    /// with respect to `append`. Returns how many were initialised.
    fn initialize<'a>(&self, entities: &mut dyn Iterator<Item = &'a str>) -> usize;
}

/// Append-only in-memory history. Appends are serialized through one writer
/// lock so timestamps never go backwards; each entity's history is published
/// as an immutable `Arc` so readers never take the writer lock.
#[derive(Default)]
pub struct InMemoryStatusStore {
    writer: Mutex<Option<DateTime<Utc>>>,
    histories: DashMap<String, Arc<Vec<StatusRecord>>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caller holds the writer lock, passed in as `last`.
    fn push(&self, last: &mut Option<DateTime<Utc>>, entity: &str, status: InvestigationStatus) -> StatusRecord {
        let now = Utc::now();
        let recorded_at = match *last {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        *last = Some(recorded_at);

        let record = StatusRecord {
            entity: entity.to_string(),
            status,
            recorded_at,
        };
        let mut next = self
            .histories
            .get(entity)
            .map(|h| h.as_ref().clone())
            .unwrap_or_default();
        next.push(record.clone());
        self.histories.insert(entity.to_string(), Arc::new(next));
        record
    }
}

impl StatusStore for InMemoryStatusStore {
    fn latest(&self, entity: &str) -> Option<InvestigationStatus> {
        self.histories
            .get(entity)
            .and_then(|h| h.last().map(|r| r.status))
    }

    fn all_latest(&self) -> HashMap<String, InvestigationStatus> {
        self.histories
            .iter()
            .filter_map(|entry| entry.value().last().map(|r| (entry.key().clone(), r.status)))
            .collect()
    }

    fn history(&self, entity: &str) -> Vec<StatusRecord> {
        let Some(history) = self.histories.get(entity).map(|h| Arc::clone(h.value())) else {
            return Vec::new();
        };
        history.iter().rev().cloned().collect()
    }

    fn append(&self, entity: &str, status: InvestigationStatus) -> StatusRecord {
        let mut last = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let record = self.push(&mut last, entity, status);
        info!(entity, status = %status, "Recorded investigation status");
        record
    }

    fn initialize<'a>(&self, entities: &mut dyn Iterator<Item = &'a str>) -> usize {
        let mut last = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut added = 0;
        for entity in entities {
            if !self.histories.contains_key(entity) {
                self.push(&mut last, entity, InvestigationStatus::NotReviewed);
                added += 1;
            }
        }
        if added > 0 {
            info!(added, "Initialised investigation statuses");
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!("Bad Actor".parse::<InvestigationStatus>().unwrap(), InvestigationStatus::BadActor);
        assert!(matches!(
            "Suspicious".parse::<InvestigationStatus>(),
            Err(EngineError::InvalidStatus(s)) if s == "Suspicious"
        ));
        assert_eq!(
            serde_json::to_string(&InvestigationStatus::UnderInvestigation).unwrap(),
            "\"Under Investigation\""
        );
    }

    #[test]
    fn test_history_is_newest_first() {
        let store = InMemoryStatusStore::new();
        store.append("Dr. A", InvestigationStatus::NotReviewed);
        store.append("Dr. A", InvestigationStatus::UnderInvestigation);
        store.append("Dr. A", InvestigationStatus::BadActor);

        let history = store.history("Dr. A");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].status, InvestigationStatus::BadActor);
        assert!(history.windows(2).all(|w| w[0].recorded_at >= w[1].recorded_at));
        assert_eq!(store.latest("Dr. A"), Some(InvestigationStatus::BadActor));
        assert!(store.history("Nobody").is_empty());
    }

    #[test]
    fn test_initialize_only_fills_gaps() {
        let store = InMemoryStatusStore::new();
        store.append("A", InvestigationStatus::Cleared);

        let added = store.initialize(&mut ["A", "B", "C"].into_iter());
        assert_eq!(added, 2);
        assert_eq!(store.latest("A"), Some(InvestigationStatus::Cleared));
        assert_eq!(store.latest("B"), Some(InvestigationStatus::NotReviewed));
        assert_eq!(store.all_latest().len(), 3);
    }

    #[test]
    fn test_concurrent_appends_keep_every_record() {
        let store = Arc::new(InMemoryStatusStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.append("Shared", InvestigationStatus::UnderInvestigation);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.history("Shared").len(), 200);
    }

    #[test]
    fn test_initialize_never_overtakes_a_recorded_status() {
        let entities: Vec<String> = (0..50).map(|i| format!("E{}", i)).collect();
        for _ in 0..20 {
            let store = Arc::new(InMemoryStatusStore::new());
            let writer = {
                let store = Arc::clone(&store);
                let entities = entities.clone();
                std::thread::spawn(move || {
                    for entity in &entities {
                        store.append(entity, InvestigationStatus::BadActor);
                    }
                })
            };
            let initializer = {
                let store = Arc::clone(&store);
                let entities = entities.clone();
                std::thread::spawn(move || store.initialize(&mut entities.iter().map(String::as_str)))
            };
            writer.join().unwrap();
            initializer.join().unwrap();

            for entity in &entities {
                assert_eq!(store.latest(entity), Some(InvestigationStatus::BadActor));
                let history = store.history(entity);
                assert!(history.len() <= 2);
                assert!(history.windows(2).all(|w| w[0].recorded_at >= w[1].recorded_at));
            }
        }
    }
}
