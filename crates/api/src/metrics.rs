use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Requests
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Reloads
    reloads_started: AtomicUsize,
    reloads_succeeded: AtomicUsize,
    reloads_failed: AtomicUsize,
    reloads_rejected: AtomicUsize,

    // Timing (in microseconds)
    total_reload_time_us: AtomicU64,
    last_reload_time_us: AtomicU64,
}

/// How a reload attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Succeeded,
    Failed,
    Rejected,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            reloads_started: AtomicUsize::new(0),
            reloads_succeeded: AtomicUsize::new(0),
            reloads_failed: AtomicUsize::new(0),
            reloads_rejected: AtomicUsize::new(0),
            total_reload_time_us: AtomicU64::new(0),
            last_reload_time_us: AtomicU64::new(0),
        })
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_reload(&self, outcome: ReloadOutcome, duration: Duration) {
        self.reloads_started.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            ReloadOutcome::Succeeded => &self.reloads_succeeded,
            ReloadOutcome::Failed => &self.reloads_failed,
            ReloadOutcome::Rejected => &self.reloads_rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if outcome == ReloadOutcome::Succeeded {
            let us = duration.as_micros() as u64;
            self.total_reload_time_us.fetch_add(us, Ordering::Relaxed);
            self.last_reload_time_us.store(us, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self, live_entities: usize, live_communities: usize) -> MetricsSnapshot {
        let succeeded = self.reloads_succeeded.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            reloads_started: self.reloads_started.load(Ordering::Relaxed),
            reloads_succeeded: succeeded,
            reloads_failed: self.reloads_failed.load(Ordering::Relaxed),
            reloads_rejected: self.reloads_rejected.load(Ordering::Relaxed),
            avg_reload_time_ms: avg_time_ms(&self.total_reload_time_us, succeeded),
            last_reload_time_ms: self.last_reload_time_us.load(Ordering::Relaxed) as f64 / 1000.0,
            live_entities,
            live_communities,
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: usize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    if count > 0 {
        total / count as f64 / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub reloads_started: usize,
    pub reloads_succeeded: usize,
    pub reloads_failed: usize,
    pub reloads_rejected: usize,
    pub avg_reload_time_ms: f64,
    pub last_reload_time_ms: f64,
    pub live_entities: usize,
    pub live_communities: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
