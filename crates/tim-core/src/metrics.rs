//! Atomic counters for one memory instance.
//!
//! Counters are incremented silently at the call site. Call
//! [`MemoryMetrics::flush`] to emit current values as a single
//! `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lightweight atomic counters; no allocations, no locking.
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    inserts: AtomicU64,
    duplicate_inserts: AtomicU64,
    recalls: AtomicU64,
    organizes: AtomicU64,
    thoughts_forgotten: AtomicU64,
    thoughts_merged_away: AtomicU64,
    collaborator_failures: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub inserts: u64,
    pub duplicate_inserts: u64,
    pub recalls: u64,
    pub organizes: u64,
    pub thoughts_forgotten: u64,
    pub thoughts_merged_away: u64,
    pub collaborator_failures: u64,
}

impl MemoryMetrics {
    pub const fn new() -> Self {
        Self {
            inserts: AtomicU64::new(0),
            duplicate_inserts: AtomicU64::new(0),
            recalls: AtomicU64::new(0),
            organizes: AtomicU64::new(0),
            thoughts_forgotten: AtomicU64::new(0),
            thoughts_merged_away: AtomicU64::new(0),
            collaborator_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_inserts(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "inserts", "counter incremented");
    }

    pub fn inc_duplicate_inserts(&self) {
        self.duplicate_inserts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "duplicate_inserts", "counter incremented");
    }

    pub fn inc_recalls(&self) {
        self.recalls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "recalls", "counter incremented");
    }

    pub fn inc_organizes(&self) {
        self.organizes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "organizes", "counter incremented");
    }

    pub fn add_forgotten(&self, n: u64) {
        self.thoughts_forgotten.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_merged_away(&self, n: u64) {
        self.thoughts_merged_away.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_collaborator_failures(&self) {
        self.collaborator_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "collaborator_failures", "counter incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            duplicate_inserts: self.duplicate_inserts.load(Ordering::Relaxed),
            recalls: self.recalls.load(Ordering::Relaxed),
            organizes: self.organizes.load(Ordering::Relaxed),
            thoughts_forgotten: self.thoughts_forgotten.load(Ordering::Relaxed),
            thoughts_merged_away: self.thoughts_merged_away.load(Ordering::Relaxed),
            collaborator_failures: self.collaborator_failures.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            inserts = s.inserts,
            duplicate_inserts = s.duplicate_inserts,
            recalls = s.recalls,
            organizes = s.organizes,
            thoughts_forgotten = s.thoughts_forgotten,
            thoughts_merged_away = s.thoughts_merged_away,
            collaborator_failures = s.collaborator_failures,
        );
    }
}
