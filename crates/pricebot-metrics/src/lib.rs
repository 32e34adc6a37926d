//! Pricebot - Metrics
//!
//! Internal metrics collection for observability.
//!
//! # Overview
//!
//! This crate provides:
//! - Atomic metric counters for the ingestion pipeline and job runner
//! - Per-(client, chat) counters for WhatsApp intake and extraction
//! - A bounded ring buffer of recent intake failures for `/metrics`
//!
//! # Design Principles
//!
//! - **Lock-free counters**: pipeline totals use atomic operations
//! - **Low overhead**: no allocations during metric updates on the hot path
//! - **Snapshot-based reads**: `/metrics` serializes point-in-time copies,
//!   never holding locks across I/O

mod ingest;
mod whatsapp;

pub use ingest::{IngestMetrics, IngestSnapshot};
pub use whatsapp::{
    FailureEvent, WhatsAppCounterSnapshot, WhatsAppMetrics, WhatsAppTotals,
};

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter wrapper for convenient metric operations
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Create a new counter initialized to 0
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increment the counter by `val` (relaxed ordering for performance)
    #[inline]
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Increment the counter by 1
    #[inline]
    pub fn inc(&self) {
        self.add(1);
    }

    /// Get the current value (relaxed ordering)
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_basics() {
        let counter = Counter::new();
        assert_eq!(counter.get(), 0);
        counter.inc();
        counter.add(4);
        assert_eq!(counter.get(), 5);
    }
}
