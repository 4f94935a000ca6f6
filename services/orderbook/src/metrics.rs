//! Operation counters and latency tracking for the book
//!
//! Counters are relaxed atomics; latencies go into an HDR histogram with
//! nanosecond resolution.

use crate::core::Side;
use book_common::Amount;
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for book operations
pub struct BookMetrics {
    bids_placed: AtomicU64,
    asks_placed: AtomicU64,
    bids_cancelled: AtomicU64,
    asks_cancelled: AtomicU64,
    rejected: AtomicU64,
    /// Total fee withheld across all placements
    fees_retained: Mutex<Amount>,
    latency: LatencyTracker,
}

impl Default for BookMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BookMetrics {
    /// Create a zeroed metrics tracker
    #[must_use]
    pub fn new() -> Self {
        Self {
            bids_placed: AtomicU64::new(0),
            asks_placed: AtomicU64::new(0),
            bids_cancelled: AtomicU64::new(0),
            asks_cancelled: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            fees_retained: Mutex::new(Amount::ZERO),
            latency: LatencyTracker::new(),
        }
    }

    /// Record a successful placement
    #[inline]
    pub fn record_placement(&self, side: Side, fee: Amount, latency_ns: u64) {
        match side {
            Side::Bid => self.bids_placed.fetch_add(1, Ordering::Relaxed),
            Side::Ask => self.asks_placed.fetch_add(1, Ordering::Relaxed),
        };
        {
            let mut fees = self.fees_retained.lock();
            *fees = fees.saturating_add(fee);
        }
        self.latency.record(latency_ns);
    }

    /// Record a successful cancellation
    #[inline]
    pub fn record_cancel(&self, side: Side, latency_ns: u64) {
        match side {
            Side::Bid => self.bids_cancelled.fetch_add(1, Ordering::Relaxed),
            Side::Ask => self.asks_cancelled.fetch_add(1, Ordering::Relaxed),
        };
        self.latency.record(latency_ns);
    }

    /// Record a rejected operation
    #[inline]
    pub fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency = self.latency.stats();
        MetricsSnapshot {
            bids_placed: self.bids_placed.load(Ordering::Relaxed),
            asks_placed: self.asks_placed.load(Ordering::Relaxed),
            bids_cancelled: self.bids_cancelled.load(Ordering::Relaxed),
            asks_cancelled: self.asks_cancelled.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            fees_retained: *self.fees_retained.lock(),
            samples: latency.samples,
            p50_latency_ns: latency.p50,
            p99_latency_ns: latency.p99,
            max_latency_ns: latency.max,
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        self.bids_placed.store(0, Ordering::Relaxed);
        self.asks_placed.store(0, Ordering::Relaxed);
        self.bids_cancelled.store(0, Ordering::Relaxed);
        self.asks_cancelled.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        *self.fees_retained.lock() = Amount::ZERO;
        self.latency.reset();
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Bids placed
    pub bids_placed: u64,
    /// Asks placed
    pub asks_placed: u64,
    /// Bids cancelled
    pub bids_cancelled: u64,
    /// Asks cancelled
    pub asks_cancelled: u64,
    /// Operations rejected with an error
    pub rejected: u64,
    /// Total fee withheld
    pub fees_retained: Amount,
    /// Latency samples recorded
    pub samples: u64,
    /// Median latency
    pub p50_latency_ns: u64,
    /// 99th percentile latency
    pub p99_latency_ns: u64,
    /// Worst latency
    pub max_latency_ns: u64,
}

impl MetricsSnapshot {
    /// Placements on both sides
    #[must_use]
    pub fn total_placed(&self) -> u64 {
        self.bids_placed + self.asks_placed
    }

    /// Cancellations on both sides
    #[must_use]
    pub fn total_cancelled(&self) -> u64 {
        self.bids_cancelled + self.asks_cancelled
    }
}

#[derive(Debug, Default)]
struct LatencyStats {
    samples: u64,
    p50: u64,
    p99: u64,
    max: u64,
}

/// Latency histogram shared by all mutating operations
struct LatencyTracker {
    // None only if the histogram could not be allocated
    histogram: Mutex<Option<Histogram<u64>>>,
}

impl LatencyTracker {
    fn new() -> Self {
        // 3 significant figures: microsecond accuracy up to ~1 hour
        Self {
            histogram: Mutex::new(Histogram::new(3).ok()),
        }
    }

    fn record(&self, latency_ns: u64) {
        if let Some(histogram) = self.histogram.lock().as_mut() {
            histogram.saturating_record(latency_ns);
        }
    }

    fn stats(&self) -> LatencyStats {
        match self.histogram.lock().as_ref() {
            Some(histogram) if !histogram.is_empty() => LatencyStats {
                samples: histogram.len(),
                p50: histogram.value_at_quantile(0.50),
                p99: histogram.value_at_quantile(0.99),
                max: histogram.max(),
            },
            _ => LatencyStats::default(),
        }
    }

    fn reset(&self) {
        if let Some(histogram) = self.histogram.lock().as_mut() {
            histogram.reset();
        }
    }
}
