//! Steal, queue, and timing bookkeeping.
//!
//! Every place owns a [`PlaceLogger`] of atomic counters so workers and
//! message handlers record events without taking the place lock. Counters only
//! grow during a computation; the gather phase snapshots them into plain
//! [`PlaceLog`] values that the driver folds into one [`Logger`] report.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Live counters for one place. Monotonic within a computation, reset between
/// computations.
#[derive(Debug, Default)]
pub struct PlaceLogger {
    pub random_steal_attempts: AtomicU64,
    pub random_steal_successes: AtomicU64,
    pub random_steals_received: AtomicU64,
    pub random_steals_answered: AtomicU64,
    pub lifelines_established: AtomicU64,
    pub lifeline_requests_received: AtomicU64,
    pub lifeline_steal_successes: AtomicU64,
    pub lifeline_answers: AtomicU64,
    pub intra_queue_feeds: AtomicU64,
    pub intra_queue_splits: AtomicU64,
    pub inter_queue_feeds: AtomicU64,
    pub inter_queue_splits: AtomicU64,
    pub chunks_processed: AtomicU64,
    pub workers_spawned: AtomicU64,
    pub whispers_sent: AtomicU64,
    pub whispers_received: AtomicU64,
    pub tuning_adjustments: AtomicU64,
    pub busy_ns: AtomicU64,
    pub idle_ns: AtomicU64,
}

impl PlaceLogger {
    pub fn add_busy(&self, elapsed: Duration) {
        self.busy_ns
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn add_idle(&self, elapsed: Duration) {
        self.idle_ns
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, place: usize) -> PlaceLog {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PlaceLog {
            place,
            random_steal_attempts: get(&self.random_steal_attempts),
            random_steal_successes: get(&self.random_steal_successes),
            random_steals_received: get(&self.random_steals_received),
            random_steals_answered: get(&self.random_steals_answered),
            lifelines_established: get(&self.lifelines_established),
            lifeline_requests_received: get(&self.lifeline_requests_received),
            lifeline_steal_successes: get(&self.lifeline_steal_successes),
            lifeline_answers: get(&self.lifeline_answers),
            intra_queue_feeds: get(&self.intra_queue_feeds),
            intra_queue_splits: get(&self.intra_queue_splits),
            inter_queue_feeds: get(&self.inter_queue_feeds),
            inter_queue_splits: get(&self.inter_queue_splits),
            chunks_processed: get(&self.chunks_processed),
            workers_spawned: get(&self.workers_spawned),
            whispers_sent: get(&self.whispers_sent),
            whispers_received: get(&self.whispers_received),
            tuning_adjustments: get(&self.tuning_adjustments),
            busy_ns: get(&self.busy_ns),
            idle_ns: get(&self.idle_ns),
        }
    }
}

/// Immutable per-place counter snapshot shipped during the gather phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaceLog {
    pub place: usize,
    pub random_steal_attempts: u64,
    pub random_steal_successes: u64,
    pub random_steals_received: u64,
    pub random_steals_answered: u64,
    pub lifelines_established: u64,
    pub lifeline_requests_received: u64,
    pub lifeline_steal_successes: u64,
    pub lifeline_answers: u64,
    pub intra_queue_feeds: u64,
    pub intra_queue_splits: u64,
    pub inter_queue_feeds: u64,
    pub inter_queue_splits: u64,
    pub chunks_processed: u64,
    pub workers_spawned: u64,
    pub whispers_sent: u64,
    pub whispers_received: u64,
    pub tuning_adjustments: u64,
    pub busy_ns: u64,
    pub idle_ns: u64,
}

impl PlaceLog {
    fn accumulate(&mut self, other: &PlaceLog) {
        self.random_steal_attempts += other.random_steal_attempts;
        self.random_steal_successes += other.random_steal_successes;
        self.random_steals_received += other.random_steals_received;
        self.random_steals_answered += other.random_steals_answered;
        self.lifelines_established += other.lifelines_established;
        self.lifeline_requests_received += other.lifeline_requests_received;
        self.lifeline_steal_successes += other.lifeline_steal_successes;
        self.lifeline_answers += other.lifeline_answers;
        self.intra_queue_feeds += other.intra_queue_feeds;
        self.intra_queue_splits += other.intra_queue_splits;
        self.inter_queue_feeds += other.inter_queue_feeds;
        self.inter_queue_splits += other.inter_queue_splits;
        self.chunks_processed += other.chunks_processed;
        self.workers_spawned += other.workers_spawned;
        self.whispers_sent += other.whispers_sent;
        self.whispers_received += other.whispers_received;
        self.tuning_adjustments += other.tuning_adjustments;
        self.busy_ns += other.busy_ns;
        self.idle_ns += other.idle_ns;
    }
}

/// Full report for one computation: phase timings plus every place's counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Logger {
    pub init: Duration,
    pub compute: Duration,
    pub gather: Duration,
    pub places: Vec<PlaceLog>,
}

impl Logger {
    /// Cluster-wide counter totals.
    pub fn totals(&self) -> PlaceLog {
        let mut total = PlaceLog::default();
        for log in &self.places {
            total.accumulate(log);
        }
        total
    }
}

impl fmt::Display for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "phases: init {:?}, compute {:?}, gather {:?}",
            self.init, self.compute, self.gather
        )?;
        writeln!(
            f,
            "{:<6} {:>10} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>10} {:>10}",
            "place",
            "chunks",
            "rnd-att",
            "rnd-ok",
            "life-est",
            "life-ok",
            "feeds",
            "splits",
            "busy-ms",
            "idle-ms"
        )?;
        for log in &self.places {
            writeln!(
                f,
                "{:<6} {:>10} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>10} {:>10}",
                log.place,
                log.chunks_processed,
                log.random_steal_attempts,
                log.random_steal_successes,
                log.lifelines_established,
                log.lifeline_steal_successes,
                log.intra_queue_feeds + log.inter_queue_feeds,
                log.intra_queue_splits + log.inter_queue_splits,
                log.busy_ns / 1_000_000,
                log.idle_ns / 1_000_000
            )?;
        }
        let total = self.totals();
        write!(
            f,
            "total: {} chunks, {} random steals ({} ok), {} lifelines ({} answered)",
            total.chunks_processed,
            total.random_steal_attempts,
            total.random_steal_successes,
            total.lifelines_established,
            total.lifeline_answers
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_captures_counters() {
        let logger = PlaceLogger::default();
        logger.random_steal_attempts.fetch_add(3, Ordering::Relaxed);
        logger.chunks_processed.fetch_add(7, Ordering::Relaxed);
        logger.add_busy(Duration::from_millis(2));

        let log = logger.snapshot(5);
        assert_eq!(log.place, 5);
        assert_eq!(log.random_steal_attempts, 3);
        assert_eq!(log.chunks_processed, 7);
        assert_eq!(log.busy_ns, 2_000_000);
    }

    #[test]
    fn totals_sum_across_places() {
        let mut a = PlaceLog::default();
        a.chunks_processed = 10;
        a.lifeline_answers = 2;
        let mut b = PlaceLog::default();
        b.chunks_processed = 5;
        b.lifeline_answers = 1;

        let logger = Logger {
            places: vec![a, b],
            ..Logger::default()
        };
        let total = logger.totals();
        assert_eq!(total.chunks_processed, 15);
        assert_eq!(total.lifeline_answers, 3);
    }

    #[test]
    fn report_renders() {
        let logger = Logger {
            places: vec![PlaceLog::default()],
            ..Logger::default()
        };
        let text = logger.to_string();
        assert!(text.contains("phases"));
        assert!(text.contains("total"));
    }
}
