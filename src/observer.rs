//! Progress notifications from the archive loop
//!
//! The archiver never prints. It reports what it is doing to an
//! [`ArchiveObserver`]; the CLI renders progress bars from these events and
//! the library default turns them into tracing events.

use tracing::{info, warn};

use crate::models::{AggregateResult, BatchOutcome, RoundResult};

/// Position of a batch within its round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPosition {
    /// 1-based batch number
    pub number: usize,
    pub total: usize,
}

/// Receives progress events; every method defaults to doing nothing
pub trait ArchiveObserver: Send + Sync {
    /// A round is about to enumerate the inbox
    fn round_started(&self, _round: u32, _inbox_estimate: u32) {}

    /// Another page of ids arrived; `total_so_far` includes it
    fn ids_fetched(&self, _total_so_far: usize) {}

    /// Enumeration finished with `count` ids
    fn enumeration_finished(&self, _round: u32, _count: usize) {}

    /// One chunk was archived, simulated or failed
    fn batch_finished(&self, _position: BatchPosition, _outcome: &BatchOutcome) {}

    /// Counters for the round are final
    fn round_finished(&self, _round: u32, _result: &RoundResult) {}

    /// Inbox estimate re-measured after a live round settled
    fn round_settled(&self, _round: u32, _before: u32, _after: u32) {}

    /// The loop ended
    fn run_finished(&self, _total: &AggregateResult) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ArchiveObserver for NoopObserver {}

/// Observer that logs progress through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ArchiveObserver for TracingObserver {
    fn round_started(&self, round: u32, inbox_estimate: u32) {
        info!(round, inbox_estimate, "Starting round");
    }

    fn ids_fetched(&self, total_so_far: usize) {
        info!("Found {} messages so far...", total_so_far);
    }

    fn enumeration_finished(&self, round: u32, count: usize) {
        if count == 0 {
            info!(round, "No more emails found in inbox");
        } else {
            info!(round, "Found {} emails to archive in this round", count);
        }
    }

    fn batch_finished(&self, position: BatchPosition, outcome: &BatchOutcome) {
        match outcome {
            BatchOutcome::Archived { size } => info!(
                "Archived {} messages (batch {}/{})",
                size, position.number, position.total
            ),
            BatchOutcome::Simulated { size } => info!(
                "[DRY RUN] Would archive {} messages (batch {}/{})",
                size, position.number, position.total
            ),
            BatchOutcome::Failed { size, error } => warn!(
                "Failed to archive batch {}/{} ({} messages): {}",
                position.number, position.total, size, error
            ),
        }
    }

    fn round_finished(&self, round: u32, result: &RoundResult) {
        info!(
            round,
            success = result.success,
            failed = result.failed,
            "Round complete"
        );
    }

    fn round_settled(&self, round: u32, before: u32, after: u32) {
        info!(
            round,
            before,
            after,
            "Inbox estimate moved by {}",
            i64::from(before) - i64::from(after)
        );
    }

    fn run_finished(&self, total: &AggregateResult) {
        info!(
            rounds = total.rounds,
            success = total.success,
            failed = total.failed,
            "Archiving process complete"
        );
    }
}
