use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;

use crate::error::GmailError;

/// Opaque Gmail message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One page of a `messages.list` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub ids: Vec<MessageId>,
    pub next_page_token: Option<String>,
    pub result_size_estimate: u32,
}

/// What happened to one chunk of ids
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// The batch modify call succeeded
    Archived { size: usize },
    /// Dry run: counted as archived, no call issued
    Simulated { size: usize },
    /// The call failed; the ids stay in the inbox for a later run
    Failed { size: usize, error: GmailError },
}

impl BatchOutcome {
    pub fn size(&self) -> usize {
        match self {
            BatchOutcome::Archived { size }
            | BatchOutcome::Simulated { size }
            | BatchOutcome::Failed { size, .. } => *size,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, BatchOutcome::Failed { .. })
    }
}

/// Counters for one archiving round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub success: usize,
    pub failed: usize,
}

impl RoundResult {
    /// Fold one batch outcome into the counters
    pub fn record(&mut self, outcome: &BatchOutcome) {
        if outcome.is_failure() {
            self.failed += outcome.size();
        } else {
            self.success += outcome.size();
        }
    }

    /// True when the round archived nothing at all
    pub fn made_no_progress(&self) -> bool {
        self.success == 0
    }
}

/// Totals across every round of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub success: usize,
    pub failed: usize,
    /// Rounds started, including a final round that found the inbox empty
    pub rounds: u32,
}

impl AddAssign<RoundResult> for AggregateResult {
    fn add_assign(&mut self, round: RoundResult) {
        self.success += round.success;
        self.failed += round.failed;
    }
}
