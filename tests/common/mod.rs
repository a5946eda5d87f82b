//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use gmail_inbox_archiver::auth::Authenticator;
use gmail_inbox_archiver::client::GmailClient;
use gmail_inbox_archiver::error::{ArchiveError, GmailError, Result};
use gmail_inbox_archiver::models::{AggregateResult, BatchOutcome, ListPage, MessageId, RoundResult};
use gmail_inbox_archiver::observer::{ArchiveObserver, BatchPosition};
use gmail_inbox_archiver::pacing::Pacer;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Generate `count` message ids of the form `msg_00000`
pub fn message_ids(count: usize) -> Vec<MessageId> {
    (0..count)
        .map(|i| MessageId::new(format!("msg_{:05}", i)))
        .collect()
}

/// One recorded `batch_modify` call
#[derive(Debug, Clone, PartialEq)]
pub struct ModifyCall {
    pub ids: Vec<MessageId>,
    pub remove_label_ids: Vec<String>,
}

#[derive(Default)]
struct InboxState {
    inbox: Vec<MessageId>,
    modify_calls: Vec<ModifyCall>,
    list_calls: usize,
    /// Scripted results for successive batch_modify calls; Ok once empty
    modify_script: VecDeque<Option<GmailError>>,
    fail_listing: Option<GmailError>,
}

/// In-memory Gmail inbox
///
/// Pages with offset tokens, reports the current size as the estimate and
/// removes ids from the inbox when a `batch_modify` call succeeds.
#[derive(Clone, Default)]
pub struct FakeInbox {
    state: Arc<Mutex<InboxState>>,
}

impl FakeInbox {
    pub fn with_messages(count: usize) -> Self {
        let inbox = Self::default();
        inbox.state.lock().unwrap().inbox = message_ids(count);
        inbox
    }

    /// Queue a failure for the next unscripted batch_modify call
    pub fn fail_next_modify(&self, error: GmailError) {
        self.state
            .lock()
            .unwrap()
            .modify_script
            .push_back(Some(error));
    }

    /// Queue a success, so later scripted failures hit later calls
    pub fn succeed_next_modify(&self) {
        self.state.lock().unwrap().modify_script.push_back(None);
    }

    /// Every batch_modify call fails with a server error
    pub fn fail_all_modifies(&self, calls: usize) {
        for _ in 0..calls {
            self.fail_next_modify(GmailError::ServerError {
                status: 500,
                message: "backend error".to_string(),
            });
        }
    }

    /// Make every list call fail
    pub fn fail_listing(&self, error: GmailError) {
        self.state.lock().unwrap().fail_listing = Some(error);
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().unwrap().inbox.len()
    }

    pub fn modify_calls(&self) -> Vec<ModifyCall> {
        self.state.lock().unwrap().modify_calls.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }
}

#[async_trait]
impl GmailClient for FakeInbox {
    async fn list_messages(
        &self,
        _query: &str,
        page_token: Option<String>,
        max_results: u32,
    ) -> Result<ListPage> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;

        if let Some(error) = state.fail_listing.clone() {
            return Err(error);
        }

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| GmailError::BadRequest(format!("bad page token {}", token)))?,
            None => 0,
        };
        let end = (offset + max_results as usize).min(state.inbox.len());
        let ids = state.inbox.get(offset..end).unwrap_or_default().to_vec();
        let next_page_token = (end < state.inbox.len()).then(|| end.to_string());

        Ok(ListPage {
            ids,
            next_page_token,
            result_size_estimate: state.inbox.len() as u32,
        })
    }

    async fn batch_modify(
        &self,
        message_ids: &[MessageId],
        remove_label_ids: &[String],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.modify_calls.push(ModifyCall {
            ids: message_ids.to_vec(),
            remove_label_ids: remove_label_ids.to_vec(),
        });

        if let Some(Some(error)) = state.modify_script.pop_front() {
            return Err(error);
        }

        state.inbox.retain(|id| !message_ids.contains(id));
        Ok(())
    }
}

/// Authenticator handing out a prepared client, or failing
pub struct FakeAuthenticator {
    client: Option<FakeInbox>,
}

impl FakeAuthenticator {
    pub fn succeeding(client: FakeInbox) -> Self {
        Self {
            client: Some(client),
        }
    }

    pub fn failing() -> Self {
        Self { client: None }
    }
}

#[async_trait]
impl Authenticator for FakeAuthenticator {
    type Client = FakeInbox;

    async fn connect(&self) -> std::result::Result<FakeInbox, ArchiveError> {
        self.client
            .clone()
            .ok_or_else(|| ArchiveError::Authentication("consent denied".to_string()))
    }
}

/// Pacer that records requested delays instead of sleeping
#[derive(Clone, Default)]
pub struct RecordingPacer {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingPacer {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn wait(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

/// Observer events, flattened for assertions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RoundStarted(u32),
    EnumerationFinished(u32, usize),
    Batch { number: usize, total: usize, size: usize, failed: bool },
    RoundFinished(u32, RoundResult),
    RoundSettled(u32),
    RunFinished(AggregateResult),
}

#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl ArchiveObserver for RecordingObserver {
    fn round_started(&self, round: u32, _inbox_estimate: u32) {
        self.push(Event::RoundStarted(round));
    }

    fn enumeration_finished(&self, round: u32, count: usize) {
        self.push(Event::EnumerationFinished(round, count));
    }

    fn batch_finished(&self, position: BatchPosition, outcome: &BatchOutcome) {
        self.push(Event::Batch {
            number: position.number,
            total: position.total,
            size: outcome.size(),
            failed: outcome.is_failure(),
        });
    }

    fn round_finished(&self, round: u32, result: &RoundResult) {
        self.push(Event::RoundFinished(round, *result));
    }

    fn round_settled(&self, round: u32, _before: u32, _after: u32) {
        self.push(Event::RoundSettled(round));
    }

    fn run_finished(&self, total: &AggregateResult) {
        self.push(Event::RunFinished(*total));
    }
}
