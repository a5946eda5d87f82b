//! Inbox archiving rounds
//!
//! A run repeatedly enumerates the inbox and removes the `INBOX` label from
//! whatever it finds, in batches, until a listing comes back empty or a round
//! archives nothing. Enumeration is redone every round because the list
//! endpoint serves an estimated view and label removal is eventually
//! consistent, so one upfront fetch would miss stragglers.
//!
//! The two phases treat failures differently:
//! - listing failures abort the run ([`ArchiveError::Enumeration`]); a partial
//!   id list would silently undercount what is left
//! - batch failures are counted in [`RoundResult::failed`] and the run moves
//!   on to the next batch; whatever did get archived is real progress

use std::time::Duration;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

use crate::auth::Authenticator;
use crate::client::GmailClient;
use crate::error::{ArchiveError, Result as GmailResult};
use crate::models::{AggregateResult, BatchOutcome, MessageId, RoundResult};
use crate::observer::{ArchiveObserver, BatchPosition, TracingObserver};
use crate::pacing::{Pacer, TokioPacer};

/// The only query the archiver ever runs
pub const INBOX_QUERY: &str = "in:inbox";

/// Label removed to archive a message
pub const INBOX_LABEL: &str = "INBOX";

/// Default number of ids per batchModify call
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Tunables for the round loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSettings {
    pub query: String,
    /// messages.list page size
    pub page_size: u32,
    /// Pause after each successful batch, except the last of a round
    pub batch_delay: Duration,
    /// Pause before re-measuring the inbox after a live round
    pub settle_delay: Duration,
    /// Pause before the next round starts
    pub round_delay: Duration,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            query: INBOX_QUERY.to_string(),
            page_size: 500,
            batch_delay: Duration::from_millis(200),
            settle_delay: Duration::from_secs(2),
            round_delay: Duration::from_secs(1),
        }
    }
}

/// Connected archiver owning its Gmail handle for the length of a run
pub struct Archiver<C> {
    client: C,
    settings: ArchiveSettings,
    pacer: Box<dyn Pacer>,
    observer: Box<dyn ArchiveObserver>,
}

impl<C: GmailClient> Archiver<C> {
    /// Obtain a handle from `authenticator` and wrap it
    ///
    /// Authentication failures are fatal for the run; nothing is retried.
    pub async fn connect<A>(authenticator: &A, settings: ArchiveSettings) -> Result<Self, ArchiveError>
    where
        A: Authenticator<Client = C>,
    {
        let client = authenticator.connect().await.map_err(|e| {
            error!("Failed to connect to Gmail API: {}", e);
            e
        })?;
        Ok(Self::new(client, settings))
    }

    /// Wrap an already authenticated client
    pub fn new(client: C, settings: ArchiveSettings) -> Self {
        Self {
            client,
            settings,
            pacer: Box::new(TokioPacer),
            observer: Box::new(TracingObserver),
        }
    }

    /// Replace the real timer, mostly for tests
    pub fn with_pacer(mut self, pacer: impl Pacer + 'static) -> Self {
        self.pacer = Box::new(pacer);
        self
    }

    /// Route progress events somewhere other than the log
    pub fn with_observer(mut self, observer: impl ArchiveObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Inbox size estimate from a single-item list call
    pub async fn try_inbox_count(&self) -> GmailResult<u32> {
        let page = self
            .client
            .list_messages(&self.settings.query, None, 1)
            .await?;
        Ok(page.result_size_estimate)
    }

    /// Like [`Self::try_inbox_count`], but a failure reads as 0
    ///
    /// Only used for display; loop termination never depends on it.
    pub async fn inbox_count(&self) -> u32 {
        match self.try_inbox_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Error getting inbox count: {}", e);
                0
            }
        }
    }

    /// Every id matching `query`, following page tokens to the end
    ///
    /// Ids gathered before a failing page are dropped.
    pub async fn list_inbox_ids(&self, query: &str) -> Result<Vec<MessageId>, ArchiveError> {
        debug!("Fetching message IDs with query: {}", query);

        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_messages(query, page_token.take(), self.settings.page_size)
                .await
                .map_err(|e| {
                    error!("An error occurred while fetching messages: {}", e);
                    ArchiveError::Enumeration(e)
                })?;

            if page.ids.is_empty() {
                break;
            }

            ids.extend(page.ids);
            self.observer.ids_fetched(ids.len());

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Total messages found: {}", ids.len());
        Ok(ids)
    }

    /// Archive `ids` in consecutive chunks of at most `batch_size`
    ///
    /// Never fails: a chunk whose call errors is counted as failed and the
    /// next chunk is attempted. Dry runs count every chunk as archived
    /// without calling the API.
    pub async fn archive_batch(
        &self,
        ids: &[MessageId],
        batch_size: usize,
        dry_run: bool,
    ) -> RoundResult {
        let mut result = RoundResult::default();
        if ids.is_empty() {
            return result;
        }

        // chunks(0) panics
        let batch_size = batch_size.max(1);
        let total = ids.len().div_ceil(batch_size);
        let remove_labels = [INBOX_LABEL.to_string()];

        for (index, chunk) in ids.chunks(batch_size).enumerate() {
            let position = BatchPosition {
                number: index + 1,
                total,
            };

            let outcome = if dry_run {
                BatchOutcome::Simulated { size: chunk.len() }
            } else {
                match self.client.batch_modify(chunk, &remove_labels).await {
                    Ok(()) => BatchOutcome::Archived { size: chunk.len() },
                    Err(error) => BatchOutcome::Failed {
                        size: chunk.len(),
                        error,
                    },
                }
            };

            result.record(&outcome);
            self.observer.batch_finished(position, &outcome);

            let is_last = position.number == total;
            if matches!(outcome, BatchOutcome::Archived { .. }) && !is_last {
                self.pacer.wait(self.settings.batch_delay).await;
            }
        }

        debug!(
            "Archiving complete. Success: {}, Failed: {}",
            result.success, result.failed
        );
        result
    }

    /// Run rounds until the inbox lists empty or a round makes no progress
    ///
    /// A dry run stops after its first round.
    pub async fn archive_all_inbox(
        &self,
        dry_run: bool,
        batch_size: usize,
    ) -> Result<AggregateResult, ArchiveError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("archive_run", %run_id, dry_run, batch_size);
        self.run_rounds(dry_run, batch_size).instrument(span).await
    }

    async fn run_rounds(
        &self,
        dry_run: bool,
        batch_size: usize,
    ) -> Result<AggregateResult, ArchiveError> {
        let mut total = AggregateResult::default();

        loop {
            total.rounds += 1;
            let round = total.rounds;

            let before = self.inbox_count().await;
            self.observer.round_started(round, before);

            let ids = self.list_inbox_ids(&self.settings.query).await?;
            self.observer.enumeration_finished(round, ids.len());
            if ids.is_empty() {
                break;
            }

            let result = self.archive_batch(&ids, batch_size, dry_run).await;
            total += result;
            self.observer.round_finished(round, &result);

            if dry_run {
                break;
            }

            self.pacer.wait(self.settings.settle_delay).await;
            let after = self.inbox_count().await;
            self.observer.round_settled(round, before, after);

            if result.made_no_progress() {
                warn!(
                    round,
                    failed = result.failed,
                    "No emails were successfully archived in this round, stopping"
                );
                break;
            }

            self.pacer.wait(self.settings.round_delay).await;
        }

        self.observer.run_finished(&total);
        Ok(total)
    }
}

/// Connect, then archive the whole inbox with the default pacer and observer
pub async fn connect_and_archive<A: Authenticator>(
    authenticator: &A,
    settings: ArchiveSettings,
    dry_run: bool,
    batch_size: usize,
) -> Result<AggregateResult, ArchiveError> {
    let archiver = Archiver::connect(authenticator, settings).await?;
    archiver.archive_all_inbox(dry_run, batch_size).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GmailError;
    use crate::models::ListPage;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    mockall::mock! {
        pub TestGmailClient {}

        #[async_trait]
        impl GmailClient for TestGmailClient {
            async fn list_messages(
                &self,
                query: &str,
                page_token: Option<String>,
                max_results: u32,
            ) -> GmailResult<ListPage>;
            async fn batch_modify(
                &self,
                message_ids: &[MessageId],
                remove_label_ids: &[String],
            ) -> GmailResult<()>;
        }
    }

    #[derive(Clone, Default)]
    struct RecordingPacer {
        waits: Arc<Mutex<Vec<Duration>>>,
    }

    #[async_trait]
    impl Pacer for RecordingPacer {
        async fn wait(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    fn ids(range: std::ops::Range<usize>) -> Vec<MessageId> {
        range.map(|i| MessageId::new(format!("msg{:04}", i))).collect()
    }

    fn archiver(client: MockTestGmailClient) -> (Archiver<MockTestGmailClient>, RecordingPacer) {
        let pacer = RecordingPacer::default();
        let archiver = Archiver::new(client, ArchiveSettings::default()).with_pacer(pacer.clone());
        (archiver, pacer)
    }

    #[tokio::test]
    async fn test_archive_batch_dry_run_issues_no_calls() {
        let mut client = MockTestGmailClient::new();
        client.expect_batch_modify().never();

        let (archiver, pacer) = archiver(client);
        let result = archiver.archive_batch(&ids(0..10), 100, true).await;

        assert_eq!(result, RoundResult { success: 10, failed: 0 });
        assert!(pacer.waits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_archive_batch_chunks_and_removes_inbox_label() {
        let mut client = MockTestGmailClient::new();
        client
            .expect_batch_modify()
            .withf(|ids, labels| ids.len() <= 100 && labels == &["INBOX".to_string()])
            .times(3)
            .returning(|_, _| Ok(()));

        let (archiver, pacer) = archiver(client);
        let result = archiver.archive_batch(&ids(0..250), 100, false).await;

        assert_eq!(result, RoundResult { success: 250, failed: 0 });
        // Pauses between the three calls, none after the last
        assert_eq!(
            *pacer.waits.lock().unwrap(),
            vec![Duration::from_millis(200), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn test_archive_batch_failed_chunk_does_not_stop_the_rest() {
        let mut client = MockTestGmailClient::new();
        client
            .expect_batch_modify()
            .withf(|ids, _| ids[0].as_str() == "msg0100")
            .times(1)
            .returning(|_, _| {
                Err(GmailError::ServerError {
                    status: 503,
                    message: "HTTP 503: Service Unavailable".to_string(),
                })
            });
        client
            .expect_batch_modify()
            .withf(|ids, _| ids[0].as_str() != "msg0100")
            .times(2)
            .returning(|_, _| Ok(()));

        let (archiver, _) = archiver(client);
        let result = archiver.archive_batch(&ids(0..250), 100, false).await;

        assert_eq!(result, RoundResult { success: 150, failed: 100 });
    }

    #[tokio::test]
    async fn test_archive_batch_all_failures_counted() {
        let mut client = MockTestGmailClient::new();
        client
            .expect_batch_modify()
            .times(2)
            .returning(|_, _| Err(GmailError::Forbidden("HTTP 403: Forbidden".to_string())));

        let (archiver, pacer) = archiver(client);
        let result = archiver.archive_batch(&ids(0..15), 10, false).await;

        assert_eq!(result, RoundResult { success: 0, failed: 15 });
        assert!(result.made_no_progress());
        assert!(pacer.waits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_archive_batch_zero_batch_size_is_treated_as_one() {
        let mut client = MockTestGmailClient::new();
        client
            .expect_batch_modify()
            .withf(|ids, _| ids.len() == 1)
            .times(3)
            .returning(|_, _| Ok(()));

        let (archiver, _) = archiver(client);
        let result = archiver.archive_batch(&ids(0..3), 0, false).await;
        assert_eq!(result.success, 3);
    }

    #[tokio::test]
    async fn test_archive_batch_empty_input() {
        let mut client = MockTestGmailClient::new();
        client.expect_batch_modify().never();

        let (archiver, _) = archiver(client);
        let result = archiver.archive_batch(&[], 100, false).await;
        assert_eq!(result, RoundResult::default());
    }

    #[tokio::test]
    async fn test_list_inbox_ids_follows_page_tokens() {
        let mut client = MockTestGmailClient::new();
        client
            .expect_list_messages()
            .withf(|query, token, max| query == "in:inbox" && token.is_none() && *max == 500)
            .times(1)
            .returning(|_, _, _| {
                Ok(ListPage {
                    ids: ids(0..500),
                    next_page_token: Some("page-2".to_string()),
                    result_size_estimate: 700,
                })
            });
        client
            .expect_list_messages()
            .withf(|_, token, _| token.as_deref() == Some("page-2"))
            .times(1)
            .returning(|_, _, _| {
                Ok(ListPage {
                    ids: ids(500..700),
                    next_page_token: None,
                    result_size_estimate: 700,
                })
            });

        let (archiver, _) = archiver(client);
        let listed = archiver.list_inbox_ids(INBOX_QUERY).await.unwrap();

        assert_eq!(listed, ids(0..700));
    }

    #[tokio::test]
    async fn test_list_inbox_ids_stops_on_empty_page() {
        let mut client = MockTestGmailClient::new();
        client
            .expect_list_messages()
            .times(1)
            .returning(|_, _, _| {
                Ok(ListPage {
                    ids: vec![],
                    next_page_token: Some("dangling".to_string()),
                    result_size_estimate: 0,
                })
            });

        let (archiver, _) = archiver(client);
        assert!(archiver.list_inbox_ids(INBOX_QUERY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_inbox_ids_discards_partial_results_on_error() {
        let mut client = MockTestGmailClient::new();
        client
            .expect_list_messages()
            .withf(|_, token, _| token.is_none())
            .times(1)
            .returning(|_, _, _| {
                Ok(ListPage {
                    ids: ids(0..500),
                    next_page_token: Some("page-2".to_string()),
                    result_size_estimate: 900,
                })
            });
        client
            .expect_list_messages()
            .withf(|_, token, _| token.is_some())
            .times(1)
            .returning(|_, _, _| Err(GmailError::NetworkError("connection reset".to_string())));

        let (archiver, _) = archiver(client);
        let err = archiver.list_inbox_ids(INBOX_QUERY).await.unwrap_err();

        assert!(matches!(
            err,
            ArchiveError::Enumeration(GmailError::NetworkError(_))
        ));
    }

    #[tokio::test]
    async fn test_inbox_count_uses_single_item_listing() {
        let mut client = MockTestGmailClient::new();
        client
            .expect_list_messages()
            .withf(|query, token, max| query == "in:inbox" && token.is_none() && *max == 1)
            .times(1)
            .returning(|_, _, _| {
                Ok(ListPage {
                    ids: ids(0..1),
                    next_page_token: Some("next".to_string()),
                    result_size_estimate: 4321,
                })
            });

        let (archiver, _) = archiver(client);
        assert_eq!(archiver.inbox_count().await, 4321);
    }

    #[tokio::test]
    async fn test_inbox_count_reads_zero_on_error() {
        let mut client = MockTestGmailClient::new();
        client
            .expect_list_messages()
            .returning(|_, _, _| Err(GmailError::RateLimitExceeded { retry_after: 5 }));

        let (archiver, _) = archiver(client);
        assert_eq!(archiver.inbox_count().await, 0);
        assert!(archiver.try_inbox_count().await.is_err());
    }

    #[tokio::test]
    async fn test_archive_all_inbox_aborts_when_listing_fails() {
        let mut client = MockTestGmailClient::new();
        client
            .expect_list_messages()
            .withf(|_, _, max| *max == 1)
            .returning(|_, _, _| Ok(ListPage::default()));
        client
            .expect_list_messages()
            .withf(|_, _, max| *max > 1)
            .times(1)
            .returning(|_, _, _| {
                Err(GmailError::ServerError {
                    status: 500,
                    message: "HTTP 500: Internal Server Error".to_string(),
                })
            });
        client.expect_batch_modify().never();

        let (archiver, _) = archiver(client);
        let result = archiver.archive_all_inbox(false, 100).await;

        assert!(matches!(result, Err(ArchiveError::Enumeration(_))));
    }
}
