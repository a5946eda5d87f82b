//! Gmail API client covering the two calls the archiver needs

use async_trait::async_trait;
use google_gmail1::api::BatchModifyMessagesRequest;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::GmailHub;
use crate::error::{GmailError, Result};
use crate::models::{ListPage, MessageId};

/// Scope used for every call; lets us list and relabel without delete rights
pub const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Gmail API allows up to 1000 ids per batchModify request
pub const MAX_BATCH_MODIFY_IDS: usize = 1000;

/// Gmail API allows up to 500 results per messages.list page
pub const MAX_LIST_PAGE_SIZE: u32 = 500;

/// Trait defining Gmail client operations for easier testing
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// Fetch one page of message ids matching a query
    async fn list_messages(
        &self,
        query: &str,
        page_token: Option<String>,
        max_results: u32,
    ) -> Result<ListPage>;

    /// Remove labels from up to 1000 messages in a single call
    async fn batch_modify(&self, message_ids: &[MessageId], remove_label_ids: &[String])
        -> Result<()>;
}

/// Production Gmail client backed by the google-gmail1 hub
///
/// Every call is bounded by a timeout so a stalled connection surfaces as a
/// [`GmailError::NetworkError`] instead of hanging the run. Calls are never
/// retried here; the archiver decides what a failure means.
pub struct ProductionGmailClient {
    hub: GmailHub,
    request_timeout: Duration,
}

impl ProductionGmailClient {
    /// Create a new production Gmail client
    ///
    /// # Arguments
    /// * `hub` - Gmail API hub instance
    /// * `request_timeout` - Upper bound for a single API round-trip
    pub fn new(hub: GmailHub, request_timeout: Duration) -> Self {
        Self {
            hub,
            request_timeout,
        }
    }

    async fn with_timeout<T, F>(&self, operation_name: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, google_gmail1::Error>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(GmailError::from),
            Err(_) => {
                warn!(
                    "Gmail API {} call timed out after {:?}",
                    operation_name, self.request_timeout
                );
                Err(GmailError::NetworkError(format!(
                    "API call timed out after {:?}",
                    self.request_timeout
                )))
            }
        }
    }
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_messages(
        &self,
        query: &str,
        page_token: Option<String>,
        max_results: u32,
    ) -> Result<ListPage> {
        let mut call = self
            .hub
            .users()
            .messages_list("me")
            .q(query)
            .max_results(max_results.min(MAX_LIST_PAGE_SIZE));

        if let Some(token) = page_token.as_deref() {
            call = call.page_token(token);
        }

        debug!("Calling Gmail API to list messages (q={})", query);
        let (_, response) = self
            .with_timeout("messages.list", call.add_scope(MODIFY_SCOPE).doit())
            .await?;

        let ids = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| msg.id.map(MessageId::from))
            .collect();

        Ok(ListPage {
            ids,
            next_page_token: response.next_page_token,
            result_size_estimate: response.result_size_estimate.unwrap_or(0),
        })
    }

    async fn batch_modify(
        &self,
        message_ids: &[MessageId],
        remove_label_ids: &[String],
    ) -> Result<()> {
        if message_ids.is_empty() {
            return Ok(());
        }
        if message_ids.len() > MAX_BATCH_MODIFY_IDS {
            return Err(GmailError::BadRequest(format!(
                "batchModify accepts at most {} ids, got {}",
                MAX_BATCH_MODIFY_IDS,
                message_ids.len()
            )));
        }

        let request = BatchModifyMessagesRequest {
            ids: Some(message_ids.iter().map(|id| id.as_str().to_string()).collect()),
            add_label_ids: None,
            remove_label_ids: Some(remove_label_ids.to_vec()),
        };

        let call = self
            .hub
            .users()
            .messages_batch_modify(request, "me")
            .add_scope(MODIFY_SCOPE)
            .doit();

        self.with_timeout("messages.batchModify", call).await?;
        debug!("batchModify succeeded for {} messages", message_ids.len());
        Ok(())
    }
}
