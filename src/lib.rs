//! Gmail Inbox Archiver
//!
//! Empties a Gmail inbox by removing the `INBOX` label from every message,
//! in batches, through the Gmail API. Messages stay available under
//! "All Mail"; nothing is deleted.
//!
//! # Overview
//!
//! - **Authentication**: OAuth2 installed-app flow with a cached token
//! - **Enumeration**: paged `messages.list` over `in:inbox`
//! - **Archiving**: `messages.batchModify` in chunks, tolerating failed chunks
//! - **Rounds**: re-enumerate until the inbox lists empty or a round stalls
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_inbox_archiver::{connect_and_archive, ArchiveSettings, ClientCredentials, OAuthAuthenticator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let credentials = ClientCredentials::from_env()?;
//!     let authenticator = OAuthAuthenticator::new(credentials, ".gmail-archiver/token.json");
//!
//!     let result = connect_and_archive(&authenticator, ArchiveSettings::default(), false, 100).await?;
//!     println!("archived {}, failed {}", result.success, result.failed);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`archiver`] - Round loop, enumeration and batch archiving
//! - [`auth`] - Credentials, OAuth2 and Gmail hub initialization
//! - [`cli`] - Command-line interface and progress rendering
//! - [`client`] - Gmail API client trait and production implementation
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`models`] - Message ids and per-batch/round/run results
//! - [`observer`] - Progress event hooks
//! - [`pacing`] - Delays between calls

pub mod archiver;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod observer;
pub mod pacing;

// Re-export commonly used types for convenience
pub use error::{ArchiveError, GmailError, Result};

pub use archiver::{connect_and_archive, ArchiveSettings, Archiver, INBOX_LABEL, INBOX_QUERY};
pub use auth::{Authenticator, ClientCredentials, OAuthAuthenticator};
pub use client::{GmailClient, ProductionGmailClient};
pub use config::Config;
pub use models::{AggregateResult, BatchOutcome, ListPage, MessageId, RoundResult};
pub use observer::{ArchiveObserver, BatchPosition, NoopObserver, TracingObserver};
pub use pacing::{Pacer, TokioPacer};
