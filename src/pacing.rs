//! Fixed delays between API calls
//!
//! Gmail charges 50 quota units per batchModify and 5 per messages.list, and
//! label removal is eventually consistent. The archiver does not adapt to
//! quota feedback; it waits fixed intervals between calls and rounds. The
//! wait itself goes through [`Pacer`] so tests can run the loop instantly.

use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

/// Something that can wait
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// Real waits on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn wait(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        trace!("Pausing {:?}", duration);
        tokio::time::sleep(duration).await;
    }
}
