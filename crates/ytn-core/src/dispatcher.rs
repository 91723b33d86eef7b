//! Fan-out of one upload notification to every destination chat.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::Pacing,
    domain::{ChatId, VideoItem},
    formatting::{format_iso_duration, notification_caption},
    messaging::{port::MessagingPort, types::SendError},
    ports::ContentSource,
    store::ConfigStore,
    utils::sleep_or_cancelled,
};

/// What happened while notifying chats about one item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub batches: usize,
    /// Every `send_photo` call, retries included.
    pub attempts: usize,
    pub delivered: Vec<ChatId>,
    pub removed: Vec<ChatId>,
    pub retried: Vec<ChatId>,
    pub failed: Vec<ChatId>,
    /// The item was dropped before any fan-out (no thumbnail, unreadable store, ...).
    pub aborted: bool,
    pub cancelled: bool,
}

pub struct Dispatcher {
    source: Arc<dyn ContentSource>,
    messenger: Arc<dyn MessagingPort>,
    store: Arc<dyn ConfigStore>,
    pacing: Pacing,
}

impl Dispatcher {
    pub fn new(
        source: Arc<dyn ContentSource>,
        messenger: Arc<dyn MessagingPort>,
        store: Arc<dyn ConfigStore>,
        pacing: Pacing,
    ) -> Self {
        Self {
            source,
            messenger,
            store,
            pacing,
        }
    }

    /// Notify every destination chat about `item`.
    ///
    /// Never fails: problems are logged and reflected in the report. A chat
    /// reported gone by the transport is removed from the store.
    pub async fn dispatch(&self, item: &VideoItem, cancel: &CancellationToken) -> DispatchReport {
        let mut report = DispatchReport::default();
        if cancel.is_cancelled() {
            report.cancelled = true;
            return report;
        }

        let Some(thumbnail_url) = item.thumbnails.best() else {
            error!(video_id = %item.id, "no thumbnail available, skipping notification");
            report.aborted = true;
            return report;
        };

        let photo = match self.source.fetch_thumbnail(thumbnail_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(video_id = %item.id, url = thumbnail_url, "thumbnail fetch failed: {e}");
                report.aborted = true;
                return report;
            }
        };

        let caption = notification_caption(item);

        // Fresh read: chats may have been added or removed since the check started.
        let chats: Vec<ChatId> = match self.store.list_chats() {
            Ok(chats) => chats.iter().map(|c| c.chat_id()).collect(),
            Err(e) => {
                error!(video_id = %item.id, "failed to read destination chats: {e}");
                report.aborted = true;
                return report;
            }
        };

        info!(
            video_id = %item.id,
            channel = %item.channel_title,
            duration = %format_iso_duration(&item.duration),
            chats = chats.len(),
            "dispatching notification: {}",
            item.title
        );

        let batch_size = self.pacing.batch_size.max(1);
        let total_batches = chats.len().div_ceil(batch_size);

        for (idx, batch) in chats.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return report;
            }
            report.batches += 1;

            for &chat_id in batch {
                let sent_first_try = self
                    .deliver(chat_id, &photo, &caption, cancel, &mut report)
                    .await;
                // Only a clean first-attempt send is followed by the per-destination pause.
                if sent_first_try
                    && sleep_or_cancelled(cancel, self.pacing.per_destination_pause).await
                {
                    report.cancelled = true;
                    return report;
                }
            }

            if idx + 1 < total_batches
                && sleep_or_cancelled(cancel, self.pacing.inter_batch_pause).await
            {
                report.cancelled = true;
                return report;
            }
        }

        debug!(
            video_id = %item.id,
            delivered = report.delivered.len(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            "dispatch finished"
        );
        report
    }

    /// Returns `true` when the first attempt went through.
    async fn deliver(
        &self,
        chat_id: ChatId,
        photo: &[u8],
        caption: &str,
        cancel: &CancellationToken,
        report: &mut DispatchReport,
    ) -> bool {
        report.attempts += 1;
        let err = match self.messenger.send_photo(chat_id, photo, caption).await {
            Ok(_) => {
                info!(%chat_id, "sent notification");
                report.delivered.push(chat_id);
                return true;
            }
            Err(e) => e,
        };

        match err {
            SendError::DestinationGone(reason) => {
                warn!(%chat_id, "chat not accessible, removing it: {reason}");
                match self.store.remove_chat(chat_id) {
                    Ok(_) => report.removed.push(chat_id),
                    Err(e) => error!(%chat_id, "failed to remove unreachable chat: {e}"),
                }
            }
            SendError::Transient(reason) => {
                warn!(%chat_id, "network error, retrying once: {reason}");
                if sleep_or_cancelled(cancel, self.pacing.transient_retry_delay).await {
                    report.failed.push(chat_id);
                    return false;
                }

                report.attempts += 1;
                report.retried.push(chat_id);
                match self.messenger.send_photo(chat_id, photo, caption).await {
                    Ok(_) => {
                        info!(%chat_id, "retry succeeded");
                        report.delivered.push(chat_id);
                    }
                    Err(e) => {
                        error!(%chat_id, "retry failed: {e}");
                        report.failed.push(chat_id);
                    }
                }
            }
            SendError::Other(reason) => {
                error!(%chat_id, "failed to send notification: {reason}");
                report.failed.push(chat_id);
            }
        }
        false
    }
}
