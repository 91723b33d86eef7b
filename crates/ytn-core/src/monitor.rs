//! Per-channel change detection.
//!
//! A check asks the content source for uploads newer than the channel's
//! last-check time, fetches details, and hands each new item (newest first)
//! to the [`Dispatcher`]. The last-check time only advances when a check
//! completes without error.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::Pacing,
    dispatcher::Dispatcher,
    domain::{ActivityRef, MonitoredChannel, VideoItem},
    ports::ContentSource,
    utils::{sleep_or_cancelled, start_of_utc_day},
    Error, Result,
};

/// Result of one channel check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    Completed { dispatched: usize },
    /// The provider does not know the channel; nothing else was attempted.
    Skipped,
    Failed,
    Cancelled,
}

#[derive(Debug, Default)]
struct MonitorState {
    /// Channel id -> time the last successful check finished.
    last_check: HashMap<String, DateTime<Utc>>,
    /// Channels the provider has confirmed to exist.
    verified: HashSet<String>,
}

pub struct ChannelMonitor {
    source: Arc<dyn ContentSource>,
    dispatcher: Arc<Dispatcher>,
    pacing: Pacing,
    state: Mutex<MonitorState>,
}

impl ChannelMonitor {
    pub fn new(source: Arc<dyn ContentSource>, dispatcher: Arc<Dispatcher>, pacing: Pacing) -> Self {
        Self {
            source,
            dispatcher,
            pacing,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// Last successful check time for a channel, if any.
    pub async fn last_checked(&self, channel_id: &str) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_check.get(channel_id).copied()
    }

    /// Run one check for `channel`.
    pub async fn check(&self, channel: &MonitoredChannel, cancel: &CancellationToken) -> CheckOutcome {
        match self.verify(channel).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(channel_id = %channel.id, name = %channel.name, "channel not found, skipping");
                return CheckOutcome::Skipped;
            }
            Err(e) => {
                error!(channel_id = %channel.id, "channel verification failed: {e}");
                return CheckOutcome::Skipped;
            }
        }

        match self.check_verified(channel, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(channel_id = %channel.id, name = %channel.name, "check failed: {e}");
                if sleep_or_cancelled(cancel, self.pacing.failure_cooldown).await {
                    return CheckOutcome::Cancelled;
                }
                CheckOutcome::Failed
            }
        }
    }

    /// Verify a channel once; a confirmation is cached for the life of the process.
    async fn verify(&self, channel: &MonitoredChannel) -> Result<bool> {
        if self.state.lock().await.verified.contains(&channel.id) {
            return Ok(true);
        }

        let Some(identity) = self.source.verify_channel(&channel.id).await? else {
            return Ok(false);
        };
        info!(channel_id = %channel.id, title = %identity.title, "verified channel");
        self.state.lock().await.verified.insert(channel.id.clone());
        Ok(true)
    }

    async fn check_verified(
        &self,
        channel: &MonitoredChannel,
        cancel: &CancellationToken,
    ) -> Result<CheckOutcome> {
        let since = self
            .last_checked(&channel.id)
            .await
            .unwrap_or_else(|| start_of_utc_day(Utc::now()));
        debug!(channel_id = %channel.id, %since, "checking channel");

        let activity = self
            .source
            .list_recent_uploads(&channel.id, since, self.pacing.page_size)
            .await?;

        let mut items: Vec<VideoItem> = Vec::new();
        for entry in activity {
            let ActivityRef::Upload { video_id } = entry else {
                continue;
            };
            let item = self.source.get_item_detail(&video_id).await.map_err(|e| match e {
                Error::NotFound(_) => {
                    Error::External(format!("upload {video_id} has no details"))
                }
                other => other,
            })?;
            items.push(item);
        }

        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        let mut dispatched = 0;
        let mut aborted = 0;
        for item in &items {
            if cancel.is_cancelled() {
                break;
            }
            let report = self.dispatcher.dispatch(item, cancel).await;
            if report.aborted {
                aborted += 1;
            } else {
                dispatched += 1;
            }
        }

        if cancel.is_cancelled() && !items.is_empty() {
            info!(channel_id = %channel.id, dispatched, "check interrupted by shutdown");
            return Ok(CheckOutcome::Cancelled);
        }

        let now = Utc::now();
        let mut st = self.state.lock().await;
        let next = match st.last_check.get(&channel.id) {
            Some(prev) if *prev > now => *prev,
            _ => now,
        };
        st.last_check.insert(channel.id.clone(), next);

        if dispatched > 0 {
            info!(channel_id = %channel.id, name = %channel.name, dispatched, "new uploads dispatched");
        }
        if aborted > 0 {
            warn!(channel_id = %channel.id, name = %channel.name, aborted, "new uploads dropped before fan-out");
        }
        Ok(CheckOutcome::Completed { dispatched })
    }
}
