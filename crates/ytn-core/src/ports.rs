use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{ActivityRef, ChannelIdentity, VideoItem},
    Result,
};

/// Hexagonal port for the video provider (YouTube today).
///
/// Errors are transport or protocol failures; "channel does not exist" is
/// `Ok(None)` from `verify_channel`, not an error.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn verify_channel(&self, channel_id: &str) -> Result<Option<ChannelIdentity>>;

    /// Activity published after `since`, newest page only (at most `max_results`).
    async fn list_recent_uploads(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
        max_results: u32,
    ) -> Result<Vec<ActivityRef>>;

    async fn get_item_detail(&self, video_id: &str) -> Result<VideoItem>;

    /// Download a thumbnail image. A non-success HTTP status is an error.
    async fn fetch_thumbnail(&self, url: &str) -> Result<Vec<u8>>;
}
