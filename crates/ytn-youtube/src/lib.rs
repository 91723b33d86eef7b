//! YouTube Data API v3 adapter.
//!
//! Implements [`ContentSource`] over the `channels`, `activities` and `videos`
//! endpoints. The API key travels as the `key` query parameter.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use ytn_core::{
    domain::{ActivityRef, ChannelIdentity, Thumbnails, VideoItem},
    errors::Error,
    ports::ContentSource,
    Result,
};

#[derive(Clone, Debug)]
pub struct YouTubeClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl YouTubeClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("youtube http client build: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}/{endpoint}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| Error::External(format!("youtube {endpoint} request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "youtube {endpoint} failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::External(format!("youtube {endpoint} json error: {e}")))
    }
}

#[async_trait]
impl ContentSource for YouTubeClient {
    async fn verify_channel(&self, channel_id: &str) -> Result<Option<ChannelIdentity>> {
        let resp: ListResponse<ChannelResource> = self
            .get_json(
                "channels",
                &[("part", "id,snippet".to_string()), ("id", channel_id.to_string())],
            )
            .await?;
        Ok(channel_identity(resp))
    }

    async fn list_recent_uploads(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
        max_results: u32,
    ) -> Result<Vec<ActivityRef>> {
        let resp: ListResponse<ActivityResource> = self
            .get_json(
                "activities",
                &[
                    ("part", "contentDetails,snippet".to_string()),
                    ("channelId", channel_id.to_string()),
                    ("publishedAfter", rfc3339(since)),
                    ("maxResults", max_results.to_string()),
                ],
            )
            .await?;
        let refs = activity_refs(resp);
        debug!(channel_id, count = refs.len(), "listed activity");
        Ok(refs)
    }

    async fn get_item_detail(&self, video_id: &str) -> Result<VideoItem> {
        let resp: ListResponse<VideoResource> = self
            .get_json(
                "videos",
                &[
                    ("part", "snippet,statistics,contentDetails".to_string()),
                    ("id", video_id.to_string()),
                ],
            )
            .await?;
        video_item(resp).ok_or_else(|| Error::NotFound(format!("video {video_id}")))
    }

    async fn fetch_thumbnail(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::External(format!("thumbnail request error: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::External(format!(
                "thumbnail fetch failed: {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::External(format!("thumbnail body error: {e}")))?;
        Ok(bytes.to_vec())
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ============== Wire types ==============

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ChannelResource {
    id: String,
    #[serde(default)]
    snippet: Option<ChannelSnippet>,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityResource {
    #[serde(default)]
    snippet: Option<ActivitySnippet>,
    #[serde(default)]
    content_details: Option<ActivityContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ActivitySnippet {
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ActivityContentDetails {
    #[serde(default)]
    upload: Option<UploadDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    id: String,
    snippet: VideoSnippet,
    #[serde(default)]
    content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    channel_id: String,
    channel_title: String,
    published_at: DateTime<Utc>,
    #[serde(default)]
    thumbnails: ThumbnailSet,
}

#[derive(Debug, Default, Deserialize)]
struct ThumbnailSet {
    maxres: Option<Thumbnail>,
    high: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    #[serde(default)]
    duration: String,
}

fn channel_identity(resp: ListResponse<ChannelResource>) -> Option<ChannelIdentity> {
    let ch = resp.items.into_iter().next()?;
    let title = ch
        .snippet
        .map(|s| s.title)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| ch.id.clone());
    Some(ChannelIdentity { id: ch.id, title })
}

fn activity_refs(resp: ListResponse<ActivityResource>) -> Vec<ActivityRef> {
    resp.items
        .into_iter()
        .map(|a| match a.content_details.and_then(|d| d.upload) {
            Some(up) => ActivityRef::Upload {
                video_id: up.video_id,
            },
            None => ActivityRef::Other {
                kind: a.snippet.map(|s| s.kind).unwrap_or_default(),
            },
        })
        .collect()
}

fn video_item(resp: ListResponse<VideoResource>) -> Option<VideoItem> {
    let v = resp.items.into_iter().next()?;
    let t = v.snippet.thumbnails;
    Some(VideoItem {
        id: v.id,
        title: v.snippet.title,
        channel_id: v.snippet.channel_id,
        channel_title: v.snippet.channel_title,
        published_at: v.snippet.published_at,
        thumbnails: Thumbnails {
            maxres: t.maxres.map(|x| x.url),
            high: t.high.map(|x| x.url),
            default: t.default.map(|x| x.url),
        },
        duration: v.content_details.map(|d| d.duration).unwrap_or_default(),
    })
}
