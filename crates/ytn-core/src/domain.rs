use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// A channel on the content provider whose uploads are watched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredChannel {
    pub name: String,
    pub id: String,
}

impl MonitoredChannel {
    /// Build a channel from admin input, trimming both fields.
    pub fn new(name: &str, id: &str) -> Result<Self> {
        let name = name.trim();
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::Validation("channel id must not be empty".to_string()));
        }
        if name.is_empty() {
            return Err(Error::Validation(format!(
                "channel {id} must have a name"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            id: id.to_string(),
        })
    }
}

/// Kind of Telegram chat a notification goes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
    #[default]
    Unknown,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatKind::Private => "private",
            ChatKind::Group => "group",
            ChatKind::Supergroup => "supergroup",
            ChatKind::Channel => "channel",
            ChatKind::Unknown => "unknown",
        }
    }
}

impl From<String> for ChatKind {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "private" => ChatKind::Private,
            "group" => ChatKind::Group,
            "supergroup" => ChatKind::Supergroup,
            "channel" => ChatKind::Channel,
            _ => ChatKind::Unknown,
        }
    }
}

impl From<ChatKind> for String {
    fn from(k: ChatKind) -> Self {
        k.as_str().to_string()
    }
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat that receives upload notifications.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationChat {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: ChatKind,
    /// Missing or unreadable timestamps load as the Unix epoch.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub added_at: DateTime<Utc>,
}

/// Accepts RFC 3339 as well as the older `YYYY-MM-DD HH:MM:SS` (UTC) form.
fn lenient_timestamp<'de, D>(de: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(de)?;
    Ok(raw.as_deref().and_then(parse_timestamp).unwrap_or_default())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl DestinationChat {
    pub fn new(id: ChatId, title: Option<&str>, kind: ChatKind, added_at: DateTime<Utc>) -> Self {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string());
        Self {
            id: id.0,
            title,
            kind,
            added_at,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        ChatId(self.id)
    }
}

/// Identity of a channel as reported by the content provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelIdentity {
    pub id: String,
    pub title: String,
}

/// One entry of a channel's activity feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActivityRef {
    Upload { video_id: String },
    Other { kind: String },
}

/// Thumbnail URLs by resolution; any of them may be missing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Thumbnails {
    pub maxres: Option<String>,
    pub high: Option<String>,
    pub default: Option<String>,
}

impl Thumbnails {
    /// Highest resolution available: maxres, then high, then default.
    pub fn best(&self) -> Option<&str> {
        self.maxres
            .as_deref()
            .or(self.high.as_deref())
            .or(self.default.as_deref())
    }
}

/// A freshly detected upload, built per check and dropped after dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoItem {
    pub id: String,
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: DateTime<Utc>,
    pub thumbnails: Thumbnails,
    /// ISO-8601 duration as reported by the provider (`PT4M13S`).
    pub duration: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnails_prefer_highest_resolution() {
        let mut t = Thumbnails {
            maxres: Some("max".into()),
            high: Some("high".into()),
            default: Some("default".into()),
        };
        assert_eq!(t.best(), Some("max"));
        t.maxres = None;
        assert_eq!(t.best(), Some("high"));
        t.high = None;
        assert_eq!(t.best(), Some("default"));
        t.default = None;
        assert_eq!(t.best(), None);
    }

    #[test]
    fn channel_input_is_trimmed_and_validated() {
        let c = MonitoredChannel::new("  Some Channel ", " UC123 ").unwrap();
        assert_eq!(c.name, "Some Channel");
        assert_eq!(c.id, "UC123");

        assert!(matches!(
            MonitoredChannel::new("name", "   "),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            MonitoredChannel::new("", "UC1"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn chat_kind_round_trips_through_json_with_unknown_fallback() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let chat = DestinationChat::new(ChatId(-100), Some("Group"), ChatKind::Supergroup, at);
        let json = serde_json::to_value(&chat).unwrap();
        assert_eq!(json["type"], "supergroup");

        let weird: DestinationChat = serde_json::from_str(
            r#"{"id": 5, "title": "x", "type": "forum", "added_at": "2026-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        assert_eq!(weird.kind, ChatKind::Unknown);
    }

    #[test]
    fn added_at_accepts_legacy_format_and_missing_values() {
        let legacy: DestinationChat = serde_json::from_str(
            r#"{"id": 1, "title": "x", "type": "group", "added_at": "2024-05-01 10:00:00"}"#,
        )
        .unwrap();
        assert_eq!(
            legacy.added_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );

        let missing: DestinationChat =
            serde_json::from_str(r#"{"id": 2, "title": "y", "type": "group"}"#).unwrap();
        assert_eq!(missing.added_at, DateTime::<Utc>::default());

        let garbage: DestinationChat = serde_json::from_str(
            r#"{"id": 3, "title": "z", "added_at": "yesterday"}"#,
        )
        .unwrap();
        assert_eq!(garbage.added_at, DateTime::<Utc>::default());
        assert_eq!(garbage.kind, ChatKind::Unknown);
    }

    #[test]
    fn chat_title_falls_back_to_id() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let chat = DestinationChat::new(ChatId(42), Some("  "), ChatKind::Private, at);
        assert_eq!(chat.title, "42");
    }
}
