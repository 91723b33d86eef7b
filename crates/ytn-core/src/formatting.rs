//! Formatting utilities (notification captions, Telegram HTML helpers).

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::domain::VideoItem;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://youtube.com/watch?v={video_id}")
}

pub fn channel_url(channel_id: &str) -> String {
    format!("https://youtube.com/channel/{channel_id}?sub_confirmation=1")
}

/// `YYYY-MM-DD HH:MM UTC`.
pub fn format_publish_date(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Channel name as a hashtag body: every whitespace character removed.
pub fn hashtag(name: &str) -> String {
    name.split_whitespace().collect()
}

/// HTML caption for a new-upload notification.
pub fn notification_caption(item: &VideoItem) -> String {
    format!(
        "🔥<b>NEW UPLOAD WATCH NOW</b>🔥\n\
         ═══════════════\n\
         🎬 <b><a href='{watch}'>{title}</a></b>\n\
         📺 <b><a href='{channel}'>{channel_title}</a></b>\n\
         📅 {date}\n\
         #NewVideo #{tag}",
        watch = watch_url(&item.id),
        title = escape_html(&item.title),
        channel = channel_url(&item.channel_id),
        channel_title = escape_html(&item.channel_title),
        date = format_publish_date(item.published_at),
        tag = escape_html(&hashtag(&item.channel_title)),
    )
}

fn iso_duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").expect("valid regex")
    })
}

/// Render an ISO-8601 duration (`PT1H2M3S`) as `1:02:03`, or `4:05` below an hour.
///
/// Unparseable input is returned unchanged.
pub fn format_iso_duration(raw: &str) -> String {
    let Some(caps) = iso_duration_re().captures(raw.trim()) else {
        return raw.to_string();
    };
    let num = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    let hours = num(1) * 24 + num(2);
    let (mins, secs) = (num(3), num(4));
    if hours > 0 {
        format!("{hours}:{mins:02}:{secs:02}")
    } else {
        format!("{mins}:{secs:02}")
    }
}

/// Split `header` + `entries` into messages no longer than `limit` bytes.
///
/// Entries are joined with a blank line and never split across messages unless
/// a single entry alone exceeds the limit.
pub fn split_entries(header: &str, entries: &[String], limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = header.to_string();
    let mut has_entry = false;

    for entry in entries {
        let sep = if has_entry { "\n\n" } else { "" };
        if !current.is_empty() && current.len() + sep.len() + entry.len() > limit {
            out.push(std::mem::take(&mut current));
            has_entry = false;
        }

        if entry.len() > limit {
            // `current` was flushed above, so the pieces stand alone.
            let mut pieces = split_at_char_boundaries(entry, limit);
            if let Some(last) = pieces.pop() {
                out.extend(pieces.into_iter().map(str::to_string));
                current = last.to_string();
            }
        } else {
            if has_entry {
                current.push_str("\n\n");
            }
            current.push_str(entry);
        }
        has_entry = true;
    }

    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn split_at_char_boundaries(s: &str, max_bytes: usize) -> Vec<&str> {
    let max_bytes = max_bytes.max(4);
    let mut out = Vec::new();
    let mut rest = s;
    while rest.len() > max_bytes {
        let mut cut = max_bytes;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (head, tail) = rest.split_at(cut);
        out.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}
