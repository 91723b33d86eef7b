use chrono::Utc;

use ytn_core::{
    domain::{ChatId, ChatKind, DestinationChat, MonitoredChannel},
    formatting::{escape_html, split_entries},
};

use crate::router::AppState;

/// Admin commands understood by the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    StartNotify,
    HelpNotify,
    HowNotify,
    AddTelegramNotify,
    RemoveNotify,
    ListNotify,
    AddYoutubeChannel,
    RemoveYoutubeChannel,
    ListYoutubeChannels,
}

impl Command {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "start_notify" => Command::StartNotify,
            "help_notify" => Command::HelpNotify,
            "how_notify" => Command::HowNotify,
            "add_telegram_notify" => Command::AddTelegramNotify,
            "remove_notify" => Command::RemoveNotify,
            "list_notify" => Command::ListNotify,
            "add_youtube_channel" => Command::AddYoutubeChannel,
            "remove_youtube_channel" => Command::RemoveYoutubeChannel,
            "list_youtube_channels" => Command::ListYoutubeChannels,
            _ => return None,
        })
    }
}

/// Parse `/cmd@botname arg1 ...` into a known command and its argument text.
pub(crate) fn parse_command(text: &str) -> Option<(Command, String)> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }
    let mut parts = text.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let name = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    Command::from_name(&name).map(|c| (c, rest))
}

/// The chat a command was sent from.
#[derive(Clone, Debug)]
pub(crate) struct CommandContext {
    pub chat_id: ChatId,
    pub chat_title: Option<String>,
    pub chat_kind: ChatKind,
}

const WELCOME: &str = "👋 Welcome to the YouTube Monitor Bot!\n\n\
Available commands:\n\
/help_notify - Show all commands and usage\n\
/add_telegram_notify - Add current chat to notification list\n\
/remove_notify - Remove current chat from notification list\n\
/list_notify - List all chats receiving notifications\n\n\
Add me to your groups/channels and use these commands there!";

const HELP: &str = "🤖 <b>YouTube Notification Bot Help</b>\n\n\
<b>Available Commands:</b>\n\n\
🔔 <b>Notification Commands:</b>\n\
/add_telegram_notify - Add current chat to notification list\n\
/remove_notify - Remove current chat from notification list\n\
/list_notify - List all chats receiving notifications\n\n\
📺 <b>YouTube Channel Commands:</b>\n\
/add_youtube_channel - Add a YouTube channel to monitor\n\
/remove_youtube_channel - Remove a YouTube channel\n\
/list_youtube_channels - List all monitored channels\n\n\
❓ <b>Other Commands:</b>\n\
/start_notify - Show welcome message\n\
/help_notify - Show this help message\n\
/how_notify - Show quick setup guide\n\n\
For detailed setup instructions, use /how_notify";

fn how_text(interval_secs: u64) -> String {
    let every = if interval_secs % 60 == 0 {
        let mins = interval_secs / 60;
        if mins == 1 {
            "minute".to_string()
        } else {
            format!("{mins} minutes")
        }
    } else {
        format!("{interval_secs} seconds")
    };

    format!(
        "🚀 <b>Bot Setup Guide</b>\n\n\
<b>1. Setting Up Notifications:</b>\n\
• Add bot to your group/channel\n\
• Make bot an administrator\n\
• Use /add_telegram_notify in the chat\n\
• Verify with /list_notify\n\n\
<b>2. Adding YouTube Channels:</b>\n\
• Find the YouTube channel ID\n\
• Use: /add_youtube_channel [channel_name] [channel_id]\n\
• Example: /add_youtube_channel PewDiePie UC-lHJZR3Gqxm24_Vd_AJ5Yw\n\
• Verify with /list_youtube_channels\n\n\
<b>3. Bot Operation:</b>\n\
• Bot checks for new videos every {every}\n\
• Notifications are sent automatically\n\
• Ensure bot remains as admin\n\n\
<b>4. Management:</b>\n\
• Remove channels: /remove_youtube_channel [channel_id]\n\
• Stop notifications: /remove_notify\n\
• List settings: /list_notify and /list_youtube_channels\n\n\
For command list, use /help_notify"
    )
}

/// Run a command and return the HTML replies to send, in order.
pub(crate) async fn execute(
    state: &AppState,
    ctx: &CommandContext,
    cmd: Command,
    arg: &str,
) -> Vec<String> {
    match cmd {
        Command::StartNotify => vec![WELCOME.to_string()],
        Command::HelpNotify => vec![HELP.to_string()],
        Command::HowNotify => vec![how_text(state.cfg.pacing.check_interval.as_secs())],
        Command::AddTelegramNotify => vec![add_chat(state, ctx)],
        Command::RemoveNotify => vec![remove_chat(state, ctx)],
        Command::ListNotify => list_chats(state),
        Command::AddYoutubeChannel => vec![add_channel(state, arg).await],
        Command::RemoveYoutubeChannel => vec![remove_channel(state, arg)],
        Command::ListYoutubeChannels => list_channels(state),
    }
}

fn chat_title(ctx: &CommandContext) -> String {
    ctx.chat_title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| ctx.chat_id.to_string())
}

fn add_chat(state: &AppState, ctx: &CommandContext) -> String {
    let title = chat_title(ctx);
    let chat = DestinationChat::new(ctx.chat_id, Some(title.as_str()), ctx.chat_kind, Utc::now());
    match state.store.add_chat(chat) {
        Ok(true) => format!(
            "✅ Successfully added chat to notification list!\n\n\
Chat: <b>{}</b>\n\
Type: {}\n\
ID: <code>{}</code>\n\n\
Check /list_notify to see all configured chats.",
            escape_html(&title),
            ctx.chat_kind,
            ctx.chat_id
        ),
        Ok(false) => format!(
            "ℹ️ This chat is already receiving notifications.\n\n\
Chat: <b>{}</b>\n\
ID: <code>{}</code>",
            escape_html(&title),
            ctx.chat_id
        ),
        Err(e) => format!("❌ Error adding chat: {}", escape_html(&e.to_string())),
    }
}

fn remove_chat(state: &AppState, ctx: &CommandContext) -> String {
    let title = escape_html(&chat_title(ctx));
    match state.store.remove_chat(ctx.chat_id) {
        Ok(true) => format!(
            "✅ Successfully removed chat from notification list!\n\n\
Chat: <b>{title}</b>\n\
ID: <code>{}</code>\n\n\
Use /add_telegram_notify to start receiving notifications again.",
            ctx.chat_id
        ),
        Ok(false) => format!(
            "ℹ️ This chat was not in the notification list.\n\n\
Chat: <b>{title}</b>\n\
ID: <code>{}</code>\n\n\
Use /add_telegram_notify to start receiving notifications.",
            ctx.chat_id
        ),
        Err(e) => format!("❌ Error removing chat: {}", escape_html(&e.to_string())),
    }
}

fn list_chats(state: &AppState) -> Vec<String> {
    let chats = match state.store.list_chats() {
        Ok(chats) => chats,
        Err(e) => return vec![format!("❌ Error listing chats: {}", escape_html(&e.to_string()))],
    };
    if chats.is_empty() {
        return vec![
            "📝 No chats are currently receiving notifications.\n\n\
Use /add_telegram_notify in a group/channel to add it to the list."
                .to_string(),
        ];
    }

    let entries: Vec<String> = chats
        .iter()
        .map(|c| {
            format!(
                "• <b>{}</b>\n  Type: {}\n  ID: <code>{}</code>\n  Added: {}",
                escape_html(&c.title),
                c.kind,
                c.id,
                c.added_at.format("%Y-%m-%d %H:%M UTC")
            )
        })
        .collect();

    let limit = state.messenger.capabilities().max_message_len;
    split_entries("📝 <b>Chats receiving notifications:</b>\n\n", &entries, limit)
}

async fn add_channel(state: &AppState, arg: &str) -> String {
    let mut args = arg.split_whitespace();
    let (Some(name), Some(channel_id)) = (args.next(), args.next()) else {
        return "❌ Usage: /add_youtube_channel &lt;channel_name&gt; &lt;channel_id&gt;\n\n\
Example: /add_youtube_channel PewDiePie UC-lHJZR3Gqxm24_Vd_AJ5Yw"
            .to_string();
    };

    let identity = match state.content.verify_channel(channel_id).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            return format!(
                "❌ Could not find YouTube channel with ID: {}\n\
Please verify the channel ID is correct.",
                escape_html(channel_id)
            )
        }
        Err(e) => return format!("❌ Error adding channel: {}", escape_html(&e.to_string())),
    };

    // The provider's title wins over the name typed by the admin.
    let title = if identity.title.trim().is_empty() {
        name.to_string()
    } else {
        identity.title
    };
    let channel = match MonitoredChannel::new(&title, channel_id) {
        Ok(c) => c,
        Err(e) => return format!("❌ Error adding channel: {}", escape_html(&e.to_string())),
    };

    match state.store.add_channel(channel.clone()) {
        Ok(true) => format!(
            "✅ Successfully added YouTube channel!\n\n\
Channel: <b>{}</b>\n\
ID: <code>{}</code>",
            escape_html(&channel.name),
            escape_html(&channel.id)
        ),
        Ok(false) => format!(
            "ℹ️ This channel is already in the monitoring list.\n\n\
Channel: <b>{}</b>\n\
ID: <code>{}</code>",
            escape_html(&channel.name),
            escape_html(&channel.id)
        ),
        Err(e) => format!("❌ Error adding channel: {}", escape_html(&e.to_string())),
    }
}

fn remove_channel(state: &AppState, arg: &str) -> String {
    let Some(channel_id) = arg.split_whitespace().next() else {
        return "❌ Usage: /remove_youtube_channel &lt;channel_id&gt;\n\n\
Use /list_youtube_channels to see all channel IDs"
            .to_string();
    };

    let existing = match state.store.get_channel(channel_id) {
        Ok(c) => c,
        Err(e) => return format!("❌ Error removing channel: {}", escape_html(&e.to_string())),
    };
    let not_found = || {
        format!(
            "❌ Channel with ID <code>{}</code> not found in monitoring list.\n\n\
Use /list_youtube_channels to see all monitored channels.",
            escape_html(channel_id)
        )
    };
    let Some(existing) = existing else {
        return not_found();
    };

    match state.store.remove_channel(channel_id) {
        Ok(true) => format!(
            "✅ Successfully removed YouTube channel!\n\n\
Channel: <b>{}</b>\n\
ID: <code>{}</code>",
            escape_html(&existing.name),
            escape_html(&existing.id)
        ),
        Ok(false) => not_found(),
        Err(e) => format!("❌ Error removing channel: {}", escape_html(&e.to_string())),
    }
}

fn list_channels(state: &AppState) -> Vec<String> {
    let channels = match state.store.list_channels() {
        Ok(c) => c,
        Err(e) => {
            return vec![format!("❌ Error listing channels: {}", escape_html(&e.to_string()))]
        }
    };
    if channels.is_empty() {
        return vec![
            "📝 No YouTube channels are currently being monitored.\n\n\
Use /add_youtube_channel to add a channel."
                .to_string(),
        ];
    }

    let entries: Vec<String> = channels
        .iter()
        .map(|c| {
            format!(
                "• <b>{}</b>\n  ID: <code>{}</code>",
                escape_html(&c.name),
                escape_html(&c.id)
            )
        })
        .collect();

    let limit = state.messenger.capabilities().max_message_len;
    split_entries("📝 <b>Monitored YouTube Channels:</b>\n\n", &entries, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::{path::PathBuf, sync::Arc, time::Duration};
    use ytn_core::{
        config::{Config, Pacing},
        domain::{ActivityRef, ChannelIdentity, MessageId, MessageRef, VideoItem},
        errors::Error,
        messaging::{
            port::MessagingPort,
            types::{MessagingCapabilities, SendResult},
        },
        ports::ContentSource,
        store::{ConfigStore, JsonConfigStore},
        Result,
    };

    struct FakeSource;

    #[async_trait]
    impl ContentSource for FakeSource {
        async fn verify_channel(&self, channel_id: &str) -> Result<Option<ChannelIdentity>> {
            match channel_id {
                "UCmissing" => Ok(None),
                "UCbroken" => Err(Error::External("quota exceeded".to_string())),
                _ => Ok(Some(ChannelIdentity {
                    id: channel_id.to_string(),
                    title: "Official Title".to_string(),
                })),
            }
        }

        async fn list_recent_uploads(
            &self,
            _channel_id: &str,
            _since: DateTime<Utc>,
            _max_results: u32,
        ) -> Result<Vec<ActivityRef>> {
            Ok(vec![])
        }

        async fn get_item_detail(&self, video_id: &str) -> Result<VideoItem> {
            Err(Error::NotFound(video_id.to_string()))
        }

        async fn fetch_thumbnail(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(vec![])
        }
    }

    struct NullMessenger {
        limit: usize,
    }

    #[async_trait]
    impl MessagingPort for NullMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_html: true,
                max_message_len: self.limit,
                max_caption_len: 1024,
            }
        }

        async fn send_photo(
            &self,
            chat_id: ChatId,
            _photo: &[u8],
            _caption_html: &str,
        ) -> SendResult<MessageRef> {
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }

        async fn send_html(&self, chat_id: ChatId, _html: &str) -> SendResult<MessageRef> {
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }
    }

    fn state(name: &str, limit: usize) -> AppState {
        let dir = PathBuf::from(format!("/tmp/ytn-cmd-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let store: Arc<dyn ConfigStore> = Arc::new(JsonConfigStore::open(&dir).unwrap());
        let cfg = Config {
            telegram_bot_token: "t".to_string(),
            youtube_api_key: "k".to_string(),
            youtube_api_base: "http://localhost".to_string(),
            admin_users: vec![1],
            data_dir: dir,
            http_timeout: Duration::from_secs(30),
            pacing: Pacing::default(),
        };
        AppState {
            cfg: Arc::new(cfg),
            store,
            content: Arc::new(FakeSource),
            messenger: Arc::new(NullMessenger { limit }),
        }
    }

    fn ctx(id: i64, title: Option<&str>) -> CommandContext {
        CommandContext {
            chat_id: ChatId(id),
            chat_title: title.map(str::to_string),
            chat_kind: ChatKind::Supergroup,
        }
    }

    async fn run(state: &AppState, ctx: &CommandContext, text: &str) -> Vec<String> {
        let (cmd, arg) = parse_command(text).unwrap();
        execute(state, ctx, cmd, &arg).await
    }

    #[test]
    fn parses_known_commands_with_bot_suffix() {
        assert_eq!(
            parse_command("/add_youtube_channel@ytn_bot Foo UC1"),
            Some((Command::AddYoutubeChannel, "Foo UC1".to_string()))
        );
        assert_eq!(
            parse_command("  /LIST_NOTIFY "),
            Some((Command::ListNotify, String::new()))
        );
        assert_eq!(parse_command("/start"), None);
        assert_eq!(parse_command("hello"), None);
    }

    #[test]
    fn how_text_reflects_interval() {
        assert!(how_text(300).contains("every 5 minutes"));
        assert!(how_text(60).contains("every minute"));
        assert!(how_text(90).contains("every 90 seconds"));
    }

    #[tokio::test]
    async fn add_and_remove_current_chat() {
        let st = state("chat", 4096);
        let here = ctx(-100, Some("Group <One>"));

        let r = run(&st, &here, "/add_telegram_notify").await;
        assert!(r[0].starts_with("✅"));
        assert!(r[0].contains("Group &lt;One&gt;"));
        assert!(r[0].contains("Type: supergroup"));
        assert!(run(&st, &here, "/add_telegram_notify").await[0].starts_with("ℹ️"));

        let stored = st.store.list_chats().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Group <One>");

        assert!(run(&st, &here, "/remove_notify").await[0].starts_with("✅"));
        assert!(run(&st, &here, "/remove_notify").await[0].contains("was not in"));
        assert!(st.store.list_chats().unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_notify_splits_long_lists() {
        let st = state("list", 300);
        for id in 0..20 {
            run(&st, &ctx(id, Some("A fairly long group title")), "/add_telegram_notify").await;
        }

        let replies = run(&st, &ctx(0, None), "/list_notify").await;
        assert!(replies.len() > 1);
        assert!(replies.iter().all(|r| r.len() <= 300));
        assert!(replies[0].starts_with("📝 <b>Chats receiving notifications:</b>"));
        let total: usize = replies.iter().map(|r| r.matches("• <b>").count()).sum();
        assert_eq!(total, 20);
    }

    #[tokio::test]
    async fn list_channels_splits_long_lists() {
        let st = state("list-channels", 200);
        for n in 0..15 {
            let channel = MonitoredChannel::new("Some Monitored Channel", &format!("UC{n:020}"));
            st.store.add_channel(channel.unwrap()).unwrap();
        }

        let replies = run(&st, &ctx(1, None), "/list_youtube_channels").await;
        assert!(replies.len() > 1);
        assert!(replies.iter().all(|r| r.len() <= 200));
        assert!(replies[0].starts_with("📝 <b>Monitored YouTube Channels:</b>"));
        let total: usize = replies.iter().map(|r| r.matches("• <b>").count()).sum();
        assert_eq!(total, 15);
    }

    #[tokio::test]
    async fn empty_lists_explain_how_to_add() {
        let st = state("empty", 4096);
        assert!(run(&st, &ctx(1, None), "/list_notify").await[0].contains("No chats"));
        assert!(run(&st, &ctx(1, None), "/list_youtube_channels").await[0]
            .contains("No YouTube channels"));
    }

    #[tokio::test]
    async fn add_channel_stores_provider_title() {
        let st = state("add-channel", 4096);
        let here = ctx(1, None);

        let r = run(&st, &here, "/add_youtube_channel typed UC1").await;
        assert!(r[0].contains("<b>Official Title</b>"));
        assert_eq!(
            st.store.get_channel("UC1").unwrap().unwrap().name,
            "Official Title"
        );
        assert!(run(&st, &here, "/add_youtube_channel typed UC1").await[0].starts_with("ℹ️"));

        assert!(run(&st, &here, "/add_youtube_channel x UCmissing").await[0]
            .contains("Could not find"));
        assert!(run(&st, &here, "/add_youtube_channel x UCbroken").await[0]
            .contains("❌ Error adding channel: external error: quota exceeded"));
        assert!(run(&st, &here, "/add_youtube_channel only").await[0].contains("Usage"));
        assert_eq!(st.store.list_channels().unwrap().len(), 1);

        let listed = run(&st, &here, "/list_youtube_channels").await;
        assert!(listed[0].contains("<code>UC1</code>"));
    }

    #[tokio::test]
    async fn remove_channel_echoes_name() {
        let st = state("rm-channel", 4096);
        let here = ctx(1, None);
        run(&st, &here, "/add_youtube_channel typed UC1").await;

        let r = run(&st, &here, "/remove_youtube_channel UC1").await;
        assert!(r[0].contains("<b>Official Title</b>"));
        assert!(run(&st, &here, "/remove_youtube_channel UC1").await[0].contains("not found"));
        assert!(run(&st, &here, "/remove_youtube_channel").await[0].contains("Usage"));
    }
}
