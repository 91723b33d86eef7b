//! Telegram update handlers.
//!
//! Only the admin commands are handled. Every other message is ignored since
//! the bot mostly lives in group chats.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::{info, warn};

use ytn_core::{
    domain::{ChatId, ChatKind, UserId},
    security::is_authorized,
};

use crate::router::AppState;

mod commands;

use commands::{execute, parse_command, CommandContext};

const UNAUTHORIZED: &str = "⛔️ Sorry, only admin users can use this bot.";

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some((cmd, arg)) = parse_command(text) else {
        return Ok(());
    };

    let chat_id = ChatId(msg.chat.id.0);
    let user_id = msg.from().map(|u| UserId(u.id.0 as i64));

    if !is_authorized(user_id, &state.cfg.admin_users) {
        warn!(%chat_id, user_id = ?user_id.map(|u| u.0), ?cmd, "unauthorized command");
        if let Err(e) = state.messenger.send_html(chat_id, UNAUTHORIZED).await {
            warn!(%chat_id, "failed to send reply: {e}");
        }
        return Ok(());
    }

    info!(%chat_id, ?cmd, "admin command");
    let ctx = CommandContext {
        chat_id,
        chat_title: chat_title(&msg),
        chat_kind: chat_kind(&msg),
    };

    for reply in execute(&state, &ctx, cmd, &arg).await {
        if let Err(e) = state.messenger.send_html(chat_id, &reply).await {
            warn!(%chat_id, "failed to send reply: {e}");
        }
    }

    Ok(())
}

fn chat_title(msg: &Message) -> Option<String> {
    msg.chat
        .title()
        .or_else(|| msg.chat.username())
        .or_else(|| msg.chat.first_name())
        .map(str::to_string)
}

fn chat_kind(msg: &Message) -> ChatKind {
    let chat = &msg.chat;
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else if chat.is_group() {
        ChatKind::Group
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Unknown
    }
}
