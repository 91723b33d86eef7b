//! Telegram adapter (teloxide).
//!
//! This crate implements the `ytn-core` MessagingPort over Telegram Bot API
//! and hosts the admin command surface.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode},
    ApiError, RequestError,
};

use tokio::time::sleep;
use tracing::warn;

pub mod handlers;
pub mod router;

use ytn_core::{
    config::Config,
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{MessagingCapabilities, SendError, SendResult},
    },
    Result,
};

/// Build a bot whose HTTP client uses the configured request timeout.
pub fn build_bot(cfg: &Config) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(cfg.http_timeout)
        .build()
        .map_err(|e| Error::External(format!("telegram http client build: {e}")))?;
    Ok(Bot::with_client(cfg.telegram_bot_token.clone(), client))
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    /// One retry on flood control, then classify.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> SendResult<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(RequestError::RetryAfter(secs)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    warn!(retry_after = ?secs, "telegram flood control, waiting");
                    sleep(secs).await;
                }
                Err(other) => return Err(classify_request_error(&other)),
            }
        }
    }
}

/// Map a teloxide error onto the delivery failure kinds the dispatcher acts on.
pub fn classify_request_error(e: &RequestError) -> SendError {
    match e {
        RequestError::Api(api) => match api {
            ApiError::ChatNotFound
            | ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::UserDeactivated => SendError::DestinationGone(api.to_string()),
            ApiError::Unknown(msg) => SendError::classify(msg),
            other => SendError::classify(&other.to_string()),
        },
        RequestError::MigrateToChatId(id) => {
            SendError::DestinationGone(format!("group migrated to supergroup {id}"))
        }
        RequestError::Network(e) => SendError::Transient(e.to_string()),
        RequestError::Io(e) => SendError::Transient(e.to_string()),
        RequestError::RetryAfter(secs) => {
            SendError::Transient(format!("flood control, retry after {:?}", secs))
        }
        other => SendError::classify(&other.to_string()),
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_html: true,
            max_message_len: 4096,
            max_caption_len: 1024,
        }
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &[u8],
        caption_html: &str,
    ) -> SendResult<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_photo(
                        Self::tg_chat(chat_id),
                        InputFile::memory(photo.to_vec()).file_name("thumbnail.jpg"),
                    )
                    .caption(caption_html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> SendResult<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }
}
