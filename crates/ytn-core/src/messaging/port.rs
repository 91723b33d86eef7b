use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{MessagingCapabilities, SendResult},
};

/// Outbound messaging port.
///
/// Telegram is the only implementation; failures come back already
/// classified so callers never inspect transport error strings.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    /// Send an image with an HTML caption.
    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &[u8],
        caption_html: &str,
    ) -> SendResult<MessageRef>;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> SendResult<MessageRef>;
}
