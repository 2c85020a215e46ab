use async_trait::async_trait;

use crate::{
    chunking::split_message,
    domain::{ChatId, MessageRef},
    messaging::types::{InlineKeyboard, MessagingCapabilities},
    Result,
};

/// Outbound side of the chat platform.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    /// Replace the text of a keyboard message, keeping (re-sending) its buttons.
    async fn edit_inline_keyboard(
        &self,
        msg: MessageRef,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}

/// Send `html` as ordered chunks no longer than `limit` chars, split between lines.
///
/// Stops at the first failed send so later chunks never arrive out of context.
pub async fn send_html_chunked(
    messenger: &dyn MessagingPort,
    chat_id: ChatId,
    html: &str,
    limit: usize,
) -> Result<usize> {
    let limit = limit.min(messenger.capabilities().max_message_len);
    let chunks = split_message(html, limit);
    let mut sent = 0usize;
    for chunk in chunks.iter().filter(|c| !c.trim().is_empty()) {
        messenger.send_html(chat_id, chunk).await?;
        sent += 1;
    }
    Ok(sent)
}
