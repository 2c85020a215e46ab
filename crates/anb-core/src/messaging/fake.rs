//! Recording messenger for tests.

use std::sync::{
    atomic::{AtomicBool, AtomicI32, Ordering},
    Mutex,
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    errors::Error,
    Result,
};

#[derive(Default)]
pub struct RecordingMessenger {
    next_id: AtomicI32,
    sent: Mutex<Vec<(ChatId, String)>>,
    failing: AtomicBool,
}

impl RecordingMessenger {
    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        MessageRef {
            chat_id,
            message_id: MessageId(id),
        }
    }

    /// While set, every send fails and nothing is recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_html(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, html)| html).collect()
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: 4096,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::External("chat unavailable".to_string()));
        }
        self.sent.lock().unwrap().push((chat_id, html.to_string()));
        Ok(self.alloc(chat_id))
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        _keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.send_html(chat_id, html).await
    }

    async fn edit_inline_keyboard(
        &self,
        _msg: MessageRef,
        _html: &str,
        _keyboard: InlineKeyboard,
    ) -> Result<()> {
        Ok(())
    }

    async fn answer_callback_query(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
        Ok(())
    }
}
