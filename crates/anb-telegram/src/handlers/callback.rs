use std::sync::Arc;

use teloxide::prelude::*;

use anb_core::{
    domain::{ChatId, MessageId, MessageRef},
    events::{
        event_keyboard, parse_event_callback, render_event_card, EventAction, JoinOutcome,
        LeaveOutcome,
    },
};

use super::commands::participant;
use crate::router::AppState;

const ALREADY_JOINED: &str = "你已經報名過了！";
const NOT_JOINED: &str = "您未報名，無法取消！";
const EVENT_GONE: &str = "找不到這個活動！";

pub async fn handle_callback(
    _bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let data = q.data.clone().unwrap_or_default();

    let Some(action) = parse_event_callback(&data) else {
        tracing::debug!(data = %data, "ignoring unknown callback data");
        let _ = state.messenger.answer_callback_query(&cb_id, None).await;
        return Ok(());
    };

    let who = participant(&q.from);

    // Mutate and snapshot the card under one lock so the edit reflects this press.
    let (toast, card) = {
        let mut events = state.events.lock().await;
        let (id, toast) = match action {
            EventAction::Join(id) => match events.join(id, who.clone()) {
                Ok(JoinOutcome::Joined) => (id, None),
                Ok(JoinOutcome::AlreadyJoined) => (id, Some(ALREADY_JOINED.to_string())),
                Err(_) => (id, Some(EVENT_GONE.to_string())),
            },
            EventAction::Leave(id) => match events.leave(id, &who) {
                Ok(LeaveOutcome::Left) => (id, Some(format!("{} 已取消報名！", who.display))),
                Ok(LeaveOutcome::NotJoined) => (id, Some(NOT_JOINED.to_string())),
                Err(_) => (id, Some(EVENT_GONE.to_string())),
            },
        };
        let card = events.get(id).ok().map(|e| (e.id, render_event_card(e)));
        (toast, card)
    };

    if let (Some((id, html)), Some(m)) = (card, q.message.as_ref()) {
        let msg = MessageRef {
            chat_id: ChatId(m.chat.id.0),
            message_id: MessageId(m.id.0),
        };
        if let Err(e) = state
            .messenger
            .edit_inline_keyboard(msg, &html, event_keyboard(id))
            .await
        {
            // Telegram rejects edits that leave the text unchanged.
            tracing::debug!(event = id, "event card edit skipped: {e}");
        }
    }

    if let Err(e) = state
        .messenger
        .answer_callback_query(&cb_id, toast.as_deref())
        .await
    {
        tracing::warn!("failed to answer callback: {e}");
    }

    Ok(())
}
