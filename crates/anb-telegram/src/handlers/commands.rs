use std::sync::Arc;

use chrono::Local;
use teloxide::{prelude::*, types::User};

use anb_core::{
    domain::{ChatId, UserId},
    errors::Error,
    events::{event_keyboard, render_event_card, render_event_list, Participant},
    messaging::port::send_html_chunked,
    render::{escape_html, render_latest, render_search, search_not_found, FETCH_FAILED},
};

use crate::router::{AppState, COMMANDS};

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// `<name...> <date> <time>`: the last two tokens are date and time, the rest is the name.
fn parse_activity_args(arg: &str) -> Option<(String, String, String)> {
    let tokens: Vec<&str> = arg.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }
    let (name, when) = tokens.split_at(tokens.len() - 2);
    Some((name.join(" "), when[0].to_string(), when[1].to_string()))
}

pub(crate) fn participant(user: &User) -> Participant {
    let display = match &user.username {
        Some(u) => format!("@{u}"),
        None => user.full_name(),
    };
    Participant {
        user_id: UserId(user.id.0 as i64),
        display,
    }
}

fn help_text() -> String {
    let lines = COMMANDS
        .iter()
        .map(|(name, desc)| format!("• /{name} - {}", escape_html(desc)))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "📢 <b>可用指令列表</b>：\n{lines}\n\n\
範例：\n\
/search 國科\n\
/create_activity 團建 2024/12/10 18:30\n\
/delete_activity 1"
    )
}

async fn reply(state: &AppState, chat_id: i64, html: &str) {
    if let Err(e) = send_html_chunked(
        state.messenger.as_ref(),
        ChatId(chat_id),
        html,
        state.cfg.message_safe_limit,
    )
    .await
    {
        tracing::warn!(chat = chat_id, "reply failed: {e}");
    }
}

pub async fn handle_command(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat_id = msg.chat.id.0;
    let (cmd, arg) = parse_command(text);
    tracing::debug!(chat = chat_id, cmd = %cmd, "command");

    match cmd.as_str() {
        "start" | "help" | "commands" => {
            reply(&state, chat_id, &help_text()).await;
        }

        "latest" => {
            let cycle = state.service.begin_cycle().await;
            if cycle.is_empty() {
                reply(&state, chat_id, FETCH_FAILED).await;
                return Ok(());
            }
            let html = render_latest(cycle.diff(), Local::now());
            reply(&state, chat_id, &html).await;
            // A failed commit is logged by the service; the reply already went out.
            let _ = cycle.commit();
        }

        "search" => {
            let keyword = arg.trim();
            if keyword.is_empty() {
                reply(&state, chat_id, "請提供關鍵字，例如：/search 國科").await;
                return Ok(());
            }
            let html = match state.service.search(keyword).await {
                Ok(matches) => render_search(keyword, &matches, Local::now()),
                Err(Error::NotFound(_)) => search_not_found(keyword),
                Err(e) => {
                    tracing::warn!("search failed: {e}");
                    search_not_found(keyword)
                }
            };
            reply(&state, chat_id, &html).await;
        }

        "create_activity" => {
            let Some(user) = msg.from() else {
                return Ok(());
            };
            let Some((name, date, time)) = parse_activity_args(&arg) else {
                reply(
                    &state,
                    chat_id,
                    "用法：/create_activity 活動名稱 日期(YYYY/MM/DD) 時間(24小時制)",
                )
                .await;
                return Ok(());
            };

            let event = state
                .events
                .lock()
                .await
                .create(name, date, time, participant(user));
            tracing::info!(id = event.id, name = %event.name, "event created");

            if let Err(e) = state
                .messenger
                .send_inline_keyboard(
                    ChatId(chat_id),
                    &render_event_card(&event),
                    event_keyboard(event.id),
                )
                .await
            {
                tracing::warn!(chat = chat_id, "failed to send event card: {e}");
            }
        }

        "delete_activity" => {
            let Ok(id) = arg.trim().parse::<u64>() else {
                reply(&state, chat_id, "用法：/delete_activity 活動ID").await;
                return Ok(());
            };
            let removed = state.events.lock().await.delete(id);
            let html = match removed {
                Ok(event) => format!("活動 <b>{}</b> 已被刪除！", escape_html(&event.name)),
                Err(_) => "未找到該活動！".to_string(),
            };
            reply(&state, chat_id, &html).await;
        }

        "list_activities" => {
            let html = {
                let events = state.events.lock().await;
                render_event_list(&events.list())
            };
            reply(&state, chat_id, &html).await;
        }

        _ => {
            let html = format!("Unknown command: /{}", escape_html(&cmd));
            reply(&state, chat_id, &html).await;
        }
    }

    Ok(())
}
