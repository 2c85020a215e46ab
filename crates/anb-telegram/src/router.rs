use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};

use tokio::sync::Mutex;

use anb_core::{
    config::Config,
    domain::ChatId,
    events::EventRegistry,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    service::AnnouncementService,
    watcher::{UpdateWatcher, WatcherConfig},
};

use crate::handlers;
use crate::TelegramMessenger;

/// Shared state handed to every handler; built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub service: Arc<AnnouncementService>,
    pub events: Arc<Mutex<EventRegistry>>,
    pub messenger: Arc<dyn MessagingPort>,
}

/// Command menu shown by Telegram clients.
pub(crate) const COMMANDS: &[(&str, &str)] = &[
    ("latest", "顯示所有最新公告"),
    ("search", "搜尋包含特定關鍵字的公告"),
    ("create_activity", "創建活動：名稱 日期(YYYY/MM/DD) 時間(24小時制)"),
    ("delete_activity", "刪除指定活動"),
    ("list_activities", "列出所有活動"),
    ("commands", "顯示指令說明"),
];

pub async fn run_polling(cfg: Arc<Config>, service: Arc<AnnouncementService>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!("bot started: @{}", me.username()),
        Err(e) => tracing::warn!("get_me failed: {e}"),
    }

    let menu: Vec<BotCommand> = COMMANDS
        .iter()
        .map(|(name, desc)| BotCommand::new(*name, *desc))
        .collect();
    if let Err(e) = bot.set_my_commands(menu).await {
        tracing::warn!("failed to register command menu: {e}");
    }

    // Multi-chunk replies go to the same chat back to back; keep them spaced.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let watcher = if cfg.watcher_enabled() {
        let w = UpdateWatcher::new(
            service.clone(),
            messenger.clone(),
            WatcherConfig {
                interval: cfg.check_interval,
                chats: cfg.notify_chat_ids.iter().copied().map(ChatId).collect(),
                chunk_limit: cfg.message_safe_limit,
            },
        );
        w.start().await;
        Some(w)
    } else {
        tracing::info!("no NOTIFY_CHAT_IDS configured; periodic check disabled");
        None
    };

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        service,
        events: Arc::new(Mutex::new(EventRegistry::new())),
        messenger,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    if let Some(w) = watcher {
        w.stop().await;
    }

    Ok(())
}
