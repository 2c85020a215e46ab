//! Periodic announcement check.
//!
//! Every tick runs one fetch cycle and posts only the new entries to the
//! configured chats. The first run records a baseline without posting.

use std::{sync::Arc, time::Duration};

use chrono::Local;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::ChatId,
    messaging::port::{send_html_chunked, MessagingPort},
    render::render_new_only,
    service::AnnouncementService,
    watermark::DiffStatus,
};

#[derive(Clone, Debug)]
pub struct WatcherConfig {
    pub interval: Duration,
    pub chats: Vec<ChatId>,
    pub chunk_limit: usize,
}

/// What a single tick did; mostly for logs and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    FetchFailed,
    Baseline,
    NothingNew,
    Posted(usize),
    /// At least one chat missed the post; the watermark was left alone so the
    /// next tick sends the same entries again.
    PostFailed(usize),
}

pub struct UpdateWatcher {
    service: Arc<AnnouncementService>,
    messenger: Arc<dyn MessagingPort>,
    cfg: WatcherConfig,
    cancel: CancellationToken,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl UpdateWatcher {
    pub fn new(
        service: Arc<AnnouncementService>,
        messenger: Arc<dyn MessagingPort>,
        cfg: WatcherConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            service,
            messenger,
            cfg,
            cancel: CancellationToken::new(),
            handle: tokio::sync::Mutex::new(None),
        })
    }

    /// Spawn the timer loop. Calling it twice is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return;
        }

        let watcher = Arc::clone(self);
        *handle = Some(tokio::spawn(async move { watcher.run().await }));
        tracing::info!(
            interval_secs = self.cfg.interval.as_secs(),
            chats = self.cfg.chats.len(),
            "update watcher started"
        );
    }

    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(h) = self.handle.lock().await.take() {
            let _ = h.await;
        }
    }

    async fn run(&self) {
        let mut tick = tokio::time::interval(self.cfg.interval.max(Duration::from_secs(1)));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
              _ = self.cancel.cancelled() => break,
              _ = tick.tick() => {
                let outcome = self.check_once().await;
                tracing::debug!(?outcome, "update check finished");
              }
            }
        }
        tracing::info!("update watcher stopped");
    }

    /// Run one fetch cycle and notify chats about new entries.
    pub async fn check_once(&self) -> TickOutcome {
        let cycle = self.service.begin_cycle().await;
        let diff = cycle.diff();

        let outcome = match diff.status {
            DiffStatus::Empty => return TickOutcome::FetchFailed,
            DiffStatus::FirstRun => TickOutcome::Baseline,
            DiffStatus::UpToDate => TickOutcome::NothingNew,
            DiffStatus::WatermarkNotFound => {
                tracing::warn!(
                    fetched = diff.all_items.len(),
                    "stored watermark not on the page; not posting"
                );
                TickOutcome::NothingNew
            }
            DiffStatus::NewItems => {
                let html = render_new_only(&diff.new_items, Local::now());
                let mut failed = 0usize;
                for chat in &self.cfg.chats {
                    if let Err(e) = send_html_chunked(
                        self.messenger.as_ref(),
                        *chat,
                        &html,
                        self.cfg.chunk_limit,
                    )
                    .await
                    {
                        tracing::warn!(chat = chat.0, "failed to post new announcements: {e}");
                        failed += 1;
                    }
                }
                if failed > 0 {
                    tracing::warn!(
                        failed_chats = failed,
                        "keeping watermark so the next check resends"
                    );
                    return TickOutcome::PostFailed(diff.new_items.len());
                }
                TickOutcome::Posted(diff.new_items.len())
            }
        };

        // Commit failures are logged inside; the next tick retries.
        let _ = cycle.commit();
        outcome
    }
}
