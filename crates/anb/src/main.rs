use std::sync::Arc;

use anb_core::{
    config::Config,
    fetcher::HttpFetcher,
    service::AnnouncementService,
    watermark::{JsonFileStore, WatermarkTracker},
};

#[tokio::main]
async fn main() -> Result<(), anb_core::Error> {
    anb_core::logging::init("anb")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        url = %cfg.announcements_url,
        watermark = %cfg.watermark_file.display(),
        "starting announcement bot"
    );

    let source = Arc::new(HttpFetcher::from_config(&cfg)?);
    let tracker = WatermarkTracker::new(Arc::new(JsonFileStore::new(cfg.watermark_file.clone())));
    let service = Arc::new(AnnouncementService::new(source, tracker));

    anb_telegram::router::run_polling(cfg, service)
        .await
        .map_err(|e| anb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
