use std::{env, path::PathBuf, time::Duration};

use url::Url;

use crate::{errors::Error, Result};

pub const DEFAULT_ANNOUNCEMENTS_URL: &str =
    "https://www.nsysu.edu.tw/p/422-1000-1314.php?Lang=zh-tw";
pub const DEFAULT_SITE_ORIGIN: &str = "https://www.nsysu.edu.tw";

/// Typed configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    /// Chats that receive timer-triggered "new announcement" posts.
    pub notify_chat_ids: Vec<i64>,

    // Scraping
    pub announcements_url: String,
    pub site_origin: String,
    pub fetch_timeout: Duration,
    /// Zero disables the periodic check.
    pub check_interval: Duration,

    // State
    pub watermark_file: PathBuf,

    // Message limits
    pub message_limit: usize,
    pub message_safe_limit: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Existing environment wins over `.env`.
        let _ = dotenvy::dotenv();

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let mut cfg = Self::with_token(telegram_bot_token);

        cfg.notify_chat_ids = parse_csv_i64(env_str("NOTIFY_CHAT_IDS"));

        if let Some(url) = env_str("ANNOUNCEMENTS_URL").and_then(non_empty) {
            cfg.announcements_url = url;
        }
        if let Some(origin) = env_str("SITE_ORIGIN").and_then(non_empty) {
            cfg.site_origin = origin;
        }
        cfg.site_origin = validate_origin(&cfg.site_origin)?;
        Url::parse(&cfg.announcements_url).map_err(|e| {
            Error::Config(format!(
                "ANNOUNCEMENTS_URL is not a valid URL ({}): {e}",
                cfg.announcements_url
            ))
        })?;

        if let Some(secs) = env_u64("FETCH_TIMEOUT_SECS").filter(|s| *s > 0) {
            cfg.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("CHECK_INTERVAL_SECS") {
            cfg.check_interval = Duration::from_secs(secs);
        }
        if let Some(path) = env_str("WATERMARK_FILE").and_then(non_empty) {
            cfg.watermark_file = PathBuf::from(path);
        }
        if let Some(limit) = env_usize("MESSAGE_LIMIT").filter(|l| *l > 0) {
            cfg.message_limit = limit;
        }
        if let Some(limit) = env_usize("MESSAGE_SAFE_LIMIT").filter(|l| *l > 0) {
            cfg.message_safe_limit = limit;
        }
        cfg.message_safe_limit = cfg.message_safe_limit.min(cfg.message_limit);

        Ok(cfg)
    }

    /// Defaults for everything except the token.
    pub fn with_token(telegram_bot_token: impl Into<String>) -> Self {
        Self {
            telegram_bot_token: telegram_bot_token.into(),
            notify_chat_ids: Vec::new(),
            announcements_url: DEFAULT_ANNOUNCEMENTS_URL.to_string(),
            site_origin: DEFAULT_SITE_ORIGIN.to_string(),
            fetch_timeout: Duration::from_secs(15),
            check_interval: Duration::from_secs(3600),
            watermark_file: PathBuf::from("last_announcement.json"),
            message_limit: 2000,
            message_safe_limit: 1900,
        }
    }

    pub fn watcher_enabled(&self) -> bool {
        !self.notify_chat_ids.is_empty() && !self.check_interval.is_zero()
    }
}

/// Origin must be scheme + host (+ port); a trailing slash is dropped.
fn validate_origin(raw: &str) -> Result<String> {
    let url = Url::parse(raw)
        .map_err(|e| Error::Config(format!("SITE_ORIGIN is not a valid URL ({raw}): {e}")))?;
    if url.host_str().is_none() {
        return Err(Error::Config(format!("SITE_ORIGIN has no host: {raw}")));
    }
    Ok(url.origin().ascii_serialization())
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}
