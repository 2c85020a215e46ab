//! Announcement page fetching and parsing.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::{
    announcement::{
        normalize_date, resolve_link, AnnouncementRecord, MISSING_DATE, MISSING_LINK,
        MISSING_TITLE,
    },
    config::Config,
    Error, Result,
};

const CONTAINER_SELECTOR: &str = "div.minner";
const ROW_SELECTOR: &str = "div.minner table tbody tr";
const DATE_SELECTOR: &str = "div.d-txt";
const LINK_SELECTOR: &str = "a";

/// Source of the current announcement list, newest first.
#[async_trait]
pub trait AnnouncementSource: Send + Sync {
    /// Fetch and parse, reporting why it failed.
    async fn try_fetch(&self) -> Result<Vec<AnnouncementRecord>>;

    /// Fetch and parse; any failure yields an empty list.
    async fn fetch(&self) -> Vec<AnnouncementRecord> {
        match self.try_fetch().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("announcement fetch failed: {e}");
                Vec::new()
            }
        }
    }
}

/// Fetches the announcements page over HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
    origin: String,
}

impl HttpFetcher {
    pub fn new(url: impl Into<String>, origin: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            origin: origin.into(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            cfg.announcements_url.clone(),
            cfg.site_origin.clone(),
            cfg.fetch_timeout,
        )
    }
}

#[async_trait]
impl AnnouncementSource for HttpFetcher {
    async fn try_fetch(&self) -> Result<Vec<AnnouncementRecord>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?;
        let body = resp.bytes().await?;

        // The page is UTF-8 regardless of what the server declares.
        let html = String::from_utf8_lossy(&body);
        let items = parse_announcements(&html, &self.origin)?;
        tracing::debug!(count = items.len(), url = %self.url, "fetched announcements");
        Ok(items)
    }
}

/// Parse the announcements table into records, one per row, in page order.
///
/// Missing pieces of a row are replaced with placeholders; rows are never dropped.
pub fn parse_announcements(html: &str, origin: &str) -> Result<Vec<AnnouncementRecord>> {
    let container = selector(CONTAINER_SELECTOR)?;
    let rows = selector(ROW_SELECTOR)?;
    let date_sel = selector(DATE_SELECTOR)?;
    let link_sel = selector(LINK_SELECTOR)?;

    let document = Html::parse_document(html);
    if document.select(&container).next().is_none() {
        return Err(Error::Parse(format!(
            "announcement container `{CONTAINER_SELECTOR}` not found"
        )));
    }

    Ok(document
        .select(&rows)
        .map(|row| parse_row(row, &date_sel, &link_sel, origin))
        .collect())
}

fn parse_row(
    row: ElementRef<'_>,
    date_sel: &Selector,
    link_sel: &Selector,
    origin: &str,
) -> AnnouncementRecord {
    let date = row
        .select(date_sel)
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_else(|| MISSING_DATE.to_string());

    let anchor = row.select(link_sel).next();
    let title = anchor
        .map(|a| element_text(&a))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| MISSING_TITLE.to_string());
    let href = anchor
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or(MISSING_LINK);

    AnnouncementRecord {
        date: normalize_date(&date),
        title,
        link: resolve_link(origin, href),
    }
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("invalid selector `{css}`: {e}")))
}
