//! Announcement records and the normalization helpers applied while scraping.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date placeholder for rows without a date element.
pub const MISSING_DATE: &str = "N/A";
/// Title placeholder for rows without an anchor (or with an empty one).
pub const MISSING_TITLE: &str = "無標題公告";
/// Link placeholder for rows without a usable `href`.
pub const MISSING_LINK: &str = "#";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One announcement as shown on the source page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementRecord {
    pub date: String,
    /// Older state files call this field `content`.
    #[serde(alias = "content")]
    pub title: String,
    pub link: String,
}

impl AnnouncementRecord {
    pub fn new(date: impl Into<String>, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            title: title.into(),
            link: link.into(),
        }
    }

    /// Identity used for "already seen": date and title only.
    ///
    /// Links may be rewritten upstream without counting as a new announcement.
    pub fn same_announcement(&self, other: &AnnouncementRecord) -> bool {
        self.date == other.date && self.title == other.title
    }

    pub fn has_link(&self) -> bool {
        self.link != MISSING_LINK
    }
}

/// Re-emit `raw` as `YYYY-MM-DD` when it parses as such, otherwise pass it through.
pub fn normalize_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(d) => d.format(DATE_FORMAT).to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Site-relative hrefs (`/p/...`) become absolute; anything else is kept as-is.
pub fn resolve_link(origin: &str, href: &str) -> String {
    if href.starts_with('/') {
        return format!("{}{href}", origin.trim_end_matches('/'));
    }
    href.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_dates_are_kept() {
        assert_eq!(normalize_date("2024-12-10"), "2024-12-10");
    }

    #[test]
    fn malformed_dates_pass_through() {
        assert_eq!(normalize_date("公告日期不明"), "公告日期不明");
        assert_eq!(normalize_date("N/A"), "N/A");
        assert_eq!(normalize_date("2024/12/10"), "2024/12/10");
        assert_eq!(normalize_date(""), "");
    }

    #[test]
    fn relative_links_get_the_origin() {
        assert_eq!(
            resolve_link("https://www.nsysu.edu.tw", "/p/406-1000-1.php"),
            "https://www.nsysu.edu.tw/p/406-1000-1.php"
        );
        assert_eq!(
            resolve_link("https://www.nsysu.edu.tw/", "/p/x"),
            "https://www.nsysu.edu.tw/p/x"
        );
    }

    #[test]
    fn absolute_links_and_placeholder_are_untouched() {
        assert_eq!(
            resolve_link("https://www.nsysu.edu.tw", "https://other.example/a"),
            "https://other.example/a"
        );
        assert_eq!(resolve_link("https://www.nsysu.edu.tw", MISSING_LINK), "#");
    }

    #[test]
    fn identity_ignores_link() {
        let a = AnnouncementRecord::new("2024-01-10", "A", "https://x/1");
        let b = AnnouncementRecord::new("2024-01-10", "A", "https://x/2");
        let c = AnnouncementRecord::new("2024-01-11", "A", "https://x/1");
        assert!(a.same_announcement(&b));
        assert!(!a.same_announcement(&c));
    }
}
