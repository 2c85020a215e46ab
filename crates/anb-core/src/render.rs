//! Telegram-HTML rendering of announcement lists.

use chrono::{DateTime, Local};

use crate::{
    announcement::AnnouncementRecord,
    watermark::{Diff, DiffStatus},
};

pub const FETCH_FAILED: &str = "抱歉，無法獲取公告資訊。";

const ICONS: [&str; 5] = ["📢", "📣", "🔔", "📋", "📝"];
const DETAILS_LABEL: &str = "點擊查看詳情";
const NO_LINK_LABEL: &str = "(無連結)";
const RULE_WIDTH: usize = 50;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn format_timestamp(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// One line per announcement; icons restart for every section.
pub fn format_entry(index: usize, item: &AnnouncementRecord) -> String {
    let icon = ICONS[index % ICONS.len()];
    let link = if item.has_link() {
        format!("<a href=\"{}\">{DETAILS_LABEL}</a>", escape_html(&item.link))
    } else {
        NO_LINK_LABEL.to_string()
    };
    format!(
        "{icon} <b>{}</b> - {} {link}\n",
        escape_html(&item.date),
        escape_html(&item.title)
    )
}

fn push_entries(out: &mut String, items: &[AnnouncementRecord]) {
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format_entry(i, item));
    }
}

/// Reply for the "latest" command: new entries, a separator, then the rest.
pub fn render_latest(diff: &Diff, now: DateTime<Local>) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = format!("📌 <b>中山大學最新公告（{}）：</b>\n\n", format_timestamp(now));

    push_entries(&mut out, &diff.new_items);

    if diff.status == DiffStatus::WatermarkNotFound {
        out.push_str("\n⚠️ 找不到上次記錄的公告，無法判斷哪些是新公告。\n");
    }

    out.push_str(&format!("\n{rule}\n📜 <b>以下為先前公告</b>\n{rule}\n\n"));
    push_entries(&mut out, diff.previous_items());
    out
}

/// Timer notification listing only the new entries.
pub fn render_new_only(items: &[AnnouncementRecord], now: DateTime<Local>) -> String {
    let mut out = format!("🆕 <b>中山大學新公告（{}）：</b>\n\n", format_timestamp(now));
    push_entries(&mut out, items);
    out
}

pub fn render_search(keyword: &str, matches: &[AnnouncementRecord], now: DateTime<Local>) -> String {
    let mut out = format!(
        "🔍 <b>包含關鍵字 '{}' 的公告（{}）：</b>\n\n",
        escape_html(keyword),
        format_timestamp(now)
    );
    push_entries(&mut out, matches);
    out
}

pub fn search_not_found(keyword: &str) -> String {
    format!("找不到包含關鍵字 '{}' 的公告。", escape_html(keyword))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::watermark::diff_against;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 12, 10, 9, 30, 0).unwrap()
    }

    fn rec(date: &str, title: &str) -> AnnouncementRecord {
        AnnouncementRecord::new(date, title, format!("https://www.nsysu.edu.tw/p/{title}"))
    }

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn entry_has_icon_date_title_and_link() {
        let line = format_entry(1, &rec("2024-12-10", "R&D <說明會>"));
        assert_eq!(
            line,
            "📣 <b>2024-12-10</b> - R&amp;D &lt;說明會&gt; <a href=\"https://www.nsysu.edu.tw/p/R&amp;D &lt;說明會&gt;\">點擊查看詳情</a>\n"
        );
    }

    #[test]
    fn placeholder_link_is_not_an_anchor() {
        let line = format_entry(0, &AnnouncementRecord::new("N/A", "無標題公告", "#"));
        assert!(!line.contains("<a "));
        assert!(line.contains("(無連結)"));
    }

    #[test]
    fn icons_cycle_every_five_entries() {
        assert!(format_entry(0, &rec("d", "t")).starts_with("📢"));
        assert!(format_entry(5, &rec("d", "t")).starts_with("📢"));
        assert!(format_entry(4, &rec("d", "t")).starts_with("📝"));
    }

    #[test]
    fn latest_puts_new_items_above_the_separator() {
        let fresh = vec![rec("2024-01-12", "C"), rec("2024-01-11", "B"), rec("2024-01-10", "A")];
        let mark = rec("2024-01-11", "B");
        let html = render_latest(&diff_against(Some(&mark), &fresh), now());

        assert!(html.starts_with("📌 <b>中山大學最新公告（2024-12-10 09:30:00）：</b>"));
        let sep = html.find("以下為先前公告").unwrap();
        assert!(html.find("- C ").unwrap() < sep);
        assert!(html.find("- B ").unwrap() > sep);
        assert!(html.find("- A ").unwrap() > sep);
        assert!(!html.contains("⚠️"));
    }

    #[test]
    fn latest_flags_a_missing_watermark() {
        let fresh = vec![rec("2024-01-12", "C")];
        let mark = rec("2023-01-01", "old");
        let html = render_latest(&diff_against(Some(&mark), &fresh), now());
        assert!(html.contains("⚠️"));
        assert!(html.find("- C ").unwrap() > html.find("以下為先前公告").unwrap());
    }

    #[test]
    fn search_reply_lists_matches() {
        let html = render_search("國科", &[rec("2024-01-12", "國科會計畫")], now());
        assert!(html.contains("包含關鍵字 '國科'"));
        assert!(html.contains("國科會計畫"));
        assert_eq!(search_not_found("<x>"), "找不到包含關鍵字 '&lt;x&gt;' 的公告。");
    }
}
