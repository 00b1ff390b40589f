use crate::markdown::{escape_html, HtmlSanitizer};
use crate::model::LogEntry;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(140);

#[derive(Debug, Clone, PartialEq)]
pub struct JournalCard {
    pub date: NaiveDate,
    pub date_label: String,
    pub title: String,
    pub body: String,
    pub footnotes: String,
    pub body_html: String,
    pub footnotes_html: Option<String>,
    pub search_text: String,
    pub expanded: bool,
    pub visible: bool,
}

pub struct JournalView {
    cards: Vec<JournalCard>,
    all_expanded: bool,
    query: String,
    sanitizer: HtmlSanitizer,
}

/// Holds back search input until typing pauses for `wait`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    wait: Duration,
    pending: Option<(String, Instant)>,
}

pub fn date_label(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// First non-blank line becomes the title with heading markers at column zero
/// removed; the rest is the body. Entries without any text get a synthetic title.
pub fn split_title(date: NaiveDate, main: &str) -> (String, String) {
    let mut lines: Vec<&str> = main.split('\n').collect();
    match lines.iter().position(|l| !l.trim().is_empty()) {
        Some(idx) => {
            let title = lines[idx].trim_start_matches('#').trim().to_string();
            lines.remove(idx);
            (title, lines.join("\n").trim().to_string())
        }
        None => (format!("Entry {}", date.format("%Y-%m-%d")), main.to_string()),
    }
}

pub fn build_card(
    date: NaiveDate,
    entry: &LogEntry,
    sanitizer: &HtmlSanitizer,
    expanded: bool,
) -> Option<JournalCard> {
    if entry.is_blank() {
        return None;
    }
    let (title, body) = split_title(date, &entry.main);
    let label = date_label(date);
    let search_text = format!("{} {} {} {}", title, body, entry.footnotes, label).to_lowercase();
    let footnotes_html = if entry.footnotes.trim().is_empty() {
        None
    } else {
        Some(sanitizer.render(&entry.footnotes))
    };
    Some(JournalCard {
        date,
        date_label: label,
        body_html: sanitizer.render(&body),
        title,
        body,
        footnotes: entry.footnotes.clone(),
        footnotes_html,
        search_text,
        expanded,
        visible: true,
    })
}

impl JournalView {
    pub fn new() -> Self {
        JournalView {
            cards: Vec::new(),
            all_expanded: false,
            query: String::new(),
            sanitizer: HtmlSanitizer::new(),
        }
    }

    /// Rebuilds every card newest first and re-applies the current query.
    pub fn render(&mut self, logs: &BTreeMap<NaiveDate, LogEntry>) {
        let expanded = self.all_expanded;
        self.cards = logs
            .iter()
            .rev()
            .filter_map(|(date, entry)| build_card(*date, entry, &self.sanitizer, expanded))
            .collect();
        let query = self.query.clone();
        self.filter(&query);
    }

    pub fn filter(&mut self, query: &str) {
        self.query = query.to_string();
        let needle = query.to_lowercase();
        for card in &mut self.cards {
            card.visible = card.search_text.contains(&needle);
        }
    }

    pub fn toggle_one(&mut self, idx: usize) {
        if let Some(card) = self.cards.get_mut(idx) {
            card.expanded = !card.expanded;
        }
    }

    /// Flips the shared default and applies it to every card.
    pub fn toggle_all(&mut self) {
        self.all_expanded = !self.all_expanded;
        for card in &mut self.cards {
            card.expanded = self.all_expanded;
        }
    }

    pub fn cards(&self) -> &[JournalCard] {
        &self.cards
    }

    pub fn visible(&self) -> Vec<(usize, &JournalCard)> {
        self.cards.iter().enumerate().filter(|(_, c)| c.visible).collect()
    }

    pub fn all_expanded(&self) -> bool {
        self.all_expanded
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn to_html(&self) -> String {
        if self.cards.is_empty() {
            return "<h3 style=\"text-align:center;\">No entries yet.</h3>\n".to_string();
        }
        let mut html = String::new();
        for card in self.cards.iter().filter(|c| c.visible) {
            html.push_str(&format!(
                "<div class=\"entry\" data-date=\"{}\">\n<div class=\"entry-header\"><div class=\"entry-date\">{}</div></div>\n<h3 class=\"entry-title\">{}</h3>\n<div class=\"entry-content\" style=\"display: {}\">\n<div class=\"main-text\">{}</div>\n",
                card.date.format("%Y-%m-%d"),
                escape_html(&card.date_label),
                escape_html(&card.title),
                if card.expanded { "block" } else { "none" },
                card.body_html,
            ));
            if let Some(footnotes) = &card.footnotes_html {
                html.push_str(&format!(
                    "<div class=\"footnote-block\"><div class=\"footnote-block-title\">Chronicle Addendum</div>{}</div>\n",
                    footnotes
                ));
            }
            html.push_str("</div>\n</div>\n");
        }
        html
    }
}

impl Default for JournalView {
    fn default() -> Self {
        Self::new()
    }
}

impl Debouncer {
    pub fn new(wait: Duration) -> Self {
        Debouncer { wait, pending: None }
    }

    pub fn push(&mut self, value: impl Into<String>, now: Instant) {
        self.pending = Some((value.into(), now));
    }

    /// Releases the pending value once it has been quiet for `wait`.
    pub fn ready(&mut self, now: Instant) -> Option<String> {
        match &self.pending {
            Some((_, at)) if now.duration_since(*at) >= self.wait => {
                self.pending.take().map(|(value, _)| value)
            }
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn entry(main: &str, footnotes: &str) -> LogEntry {
        LogEntry {
            main: main.into(),
            footnotes: footnotes.into(),
        }
    }

    #[test]
    fn title_is_first_non_blank_line() {
        assert_eq!(
            split_title(date(1), "\n\nHello\nWorld"),
            ("Hello".to_string(), "World".to_string())
        );
        assert_eq!(
            split_title(date(1), "# Title\nBody"),
            ("Title".to_string(), "Body".to_string())
        );
        assert_eq!(
            split_title(date(1), "##Spaced  \n\n  more  \n"),
            ("Spaced".to_string(), "more".to_string())
        );
    }

    #[test]
    fn indented_hash_stays_in_title() {
        assert_eq!(
            split_title(date(1), "   #tag day\nBody"),
            ("#tag day".to_string(), "Body".to_string())
        );
    }

    #[test]
    fn blank_main_gets_synthetic_title() {
        let (title, body) = split_title(date(4), "  \n");
        assert_eq!(title, "Entry 2026-03-04");
        assert_eq!(body, "  \n");
    }

    #[test]
    fn render_skips_blank_entries_and_orders_newest_first() {
        let mut logs = BTreeMap::new();
        logs.insert(date(1), entry("first", ""));
        logs.insert(date(2), entry("  ", "\n"));
        logs.insert(date(3), entry("", "only a footnote"));
        let mut view = JournalView::new();
        view.render(&logs);
        let dates: Vec<NaiveDate> = view.cards().iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![date(3), date(1)]);
        assert_eq!(view.cards()[0].title, "Entry 2026-03-03");
        assert!(view.cards()[0].footnotes_html.is_some());
        assert!(view.cards()[1].footnotes_html.is_none());
    }

    #[test]
    fn search_text_includes_date_label() {
        let card = build_card(date(9), &entry("Run\nfast", "Note"), &HtmlSanitizer::new(), false).unwrap();
        assert_eq!(card.date_label, "Monday, March 9, 2026");
        assert_eq!(card.search_text, "run fast note monday, march 9, 2026");
    }

    #[test]
    fn filter_matches_substrings_case_insensitively() {
        let mut logs = BTreeMap::new();
        logs.insert(date(1), entry("hello world", ""));
        logs.insert(date(2), entry("goodbye", ""));
        let mut view = JournalView::new();
        view.render(&logs);
        view.filter("WOR");
        let visible: Vec<&str> = view.visible().iter().map(|(_, c)| c.title.as_str()).collect();
        assert_eq!(visible, vec!["hello world"]);
        view.filter("");
        assert_eq!(view.visible().len(), 2);
    }

    #[test]
    fn rerender_keeps_query() {
        let mut logs = BTreeMap::new();
        logs.insert(date(1), entry("alpha", ""));
        let mut view = JournalView::new();
        view.filter("beta");
        view.render(&logs);
        assert!(view.visible().is_empty());
    }

    #[test]
    fn toggle_all_sets_default_for_future_renders() {
        let mut logs = BTreeMap::new();
        logs.insert(date(1), entry("alpha", ""));
        let mut view = JournalView::new();
        view.render(&logs);
        assert!(!view.cards()[0].expanded);
        view.toggle_one(0);
        assert!(view.cards()[0].expanded);
        view.toggle_all();
        assert!(view.all_expanded());
        logs.insert(date(2), entry("beta", ""));
        view.render(&logs);
        assert!(view.cards().iter().all(|c| c.expanded));
    }

    #[test]
    fn card_html_is_sanitized_and_escaped() {
        let mut logs = BTreeMap::new();
        logs.insert(
            date(1),
            entry("<i>Title</i>\n<img src=x onerror=alert(1)>", "[x](javascript:alert(1))"),
        );
        let mut view = JournalView::new();
        view.render(&logs);
        let html = view.to_html();
        assert!(html.contains("&lt;i&gt;Title&lt;/i&gt;"));
        assert!(!html.contains("onerror"));
        assert!(!html.contains("javascript:"));
        assert!(html.contains("Chronicle Addendum"));
    }

    #[test]
    fn debouncer_waits_for_quiet_period() {
        let start = Instant::now();
        let mut debounce = Debouncer::new(SEARCH_DEBOUNCE);
        debounce.push("h", start);
        debounce.push("he", start + Duration::from_millis(100));
        assert_eq!(debounce.ready(start + Duration::from_millis(200)), None);
        assert_eq!(
            debounce.ready(start + Duration::from_millis(240)),
            Some("he".to_string())
        );
        assert!(!debounce.is_pending());
        assert_eq!(debounce.ready(start + Duration::from_millis(400)), None);
    }
}
