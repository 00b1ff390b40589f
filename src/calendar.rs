use crate::api::CalendarPayload;
use crate::color::{compute_gradient, Paint};
use crate::markdown::escape_html;
use crate::model::{DayCell, TagRegistry};
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub enum CalendarState {
    Idle,
    Loading { year: i32, month: u32 },
    Rendered(MonthView),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthView {
    pub title: String,
    pub year: i32,
    pub month: u32,
    pub prev: (i32, u32),
    pub next: (i32, u32),
    /// Seven slots per week; `None` marks padding outside the month.
    pub weeks: Vec<Vec<Option<DayCell>>>,
}

impl CalendarState {
    pub fn begin_loading(&mut self, year: i32, month: u32) {
        *self = CalendarState::Loading { year, month };
    }

    pub fn finish(&mut self, year: i32, month: u32, payload: CalendarPayload) {
        *self = CalendarState::Rendered(MonthView::new(year, month, payload));
    }

    /// Drops back to the previous view (or idle) after a failed load.
    pub fn abort(&mut self, previous: Option<MonthView>) {
        *self = match previous {
            Some(view) => CalendarState::Rendered(view),
            None => CalendarState::Idle,
        };
    }

    pub fn view(&self) -> Option<&MonthView> {
        match self {
            CalendarState::Rendered(view) => Some(view),
            _ => None,
        }
    }

    pub fn view_mut(&mut self) -> Option<&mut MonthView> {
        match self {
            CalendarState::Rendered(view) => Some(view),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, CalendarState::Loading { .. })
    }
}

impl MonthView {
    pub fn new(year: i32, month: u32, payload: CalendarPayload) -> Self {
        let weeks = payload
            .cal_data
            .into_iter()
            .map(|week| {
                week.into_iter()
                    .map(|slot| slot.map(DayCell::from))
                    .collect()
            })
            .collect();
        MonthView {
            title: format!("{} {}", payload.month_name, payload.year),
            year,
            month,
            prev: (payload.prev_year, payload.prev_month),
            next: (payload.next_year, payload.next_month),
            weeks,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = &DayCell> {
        self.weeks.iter().flatten().flatten()
    }

    pub fn cell(&self, date: NaiveDate) -> Option<&DayCell> {
        self.cells().find(|c| c.date == date)
    }

    pub fn cell_mut(&mut self, date: NaiveDate) -> Option<&mut DayCell> {
        self.weeks
            .iter_mut()
            .flatten()
            .flatten()
            .find(|c| c.date == date)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.cells().map(|c| c.date).min()
    }

    /// Static HTML for the grid. Every server-supplied value is escaped.
    pub fn to_markup(&self, today: NaiveDate, live: &TagRegistry) -> String {
        let mut html = String::new();
        html.push_str(&format!(
            "<h2 class=\"month-title\">{}</h2>\n<div id=\"calendar\">\n",
            escape_html(&self.title)
        ));
        for slot in self.weeks.iter().flatten() {
            match slot {
                None => html.push_str("<div class=\"day\" style=\"visibility:hidden\"></div>\n"),
                Some(cell) => {
                    let universe = cell.universe(today, live);
                    let paint = compute_gradient(&cell.tags, &universe);
                    html.push_str(&cell.to_markup(&paint));
                    html.push('\n');
                }
            }
        }
        html.push_str("</div>\n");
        html
    }
}

impl DayCell {
    pub fn class_list(&self) -> String {
        let mut classes = vec!["day"];
        if self.is_today {
            classes.push("is-today");
        }
        if self.has_blog {
            classes.push("has-blog");
        }
        classes.join(" ")
    }

    pub fn to_markup(&self, paint: &Paint) -> String {
        let snapshot = if self.snapshot.is_empty() {
            "{}".to_string()
        } else {
            escape_html(&self.snapshot)
        };
        format!(
            "<div class=\"{}\" data-date=\"{}\" data-tags=\"{}\" data-snapshot=\"{}\" data-blog=\"{}\" data-locked=\"{}\" data-status=\"{}\"><div class=\"cell-paper\" style=\"background: {}\"></div><span class=\"cell-content\">{}</span></div>",
            self.class_list(),
            escape_html(&self.date.format("%Y-%m-%d").to_string()),
            escape_html(&self.tags_csv()),
            snapshot,
            self.has_blog,
            if self.is_locked { "1" } else { "0" },
            escape_html(&self.status),
            escape_html(&paint.to_css()),
            self.day,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DayPayload;

    fn payload() -> CalendarPayload {
        let day = |d: u32, tags: &str, status: &str| DayPayload {
            date: NaiveDate::from_ymd_opt(2026, 3, d).unwrap(),
            day: d,
            tags: tags.to_string(),
            has_blog: d == 2,
            is_locked: d == 1,
            is_today: false,
            status: status.to_string(),
            snapshot: if d == 2 {
                r##"{"a\"b": {"color": "#123456", "priority": 1}}"##.to_string()
            } else {
                String::new()
            },
        };
        CalendarPayload {
            month_name: "March".into(),
            year: 2026,
            prev_year: 2026,
            prev_month: 2,
            next_year: 2026,
            next_month: 4,
            cal_data: vec![vec![
                None,
                Some(day(1, "gym", "locked")),
                Some(day(2, "<b>x</b>", "\"quoted\" & more")),
            ]],
        }
    }

    #[test]
    fn loading_then_rendered() {
        let mut state = CalendarState::Idle;
        state.begin_loading(2026, 3);
        assert!(state.is_loading());
        assert!(state.view().is_none());
        state.finish(2026, 3, payload());
        let view = state.view().unwrap();
        assert_eq!(view.title, "March 2026");
        assert_eq!(view.prev, (2026, 2));
        assert_eq!(view.next, (2026, 4));
        assert_eq!(view.cells().count(), 2);
    }

    #[test]
    fn abort_restores_previous_view() {
        let mut state = CalendarState::Idle;
        state.finish(2026, 3, payload());
        let previous = state.view().cloned();
        state.begin_loading(2026, 4);
        state.abort(previous);
        assert_eq!(state.view().unwrap().month, 3);
    }

    #[test]
    fn markup_escapes_server_strings() {
        let view = MonthView::new(2026, 3, payload());
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let html = view.to_markup(today, &TagRegistry::default());
        assert!(html.contains("style=\"visibility:hidden\""));
        assert!(html.contains("data-tags=\"&lt;b&gt;x&lt;/b&gt;\""));
        assert!(html.contains("data-status=\"&quot;quoted&quot; &amp; more\""));
        assert!(html.contains("data-locked=\"1\""));
        assert!(html.contains("class=\"day has-blog\""));
        assert!(!html.contains("<b>x</b>"));
    }

    #[test]
    fn markup_escapes_snapshot_json() {
        let view = MonthView::new(2026, 3, payload());
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let html = view.to_markup(today, &TagRegistry::default());
        let start = html.find("data-date=\"2026-03-02\"").unwrap();
        let attr = &html[start..];
        let value_start = attr.find("data-snapshot=\"").unwrap() + "data-snapshot=\"".len();
        let value_len = attr[value_start..].find('"').unwrap();
        assert_eq!(
            &attr[value_start..value_start + value_len],
            "{&quot;a\\&quot;b&quot;: {&quot;color&quot;: &quot;#123456&quot;, &quot;priority&quot;: 1}}"
        );
        assert!(attr[value_start + value_len..].starts_with("\" data-blog="));
        assert!(html.contains("data-snapshot=\"{}\""));
    }
}
