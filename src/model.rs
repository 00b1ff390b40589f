use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

pub const TAG_NAME_MAX_LEN: usize = 60;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub color: String,
    pub priority: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub color: String,
    pub priority: i64,
}

/// Tag name to color/priority mapping. Used both for the live registry and
/// for the frozen copies attached to past days.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct TagRegistry {
    tags: BTreeMap<String, TagInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct LogEntry {
    #[serde(default, deserialize_with = "nullable_string")]
    pub main: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub footnotes: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub day: u32,
    pub tags: Vec<String>,
    pub has_blog: bool,
    pub is_locked: bool,
    pub is_today: bool,
    pub status: String,
    pub snapshot: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TagNameError {
    #[error("Tag name is required.")]
    Empty,
    #[error("Tag name must be {} characters or fewer.", TAG_NAME_MAX_LEN)]
    TooLong,
    #[error("Tag name contains invalid characters.")]
    InvalidCharacters,
}

impl TagRegistry {
    pub fn new(tags: BTreeMap<String, TagInfo>) -> Self {
        TagRegistry { tags }
    }

    /// Parses a day's stored snapshot. Blank, `{}`, `None` and malformed
    /// payloads all yield `None`.
    pub fn from_snapshot(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "{}" || raw == "None" {
            return None;
        }
        match serde_json::from_str::<BTreeMap<String, TagInfo>>(raw) {
            Ok(tags) if !tags.is_empty() => Some(TagRegistry { tags }),
            Ok(_) => None,
            Err(err) => {
                log::debug!("ignoring malformed snapshot: {}", err);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&TagInfo> {
        self.tags.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TagInfo)> {
        self.tags.iter()
    }

    /// Tags ordered by descending priority, ties broken by name.
    pub fn sorted(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self
            .tags
            .iter()
            .map(|(name, info)| Tag {
                name: name.clone(),
                color: info.color.clone(),
                priority: info.priority,
            })
            .collect();
        tags.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        tags
    }

    pub fn names_by_priority(&self) -> Vec<String> {
        self.sorted().into_iter().map(|t| t.name).collect()
    }
}

impl LogEntry {
    pub fn is_blank(&self) -> bool {
        self.main.trim().is_empty() && self.footnotes.trim().is_empty()
    }
}

impl DayCell {
    /// Tag universe used to color this day. Past days prefer their snapshot
    /// when it carries any tags; today, future days and days without a usable
    /// snapshot use the live registry.
    pub fn universe<'a>(&self, today: NaiveDate, live: &'a TagRegistry) -> Cow<'a, TagRegistry> {
        if self.date < today {
            if let Some(snapshot) = TagRegistry::from_snapshot(&self.snapshot) {
                return Cow::Owned(snapshot);
            }
        }
        Cow::Borrowed(live)
    }

    pub fn tags_csv(&self) -> String {
        self.tags.join(",")
    }
}

pub(crate) fn nullable_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn split_tags(csv: &str) -> Vec<String> {
    csv.split(',')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Cleans up a user-typed tag name: commas are dropped and surrounding
/// whitespace trimmed before the length and character checks.
pub fn normalize_tag_name(raw: &str) -> Result<String, TagNameError> {
    let normalized = raw.replace(',', "");
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return Err(TagNameError::Empty);
    }
    if normalized.chars().count() > TAG_NAME_MAX_LEN {
        return Err(TagNameError::TooLong);
    }
    if normalized.contains('\0') {
        return Err(TagNameError::InvalidCharacters);
    }
    Ok(normalized.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn registry(entries: &[(&str, &str, i64)]) -> TagRegistry {
        TagRegistry::new(
            entries
                .iter()
                .map(|(name, color, priority)| {
                    (
                        name.to_string(),
                        TagInfo {
                            color: color.to_string(),
                            priority: *priority,
                        },
                    )
                })
                .collect(),
        )
    }

    fn cell(date: NaiveDate, snapshot: &str) -> DayCell {
        DayCell {
            date,
            day: date.day(),
            tags: vec!["gym".into()],
            has_blog: false,
            is_locked: false,
            is_today: false,
            status: String::new(),
            snapshot: snapshot.into(),
        }
    }

    #[test]
    fn normalize_strips_commas_and_whitespace() {
        assert_eq!(normalize_tag_name("  read, ing ").unwrap(), "read ing");
        assert_eq!(normalize_tag_name(",,,"), Err(TagNameError::Empty));
        assert_eq!(normalize_tag_name("   "), Err(TagNameError::Empty));
    }

    #[test]
    fn normalize_enforces_length_and_nul() {
        let long = "x".repeat(TAG_NAME_MAX_LEN + 1);
        assert_eq!(normalize_tag_name(&long), Err(TagNameError::TooLong));
        let exact = "x".repeat(TAG_NAME_MAX_LEN);
        assert_eq!(normalize_tag_name(&exact).unwrap(), exact);
        assert_eq!(
            normalize_tag_name("bad\0name"),
            Err(TagNameError::InvalidCharacters)
        );
    }

    #[test]
    fn sorted_orders_by_priority_desc() {
        let reg = registry(&[("a", "#111111", 1), ("b", "#222222", 3), ("c", "#333333", 2)]);
        assert_eq!(reg.names_by_priority(), vec!["b", "c", "a"]);
    }

    #[test]
    fn past_day_prefers_snapshot() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let live = registry(&[("gym", "#FF0000", 1)]);
        let past = cell(
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            r##"{"gym": {"color": "#00FF00", "priority": 4}}"##,
        );
        let universe = past.universe(today, &live);
        assert_eq!(universe.get("gym").unwrap().color, "#00FF00");
        assert_eq!(universe.get("gym").unwrap().priority, 4);
    }

    #[test]
    fn empty_or_invalid_snapshot_falls_back_to_live() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let live = registry(&[("gym", "#FF0000", 1)]);
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        for raw in ["{}", "not json", "None", ""] {
            let universe = cell(date, raw).universe(today, &live);
            assert_eq!(universe.get("gym").unwrap().color, "#FF0000", "snapshot {raw:?}");
        }
    }

    #[test]
    fn today_and_future_ignore_snapshot() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let live = registry(&[("gym", "#FF0000", 1)]);
        let snap = r##"{"gym": {"color": "#00FF00", "priority": 4}}"##;
        for date in [today, today.succ_opt().unwrap()] {
            let universe = cell(date, snap).universe(today, &live);
            assert_eq!(universe.get("gym").unwrap().color, "#FF0000");
        }
    }

    #[test]
    fn split_tags_drops_empty_segments() {
        assert_eq!(split_tags("a,,b,"), vec!["a", "b"]);
        assert!(split_tags("").is_empty());
    }
}
