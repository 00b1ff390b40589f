//! Client side of the journal server's HTTP API.

use crate::config::Config;
use crate::model::{nullable_string, split_tags, DayCell, LogEntry, TagRegistry};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::time::Duration;

pub const CSRF_HEADER: &str = "X-CSRF-Token";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("{0}")]
    Server(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

/// The environment object the server embeds for a fresh session.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EnvPayload {
    pub today: NaiveDate,
    #[serde(default)]
    pub csrf_token: Option<String>,
    #[serde(default)]
    pub tags_data: TagRegistry,
    #[serde(default, deserialize_with = "logs_by_date")]
    pub logs_data: BTreeMap<NaiveDate, LogEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalendarPayload {
    pub month_name: String,
    pub year: i32,
    pub prev_year: i32,
    pub prev_month: u32,
    pub next_year: i32,
    pub next_month: u32,
    pub cal_data: Vec<Vec<Option<DayPayload>>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DayPayload {
    pub date: NaiveDate,
    pub day: u32,
    #[serde(default, deserialize_with = "nullable_string")]
    pub tags: String,
    #[serde(default, deserialize_with = "flag")]
    pub has_blog: bool,
    #[serde(default, deserialize_with = "flag")]
    pub is_locked: bool,
    #[serde(default, deserialize_with = "flag")]
    pub is_today: bool,
    #[serde(default, deserialize_with = "nullable_string")]
    pub status: String,
    #[serde(default, deserialize_with = "snapshot_text")]
    pub snapshot: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DayUpdated {
    #[serde(default, deserialize_with = "nullable_string")]
    pub new_tags: String,
    #[serde(default, deserialize_with = "flag")]
    pub has_blog: bool,
    #[serde(default, deserialize_with = "snapshot_text")]
    pub snapshot: String,
}

#[derive(Debug, Deserialize)]
struct TagsUpdated {
    tags_data: TagRegistry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayUpdate {
    pub date: NaiveDate,
    pub text: String,
    pub tags: Vec<String>,
}

pub trait Backend {
    fn bootstrap(&self) -> Result<EnvPayload, ApiError>;
    fn calendar(&self, year: i32, month: u32) -> Result<CalendarPayload, ApiError>;
    fn update_day(&self, update: &DayUpdate) -> Result<DayUpdated, ApiError>;
    fn update_footnote(&self, date: NaiveDate, text: &str) -> Result<(), ApiError>;
    fn update_tag_color(&self, name: &str, color: &str) -> Result<TagRegistry, ApiError>;
    fn add_tag(&self, name: &str) -> Result<TagRegistry, ApiError>;
    fn delete_tag(&self, name: &str) -> Result<TagRegistry, ApiError>;
    fn reorder_tags(&self, names: &[String]) -> Result<TagRegistry, ApiError>;
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
    csrf_token: Option<String>,
    cookie: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("grimoire/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building http client")?;
        Ok(HttpBackend {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            csrf_token: config.csrf_token.clone(),
            cookie: config.session_cookie.clone(),
        })
    }

    /// Adopts the token handed out at bootstrap unless one was configured.
    pub fn adopt_csrf_token(&mut self, token: Option<String>) {
        if self.csrf_token.is_none() {
            self.csrf_token = token;
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decorate(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder;
        if let Some(token) = &self.csrf_token {
            builder = builder.header(CSRF_HEADER, token);
        }
        if let Some(cookie) = &self.cookie {
            builder = builder.header(reqwest::header::COOKIE, cookie);
        }
        builder
    }

    fn send(&self, builder: RequestBuilder) -> Result<Value, ApiError> {
        let response = self.decorate(builder).send().map_err(transport)?;
        let status = response.status();
        let body = response.text().map_err(transport)?;
        match serde_json::from_str::<Value>(&body) {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => {
                Err(ApiError::Server(format!("server returned {}", status)))
            }
            Err(err) => Err(ApiError::Decode(err.to_string())),
        }
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        log::debug!("GET {}", path);
        let value = self.send(self.client.get(self.url(path)).query(query))?;
        decode(value)
    }

    fn post_form(&self, path: &str, fields: &[(&str, String)]) -> Result<Value, ApiError> {
        log::debug!("POST {}", path);
        let value = self.send(self.client.post(self.url(path)).form(fields))?;
        expect_success(value)
    }
}

impl Backend for HttpBackend {
    fn bootstrap(&self) -> Result<EnvPayload, ApiError> {
        self.get("/api/env", &[])
    }

    fn calendar(&self, year: i32, month: u32) -> Result<CalendarPayload, ApiError> {
        self.get(
            "/api/calendar",
            &[("year", year.to_string()), ("month", month.to_string())],
        )
    }

    fn update_day(&self, update: &DayUpdate) -> Result<DayUpdated, ApiError> {
        let mut fields = vec![
            ("date", update.date.format("%Y-%m-%d").to_string()),
            ("blog_text", update.text.clone()),
            ("tags", update.tags.join(",")),
        ];
        // the server treats the field's presence as the flag
        if !update.text.is_empty() {
            fields.push(("has_blog", "1".to_string()));
        }
        decode(self.post_form("/update", &fields)?)
    }

    fn update_footnote(&self, date: NaiveDate, text: &str) -> Result<(), ApiError> {
        self.post_form(
            "/update_footnote",
            &[
                ("date", date.format("%Y-%m-%d").to_string()),
                ("footnotes", text.to_string()),
            ],
        )?;
        Ok(())
    }

    fn update_tag_color(&self, name: &str, color: &str) -> Result<TagRegistry, ApiError> {
        let value = self.post_form(
            "/update_tag_color",
            &[("name", name.to_string()), ("color", color.to_string())],
        )?;
        tags_from(value)
    }

    fn add_tag(&self, name: &str) -> Result<TagRegistry, ApiError> {
        tags_from(self.post_form("/add_tag", &[("name", name.to_string())])?)
    }

    fn delete_tag(&self, name: &str) -> Result<TagRegistry, ApiError> {
        tags_from(self.post_form("/delete_tag", &[("name", name.to_string())])?)
    }

    fn reorder_tags(&self, names: &[String]) -> Result<TagRegistry, ApiError> {
        log::debug!("POST /reorder_tags ({} tags)", names.len());
        let builder = self
            .client
            .post(self.url("/reorder_tags"))
            .json(&json!({ "tags": names }));
        tags_from(expect_success(self.send(builder)?)?)
    }
}

impl From<DayPayload> for DayCell {
    fn from(payload: DayPayload) -> Self {
        DayCell {
            date: payload.date,
            day: payload.day,
            tags: split_tags(&payload.tags),
            has_blog: payload.has_blog,
            is_locked: payload.is_locked,
            is_today: payload.is_today,
            status: payload.status,
            snapshot: payload.snapshot,
        }
    }
}

fn transport(err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Transport(err.to_string())
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|err| ApiError::Decode(err.to_string()))
}

/// Mutating endpoints answer `{status: "success", ...}` or carry an `error`.
pub fn expect_success(value: Value) -> Result<Value, ApiError> {
    if value.get("status").and_then(Value::as_str) == Some("success") {
        return Ok(value);
    }
    let message = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("request failed")
        .to_string();
    Err(ApiError::Server(message))
}

fn tags_from(value: Value) -> Result<TagRegistry, ApiError> {
    decode::<TagsUpdated>(value).map(|t| t.tags_data)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Text(String),
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i != 0,
        Some(Flag::Text(s)) => matches!(s.trim(), "1" | "true" | "True"),
        None => false,
    })
}

/// Entries arrive keyed by the server's date string. Keys that name the same
/// day collapse onto one entry; the canonical `YYYY-MM-DD` spelling wins.
fn logs_by_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<NaiveDate, LogEntry>, D::Error> {
    let raw = Option::<BTreeMap<String, LogEntry>>::deserialize(deserializer)?.unwrap_or_default();
    let mut logs = BTreeMap::new();
    for (key, entry) in raw {
        let Ok(date) = key.trim().parse::<NaiveDate>() else {
            log::warn!("skipping journal entry with unreadable date {:?}", key);
            continue;
        };
        let canonical = date.format("%Y-%m-%d").to_string() == key;
        match logs.entry(date) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            Entry::Occupied(mut slot) => {
                log::warn!("journal key {:?} collides with another entry for {}", key, date);
                if canonical {
                    slot.insert(entry);
                }
            }
        }
    }
    Ok(logs)
}

fn snapshot_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}
