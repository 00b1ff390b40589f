//! Session state shared by every view: the cached tag registry and log text,
//! the calendar, which overlay is open, and the request dispatcher.

use crate::api::{ApiError, Backend, DayUpdate, EnvPayload};
use crate::calendar::{CalendarState, MonthView};
use crate::color::{compute_gradient, swatches, validate_hex, HexError, HueBucket, Paint, Tier};
use crate::journal::JournalView;
use crate::model::{normalize_tag_name, split_tags, DayCell, LogEntry, TagNameError, TagRegistry};
use chrono::{Datelike, NaiveDate};
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

/// The day the editor is bound to, plus its working checkbox state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBinding {
    pub date: NaiveDate,
    pub locked: bool,
    pub selected: BTreeSet<String>,
}

/// At most one of the day editor and footnote editor is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    Closed,
    DayEditor(DayBinding),
    Footnote { date: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorPicker {
    pub tag: String,
    pub tier: Tier,
    pub hue: HueBucket,
    pub swatches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pill {
    pub name: String,
    pub color: String,
    pub checked: bool,
    pub disabled: bool,
    pub deletable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    LoadMonth { year: i32, month: u32 },
    SaveDay(DayUpdate),
    SaveFootnote { date: NaiveDate, text: String },
    SetColor { name: String, color: String },
    AddTag { name: String },
    DeleteTag { name: String },
    Reorder { names: Vec<String> },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    TagName(#[from] TagNameError),
    #[error(transparent)]
    Hex(#[from] HexError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0} is locked")]
    Locked(NaiveDate),
    #[error("no day is open")]
    NoDay,
    #[error("no addendum is open")]
    NoFootnote,
    #[error("{0} is not on the current calendar")]
    UnknownDay(NaiveDate),
    #[error("no tag selected for coloring")]
    NoPicker,
    #[error("no swatch {0}")]
    NoSwatch(usize),
    #[error("unknown tag: {0}")]
    UnknownTag(String),
}

pub struct Session<B: Backend> {
    backend: B,
    today: NaiveDate,
    tags: TagRegistry,
    logs: BTreeMap<NaiveDate, LogEntry>,
    calendar: CalendarState,
    modal: Modal,
    picker: Option<ColorPicker>,
    pending_delete: Option<String>,
    journal: JournalView,
    retry: Option<Request>,
}

impl Request {
    pub fn label(&self) -> String {
        match self {
            Request::LoadMonth { year, month } => format!("load {}-{:02}", year, month),
            Request::SaveDay(update) => format!("save {}", update.date),
            Request::SaveFootnote { date, .. } => format!("save addendum {}", date),
            Request::SetColor { name, color } => format!("color {} {}", name, color),
            Request::AddTag { name } => format!("add tag {}", name),
            Request::DeleteTag { name } => format!("delete tag {}", name),
            Request::Reorder { names } => format!("reorder {} tags", names.len()),
        }
    }
}

impl SessionError {
    pub fn is_transport(&self) -> bool {
        matches!(self, SessionError::Api(err) if err.is_transport())
    }
}

impl ColorPicker {
    pub fn new<R: Rng + ?Sized>(tag: impl Into<String>, rng: &mut R) -> Self {
        let mut picker = ColorPicker {
            tag: tag.into(),
            tier: Tier::Mixed,
            hue: HueBucket::Any,
            swatches: Vec::new(),
        };
        picker.reroll(rng);
        picker
    }

    pub fn reroll<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.swatches = swatches(self.tier, self.hue, rng);
    }
}

pub fn delete_prompt(name: &str) -> String {
    format!(
        "Archive '{}'? Historical entries keep their color, but it will be removed from the menu.",
        name
    )
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B, env: EnvPayload) -> Self {
        let mut journal = JournalView::new();
        journal.render(&env.logs_data);
        Session {
            backend,
            today: env.today,
            tags: env.tags_data,
            logs: env.logs_data,
            calendar: CalendarState::Idle,
            modal: Modal::Closed,
            picker: None,
            pending_delete: None,
            journal,
            retry: None,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub fn logs(&self) -> &BTreeMap<NaiveDate, LogEntry> {
        &self.logs
    }

    pub fn entry(&self, date: NaiveDate) -> Option<&LogEntry> {
        self.logs.get(&date)
    }

    pub fn calendar(&self) -> &CalendarState {
        &self.calendar
    }

    pub fn month(&self) -> Option<&MonthView> {
        self.calendar.view()
    }

    pub fn modal(&self) -> &Modal {
        &self.modal
    }

    pub fn binding(&self) -> Option<&DayBinding> {
        match &self.modal {
            Modal::DayEditor(binding) => Some(binding),
            _ => None,
        }
    }

    pub fn picker(&self) -> Option<&ColorPicker> {
        self.picker.as_ref()
    }

    pub fn picker_mut(&mut self) -> Option<&mut ColorPicker> {
        self.picker.as_mut()
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    pub fn journal(&self) -> &JournalView {
        &self.journal
    }

    pub fn journal_mut(&mut self) -> &mut JournalView {
        &mut self.journal
    }

    pub fn refresh_journal(&mut self) {
        self.journal.render(&self.logs);
    }

    pub fn retry_pending(&self) -> Option<&Request> {
        self.retry.as_ref()
    }

    pub fn paint_for(&self, cell: &DayCell) -> Paint {
        let universe = cell.universe(self.today, &self.tags);
        compute_gradient(&cell.tags, &universe)
    }

    // ---- calendar ----------------------------------------------------

    pub fn load_month(&mut self, year: i32, month: u32) -> Result<(), SessionError> {
        self.close_day();
        self.dispatch(Request::LoadMonth { year, month })
    }

    pub fn load_current_month(&mut self) -> Result<(), SessionError> {
        self.load_month(self.today.year(), self.today.month())
    }

    pub fn prev_month(&mut self) -> Result<(), SessionError> {
        let (year, month) = match self.month() {
            Some(view) => view.prev,
            None => (self.today.year(), self.today.month()),
        };
        self.load_month(year, month)
    }

    pub fn next_month(&mut self) -> Result<(), SessionError> {
        let (year, month) = match self.month() {
            Some(view) => view.next,
            None => (self.today.year(), self.today.month()),
        };
        self.load_month(year, month)
    }

    // ---- day editor --------------------------------------------------

    /// Binds the editor to a visible day and returns its cached text.
    pub fn open_day(&mut self, date: NaiveDate) -> Result<String, SessionError> {
        let cell = self
            .month()
            .and_then(|view| view.cell(date))
            .ok_or(SessionError::UnknownDay(date))?;
        let selected = cell
            .tags
            .iter()
            .filter(|t| self.tags.contains(t))
            .cloned()
            .collect();
        let binding = DayBinding {
            date,
            locked: cell.is_locked,
            selected,
        };
        log::debug!("opening {} (locked: {})", date, binding.locked);
        self.modal = Modal::DayEditor(binding);
        Ok(self.entry(date).map(|e| e.main.clone()).unwrap_or_default())
    }

    pub fn close_day(&mut self) {
        if matches!(self.modal, Modal::DayEditor(_)) {
            self.modal = Modal::Closed;
        }
    }

    pub fn toggle_tag(&mut self, name: &str) -> Result<(), SessionError> {
        if !self.tags.contains(name) {
            return Err(SessionError::UnknownTag(name.to_string()));
        }
        let binding = match &mut self.modal {
            Modal::DayEditor(binding) => binding,
            _ => return Err(SessionError::NoDay),
        };
        if binding.locked {
            return Err(SessionError::Locked(binding.date));
        }
        if !binding.selected.remove(name) {
            binding.selected.insert(name.to_string());
        }
        Ok(())
    }

    pub fn save_day(&mut self, text: &str) -> Result<(), SessionError> {
        let binding = self.binding().ok_or(SessionError::NoDay)?;
        if binding.locked {
            return Err(SessionError::Locked(binding.date));
        }
        let tags = self
            .tags
            .names_by_priority()
            .into_iter()
            .filter(|name| binding.selected.contains(name))
            .collect();
        let update = DayUpdate {
            date: binding.date,
            text: text.trim().to_string(),
            tags,
        };
        self.dispatch(Request::SaveDay(update))
    }

    // ---- footnote editor ---------------------------------------------

    pub fn open_footnote(&mut self, date: NaiveDate) -> String {
        self.picker = None;
        self.modal = Modal::Footnote { date };
        self.entry(date)
            .map(|e| e.footnotes.clone())
            .unwrap_or_default()
    }

    pub fn close_footnote(&mut self) {
        if matches!(self.modal, Modal::Footnote { .. }) {
            self.modal = Modal::Closed;
        }
    }

    pub fn save_footnote(&mut self, text: &str) -> Result<(), SessionError> {
        let date = match self.modal {
            Modal::Footnote { date } => date,
            _ => return Err(SessionError::NoFootnote),
        };
        self.dispatch(Request::SaveFootnote {
            date,
            text: text.trim().to_string(),
        })
    }

    // ---- tag registry ------------------------------------------------

    pub fn pills(&self) -> Vec<Pill> {
        let binding = self.binding();
        let locked = binding.map(|b| b.locked).unwrap_or(false);
        self.tags
            .sorted()
            .into_iter()
            .map(|tag| Pill {
                checked: binding.map(|b| b.selected.contains(&tag.name)).unwrap_or(false),
                disabled: locked,
                deletable: !locked,
                name: tag.name,
                color: tag.color,
            })
            .collect()
    }

    pub fn add_tag(&mut self, raw: &str) -> Result<(), SessionError> {
        let name = normalize_tag_name(raw)?;
        self.dispatch(Request::AddTag { name })
    }

    /// Stages a delete; nothing is sent until `confirm_delete`.
    pub fn request_delete(&mut self, name: &str) -> Result<String, SessionError> {
        self.ensure_unlocked()?;
        if !self.tags.contains(name) {
            return Err(SessionError::UnknownTag(name.to_string()));
        }
        self.pending_delete = Some(name.to_string());
        Ok(delete_prompt(name))
    }

    pub fn confirm_delete(&mut self) -> Result<(), SessionError> {
        match self.pending_delete.take() {
            Some(name) => self.dispatch(Request::DeleteTag { name }),
            None => Ok(()),
        }
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub fn reorder(&mut self, names: Vec<String>) -> Result<(), SessionError> {
        self.ensure_unlocked()?;
        self.dispatch(Request::Reorder { names })
    }

    /// Moves one tag up (negative) or down the priority order.
    pub fn move_tag(&mut self, name: &str, delta: isize) -> Result<(), SessionError> {
        let mut names = self.tags.names_by_priority();
        let from = names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| SessionError::UnknownTag(name.to_string()))?;
        let to = (from as isize + delta).clamp(0, names.len() as isize - 1) as usize;
        if to == from {
            return Ok(());
        }
        let moved = names.remove(from);
        names.insert(to, moved);
        self.reorder(names)
    }

    pub fn open_picker<R: Rng + ?Sized>(&mut self, name: &str, rng: &mut R) -> Result<(), SessionError> {
        if !self.tags.contains(name) {
            return Err(SessionError::UnknownTag(name.to_string()));
        }
        self.picker = Some(ColorPicker::new(name, rng));
        Ok(())
    }

    pub fn close_picker(&mut self) {
        self.picker = None;
    }

    pub fn choose_swatch(&mut self, idx: usize) -> Result<(), SessionError> {
        let color = self
            .picker
            .as_ref()
            .ok_or(SessionError::NoPicker)?
            .swatches
            .get(idx)
            .cloned()
            .ok_or(SessionError::NoSwatch(idx + 1))?;
        self.set_color(&color)
    }

    pub fn choose_hex(&mut self, input: &str) -> Result<(), SessionError> {
        let color = validate_hex(input)?;
        self.set_color(&color)
    }

    /// Recolors a tag without going through the picker.
    pub fn recolor_tag(&mut self, name: &str, input: &str) -> Result<(), SessionError> {
        let color = validate_hex(input)?;
        if !self.tags.contains(name) {
            return Err(SessionError::UnknownTag(name.to_string()));
        }
        self.dispatch(Request::SetColor {
            name: name.to_string(),
            color,
        })
    }

    pub fn set_color(&mut self, color: &str) -> Result<(), SessionError> {
        let name = self.picker.as_ref().ok_or(SessionError::NoPicker)?.tag.clone();
        self.dispatch(Request::SetColor {
            name,
            color: color.to_string(),
        })
    }

    fn ensure_unlocked(&self) -> Result<(), SessionError> {
        match self.binding() {
            Some(binding) if binding.locked => Err(SessionError::Locked(binding.date)),
            _ => Ok(()),
        }
    }

    // ---- dispatch ----------------------------------------------------

    /// Re-sends the last request that failed at the transport level.
    pub fn retry(&mut self) -> Result<(), SessionError> {
        match self.retry.take() {
            Some(request) => {
                log::info!("retrying {}", request.label());
                self.dispatch(request)
            }
            None => Ok(()),
        }
    }

    pub fn dispatch(&mut self, request: Request) -> Result<(), SessionError> {
        log::debug!("dispatching {}", request.label());
        let result = self.execute(&request);
        match &result {
            Ok(()) => self.retry = None,
            Err(err) if err.is_transport() => {
                log::error!("{} failed: {}", request.label(), err);
                self.retry = Some(request);
            }
            Err(err) => log::warn!("{} rejected: {}", request.label(), err),
        }
        result
    }

    fn execute(&mut self, request: &Request) -> Result<(), SessionError> {
        match request {
            Request::LoadMonth { year, month } => {
                let previous = self.calendar.view().cloned();
                self.calendar.begin_loading(*year, *month);
                match self.backend.calendar(*year, *month) {
                    Ok(payload) => {
                        self.calendar.finish(*year, *month, payload);
                        log::info!("loaded {}-{:02}", year, month);
                        Ok(())
                    }
                    Err(err) => {
                        self.calendar.abort(previous);
                        Err(err.into())
                    }
                }
            }
            Request::SaveDay(update) => {
                let saved = self.backend.update_day(update)?;
                if let Some(cell) = self.calendar.view_mut().and_then(|v| v.cell_mut(update.date)) {
                    cell.tags = split_tags(&saved.new_tags);
                    cell.has_blog = saved.has_blog;
                    cell.snapshot = saved.snapshot;
                }
                self.logs.entry(update.date).or_default().main = update.text.clone();
                if self.binding().map(|b| b.date) == Some(update.date) {
                    self.modal = Modal::Closed;
                }
                log::info!("saved {}", update.date);
                Ok(())
            }
            Request::SaveFootnote { date, text } => {
                self.backend.update_footnote(*date, text)?;
                self.logs.entry(*date).or_default().footnotes = text.clone();
                if self.modal == (Modal::Footnote { date: *date }) {
                    self.modal = Modal::Closed;
                }
                self.refresh_journal();
                Ok(())
            }
            Request::SetColor { name, color } => {
                self.tags = self.backend.update_tag_color(name, color)?;
                self.picker = None;
                self.sync_selection();
                Ok(())
            }
            Request::AddTag { name } => {
                self.tags = self.backend.add_tag(name)?;
                self.sync_selection();
                log::info!("added tag {}", name);
                Ok(())
            }
            Request::DeleteTag { name } => {
                self.tags = self.backend.delete_tag(name)?;
                self.sync_selection();
                log::info!("archived tag {}", name);
                Ok(())
            }
            Request::Reorder { names } => {
                self.tags = self.backend.reorder_tags(names)?;
                self.sync_selection();
                Ok(())
            }
        }
    }

    /// Drops checkbox state for tags the server no longer lists.
    fn sync_selection(&mut self) {
        let tags = &self.tags;
        if let Modal::DayEditor(binding) = &mut self.modal {
            binding.selected.retain(|name| tags.contains(name));
        }
    }
}
