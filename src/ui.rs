use crate::api::Backend;
use crate::color::{hex_to_rgb, Paint};
use crate::journal::{Debouncer, SEARCH_DEBOUNCE};
use crate::model::DayCell;
use crate::session::{Modal, Session, SessionError};
use anyhow::Result;
use chrono::{Days, NaiveDate};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Widget, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

/// Below this terminal width the color picker is centered instead of anchored.
const PICKER_NARROW_WIDTH: u16 = 60;
const PICKER_WIDTH: u16 = 36;
const NAME_COLUMN: usize = 18;

pub fn run<B: Backend>(session: Session<B>) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(session);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App<B: Backend> {
    session: Session<B>,
    view: View,
    focus: Focus,
    prompt: Prompt,
    cursor: Option<NaiveDate>,
    tag_idx: usize,
    tag_offset: usize,
    editor: FieldValue,
    footnote: FieldValue,
    search: FieldValue,
    debounce: Debouncer,
    journal_idx: usize,
    journal_state: ListState,
    queued: Option<Nav>,
    alert: Option<Alert>,
    status: String,
    last_sync: Option<Instant>,
    hits: HitAreas,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum View {
    Calendar,
    Journal,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Focus {
    Grid,
    Tags,
    Editor,
}

enum Prompt {
    None,
    AddTag(FieldValue),
    Hex(FieldValue),
    Search,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Nav {
    Prev,
    Next,
    Today,
}

struct Alert {
    message: String,
    retry: bool,
}

/// Screen regions recorded while drawing, used to route mouse clicks.
#[derive(Default)]
struct HitAreas {
    cells: Vec<(Rect, NaiveDate)>,
    pills: Vec<(Rect, usize)>,
    swatch_bars: Vec<(Rect, usize)>,
    picker: Option<Rect>,
    picker_anchor: Option<Rect>,
    swatches: Vec<Rect>,
    footnote: Option<Rect>,
}

impl View {
    fn label(&self) -> &'static str {
        match self {
            View::Calendar => "calendar",
            View::Journal => "journal",
        }
    }
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_grapheme(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_grapheme(self.cursor, &self.value);
    }

    fn move_up(&mut self) {
        let (line_starts, line_idx, col) = line_state(&self.value, self.cursor);
        if line_idx == 0 {
            return;
        }
        let target_start = line_starts[line_idx - 1];
        self.cursor = index_at_col(&self.value, target_start, col);
    }

    fn move_down(&mut self) {
        let (line_starts, line_idx, col) = line_state(&self.value, self.cursor);
        if line_idx + 1 >= line_starts.len() {
            return;
        }
        let target_start = line_starts[line_idx + 1];
        self.cursor = index_at_col(&self.value, target_start, col);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_grapheme(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }

    fn caret_line(&self) -> usize {
        line_state(&self.value, self.cursor).1
    }

    /// Applies a plain editing key. Returns false when the key is not an edit.
    fn edit(&mut self, key: KeyEvent, multiline: bool) -> bool {
        match key.code {
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Up if multiline => self.move_up(),
            KeyCode::Down if multiline => self.move_down(),
            KeyCode::Enter if multiline => self.insert_char('\n'),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.insert_char(c)
            }
            _ => return false,
        }
        true
    }
}

impl<B: Backend> App<B> {
    fn new(session: Session<B>) -> Self {
        let query = session.journal().query().to_string();
        App {
            session,
            view: View::Calendar,
            focus: Focus::Grid,
            prompt: Prompt::None,
            cursor: None,
            tag_idx: 0,
            tag_offset: 0,
            editor: FieldValue::new(""),
            footnote: FieldValue::new(""),
            search: FieldValue::new(&query),
            debounce: Debouncer::new(SEARCH_DEBOUNCE),
            journal_idx: 0,
            journal_state: ListState::default(),
            queued: Some(Nav::Today),
            alert: None,
            status: "Loading calendar".into(),
            last_sync: None,
            hits: HitAreas::default(),
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if let Some(nav) = self.queued.take() {
                // drawn once with the loading marker before the blocking fetch
                self.navigate(nav);
                continue;
            }
            if let Some(query) = self.debounce.ready(Instant::now()) {
                self.apply_search(&query);
            }
            if event::poll(Duration::from_millis(50))? {
                match event::read()? {
                    Event::Key(key) => {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if self.handle_key(key) {
                            break;
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    // ---- outcomes ----------------------------------------------------

    fn attempt(&mut self, result: Result<(), SessionError>, success: impl Into<String>) -> bool {
        match result {
            Ok(()) => {
                self.last_sync = Some(Instant::now());
                self.status = success.into();
                true
            }
            Err(err) => {
                self.fail(err);
                false
            }
        }
    }

    fn fail(&mut self, err: SessionError) {
        if matches!(err, SessionError::Locked(_) | SessionError::NoDay) {
            self.status = err.to_string();
            return;
        }
        let retry = err.is_transport() && self.session.retry_pending().is_some();
        self.status = format!("Error: {}", err);
        self.alert = Some(Alert {
            message: err.to_string(),
            retry,
        });
    }

    fn navigate(&mut self, nav: Nav) {
        let (result, label) = match nav {
            Nav::Prev => (self.session.prev_month(), "previous month"),
            Nav::Next => (self.session.next_month(), "next month"),
            Nav::Today => (self.session.load_current_month(), "current month"),
        };
        if self.attempt(result, format!("Loaded {}", label)) {
            self.after_month_change();
        }
        if self.focus == Focus::Editor {
            self.focus = Focus::Grid;
        }
    }

    fn after_month_change(&mut self) {
        let today = self.session.today();
        let Some(view) = self.session.month() else {
            self.cursor = None;
            return;
        };
        let keep = self.cursor.filter(|d| view.cell(*d).is_some());
        self.cursor = keep
            .or_else(|| view.cell(today).map(|c| c.date))
            .or_else(|| view.first_date());
    }

    fn apply_search(&mut self, query: &str) {
        self.session.journal_mut().filter(query);
        self.journal_idx = 0;
        let count = self.session.journal().visible().len();
        self.status = format!("{} matching entries", count);
    }

    // ---- keys ----------------------------------------------------------

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.alert.is_some() {
            self.handle_alert_key(key);
            return false;
        }
        if self.session.pending_delete().is_some() {
            self.handle_confirm_key(key);
            return false;
        }
        if matches!(self.session.modal(), Modal::Footnote { .. }) {
            self.handle_footnote_key(key);
            return false;
        }
        if !matches!(self.prompt, Prompt::None) {
            self.handle_prompt_key(key);
            return false;
        }
        if self.session.picker().is_some() {
            self.handle_picker_key(key);
            return false;
        }
        match self.view {
            View::Calendar => self.handle_calendar_key(key),
            View::Journal => self.handle_journal_key(key),
        }
    }

    fn handle_alert_key(&mut self, key: KeyEvent) {
        let retry = self.alert.as_ref().map(|a| a.retry).unwrap_or(false);
        self.alert = None;
        if retry && key.code == KeyCode::Char('r') {
            let label = self
                .session
                .retry_pending()
                .map(|r| r.label())
                .unwrap_or_default();
            let result = self.session.retry();
            if self.attempt(result, format!("Retried {}", label)) {
                self.after_month_change();
            }
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                let name = self.session.pending_delete().unwrap_or_default().to_string();
                let result = self.session.confirm_delete();
                if self.attempt(result, format!("Archived {}", name)) {
                    self.clamp_tag_idx();
                }
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.session.cancel_delete();
                self.status = "Delete canceled".into();
            }
            _ => {}
        }
    }

    fn handle_footnote_key(&mut self, key: KeyEvent) {
        if is_save(key) {
            let text = self.footnote.value.clone();
            let result = self.session.save_footnote(&text);
            self.attempt(result, "Addendum saved");
            return;
        }
        if key.code == KeyCode::Esc {
            self.session.close_footnote();
            self.status = "Addendum closed".into();
            return;
        }
        self.footnote.edit(key, true);
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let prompt = std::mem::replace(&mut self.prompt, Prompt::None);
        self.prompt = match prompt {
            Prompt::AddTag(mut field) => match key.code {
                KeyCode::Esc => Prompt::None,
                KeyCode::Enter => {
                    let result = self.session.add_tag(&field.value);
                    let label = format!("Added {}", field.value.trim());
                    if self.attempt(result, label) {
                        Prompt::None
                    } else {
                        Prompt::AddTag(field)
                    }
                }
                _ => {
                    field.edit(key, false);
                    Prompt::AddTag(field)
                }
            },
            Prompt::Hex(mut field) => match key.code {
                KeyCode::Esc => Prompt::None,
                KeyCode::Enter => {
                    let result = self.session.choose_hex(&field.value);
                    if self.attempt(result, "Color updated") {
                        Prompt::None
                    } else {
                        Prompt::Hex(field)
                    }
                }
                _ => {
                    field.edit(key, false);
                    Prompt::Hex(field)
                }
            },
            Prompt::Search => match key.code {
                KeyCode::Enter => {
                    let query = self.search.value.clone();
                    self.debounce.ready(Instant::now() + SEARCH_DEBOUNCE);
                    self.apply_search(&query);
                    Prompt::None
                }
                KeyCode::Esc => {
                    self.search.clear();
                    self.debounce.ready(Instant::now() + SEARCH_DEBOUNCE);
                    self.apply_search("");
                    Prompt::None
                }
                _ => {
                    if self.search.edit(key, false) {
                        self.debounce.push(self.search.value.clone(), Instant::now());
                    }
                    Prompt::Search
                }
            },
            Prompt::None => Prompt::None,
        };
    }

    fn handle_picker_key(&mut self, key: KeyEvent) {
        let mut rng = rand::thread_rng();
        match key.code {
            KeyCode::Esc => {
                self.session.close_picker();
                self.status = "Picker closed".into();
            }
            KeyCode::Char('t') => {
                if let Some(picker) = self.session.picker_mut() {
                    picker.tier = picker.tier.next();
                    picker.reroll(&mut rng);
                }
            }
            KeyCode::Char('h') => {
                if let Some(picker) = self.session.picker_mut() {
                    picker.hue = picker.hue.next();
                    picker.reroll(&mut rng);
                }
            }
            KeyCode::Char('r') => {
                if let Some(picker) = self.session.picker_mut() {
                    picker.reroll(&mut rng);
                }
            }
            KeyCode::Char('#') => {
                self.prompt = Prompt::Hex(FieldValue::new("#"));
            }
            KeyCode::Char(c @ '1'..='8') => {
                let idx = c as usize - '1' as usize;
                self.choose_swatch(idx);
            }
            _ => {}
        }
    }

    fn choose_swatch(&mut self, idx: usize) {
        let result = self.session.choose_swatch(idx);
        self.attempt(result, "Color updated");
    }

    fn handle_calendar_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Tab {
            self.cycle_focus();
            return false;
        }
        match self.focus {
            Focus::Editor => {
                self.handle_editor_key(key);
                return false;
            }
            Focus::Tags => {
                if self.handle_tags_key(key) {
                    return false;
                }
            }
            Focus::Grid => {
                if self.handle_grid_key(key) {
                    return false;
                }
            }
        }
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('2') => self.set_view(View::Journal),
            KeyCode::Char('[') => self.queue(Nav::Prev),
            KeyCode::Char(']') => self.queue(Nav::Next),
            KeyCode::Char('g') => self.queue(Nav::Today),
            KeyCode::Char('f') => {
                if let Some(date) = self.cursor {
                    self.open_footnote(date);
                }
            }
            _ => {}
        }
        false
    }

    fn handle_grid_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.shift_cursor(-1),
            KeyCode::Right | KeyCode::Char('l') => self.shift_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.shift_cursor(-7),
            KeyCode::Down | KeyCode::Char('j') => self.shift_cursor(7),
            KeyCode::Enter | KeyCode::Char('e') => {
                if let Some(date) = self.cursor {
                    self.open_day(date);
                }
            }
            KeyCode::Esc => {
                self.session.close_day();
                self.status = "Editor closed".into();
            }
            _ => return false,
        }
        true
    }

    fn handle_tags_key(&mut self, key: KeyEvent) -> bool {
        let pills = self.session.pills();
        let current = pills.get(self.tag_idx).map(|p| p.name.clone());
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.tag_idx = self.tag_idx.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.tag_idx + 1 < pills.len() {
                    self.tag_idx += 1;
                }
            }
            KeyCode::Char(' ') => {
                if let Some(name) = current {
                    if let Err(err) = self.session.toggle_tag(&name) {
                        self.fail(err);
                    }
                }
            }
            KeyCode::Char('K') | KeyCode::Char('J') => {
                let delta = if key.code == KeyCode::Char('K') { -1 } else { 1 };
                if let Some(name) = current {
                    let result = self.session.move_tag(&name, delta);
                    if self.attempt(result, format!("Moved {}", name)) {
                        self.select_tag(&name);
                    }
                }
            }
            KeyCode::Char('c') => {
                if let Some(name) = current {
                    let anchor = self
                        .hits
                        .swatch_bars
                        .iter()
                        .find(|(_, idx)| *idx == self.tag_idx)
                        .map(|(rect, _)| *rect);
                    self.open_picker(&name, anchor);
                }
            }
            KeyCode::Char('a') => {
                self.prompt = Prompt::AddTag(FieldValue::new(""));
            }
            KeyCode::Char('x') => {
                if let Some(name) = current {
                    match self.session.request_delete(&name) {
                        Ok(prompt) => self.status = prompt,
                        Err(err) => self.fail(err),
                    }
                }
            }
            KeyCode::Esc => self.focus = Focus::Grid,
            _ => return false,
        }
        true
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc {
            self.session.close_day();
            self.focus = Focus::Grid;
            self.status = "Editor closed".into();
            return;
        }
        let Some(binding) = self.session.binding() else {
            self.focus = Focus::Grid;
            return;
        };
        let (date, locked) = (binding.date, binding.locked);
        if is_save(key) {
            let text = self.editor.value.clone();
            let result = self.session.save_day(&text);
            if self.attempt(result, format!("Saved {}", date)) {
                self.focus = Focus::Grid;
            }
            return;
        }
        if locked {
            let editing = matches!(
                key.code,
                KeyCode::Char(_) | KeyCode::Enter | KeyCode::Backspace
            );
            if editing {
                self.status = format!("{} is locked", date);
                return;
            }
        }
        self.editor.edit(key, true);
    }

    fn handle_journal_key(&mut self, key: KeyEvent) -> bool {
        let visible = self.session.journal().visible().len();
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('1') => self.set_view(View::Calendar),
            KeyCode::Up | KeyCode::Char('k') => {
                self.journal_idx = self.journal_idx.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.journal_idx + 1 < visible {
                    self.journal_idx += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(idx) = self.journal_card() {
                    self.session.journal_mut().toggle_one(idx);
                }
            }
            KeyCode::Char('E') => {
                self.session.journal_mut().toggle_all();
                self.status = if self.session.journal().all_expanded() {
                    "Expanded all entries".into()
                } else {
                    "Collapsed all entries".into()
                };
            }
            KeyCode::Char('/') => self.prompt = Prompt::Search,
            KeyCode::Char('f') => {
                let date = self
                    .journal_card()
                    .and_then(|idx| self.session.journal().cards().get(idx))
                    .map(|card| card.date);
                if let Some(date) = date {
                    self.open_footnote(date);
                }
            }
            KeyCode::Esc => {
                if !self.search.value.is_empty() {
                    self.search.clear();
                    self.apply_search("");
                }
            }
            _ => {}
        }
        false
    }

    // ---- mouse ---------------------------------------------------------

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if !matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left)) {
            return;
        }
        let (col, row) = (mouse.column, mouse.row);
        if self.alert.is_some() {
            self.alert = None;
            return;
        }
        if self.session.pending_delete().is_some() {
            return;
        }
        if matches!(self.session.modal(), Modal::Footnote { .. }) {
            // only a click on the backdrop itself closes the addendum
            if let Some(area) = self.hits.footnote {
                if !hit(area, col, row) {
                    self.session.close_footnote();
                    self.status = "Addendum closed".into();
                }
            }
            return;
        }
        if self.session.picker().is_some() {
            if let Some(idx) = self.hits.swatches.iter().position(|r| hit(*r, col, row)) {
                self.choose_swatch(idx);
            } else if self.hits.picker.map(|a| !hit(a, col, row)).unwrap_or(true) {
                self.session.close_picker();
                self.prompt = Prompt::None;
            }
            return;
        }
        if self.view != View::Calendar || !matches!(self.prompt, Prompt::None) {
            return;
        }
        let cell = self
            .hits
            .cells
            .iter()
            .find(|(rect, _)| hit(*rect, col, row))
            .map(|(_, date)| *date);
        if let Some(date) = cell {
            self.cursor = Some(date);
            self.open_day(date);
            return;
        }
        let bar = self
            .hits
            .swatch_bars
            .iter()
            .find(|(rect, _)| hit(*rect, col, row))
            .map(|(rect, idx)| (*rect, *idx));
        if let Some((rect, idx)) = bar {
            self.tag_idx = idx;
            if let Some(pill) = self.session.pills().get(idx) {
                let name = pill.name.clone();
                self.open_picker(&name, Some(rect));
            }
            return;
        }
        let pill = self
            .hits
            .pills
            .iter()
            .find(|(rect, _)| hit(*rect, col, row))
            .map(|(_, idx)| *idx);
        if let Some(idx) = pill {
            self.tag_idx = idx;
            self.focus = Focus::Tags;
        }
    }

    // ---- actions -------------------------------------------------------

    fn queue(&mut self, nav: Nav) {
        self.session.close_day();
        self.queued = Some(nav);
    }

    fn set_view(&mut self, view: View) {
        if self.view == view {
            return;
        }
        self.view = view;
        if view == View::Journal {
            self.session.refresh_journal();
            self.journal_idx = 0;
        }
        self.status = format!("Switched to {} view", view.label());
    }

    fn cycle_focus(&mut self) {
        let editor_open = self.session.binding().is_some();
        self.focus = match self.focus {
            Focus::Grid => Focus::Tags,
            Focus::Tags if editor_open => Focus::Editor,
            Focus::Tags => Focus::Grid,
            Focus::Editor => Focus::Grid,
        };
    }

    fn shift_cursor(&mut self, days: i64) {
        let Some(current) = self.cursor else {
            return;
        };
        let target = if days >= 0 {
            current.checked_add_days(Days::new(days as u64))
        } else {
            current.checked_sub_days(Days::new(days.unsigned_abs()))
        };
        let visible = target.filter(|d| {
            self.session
                .month()
                .map(|view| view.cell(*d).is_some())
                .unwrap_or(false)
        });
        if let Some(date) = visible {
            self.cursor = Some(date);
        }
    }

    fn open_day(&mut self, date: NaiveDate) {
        match self.session.open_day(date) {
            Ok(text) => {
                self.editor = FieldValue::new(&text);
                self.focus = Focus::Editor;
                let locked = self.session.binding().map(|b| b.locked).unwrap_or(false);
                self.status = if locked {
                    format!("{} is locked (read only)", date)
                } else {
                    format!("Editing {} (Ctrl+S save, Esc close)", date)
                };
            }
            Err(err) => self.fail(err),
        }
    }

    fn open_footnote(&mut self, date: NaiveDate) {
        let text = self.session.open_footnote(date);
        self.footnote = FieldValue::new(&text);
        self.prompt = Prompt::None;
        if self.focus == Focus::Editor {
            self.focus = Focus::Grid;
        }
        self.status = format!("Addendum for {}", date);
    }

    fn open_picker(&mut self, name: &str, anchor: Option<Rect>) {
        match self.session.open_picker(name, &mut rand::thread_rng()) {
            Ok(()) => {
                self.hits.picker_anchor = anchor;
                self.status = format!("Coloring {}", name);
            }
            Err(err) => self.fail(err),
        }
    }

    fn select_tag(&mut self, name: &str) {
        if let Some(idx) = self.session.pills().iter().position(|p| p.name == name) {
            self.tag_idx = idx;
        }
    }

    fn clamp_tag_idx(&mut self) {
        let len = self.session.tags().len();
        self.tag_idx = self.tag_idx.min(len.saturating_sub(1));
    }

    fn journal_card(&self) -> Option<usize> {
        self.session
            .journal()
            .visible()
            .get(self.journal_idx)
            .map(|(idx, _)| *idx)
    }

    // ---- drawing -------------------------------------------------------

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.hits = HitAreas {
            picker_anchor: self.hits.picker_anchor,
            ..HitAreas::default()
        };
        self.draw_header(f, layout[0]);
        match self.view {
            View::Calendar => self.draw_calendar(f, layout[1]),
            View::Journal => self.draw_journal(f, layout[1]),
        }
        self.draw_footer(f, layout[2]);

        if let Modal::Footnote { date } = self.session.modal() {
            let date = *date;
            self.draw_footnote(f, date);
        }
        if self.session.picker().is_some() {
            self.draw_picker(f);
        }
        if let Prompt::AddTag(field) = &self.prompt {
            draw_prompt(f, "New Tag", field);
        }
        if let Some(name) = self.session.pending_delete() {
            draw_confirm(f, name);
        }
        if let Some(alert) = &self.alert {
            draw_alert(f, alert);
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let month = if self.queued.is_some() || self.session.calendar().is_loading() {
            "loading…".to_string()
        } else {
            self.session
                .month()
                .map(|m| m.title.clone())
                .unwrap_or_else(|| "no month".into())
        };
        let synced = match self.last_sync {
            Some(at) => format!("synced {}", format_elapsed(at)),
            None => "not synced".into(),
        };
        let title = Line::from(vec![
            Span::styled(
                "grimoire ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(month, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  •  "),
            Span::styled(
                format!("today {}", self.session.today().format("%Y-%m-%d")),
                Style::default().fg(Color::Green),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("{} tags", self.session.tags().len()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(synced, Style::default().fg(Color::Gray)),
            Span::raw("  •  "),
            Span::styled(
                format!("view {}", self.view.label()),
                Style::default().fg(Color::Magenta),
            ),
        ]);

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_calendar(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
            .split(area);
        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(columns[1]);
        self.draw_grid(f, columns[0]);
        self.draw_tags(f, side[0]);
        self.draw_editor(f, side[1]);
    }

    fn draw_grid(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Grid;
        let title = self
            .session
            .month()
            .map(|m| m.title.clone())
            .unwrap_or_else(|| "Calendar".into());
        let block = pane_block(title, focused);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let Some(view) = self.session.month() else {
            f.render_widget(
                Paragraph::new("Loading…").alignment(Alignment::Center),
                inner,
            );
            return;
        };
        if view.weeks.is_empty() || inner.height < 2 {
            return;
        }
        let mut rows = vec![Constraint::Length(1)];
        rows.extend(view.weeks.iter().map(|_| Constraint::Ratio(1, view.weeks.len() as u32)));
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(rows)
            .split(inner);
        let seven = [Constraint::Ratio(1, 7); 7];

        let header = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(seven)
            .split(rows[0]);
        for (slot, name) in header.iter().zip(["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"]) {
            f.render_widget(
                Paragraph::new(Span::styled(name, Style::default().fg(Color::Gray)))
                    .alignment(Alignment::Center),
                *slot,
            );
        }

        let binding = self.session.binding().map(|b| b.date);
        let mut cells = Vec::new();
        for (week, row) in view.weeks.iter().zip(rows.iter().skip(1)) {
            let slots = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(seven)
                .split(*row);
            for (slot, rect) in week.iter().zip(slots.iter()) {
                let Some(cell) = slot else {
                    continue;
                };
                let rect = Rect {
                    width: rect.width.saturating_sub(1),
                    ..*rect
                };
                let paint = self.session.paint_for(cell);
                let widget = DayCellWidget {
                    cell,
                    paint: &paint,
                    cursor: self.cursor == Some(cell.date),
                    bound: binding == Some(cell.date),
                };
                f.render_widget(widget, rect);
                cells.push((rect, cell.date));
            }
        }
        self.hits.cells = cells;
    }

    fn draw_tags(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Tags;
        let block = pane_block("Tags".to_string(), focused);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let pills = self.session.pills();
        if pills.is_empty() {
            f.render_widget(
                Paragraph::new("No tags yet. Press a to add one.")
                    .style(Style::default().fg(Color::DarkGray)),
                inner,
            );
            return;
        }
        self.tag_idx = self.tag_idx.min(pills.len() - 1);
        let viewport = inner.height as usize;
        self.tag_offset = adjust_offset(self.tag_idx, self.tag_offset, viewport, 1, pills.len());

        let mut items = Vec::new();
        for (row, (idx, pill)) in pills
            .iter()
            .enumerate()
            .skip(self.tag_offset)
            .take(viewport)
            .enumerate()
        {
            let y = inner.y + row as u16;
            let checkbox = if pill.checked { "[x] " } else { "[ ] " };
            let check_style = if pill.disabled {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::LightGreen)
            };
            let mut spans = vec![
                Span::styled("≡ ", Style::default().fg(Color::DarkGray)),
                Span::styled(checkbox, check_style),
                Span::styled(
                    format!("{:<width$} ", truncate_text(&pill.name, NAME_COLUMN), width = NAME_COLUMN),
                    Style::default().fg(Color::White),
                ),
                Span::styled("███", Style::default().fg(hex_color(&pill.color))),
            ];
            if pill.deletable {
                spans.push(Span::styled(" ×", Style::default().fg(Color::LightRed)));
            }
            let mut item = ListItem::new(Line::from(spans));
            if idx == self.tag_idx && focused {
                item = item.style(Style::default().bg(Color::Rgb(40, 44, 52)));
            }
            items.push(item);

            let bar_x = inner.x + (2 + 4 + NAME_COLUMN + 1) as u16;
            self.hits.pills.push((Rect::new(inner.x, y, inner.width, 1), idx));
            if bar_x + 3 <= inner.right() {
                self.hits.swatch_bars.push((Rect::new(bar_x, y, 3, 1), idx));
            }
        }
        f.render_widget(List::new(items), inner);
    }

    fn draw_editor(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Editor;
        let Some(binding) = self.session.binding() else {
            let block = pane_block("Entry".to_string(), false);
            let hint = Paragraph::new(vec![
                Line::from("Select a day and press Enter to write."),
                Line::from(Span::styled(
                    "f opens the addendum for the selected day.",
                    Style::default().fg(Color::DarkGray),
                )),
            ])
            .wrap(Wrap { trim: true })
            .block(block);
            f.render_widget(hint, area);
            return;
        };
        let cell = self.session.month().and_then(|m| m.cell(binding.date));
        let mut title = binding.date.format("%a %b %-d").to_string();
        if let Some(status) = cell.map(|c| c.status.as_str()).filter(|s| !s.is_empty()) {
            title.push_str(&format!(" · {}", status));
        }
        if binding.locked {
            title.push_str(" · locked");
        }
        let block = pane_block(title, focused);
        let inner = block.inner(area);
        let text = if focused && !binding.locked {
            self.editor.with_caret()
        } else {
            self.editor.value.clone()
        };
        let style = if binding.locked {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::White)
        };
        let scroll = (self.editor.caret_line() as u16).saturating_sub(inner.height.saturating_sub(1));
        let paragraph = Paragraph::new(text)
            .style(style)
            .scroll((scroll, 0))
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_journal(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(3)])
            .split(area);

        let searching = matches!(self.prompt, Prompt::Search);
        let query = if searching {
            self.search.with_caret()
        } else {
            self.search.value.clone()
        };
        let title = if self.debounce.is_pending() {
            "Search (/) …".to_string()
        } else {
            "Search (/)".to_string()
        };
        let search = Paragraph::new(query).block(pane_block(title, searching));
        f.render_widget(search, sections[0]);

        let journal = self.session.journal();
        let block = pane_block("Journal".to_string(), !searching);
        if journal.cards().is_empty() {
            f.render_widget(
                Paragraph::new("No entries yet.")
                    .alignment(Alignment::Center)
                    .block(block),
                sections[1],
            );
            return;
        }
        let width = sections[1].width.saturating_sub(4) as usize;
        let visible = journal.visible();
        let items: Vec<ListItem> = visible
            .iter()
            .map(|(_, card)| {
                let mut lines = vec![Line::from(vec![
                    Span::styled(card.date_label.clone(), Style::default().fg(Color::Yellow)),
                    Span::raw("  "),
                    Span::styled(
                        truncate_text(&card.title, width.saturating_sub(card.date_label.len() + 2)),
                        Style::default()
                            .fg(Color::White)
                            .add_modifier(Modifier::BOLD),
                    ),
                ])];
                if card.expanded {
                    for line in card.body.lines() {
                        lines.push(Line::from(Span::styled(
                            format!("  {}", line),
                            Style::default().fg(Color::Gray),
                        )));
                    }
                    if !card.footnotes.trim().is_empty() {
                        lines.push(Line::from(Span::styled(
                            "  ── Chronicle Addendum ──",
                            Style::default()
                                .fg(Color::LightMagenta)
                                .add_modifier(Modifier::BOLD),
                        )));
                        for line in card.footnotes.lines() {
                            lines.push(Line::from(Span::styled(
                                format!("  {}", line),
                                Style::default().fg(Color::LightMagenta),
                            )));
                        }
                    }
                    lines.push(Line::from(""));
                }
                ListItem::new(lines)
            })
            .collect();
        let count = items.len();
        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(Color::LightCyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
        self.journal_idx = self.journal_idx.min(count.saturating_sub(1));
        self.journal_state
            .select(if count == 0 { None } else { Some(self.journal_idx) });
        f.render_stateful_widget(list, sections[1], &mut self.journal_state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, rows[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let key = |k: &'static str, color: Color| Span::styled(k, Style::default().fg(color));
        if self.session.picker().is_some() {
            return Line::from(vec![
                key("1-8", Color::LightCyan),
                Span::raw(" pick  "),
                key("t", Color::LightYellow),
                Span::raw(" tier  "),
                key("h", Color::LightYellow),
                Span::raw(" hue  "),
                key("r", Color::LightGreen),
                Span::raw(" reroll  "),
                key("#", Color::LightMagenta),
                Span::raw(" hex  "),
                key("Esc", Color::LightRed),
                Span::raw(" close"),
            ]);
        }
        let mut spans = vec![
            key("1", Color::LightCyan),
            Span::raw(" calendar  "),
            key("2", Color::LightCyan),
            Span::raw(" journal  "),
        ];
        match (self.view, self.focus) {
            (View::Calendar, Focus::Grid) => spans.extend([
                key("←↑↓→ / h j k l", Color::LightCyan),
                Span::raw(" move  "),
                key("Enter", Color::LightYellow),
                Span::raw(" open  "),
                key("[ ]", Color::LightGreen),
                Span::raw(" month  "),
                key("g", Color::LightGreen),
                Span::raw(" today  "),
                key("f", Color::LightMagenta),
                Span::raw(" addendum  "),
                key("Tab", Color::LightCyan),
                Span::raw(" focus  "),
                key("q", Color::LightRed),
                Span::raw(" quit"),
            ]),
            (View::Calendar, Focus::Tags) => spans.extend([
                key("↑↓", Color::LightCyan),
                Span::raw(" browse  "),
                key("Space", Color::LightYellow),
                Span::raw(" toggle  "),
                key("J/K", Color::LightGreen),
                Span::raw(" reorder  "),
                key("c", Color::LightMagenta),
                Span::raw(" color  "),
                key("a", Color::LightMagenta),
                Span::raw(" add  "),
                key("x", Color::LightRed),
                Span::raw(" archive  "),
                key("Tab", Color::LightCyan),
                Span::raw(" focus"),
            ]),
            (View::Calendar, Focus::Editor) => spans.extend([
                key("Ctrl+S", Color::LightGreen),
                Span::raw(" save  "),
                key("Esc", Color::LightRed),
                Span::raw(" close  "),
                key("Tab", Color::LightCyan),
                Span::raw(" focus"),
            ]),
            (View::Journal, _) => spans.extend([
                key("↑↓", Color::LightCyan),
                Span::raw(" browse  "),
                key("Enter", Color::LightYellow),
                Span::raw(" expand  "),
                key("E", Color::LightYellow),
                Span::raw(" expand all  "),
                key("/", Color::LightGreen),
                Span::raw(" search  "),
                key("f", Color::LightMagenta),
                Span::raw(" addendum  "),
                key("q", Color::LightRed),
                Span::raw(" quit"),
            ]),
        }
        Line::from(spans)
    }

    fn draw_footnote(&mut self, f: &mut ratatui::Frame<'_>, date: NaiveDate) {
        let area = centered_rect(60, 50, f.size());
        self.hits.footnote = Some(area);
        let mut lines: Vec<Line> = self
            .footnote
            .with_caret()
            .split('\n')
            .map(|l| Line::from(l.to_string()))
            .collect();
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Ctrl+S to save • Esc or click outside to close",
            Style::default().fg(Color::Gray),
        )));
        let dialog = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        format!("Chronicle Addendum · {}", date.format("%Y-%m-%d")),
                        Style::default()
                            .fg(Color::LightMagenta)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::LightMagenta)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_picker(&mut self, f: &mut ratatui::Frame<'_>) {
        let Some(picker) = self.session.picker() else {
            return;
        };
        let hex_line = matches!(self.prompt, Prompt::Hex(_)) as u16;
        let height = picker.swatches.len() as u16 + 5 + hex_line;
        let anchor = self
            .hits
            .picker_anchor
            .unwrap_or_else(|| centered_rect(10, 10, f.size()));
        let area = picker_area(anchor, PICKER_WIDTH, height, f.size());

        let mut lines = vec![
            Line::from(vec![
                Span::styled("tier ", Style::default().fg(Color::Gray)),
                Span::styled(picker.tier.label(), Style::default().fg(Color::LightYellow)),
                Span::styled("  hue ", Style::default().fg(Color::Gray)),
                Span::styled(picker.hue.label(), Style::default().fg(Color::LightYellow)),
            ]),
            Line::from(""),
        ];
        let mut swatches = Vec::new();
        for (idx, color) in picker.swatches.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::styled(format!("{} ", idx + 1), Style::default().fg(Color::DarkGray)),
                Span::styled("██████", Style::default().fg(hex_color(color))),
                Span::raw(" "),
                Span::styled(color.clone(), Style::default().fg(Color::Gray)),
            ]));
            swatches.push(Rect::new(area.x + 1, area.y + 3 + idx as u16, area.width.saturating_sub(2), 1));
        }
        lines.push(Line::from(""));
        if let Prompt::Hex(field) = &self.prompt {
            lines.push(Line::from(vec![
                Span::styled("hex: ", Style::default().fg(Color::Gray)),
                Span::styled(field.with_caret(), Style::default().fg(Color::Cyan)),
            ]));
        } else {
            lines.push(Line::from(Span::styled(
                "# custom hex",
                Style::default().fg(Color::DarkGray),
            )));
        }
        let dialog = Paragraph::new(lines).block(
            Block::default()
                .title(Span::styled(
                    format!("Color · {}", truncate_text(&picker.tag, 20)),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
        self.hits.picker = Some(area);
        self.hits.swatches = swatches;
    }
}

/// Paints one calendar day: gradient bands bottom to top, or a diagonal
/// hatch when no tag is recognized.
struct DayCellWidget<'a> {
    cell: &'a DayCell,
    paint: &'a Paint,
    cursor: bool,
    bound: bool,
}

impl Widget for DayCellWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        for row in 0..area.height {
            let y = area.y + row;
            let from_bottom = area.height - 1 - row;
            let pct = (from_bottom as f64 + 0.5) * 100.0 / area.height as f64;
            match self.paint {
                Paint::Etched => {
                    for x in area.left()..area.right() {
                        if (x + y) % 3 == 0 {
                            buf.get_mut(x, y).set_char('╱').set_fg(Color::DarkGray);
                        }
                    }
                }
                Paint::Bands(_) => {
                    if let Some((r, g, b)) = self.paint.fill_at(pct).and_then(hex_to_rgb) {
                        for x in area.left()..area.right() {
                            buf.get_mut(x, y).set_bg(Color::Rgb(r, g, b));
                        }
                    }
                }
            }
        }

        let mut label = format!("{:>2}", self.cell.day);
        if self.cell.has_blog {
            label.push('✎');
        }
        if self.cell.is_locked {
            label.push('⊘');
        }
        let top_filled = self.paint.fill_at(100.0 - 50.0 / area.height as f64).is_some();
        let mut style = Style::default()
            .fg(if top_filled { Color::Black } else { Color::White })
            .add_modifier(Modifier::BOLD);
        if self.cell.is_today {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        if self.bound {
            style = style.bg(Color::LightCyan).fg(Color::Black);
        }
        if self.cursor {
            style = style.bg(Color::Cyan).fg(Color::Black);
        }
        buf.set_stringn(area.x, area.y, label, area.width as usize, style);
    }
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    Block::default()
        .title(Span::styled(
            title,
            Style::default()
                .fg(if focused { Color::Cyan } else { Color::Gray })
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
}

fn draw_prompt(f: &mut ratatui::Frame<'_>, title: &str, field: &FieldValue) {
    let area = centered_rect(50, 20, f.size());
    let mut lines = field_lines("Name", field, true);
    lines.push(Line::from(Span::styled(
        "Enter to add • Esc to cancel",
        Style::default().fg(Color::Gray),
    )));
    let dialog = Paragraph::new(lines)
        .block(
            Block::default()
                .title(Span::styled(
                    title.to_string(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn draw_confirm(f: &mut ratatui::Frame<'_>, name: &str) {
    let area = centered_rect(50, 30, f.size());
    let body = vec![
        Line::from(Span::styled(
            crate::session::delete_prompt(name),
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Press y to confirm, n or Esc to cancel"),
    ];
    let dialog = Paragraph::new(body)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(Span::styled(
                    "Archive Tag",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn draw_alert(f: &mut ratatui::Frame<'_>, alert: &Alert) {
    let area = centered_rect(50, 25, f.size());
    let hint = if alert.retry {
        "Press r to retry, any other key to dismiss"
    } else {
        "Press any key to dismiss"
    };
    let body = vec![
        Line::from(Span::styled(
            alert.message.clone(),
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(hint, Style::default().fg(Color::Gray))),
    ];
    let dialog = Paragraph::new(body)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(Span::styled(
                    "Error",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

/// Places the picker below its anchor, flipping above when it would run off
/// the bottom and keeping a one-cell margin. Narrow terminals get it centered.
fn picker_area(anchor: Rect, width: u16, height: u16, viewport: Rect) -> Rect {
    let width = width.min(viewport.width.saturating_sub(2));
    let height = height.min(viewport.height.saturating_sub(2));
    if viewport.width < PICKER_NARROW_WIDTH {
        return Rect::new(
            viewport.x + (viewport.width - width) / 2,
            viewport.y + (viewport.height - height) / 2,
            width,
            height,
        );
    }
    let min_x = viewport.x + 1;
    let max_x = viewport.right().saturating_sub(width + 1).max(min_x);
    let min_y = viewport.y + 1;
    let max_y = viewport.bottom().saturating_sub(height + 1).max(min_y);
    let below = anchor.bottom();
    let y = if below + height + 1 > viewport.bottom() {
        anchor.y.saturating_sub(height)
    } else {
        below
    };
    Rect::new(
        anchor.x.clamp(min_x, max_x),
        y.clamp(min_y, max_y),
        width,
        height,
    )
}

fn is_save(key: KeyEvent) -> bool {
    key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL)
}

fn hit(rect: Rect, col: u16, row: u16) -> bool {
    col >= rect.left() && col < rect.right() && row >= rect.top() && row < rect.bottom()
}

fn hex_color(hex: &str) -> Color {
    hex_to_rgb(hex)
        .map(|(r, g, b)| Color::Rgb(r, g, b))
        .unwrap_or(Color::Gray)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn prev_grapheme(cursor: usize, text: &str) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut prev = 0;
    for (idx, _) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        prev = idx;
    }
    prev
}

fn next_grapheme(cursor: usize, text: &str) -> usize {
    for (idx, ch) in text.char_indices() {
        if idx > cursor {
            return idx;
        }
        if idx == cursor {
            return cursor + ch.len_utf8();
        }
    }
    text.len()
}

fn line_state(text: &str, cursor: usize) -> (Vec<usize>, usize, usize) {
    let mut starts = vec![0];
    for (idx, ch) in text.char_indices() {
        if ch == '\n' {
            starts.push(idx + 1);
        }
    }
    let mut line_idx = 0;
    for (i, start) in starts.iter().enumerate() {
        if *start <= cursor {
            line_idx = i;
        } else {
            break;
        }
    }
    let start = starts.get(line_idx).copied().unwrap_or(0);
    let col = text[start..cursor].chars().count();
    (starts, line_idx, col)
}

fn index_at_col(text: &str, start: usize, target_col: usize) -> usize {
    let slice = &text[start..];
    let limit = slice.find('\n').unwrap_or(slice.len());
    for (col, (idx, _)) in slice[..limit].char_indices().enumerate() {
        if col == target_col {
            return start + idx;
        }
    }
    start + limit
}

fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}

fn field_lines(label: &str, field: &FieldValue, active: bool) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let prefix = format!("{}: ", label);
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    vec![Line::from(vec![
        Span::styled(prefix, label_style),
        Span::styled(text, value_style),
    ])]
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{compute_gradient, Band, BandFill};
    use crate::model::{TagInfo, TagRegistry};
    use std::collections::BTreeMap;

    fn viewport() -> Rect {
        Rect::new(0, 0, 120, 40)
    }

    #[test]
    fn picker_opens_below_anchor() {
        let area = picker_area(Rect::new(30, 5, 3, 1), 36, 13, viewport());
        assert_eq!(area, Rect::new(30, 6, 36, 13));
    }

    #[test]
    fn picker_flips_above_near_bottom() {
        let area = picker_area(Rect::new(30, 34, 3, 1), 36, 13, viewport());
        assert_eq!(area.y, 21);
        assert_eq!(area.bottom(), 34);
    }

    #[test]
    fn picker_is_clamped_to_viewport() {
        let area = picker_area(Rect::new(110, 5, 3, 1), 36, 13, viewport());
        assert_eq!(area.x, 120 - 36 - 1);
        let area = picker_area(Rect::new(0, 0, 3, 1), 36, 13, viewport());
        assert_eq!((area.x, area.y), (1, 1));
    }

    #[test]
    fn picker_is_centered_when_narrow() {
        let narrow = Rect::new(0, 0, 50, 30);
        let area = picker_area(Rect::new(45, 2, 3, 1), 36, 13, narrow);
        assert_eq!(area, Rect::new(7, 8, 36, 13));
    }

    fn cell(tags: &[&str]) -> DayCell {
        DayCell {
            date: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap_or_default(),
            day: 9,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            has_blog: true,
            is_locked: false,
            is_today: false,
            status: String::new(),
            snapshot: String::new(),
        }
    }

    #[test]
    fn bands_fill_from_the_bottom() {
        let paint = Paint::Bands(vec![
            Band {
                fill: BandFill::Color("#FF0000".into()),
                start: 0.0,
                end: 50.0,
            },
            Band {
                fill: BandFill::Color("#0000FF".into()),
                start: 50.0,
                end: 100.0,
            },
        ]);
        let day = cell(&["a", "b"]);
        let area = Rect::new(0, 0, 4, 4);
        let mut buf = Buffer::empty(area);
        DayCellWidget {
            cell: &day,
            paint: &paint,
            cursor: false,
            bound: false,
        }
        .render(area, &mut buf);
        assert_eq!(buf.get(3, 3).bg, Color::Rgb(255, 0, 0));
        assert_eq!(buf.get(3, 0).bg, Color::Rgb(0, 0, 255));
        assert_eq!(buf.get(0, 0).symbol(), " ");
        assert_eq!(buf.get(1, 0).symbol(), "9");
        assert_eq!(buf.get(2, 0).symbol(), "✎");
    }

    #[test]
    fn untagged_day_is_hatched() {
        let registry = TagRegistry::new(BTreeMap::from([(
            "gym".to_string(),
            TagInfo {
                color: "#00FF00".into(),
                priority: 1,
            },
        )]));
        let day = cell(&["unknown"]);
        let paint = compute_gradient(&day.tags, &registry);
        assert_eq!(paint, Paint::Etched);
        let area = Rect::new(0, 0, 6, 3);
        let mut buf = Buffer::empty(area);
        DayCellWidget {
            cell: &day,
            paint: &paint,
            cursor: false,
            bound: false,
        }
        .render(area, &mut buf);
        assert_eq!(buf.get(1, 2).symbol(), "╱");
        assert_eq!(buf.get(5, 1).bg, Color::Reset);
    }

    #[test]
    fn field_moves_between_lines() {
        let mut field = FieldValue::new("abc\nde");
        field.move_up();
        assert_eq!(field.cursor, 2);
        field.move_down();
        assert_eq!(field.cursor, 6);
        field.backspace();
        assert_eq!(field.value, "abc\nd");
        assert_eq!(field.caret_line(), 1);
    }

    #[test]
    fn truncation_keeps_short_text() {
        assert_eq!(truncate_text("gym", 18), "gym");
        assert_eq!(truncate_text("meditation", 5), "medi…");
    }

    #[test]
    fn offset_follows_selection() {
        assert_eq!(adjust_offset(0, 0, 5, 1, 20), 0);
        assert_eq!(adjust_offset(10, 0, 5, 1, 20), 7);
        assert_eq!(adjust_offset(19, 7, 5, 1, 20), 15);
    }
}
