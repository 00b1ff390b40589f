use crate::api::{Backend, EnvPayload, HttpBackend};
use crate::color::{swatches as random_swatches, validate_hex, HueBucket, Tier};
use crate::config::{init_config, Config, ConfigLocation};
use crate::journal::JournalView;
use crate::session::{delete_prompt, Session};
use crate::ui;
use anyhow::{anyhow, bail, Context, Result};
use chrono::Datelike;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

const EXPORT_STYLE: &str = "body{font-family:Georgia,serif;background:#1a1614;color:#e8dcc8;max-width:960px;margin:2rem auto}\
#calendar{display:grid;grid-template-columns:repeat(7,1fr);gap:4px}\
.day{position:relative;height:72px;border:1px solid #4a3f35}\
.cell-paper{position:absolute;inset:0}\
.cell-content{position:relative;padding:4px}\
.is-today{outline:2px solid #d4a857}\
.has-blog .cell-content::after{content:' \\270E'}\
.entry{border-top:1px solid #4a3f35;padding:1rem 0}\
.entry-content{display:block!important}";

pub fn init(location: &ConfigLocation) -> Result<()> {
    if init_config(location)? {
        println!("Wrote default config to {}", location.path.display());
    } else {
        println!("Config already exists at {}", location.path.display());
    }
    Ok(())
}

/// Bootstraps a session against the configured server.
pub fn connect(config: &Config) -> Result<Session<HttpBackend>> {
    let mut backend = HttpBackend::new(config)?;
    let env = backend
        .bootstrap()
        .with_context(|| format!("connecting to {}", config.server_url))?;
    log::info!(
        "bootstrapped from {}: {} tags, {} entries",
        config.server_url,
        env.tags_data.len(),
        env.logs_data.len()
    );
    backend.adopt_csrf_token(env.csrf_token.clone());
    Ok(Session::new(backend, env))
}

pub fn load_env_file(path: &Path) -> Result<EnvPayload> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let env = serde_json::from_str(&data).with_context(|| format!("parsing {:?}", path))?;
    Ok(env)
}

pub fn month(config: &Config, year: Option<i32>, month: Option<u32>) -> Result<()> {
    let mut session = connect(config)?;
    load_requested_month(&mut session, year, month)?;
    let view = session
        .month()
        .ok_or_else(|| anyhow!("calendar did not load"))?;
    println!("{}", view.title);
    println!("Mo Tu We Th Fr Sa Su");
    for week in &view.weeks {
        let row: Vec<String> = week
            .iter()
            .map(|slot| match slot {
                Some(cell) if cell.has_blog => format!("{:>2}*", cell.day),
                Some(cell) => format!("{:>2} ", cell.day),
                None => "   ".to_string(),
            })
            .collect();
        println!("{}", row.join("").trim_end());
    }
    println!();
    for cell in view.cells().filter(|c| !c.tags.is_empty() || c.is_locked) {
        let mut line = format!("{}  {}", cell.date.format("%Y-%m-%d"), cell.tags.join(", "));
        if cell.is_locked {
            line.push_str("  [locked]");
        }
        if !cell.status.is_empty() {
            line.push_str(&format!("  ({})", cell.status));
        }
        println!("{}", line.trim_end());
    }
    Ok(())
}

pub fn journal(
    config: &Config,
    query: Option<String>,
    html: bool,
    from: Option<&Path>,
) -> Result<()> {
    let mut view = JournalView::new();
    match from {
        Some(path) => view.render(&load_env_file(path)?.logs_data),
        None => view.render(connect(config)?.logs()),
    }
    if let Some(q) = query.as_deref() {
        view.filter(q);
    }
    if html {
        print!("{}", view.to_html());
        return Ok(());
    }
    let visible = view.visible();
    if visible.is_empty() {
        println!("No entries.");
    }
    for (_, card) in visible {
        println!("{}  {}", card.date.format("%Y-%m-%d"), card.title);
    }
    Ok(())
}

pub fn export(
    config: &Config,
    year: Option<i32>,
    month: Option<u32>,
    output: &Path,
) -> Result<()> {
    let mut session = connect(config)?;
    load_requested_month(&mut session, year, month)?;
    let view = session
        .month()
        .ok_or_else(|| anyhow!("calendar did not load"))?;
    let page = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}<section id=\"journal\">\n{}</section>\n</body>\n</html>\n",
        crate::markdown::escape_html(&view.title),
        EXPORT_STYLE,
        view.to_markup(session.today(), session.tags()),
        session.journal().to_html(),
    );
    fs::write(output, page).with_context(|| format!("writing {:?}", output))?;
    println!("Exported {} to {}", view.title, output.display());
    Ok(())
}

pub fn swatches(tier: &str, hue: &str) -> Result<()> {
    let tier: Tier = tier.parse().map_err(anyhow::Error::msg)?;
    let hue: HueBucket = hue.parse().map_err(anyhow::Error::msg)?;
    for color in random_swatches(tier, hue, &mut rand::thread_rng()) {
        println!("{}", color);
    }
    Ok(())
}

pub fn hex(value: &str) -> Result<()> {
    println!("{}", validate_hex(value)?);
    Ok(())
}

pub fn tag_list(config: &Config) -> Result<()> {
    let session = connect(config)?;
    if session.tags().is_empty() {
        println!("No tags.");
    }
    for tag in session.tags().sorted() {
        println!("{:>4}  {}  {}", tag.priority, tag.color, tag.name);
    }
    Ok(())
}

pub fn tag_add(config: &Config, name: &str) -> Result<()> {
    let mut session = connect(config)?;
    session.add_tag(name)?;
    println!("Added tag ({} total)", session.tags().len());
    Ok(())
}

pub fn tag_delete(config: &Config, name: &str, yes: bool) -> Result<()> {
    let mut session = connect(config)?;
    if !yes && !confirm(&delete_prompt(name))? {
        println!("Canceled");
        return Ok(());
    }
    session.request_delete(name)?;
    session.confirm_delete()?;
    println!("Archived {}", name);
    Ok(())
}

pub fn tag_color(config: &Config, name: &str, color: &str) -> Result<()> {
    let mut session = connect(config)?;
    session.recolor_tag(name, color)?;
    let applied = session
        .tags()
        .get(name)
        .map(|t| t.color.clone())
        .unwrap_or_default();
    println!("{} is now {}", name, applied);
    Ok(())
}

pub fn tag_reorder(config: &Config, names: Vec<String>) -> Result<()> {
    let mut session = connect(config)?;
    if let Some(unknown) = names.iter().find(|n| !session.tags().contains(n)) {
        bail!("unknown tag: {}", unknown);
    }
    session.reorder(names)?;
    println!("New order: {}", session.tags().names_by_priority().join(", "));
    Ok(())
}

pub fn tui(config: &Config) -> Result<()> {
    let session = connect(config)?;
    ui::run(session)
}

fn load_requested_month<B: Backend>(
    session: &mut Session<B>,
    year: Option<i32>,
    month: Option<u32>,
) -> Result<()> {
    let today = session.today();
    let year = year.unwrap_or(today.year());
    let month = month.unwrap_or(today.month());
    if !(1..=12).contains(&month) {
        bail!("month must be between 1 and 12");
    }
    session
        .load_month(year, month)
        .with_context(|| format!("loading {}-{:02}", year, month))?;
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
