mod api;
mod calendar;
mod cli;
mod color;
mod commands;
mod config;
mod journal;
mod logging;
mod markdown;
mod model;
mod session;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::{Command, TagCommand};

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let location = config::locate_config(args.config.as_deref())?;
    let mut config = match args.command {
        Some(Command::Init) => config::Config::default(),
        _ => config::load_config(&location)?,
    };
    config.apply_env();
    if let Some(server) = args.server {
        config.server_url = server;
    }
    match config.log_path() {
        Ok(path) => {
            if let Err(err) = logging::init(&path, &config.log_level) {
                eprintln!("warning: logging disabled: {:#}", err);
            }
        }
        Err(err) => eprintln!("warning: logging disabled: {:#}", err),
    }

    let command = args.command.unwrap_or(Command::Tui);
    match command {
        Command::Init => commands::init(&location),
        Command::Month { year, month } => commands::month(&config, year, month),
        Command::Journal { query, html, from } => {
            commands::journal(&config, query, html, from.as_deref())
        }
        Command::Export {
            year,
            month,
            output,
        } => commands::export(&config, year, month, &output),
        Command::Swatches { tier, hue } => commands::swatches(&tier, &hue),
        Command::Hex { value } => commands::hex(&value),
        Command::Tag(tag) => match tag {
            TagCommand::List => commands::tag_list(&config),
            TagCommand::Add { name } => commands::tag_add(&config, &name),
            TagCommand::Delete { name, yes } => commands::tag_delete(&config, &name, yes),
            TagCommand::Color { name, color } => commands::tag_color(&config, &name, &color),
            TagCommand::Reorder { names } => commands::tag_reorder(&config, names),
        },
        Command::Tui => commands::tui(&config),
    }
}
