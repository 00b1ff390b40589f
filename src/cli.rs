use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "grimoire", version, about = "Terminal client for the grimoire habit journal")]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Server base URL (overrides config and GRIMOIRE_SERVER)
    #[arg(long, global = true)]
    pub server: Option<String>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default config file if none exists
    Init,
    /// Print a month's calendar with each day's tags
    Month {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
    },
    /// Print journal entries, newest first
    Journal {
        /// Only show entries containing this text
        #[arg(long, short)]
        query: Option<String>,
        /// Emit sanitized HTML cards instead of titles
        #[arg(long)]
        html: bool,
        /// Read the session environment JSON from a file instead of the server
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Write a static HTML page of a month plus the journal
    Export {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
        /// Output file
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Print a set of random swatches
    Swatches {
        /// bold, medium, whisper or mixed
        #[arg(long, default_value = "mixed")]
        tier: String,
        /// any, red, orange, yellow, green, cyan, blue, purple or pink
        #[arg(long, default_value = "any")]
        hue: String,
    },
    /// Validate and canonicalize a hex color
    Hex { value: String },
    /// Manage tags
    #[command(subcommand)]
    Tag(TagCommand),
    /// Launch the interactive TUI
    Tui,
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    /// List tags by priority
    List,
    /// Add a tag
    Add { name: String },
    /// Archive a tag
    Delete {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Set a tag's color
    Color { name: String, color: String },
    /// Set the full tag order, highest priority first
    Reorder {
        #[arg(required = true)]
        names: Vec<String>,
    },
}
