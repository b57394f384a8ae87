//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use imgview_core::config::DEFAULT_CONFIG_FILE;

/// Browse image folders and web-page galleries from the terminal.
///
/// `open` prints the path of the image under the cursor and reads navigation
/// commands from stdin: `n` (next), `p` (previous), `c` (current), `q` (quit).
/// Remote images are downloaded in the background and printed when ready.
#[derive(Parser, Debug)]
#[command(name = "imgview")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (created with defaults if missing)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    pub config: PathBuf,

    /// Download attempts per image, overriding the configuration (1-100)
    #[arg(short = 'r', long, global = true, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub retry: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a folder, an image file or a web page and navigate it
    Open {
        /// Local path, or a URL starting with http
        target: String,
    },

    /// Print the image URLs found on a web page
    Scrape {
        /// Page URL
        url: String,
    },

    /// Inspect or edit the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `config` subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective download settings
    Show,

    /// Set a dotted key, e.g. `proxy_config.enable true`
    Set {
        /// Dotted key
        key: String,
        /// JSON value; anything that is not valid JSON is stored as a string
        value: String,
    },
}

/// A navigation command read from stdin during `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    Next,
    Prev,
    Current,
    Quit,
}

impl NavCommand {
    /// Parses one input line; blank or unknown input yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "n" | "next" => Some(Self::Next),
            "p" | "prev" => Some(Self::Prev),
            "c" | "current" => Some(Self::Current),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}
