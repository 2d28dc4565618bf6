use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::shortcut::keys::HotkeyCombo;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "aihotkey", version, about = "Rewrite the selected text from a global hotkey")]
pub struct CliArgs {
    /// Enable debug output on the console
    #[arg(long)]
    pub debug: bool,

    /// Directory holding profiles.json, settings.json and logs
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Listen for hotkeys (default)
    Run,
    /// Show all profiles
    List,
    /// Add a profile with no hotkey
    Add,
    /// Delete a profile
    Delete {
        /// Profile number as shown by `list`
        number: usize,
    },
    /// Replace a profile's prompt
    Prompt {
        number: usize,
        /// Text sent before the selection
        text: String,
    },
    /// Assign a hotkey, e.g. "ctrl+alt+r"
    Bind {
        number: usize,
        combo: HotkeyCombo,
    },
    /// Remove a profile's hotkey
    Unbind { number: usize },
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}
