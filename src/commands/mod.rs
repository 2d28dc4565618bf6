//! Profile editing from the command line.
//!
//! These run without the daemon's OS bindings (`NoopBackend`), so they only
//! touch the profile file. A running daemon picks the edits up on reload.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context};

use crate::cli::Command;
use crate::managers::profiles::ProfileManager;
use crate::profile::Profile;
use crate::profile_store::ProfileStore;
use crate::shortcut::{HotkeyBackend, NoopBackend, RebindOutcome};

const RELOAD_HINT: &str = "A running daemon picks this up after `kill -USR1 <pid>` or a restart.";

/// Convert a 1-based profile number from the command line to an index
fn index_from_number(number: usize) -> anyhow::Result<usize> {
    if number == 0 {
        bail!("Profile numbers start at 1");
    }
    Ok(number - 1)
}

pub fn format_profiles(profiles: &[Profile]) -> String {
    let mut out = String::new();
    for (i, profile) in profiles.iter().enumerate() {
        let prompt = profile.prompt.trim().replace('\n', " ");
        let prompt = if prompt.chars().count() > 60 {
            format!("{}...", prompt.chars().take(57).collect::<String>())
        } else {
            prompt
        };
        out.push_str(&format!(
            "{:>2}. {:<10} {:<24} {}\n",
            i + 1,
            profile.name,
            profile.combo().to_string(),
            prompt
        ));
    }
    out
}

fn report_rebind(out: &mut impl Write, name: &str, outcome: &RebindOutcome) -> anyhow::Result<()> {
    if !outcome.is_success() {
        bail!(outcome.message().unwrap_or_else(|| format!("{:?}", outcome)));
    }
    if *outcome == RebindOutcome::Unchanged {
        writeln!(out, "{} already uses that hotkey.", name)?;
    } else {
        writeln!(out, "Updated {}. {}", name, RELOAD_HINT)?;
    }
    Ok(())
}

fn run_edit<B: HotkeyBackend>(
    manager: &mut ProfileManager<B>,
    command: Command,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Run => bail!("`run` is not a profile command"),
        Command::List => {
            write!(out, "{}", format_profiles(manager.profiles()))?;
        }
        Command::Add => {
            let index = manager.add_profile()?;
            writeln!(out, "Added {}. {}", manager.profiles()[index].name, RELOAD_HINT)?;
        }
        Command::Delete { number } => {
            let removed = manager.delete_profile(index_from_number(number)?)?;
            writeln!(out, "Deleted {}; remaining profiles renumbered. {}", removed.name, RELOAD_HINT)?;
        }
        Command::Prompt { number, text } => {
            let index = index_from_number(number)?;
            manager.set_prompt(index, text)?;
            writeln!(out, "Updated prompt for {}. {}", manager.profiles()[index].name, RELOAD_HINT)?;
        }
        Command::Bind { number, combo } => {
            let index = index_from_number(number)?;
            let outcome = manager.assign_hotkey(index, combo)?;
            let name = manager.profiles()[index].name.clone();
            report_rebind(out, &name, &outcome)?;
        }
        Command::Unbind { number } => {
            let index = index_from_number(number)?;
            let outcome = manager.clear_hotkey(index)?;
            let name = manager.profiles()[index].name.clone();
            report_rebind(out, &name, &outcome)?;
        }
    }
    Ok(())
}

/// Execute a profile command against the profile file in `data_dir`.
pub fn execute(data_dir: &Path, command: Command, out: &mut impl Write) -> anyhow::Result<()> {
    let store = ProfileStore::in_dir(data_dir);
    let (mut manager, _) = ProfileManager::load(store, NoopBackend);
    run_edit(&mut manager, command, out)
        .with_context(|| format!("Profile file: {}", data_dir.join(crate::profile_store::PROFILES_FILE).display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortcut::keys::{HotkeyCombo, MOD_ALT, MOD_CONTROL};

    fn run(dir: &Path, command: Command) -> anyhow::Result<String> {
        let mut out = Vec::new();
        execute(dir, command, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_list_shows_default_profile() {
        let dir = tempfile::tempdir().unwrap();
        let listing = run(dir.path(), Command::List).unwrap();
        assert!(listing.starts_with(" 1. Hotkey 1"));
        assert!(listing.contains("Ctrl + Plus"));
        assert!(listing.contains("Please make the following"));
        assert!(listing.contains("..."));
    }

    #[test]
    fn test_add_bind_and_list() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), Command::Add).unwrap();
        run(
            dir.path(),
            Command::Bind {
                number: 2,
                combo: HotkeyCombo::new(MOD_CONTROL | MOD_ALT, 0x52),
            },
        )
        .unwrap();
        run(
            dir.path(),
            Command::Prompt {
                number: 2,
                text: "Translate to French:\n".to_string(),
            },
        )
        .unwrap();

        let listing = run(dir.path(), Command::List).unwrap();
        let second = listing.lines().nth(1).unwrap();
        assert!(second.contains("Hotkey 2"));
        assert!(second.contains("Ctrl + Alt + R"));
        assert!(second.contains("Translate to French:"));
    }

    #[test]
    fn test_bind_conflict_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), Command::Add).unwrap();
        let err = run(
            dir.path(),
            Command::Bind {
                number: 2,
                combo: HotkeyCombo::DEFAULT,
            },
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("already used by Hotkey 1"));
    }

    #[test]
    fn test_delete_last_profile_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(dir.path(), Command::Delete { number: 1 }).unwrap_err();
        assert!(format!("{:#}", err).contains("Cannot delete the last remaining profile"));
    }

    #[test]
    fn test_profile_number_zero_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(dir.path(), Command::Unbind { number: 0 }).is_err());
    }

    #[test]
    fn test_unbind_shows_not_set() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), Command::Unbind { number: 1 }).unwrap();
        let listing = run(dir.path(), Command::List).unwrap();
        assert!(listing.contains("Not set"));
    }
}
