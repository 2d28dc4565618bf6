mod cli;
mod clipboard;
mod commands;
mod credentials;
mod daemon;
mod input;
mod llm_client;
mod managers;
mod notification;
mod profile;
mod profile_store;
mod settings;
mod shortcut;
mod signal_handle;
mod tracing_config;

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

pub use cli::{CliArgs, Command};

const APP_DIR_NAME: &str = "AIHotKey";

/// `--data-dir` if given, otherwise the platform data directory.
fn resolve_data_dir(cli_args: &CliArgs) -> anyhow::Result<PathBuf> {
    if let Some(dir) = &cli_args.data_dir {
        return Ok(dir.clone());
    }
    let base = dirs::data_dir().context("Could not determine the user data directory")?;
    Ok(base.join(APP_DIR_NAME))
}

pub fn run(cli_args: CliArgs) -> anyhow::Result<()> {
    let data_dir = resolve_data_dir(&cli_args)?;
    tracing_config::init_tracing(&data_dir.join("logs"), cli_args.debug)?;

    let app_settings = settings::load_or_create_app_settings(&data_dir);
    tracing_config::set_file_log_level(app_settings.log_level.into());
    info!("AIHotKey {} starting, data dir: {}", env!("CARGO_PKG_VERSION"), data_dir.display());

    let result = match cli_args.command() {
        Command::Run => daemon::run_daemon(&data_dir, app_settings),
        command => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            commands::execute(&data_dir, command, &mut out)
        }
    };

    tracing_config::flush_logs();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_data_dir_override() {
        let args = CliArgs::try_parse_from(["aihotkey", "--data-dir", "/tmp/aihotkey-test", "list"]).unwrap();
        assert_eq!(resolve_data_dir(&args).unwrap(), PathBuf::from("/tmp/aihotkey-test"));
    }
}
