use std::sync::mpsc::Sender;
use tracing::{debug, info};

/// Requests that reach the daemon's main loop from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Re-read profiles.json and rebind every hotkey
    Reload,
    Shutdown,
}

/// SIGUSR1 reloads profiles; SIGINT, SIGTERM and SIGHUP shut down.
#[cfg(unix)]
pub fn setup_signal_handler(
    tx: Sender<ControlMessage>,
    _runtime: &tokio::runtime::Handle,
) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM, SIGUSR1};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGUSR1, SIGINT, SIGTERM, SIGHUP])?;
    std::thread::spawn(move || {
        for sig in signals.forever() {
            let message = match sig {
                SIGUSR1 => ControlMessage::Reload,
                _ => ControlMessage::Shutdown,
            };
            debug!("Received signal {} -> {:?}", sig, message);
            if tx.send(message).is_err() {
                break;
            }
            if message == ControlMessage::Shutdown {
                info!("Shutdown requested");
                break;
            }
        }
    });
    Ok(())
}

/// Ctrl+C shuts down. There is no reload signal on this platform.
#[cfg(not(unix))]
pub fn setup_signal_handler(
    tx: Sender<ControlMessage>,
    runtime: &tokio::runtime::Handle,
) -> anyhow::Result<()> {
    use tracing::warn;

    runtime.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                let _ = tx.send(ControlMessage::Shutdown);
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });
    Ok(())
}
