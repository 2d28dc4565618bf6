//! The long-running listener: owns the OS hotkey bindings and turns presses
//! into rewrite runs.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use fs2::FileExt;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clipboard::SystemClipboard;
use crate::credentials::{ApiKeyLookup, EnvApiKeyLookup};
use crate::input::EnigoState;
use crate::llm_client::OpenAiCompatibleClient;
use crate::managers::profiles::ProfileManager;
use crate::managers::rewrite::{Collaborators, RewriteJob, RewritePipeline, TokioDelay};
use crate::notification::{DesktopNotifier, NotificationType, Notifier};
use crate::profile_store::ProfileStore;
use crate::settings::AppSettings;
use crate::shortcut::global::GlobalHotkeyBackend;
use crate::signal_handle::{setup_signal_handler, ControlMessage};

const LOCK_FILE: &str = "aihotkey.lock";
const PUMP_INTERVAL: Duration = Duration::from_millis(20);

/// Hold an exclusive lock so two daemons never fight over the same hotkeys.
fn acquire_instance_lock(data_dir: &Path) -> anyhow::Result<File> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    let path = data_dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.try_lock_exclusive()
        .with_context(|| format!("Another AIHotKey instance is already running ({})", path.display()))?;
    Ok(file)
}

/// Dispatch pending OS messages so hotkey events reach the receiver.
#[cfg(target_os = "windows")]
fn pump_platform_events() {
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
    };

    let mut msg = MSG::default();
    unsafe {
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
    std::thread::sleep(PUMP_INTERVAL);
}

#[cfg(target_os = "macos")]
fn pump_platform_events() {
    use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};

    let _ = CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, PUMP_INTERVAL, true);
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn pump_platform_events() {
    std::thread::sleep(PUMP_INTERVAL);
}

/// Let accepted runs finish, clipboard restore included. Returns false if
/// `limit` passed first.
fn wait_for_runs(runtime: &Runtime, runs: Vec<JoinHandle<()>>, limit: Duration) -> bool {
    let pending: Vec<_> = runs.into_iter().filter(|run| !run.is_finished()).collect();
    if pending.is_empty() {
        return true;
    }
    info!("Waiting up to {:?} for {} rewrite(s) to finish", limit, pending.len());
    runtime.block_on(async move {
        tokio::time::timeout(limit, async move {
            for run in pending {
                if let Err(e) = run.await {
                    warn!("Rewrite task ended abnormally: {}", e);
                }
            }
        })
        .await
        .is_ok()
    })
}

fn build_pipeline(settings: &AppSettings) -> anyhow::Result<RewritePipeline> {
    let service = OpenAiCompatibleClient::from_settings(settings)?;
    let collaborators = Collaborators {
        clipboard: Arc::new(SystemClipboard::new()),
        input: Arc::new(EnigoState::new()),
        service: Arc::new(service),
        notifier: Arc::new(DesktopNotifier::new()),
        delay: Arc::new(TokioDelay),
    };
    Ok(RewritePipeline::new(
        collaborators,
        settings.model.clone(),
        settings.settle_timing(),
    ))
}

/// Run until a shutdown signal arrives. Must be called on the main thread:
/// the OS delivers hotkey events to the thread that registered them.
pub fn run_daemon(data_dir: &Path, settings: AppSettings) -> anyhow::Result<()> {
    let _lock = acquire_instance_lock(data_dir)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("aihotkey-worker")
        .build()
        .context("Failed to start async runtime")?;

    let backend = GlobalHotkeyBackend::new()?;
    let store = ProfileStore::in_dir(data_dir);
    info!("Loading profiles from {}", store.path().display());
    let (mut manager, failures) = ProfileManager::load(store, backend);

    let notifier = DesktopNotifier::new();
    for failure in &failures {
        warn!("{}", failure);
        notifier.show(NotificationType::Warning, "Hotkey not registered", &failure.to_string());
    }
    info!(
        "{} profile(s) loaded, {} hotkey(s) active",
        manager.profiles().len(),
        manager.registry().bound_count()
    );

    let pipeline = Arc::new(build_pipeline(&settings)?);
    let credentials = EnvApiKeyLookup::from_settings(&settings);

    let (tx, rx) = mpsc::channel();
    setup_signal_handler(tx, runtime.handle())?;

    let mut runs: Vec<JoinHandle<()>> = Vec::new();

    info!("Listening for hotkeys");
    loop {
        pump_platform_events();
        runs.retain(|run| !run.is_finished());

        for id in manager.backend().pending_presses() {
            let Some(profile) = manager.resolve(id) else {
                debug!("Ignoring press for unknown hotkey {}", id);
                continue;
            };
            debug!("Hotkey {} pressed for {}", id, profile.name);
            let job = RewriteJob::for_profile(profile, credentials.lookup());
            let pipeline = Arc::clone(&pipeline);
            runs.push(runtime.spawn(async move {
                pipeline.run(job).await;
            }));
        }

        match rx.try_recv() {
            Ok(ControlMessage::Reload) => {
                info!("Reloading profiles");
                for failure in manager.reload() {
                    warn!("{}", failure);
                    notifier.show(NotificationType::Warning, "Hotkey not registered", &failure.to_string());
                }
            }
            Ok(ControlMessage::Shutdown) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }
    }

    info!("Shutting down");
    manager.shutdown();
    if !wait_for_runs(&runtime, runs, settings.longest_run()) {
        warn!("A rewrite was still running at exit; the clipboard may not be restored");
    }
    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_instance_lock_fails() {
        let dir = tempfile::tempdir().unwrap();
        let first = acquire_instance_lock(dir.path()).unwrap();
        let err = acquire_instance_lock(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("already running"));
        drop(first);
        assert!(acquire_instance_lock(dir.path()).is_ok());
    }

    fn test_runtime() -> Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_shutdown_waits_for_running_rewrite() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let runtime = test_runtime();
        let restored = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&restored);
        let run = runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
        });

        assert!(wait_for_runs(&runtime, vec![run], Duration::from_secs(5)));
        assert!(restored.load(Ordering::SeqCst));
    }

    #[test]
    fn test_shutdown_wait_is_bounded() {
        let runtime = test_runtime();
        let run = runtime.spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let started = std::time::Instant::now();
        assert!(!wait_for_runs(&runtime, vec![run], Duration::from_millis(50)));
        assert!(started.elapsed() < Duration::from_secs(5));
        runtime.shutdown_background();
    }

    #[test]
    fn test_no_runs_returns_immediately() {
        let runtime = test_runtime();
        assert!(wait_for_runs(&runtime, Vec::new(), Duration::from_millis(1)));
    }
}
