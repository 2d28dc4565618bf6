//! Unified tracing configuration for AIHotKey
//!
//! Provides structured logging with per-rewrite session correlation,
//! dual output to stderr (colored) and file (plain),
//! non-blocking file writes, and dynamic log level changes.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use tracing::Level;
use tracing_appender::{
    non_blocking::{NonBlockingBuilder, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Global guard to keep the non-blocking writer alive
static WORKER_GUARD: OnceCell<Mutex<Option<WorkerGuard>>> = OnceCell::new();

/// Current file log level (modified at runtime via atomic)
static FILE_LOG_LEVEL: AtomicU8 = AtomicU8::new(4);

fn level_to_u8(level: Level) -> u8 {
    match level {
        Level::ERROR => 1,
        Level::WARN => 2,
        Level::INFO => 3,
        Level::DEBUG => 4,
        Level::TRACE => 5,
    }
}

/// Set the file log level dynamically at runtime.
pub fn set_file_log_level(level: Level) {
    FILE_LOG_LEVEL.store(level_to_u8(level), Ordering::Relaxed);
    tracing::info!("File log level changed to {:?}", level);
}

/// Initialize the tracing subscriber with dual output:
/// - Stderr: Colored, respects RUST_LOG (or `debug` when `verbose`)
/// - File: Plain text, daily rotation, 7 days retention, non-blocking
///
/// The worker guard is stored globally; call `flush_logs` before exit.
pub fn init_tracing(log_dir: &std::path::Path, verbose: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(7)
        .filename_prefix("aihotkey")
        .filename_suffix("log")
        .build(log_dir)?;

    let (non_blocking_writer, guard) = NonBlockingBuilder::default()
        .lossy(false) // Don't drop logs under pressure
        .finish(file_appender);

    WORKER_GUARD.get_or_init(|| Mutex::new(Some(guard)));

    let default_directive = if verbose { "debug" } else { "info" };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // stdout is reserved for command output
    let console_layer = fmt::layer()
        .with_ansi(true)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .compact()
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_writer(non_blocking_writer)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            let current_level = FILE_LOG_LEVEL.load(Ordering::Relaxed);
            level_to_u8(*metadata.level()) <= current_level
        }));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!("Tracing initialized, log dir: {}", log_dir.display());

    Ok(())
}

/// Drop the worker guard so buffered file logs are written out.
pub fn flush_logs() {
    if let Some(cell) = WORKER_GUARD.get() {
        if let Ok(mut guard) = cell.lock() {
            guard.take();
        }
    }
}
