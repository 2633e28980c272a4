use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::Result;

// Timestamp format: 2026-02-14 19:44:09.123 -08:00
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %:z";

/// `wiki_scraper_20260214_194409.log`, one file per run.
pub fn log_file_name() -> String {
    format!("wiki_scraper_{}.log", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Logs to stdout and to a fresh file in `log_dir`.
///
/// `level` is an `EnvFilter` directive and is overridden by `RUST_LOG`.
/// Keep the returned guard alive until the program exits, dropping it flushes the file.
pub fn init_tracing(level: &str, log_dir: &Path) -> Result<(WorkerGuard, PathBuf)> {
    std::fs::create_dir_all(log_dir)?;
    let file_name = log_file_name();
    let file_appender = tracing_appender::rolling::never(log_dir, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string())),
        )
        .try_init()?;

    Ok((guard, log_dir.join(file_name)))
}
