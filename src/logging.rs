//! File-based logging for the movie-store client
//!
//! The CLI prints command results on stdout, so tracing output goes to a rolling
//! log file instead.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_DIR: &str = ".logs";
const LOG_FILE_PREFIX: &str = "movie-store";
const DEFAULT_FILTER: &str = "movie_store=debug,reqwest=info,warn";

/// Initialize the logging system.
///
/// Logs are written to `.logs/movie-store.YYYY-MM-DD.log` with daily rotation.
/// The log level can be controlled via the `RUST_LOG` environment variable.
///
/// Default log levels:
/// - `movie_store` modules: DEBUG
/// - `reqwest`: INFO
/// - Other crates: WARN
pub fn init_logging() -> anyhow::Result<()> {
    // Create the log directory on first run
    let log_dir = Path::new(LOG_DIR);
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    // One file per day
    let file_appender = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, LOG_FILE_PREFIX);

    // Writes happen on a background thread, off the runtime's workers.
    // The guard flushes on drop and must outlive every log call
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    Box::leak(Box::new(guard));

    // RUST_LOG wins over the default directives
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // File output only, stdout belongs to the CLI
    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // plain text in files
        .with_target(true) // module path, e.g. movie_store::model::session
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE); // one line per closed span with its timing

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?; // fails if a subscriber is already installed

    tracing::info!("Logging initialized - logs written to {}/", LOG_DIR);

    Ok(())
}

/// Log the outcome of a backend request
#[macro_export]
macro_rules! log_api_result {
    ($method:expr, $path:expr, $result:expr) => {
        match &$result {
            Ok(_) => tracing::debug!(method = %$method, path = %$path, "API request successful"),
            Err(e) => tracing::warn!(method = %$method, path = %$path, error = %e, "API request failed"),
        }
    };
}

/// Log a backend request before it is sent
#[macro_export]
macro_rules! log_api_request {
    ($method:expr, $path:expr) => {
        tracing::trace!(method = %$method, path = %$path, "API request started");
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::trace!(method = %$method, path = %$path, $($field)*, "API request started");
    };
}
